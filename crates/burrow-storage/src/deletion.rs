//! Asynchronous soft-delete pipeline.
//!
//! Callers hand a [`DeleteRequest`] to a [`DeleteQueue`] and return at once.
//! A single worker task owns the receiving end of the queue. For every
//! request it parses the raw payload into a set of unique short codes, splits
//! the set into a few shards, and issues one batched update per shard
//! concurrently.
//!
//! Delivery is best effort. A failed update is logged and dropped, never
//! retried, and requests still sitting in the queue are lost if the process
//! dies. Re-applying a request is harmless because the deleted flag only
//! ever flips from false to true.

use crate::settings::DeleteWorkerSettings;
use async_trait::async_trait;
use burrow_core::wire::parse_code_list;
use burrow_core::{DeleteRequest, OwnerId, Result};
use jiff::Timestamp;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Applies soft deletes to the underlying store.
#[async_trait]
pub trait DeleteSink: Send + Sync + 'static {
    /// Marks every record in `codes` owned by `owner` as deleted.
    ///
    /// Codes that do not exist or belong to someone else are skipped
    /// silently. Returns the number of rows affected.
    async fn mark_deleted(&self, codes: &[String], owner: &OwnerId) -> Result<u64>;
}

/// Producer handle of the delete pipeline, plus the worker it feeds.
#[derive(Debug)]
pub struct DeleteQueue {
    sender: Mutex<Option<UnboundedSender<DeleteRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeleteQueue {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn<S: DeleteSink>(sink: Arc<S>, settings: DeleteWorkerSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(receiver, sink, settings));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Enqueues a request. Never blocks.
    pub fn submit(&self, request: DeleteRequest) {
        let sender = self.sender.lock();

        let Some(sender) = sender.as_ref() else {
            warn!(owner = %request.owner, "delete queue is shut down, dropping request");
            return;
        };

        if let Err(mpsc::error::SendError(request)) = sender.send(request) {
            error!(owner = %request.owner, "delete worker is gone, dropping request");
        }
    }

    /// Closes the queue, lets the worker apply what is already queued, and
    /// waits for it to exit. Later calls return immediately.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "delete worker terminated abnormally");
            }
        }
    }
}

async fn run<S: DeleteSink>(
    mut receiver: UnboundedReceiver<DeleteRequest>,
    sink: Arc<S>,
    settings: DeleteWorkerSettings,
) {
    info!(
        shards = settings.shards,
        min_shard_len = settings.min_shard_len,
        "delete worker started"
    );

    while let Some(request) = receiver.recv().await {
        apply(&sink, &settings, request).await;
    }

    info!("delete worker stopped");
}

/// Applies one request and returns the number of rows affected.
async fn apply<S: DeleteSink>(
    sink: &Arc<S>,
    settings: &DeleteWorkerSettings,
    request: DeleteRequest,
) -> u64 {
    let codes = match parse_code_list(&request.payload) {
        Ok(codes) => codes,
        Err(e) => {
            warn!(owner = %request.owner, error = %e, "dropping malformed delete request");
            return 0;
        }
    };

    let unique: BTreeSet<String> = codes
        .into_iter()
        .map(|code| code.trim().to_owned())
        .filter(|code| !code.is_empty())
        .collect();
    if unique.is_empty() {
        debug!(owner = %request.owner, "delete request names no short codes");
        return 0;
    }

    let requested = unique.len();
    let shards = shard(unique.into_iter().collect(), settings);
    let shard_count = shards.len();

    let mut tasks = JoinSet::new();
    for codes in shards {
        let sink = Arc::clone(sink);
        let owner = request.owner.clone();
        tasks.spawn(async move {
            let result = sink.mark_deleted(&codes, &owner).await;
            (codes.len(), result)
        });
    }

    let mut affected = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(rows))) => affected += rows,
            Ok((len, Err(e))) => {
                error!(
                    owner = %request.owner,
                    codes = len,
                    error = %e,
                    "soft delete failed, dropping shard"
                );
            }
            Err(e) => error!(owner = %request.owner, error = %e, "soft delete shard panicked"),
        }
    }

    let lag = Timestamp::now().duration_since(request.requested_at);
    info!(
        owner = %request.owner,
        requested,
        affected,
        shards = shard_count,
        lag = ?lag,
        "applied delete request"
    );

    affected
}

/// Splits `codes` into at most `settings.shards` chunks of at least
/// `settings.min_shard_len` codes each (the last chunk may be shorter).
fn shard(codes: Vec<String>, settings: &DeleteWorkerSettings) -> Vec<Vec<String>> {
    let shards = settings.shards.max(1);
    let min_len = settings.min_shard_len.max(1);
    let per_shard = codes.len().div_ceil(shards).max(min_len);

    codes.chunks(per_shard).map(<[String]>::to_vec).collect()
}
