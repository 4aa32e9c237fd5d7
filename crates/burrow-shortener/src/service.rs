use burrow_core::wire::{self, BatchResult};
use burrow_core::{
    DeleteRequest, Lookup, OwnerId, Record, Resolution, Result, ShortCode, Storage, StorageError,
    StoredLink,
};
use burrow_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info};

/// The single entry point of the shortener.
///
/// Wraps whichever [`Storage`] backend is configured together with a code
/// [`Generator`] and the base URL used to build short links. Storage errors
/// are handed back unchanged and nothing is retried here.
///
/// The generator is responsible for uniqueness of generated codes. A
/// collision is not retried.
#[derive(Debug)]
pub struct ShortenerService<S: ?Sized, G> {
    storage: Arc<S>,
    generator: G,
    base_url: String,
}

impl<S: Storage + ?Sized, G: Generator> ShortenerService<S, G> {
    pub fn new(storage: Arc<S>, generator: G, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            storage,
            generator,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    fn record(
        &self,
        original_url: String,
        owner: Option<OwnerId>,
        correlation_id: Option<String>,
    ) -> Record {
        let short_code: ShortCode = self.generator.generate().into();
        let short_url = short_code.to_url(&self.base_url);

        Record::builder()
            .short_code(short_code)
            .original_url(original_url)
            .short_url(short_url)
            .owner(owner)
            .correlation_id(correlation_id)
            .build()
    }

    /// Stores `original_url` under a freshly generated code.
    ///
    /// When the URL is already stored, nothing is written and the existing
    /// code is returned.
    pub async fn shorten(
        &self,
        original_url: impl Into<String>,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode> {
        let record = self.record(original_url.into(), owner, None);
        let generated = record.short_code.as_str().to_owned();

        let code = self.storage.insert(record).await?;
        if code.as_str() != generated {
            debug!(code = %code, "url already shortened, reusing its code");
        }
        Ok(code)
    }

    /// Looks a record up by short code or original URL, deleted ones included.
    pub async fn get(&self, lookup: &Lookup) -> Result<StoredLink> {
        self.storage.get(lookup).await
    }

    /// Resolves a short code for a redirect.
    pub async fn resolve(&self, code: &ShortCode) -> Result<Resolution> {
        match self.storage.get(&Lookup::by_code(code.clone())).await {
            Ok(link) if link.deleted => Ok(Resolution::Gone),
            Ok(link) => Ok(Resolution::Found(link.original_url)),
            Err(StorageError::NotFound(_)) => Ok(Resolution::Missing),
            Err(e) => Err(e),
        }
    }

    /// Shortens every entry of a JSON batch payload.
    ///
    /// The payload is `[{"original_url", "correlation_id"}]`. The response is
    /// `[{"correlation_id", "short_url"}]`, one element per input entry, in
    /// input order.
    pub async fn batch_shorten(&self, payload: &[u8], owner: Option<OwnerId>) -> Result<Vec<u8>> {
        let entries = wire::parse_batch(payload)?;

        let records: Vec<Record> = entries
            .into_iter()
            .map(|entry| {
                self.record(
                    entry.original_url,
                    owner.clone(),
                    Some(entry.correlation_id),
                )
            })
            .collect();
        let correlation_ids: Vec<String> = records
            .iter()
            .map(|r| r.correlation_id.clone().unwrap_or_default())
            .collect();

        let codes = self.storage.insert_batch(records).await?;
        if codes.len() != correlation_ids.len() {
            return Err(StorageError::InvalidData(format!(
                "batch of {} entries produced {} short codes",
                correlation_ids.len(),
                codes.len()
            )));
        }

        let results: Vec<BatchResult> = correlation_ids
            .into_iter()
            .zip(codes)
            .map(|(correlation_id, code)| BatchResult {
                correlation_id,
                short_url: code.to_url(&self.base_url),
            })
            .collect();
        debug!(entries = results.len(), "batch shortened");

        wire::encode(&results)
    }

    /// Lists the live links of `owner` as `[{"original_url", "short_url"}]`.
    ///
    /// Returns `None` when the owner has none.
    pub async fn list_by_user(&self, owner: &OwnerId) -> Result<Option<Vec<u8>>> {
        let urls = self.storage.list_by_owner(owner).await?;
        if urls.is_empty() {
            return Ok(None);
        }
        wire::encode(&urls).map(Some)
    }

    pub async fn ping(&self) -> bool {
        self.storage.ping().await
    }

    /// Queues the soft delete of the codes listed in `payload` and returns
    /// without waiting for it.
    pub async fn request_delete(&self, payload: impl Into<Vec<u8>>, owner: OwnerId) {
        self.storage
            .request_delete(DeleteRequest::new(payload, owner))
            .await;
    }

    pub async fn destroy(&self) {
        self.storage.destroy().await;
        info!(backend = self.storage.kind(), "shortener stopped");
    }
}
