use crate::error::Result;
use crate::record::{Lookup, OwnerId, Record, StoredLink};
use crate::shortcode::ShortCode;
use crate::wire::UserUrl;
use async_trait::async_trait;
use jiff::Timestamp;

/// A user-issued request to soft-delete some of their records.
///
/// The payload is kept raw (a JSON array of short codes) and only parsed by
/// the delete worker, after the caller has already been answered.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub payload: Vec<u8>,
    pub owner: OwnerId,
    pub requested_at: Timestamp,
}

impl DeleteRequest {
    pub fn new(payload: impl Into<Vec<u8>>, owner: OwnerId) -> Self {
        Self {
            payload: payload.into(),
            owner,
            requested_at: Timestamp::now(),
        }
    }
}

/// The storage contract shared by the memory, file and database backends.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Name of the backend, for logs.
    fn kind(&self) -> &'static str;

    /// Looks a record up by short code or by original URL.
    ///
    /// Returns `Err(NotFound)` when nothing matches. Soft-deleted records are
    /// still returned, with `deleted` set.
    async fn get(&self, lookup: &Lookup) -> Result<StoredLink>;

    /// Inserts a record unless its original URL is already stored.
    ///
    /// Returns the short code now mapped to the URL: the record's own code on
    /// insert, the existing one otherwise.
    async fn insert(&self, record: Record) -> Result<ShortCode>;

    /// Inserts many records, deduplicating each one independently.
    ///
    /// Returns the effective short code of every input record, in input order.
    async fn insert_batch(&self, records: Vec<Record>) -> Result<Vec<ShortCode>>;

    /// Lists the live records created by `owner`.
    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UserUrl>>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;

    /// Hands a delete request to the backend without waiting for it to apply.
    async fn request_delete(&self, request: DeleteRequest);

    /// Releases pooled connections and joins background workers.
    async fn destroy(&self);
}
