use async_trait::async_trait;
use burrow_core::dedup;
use burrow_core::{
    DeleteRequest, Lookup, OwnerId, Record, Result, ShortCode, Storage, StorageError, StoredLink,
    UserUrl,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace};

/// In-memory storage row for a URL mapping.
#[derive(Debug, Clone)]
struct Row {
    short_code: ShortCode,
    original_url: String,
    short_url: String,
    owner: Option<OwnerId>,
    deleted: bool,
}

impl Row {
    fn to_link(&self) -> StoredLink {
        StoredLink {
            short_code: self.short_code.clone(),
            original_url: self.original_url.clone(),
            short_url: self.short_url.clone(),
            owner: self.owner.clone(),
            deleted: self.deleted,
        }
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        Self {
            short_code: record.short_code,
            original_url: record.original_url,
            short_url: record.short_url,
            owner: record.owner,
            deleted: record.deleted,
        }
    }
}

/// Rows in insertion order plus lookup indexes on both keys.
#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    by_code: HashMap<String, usize>,
    by_url: HashMap<String, usize>,
}

impl Table {
    fn find(&self, lookup: &Lookup) -> Option<&Row> {
        lookup
            .code_str()
            .and_then(|code| self.by_code.get(code))
            .or_else(|| lookup.url_str().and_then(|url| self.by_url.get(url)))
            .map(|&index| &self.rows[index])
    }

    fn code_for_url(&self, url: &str) -> Option<ShortCode> {
        self.by_url
            .get(url)
            .map(|&index| self.rows[index].short_code.clone())
    }

    fn push(&mut self, row: Row) {
        let index = self.rows.len();
        self.by_code.insert(row.short_code.as_str().to_owned(), index);
        self.by_url.insert(row.original_url.clone(), index);
        self.rows.push(row);
    }
}

/// Process-local storage guarded by a single table-wide lock.
///
/// Each instance owns its own table, so independent instances never see
/// each other's records. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    table: Mutex<Table>,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, deleted ones included.
    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, lookup: &Lookup) -> Result<StoredLink> {
        trace!(lookup = %lookup, "looking up link in memory");

        self.table
            .lock()
            .find(lookup)
            .map(Row::to_link)
            .ok_or_else(|| StorageError::NotFound(lookup.to_string()))
    }

    async fn insert(&self, record: Record) -> Result<ShortCode> {
        let mut codes = self.insert_batch(vec![record]).await?;
        codes
            .pop()
            .ok_or_else(|| StorageError::InvalidData("insert produced no short code".to_string()))
    }

    async fn insert_batch(&self, records: Vec<Record>) -> Result<Vec<ShortCode>> {
        let mut table = self.table.lock();

        let plan = dedup::plan(records, |url| table.code_for_url(url));
        debug!(
            written = plan.fresh.len(),
            reused = plan.reused(),
            "storing links in memory"
        );

        for record in plan.fresh {
            table.push(Row::from(record));
        }

        Ok(plan.codes)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UserUrl>> {
        let table = self.table.lock();

        Ok(table
            .rows
            .iter()
            .filter(|row| !row.deleted && row.owner.as_ref() == Some(owner))
            .map(|row| UserUrl {
                original_url: row.original_url.clone(),
                short_url: row.short_url.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn request_delete(&self, request: DeleteRequest) {
        debug!(owner = %request.owner, "memory storage ignores delete requests");
    }

    async fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id).unwrap()
    }

    fn record(code: &str, url: &str, owner: Option<OwnerId>) -> Record {
        Record::builder()
            .short_code(ShortCode::new_unchecked(code))
            .original_url(url)
            .short_url(format!("http://localhost:8080/{code}"))
            .owner(owner)
            .build()
    }

    #[tokio::test]
    async fn insert_and_get_by_code() {
        let storage = MemoryStorage::new();

        storage
            .insert(record("abc123", "https://a.example", None))
            .await
            .unwrap();

        let link = storage
            .get(&Lookup::by_code(ShortCode::new_unchecked("abc123")))
            .await
            .unwrap();
        assert_eq!(link.original_url, "https://a.example");
        assert!(!link.deleted);
    }

    #[tokio::test]
    async fn get_by_url() {
        let storage = MemoryStorage::new();

        storage
            .insert(record("abc123", "https://a.example", None))
            .await
            .unwrap();

        let link = storage.get(&Lookup::by_url("https://a.example")).await.unwrap();
        assert_eq!(link.short_code.as_str(), "abc123");
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let storage = MemoryStorage::new();

        let err = storage
            .get(&Lookup::by_code(ShortCode::new_unchecked("nope00")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        let err = storage.get(&Lookup::default()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_insert_of_same_url_returns_existing_code() {
        let storage = MemoryStorage::new();

        let first = storage
            .insert(record("abc123", "https://a.example", None))
            .await
            .unwrap();
        let second = storage
            .insert(record("zzz999", "https://a.example", None))
            .await
            .unwrap();

        assert_eq!(first.as_str(), "abc123");
        assert_eq!(second.as_str(), "abc123");
        assert_eq!(storage.len(), 1);

        let err = storage
            .get(&Lookup::by_code(ShortCode::new_unchecked("zzz999")))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn batch_dedups_against_existing_rows() {
        let storage = MemoryStorage::new();

        storage
            .insert(record("old000", "https://x", None))
            .await
            .unwrap();

        let codes = storage
            .insert_batch(vec![
                record("new001", "https://x", None),
                record("new002", "https://y", None),
            ])
            .await
            .unwrap();

        let codes: Vec<&str> = codes.iter().map(ShortCode::as_str).collect();
        assert_eq!(codes, vec!["old000", "new002"]);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn list_by_owner_only_returns_owned_rows() {
        let storage = MemoryStorage::new();

        storage
            .insert_batch(vec![
                record("aaa111", "https://a", Some(owner("1"))),
                record("bbb222", "https://b", Some(owner("2"))),
                record("ccc333", "https://c", None),
                record("ddd444", "https://d", Some(owner("1"))),
            ])
            .await
            .unwrap();

        let urls = storage.list_by_owner(&owner("1")).await.unwrap();
        let urls: Vec<&str> = urls.iter().map(|u| u.original_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://d"]);

        assert!(storage.list_by_owner(&owner("3")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_requests_are_ignored() {
        let storage = MemoryStorage::new();

        storage
            .insert(record("abc123", "https://a.example", Some(owner("1"))))
            .await
            .unwrap();
        storage
            .request_delete(DeleteRequest::new(br#"["abc123"]"#.to_vec(), owner("1")))
            .await;

        let link = storage.get(&Lookup::by_url("https://a.example")).await.unwrap();
        assert!(!link.deleted);
    }

    #[tokio::test]
    async fn always_healthy() {
        assert!(MemoryStorage::new().ping().await);
    }

    #[tokio::test]
    async fn instances_are_independent() {
        let one = MemoryStorage::new();
        let two = MemoryStorage::new();

        one.insert(record("abc123", "https://a.example", None))
            .await
            .unwrap();

        assert_eq!(one.len(), 1);
        assert!(two.is_empty());
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_url_store_one_row() {
        let storage = Arc::new(MemoryStorage::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage
                    .insert(record(&format!("code-{i:03}"), "https://same.example", None))
                    .await
                    .unwrap()
            }));
        }

        let mut codes = Vec::new();
        for handle in handles {
            codes.push(handle.await.unwrap());
        }

        assert_eq!(storage.len(), 1);
        assert!(codes.windows(2).all(|w| w[0].as_str() == w[1].as_str()));
    }
}
