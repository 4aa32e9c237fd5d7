use async_trait::async_trait;
use burrow_core::dedup;
use burrow_core::{
    DeleteRequest, Lookup, OwnerId, Record, Result, ShortCode, Storage, StorageError, StoredLink,
    UserUrl,
};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

/// One element of the JSON array kept on disk.
///
/// Field names follow the database columns so both formats can be
/// exported into one another without renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileRow {
    uid: String,
    original_url: String,
    #[serde(default)]
    short_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default)]
    is_deleted: bool,
}

impl FileRow {
    fn to_link(&self) -> Result<StoredLink> {
        Ok(StoredLink {
            short_code: ShortCode::new_unchecked(self.uid.as_str()),
            original_url: self.original_url.clone(),
            short_url: self.short_url.clone(),
            owner: self.owner()?,
            deleted: self.is_deleted,
        })
    }

    fn owner(&self) -> Result<Option<OwnerId>> {
        let owner = self
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(OwnerId::new)
            .transpose()?;
        Ok(owner)
    }
}

impl From<Record> for FileRow {
    fn from(record: Record) -> Self {
        Self {
            uid: record.short_code.as_str().to_owned(),
            original_url: record.original_url,
            short_url: record.short_url,
            user_id: record.owner.map(String::from),
            is_deleted: record.deleted,
        }
    }
}

/// Storage backed by a single JSON array file.
///
/// Every call reads the whole file. Every write rewrites the whole file
/// through a temporary sibling that is renamed over the original, so a
/// crash mid-write leaves the previous contents in place. All access is
/// serialized by one lock, which makes writes O(file size).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Opens the storage file, creating its directory and an empty `[]`
    /// file when they do not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::Io(format!("cannot create directory {}: {e}", dir.display()))
            })?;
        }

        match fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::write(&path, b"[]").await.map_err(|e| {
                    StorageError::Io(format!("cannot create {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "created empty link file");
            }
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "cannot stat {}: {e}",
                    path.display()
                )))
            }
        }

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<FileRow>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::InvalidData(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, rows: &[FileRow]) -> Result<()> {
        let content =
            serde_json::to_vec(rows).map_err(|e| StorageError::InvalidData(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)
            .await
            .map_err(|e| StorageError::Io(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).await.map_err(|e| {
            StorageError::Io(format!(
                "cannot replace {} with {}: {e}",
                self.path.display(),
                tmp.display()
            ))
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    fn kind(&self) -> &'static str {
        "file"
    }

    async fn get(&self, lookup: &Lookup) -> Result<StoredLink> {
        trace!(lookup = %lookup, path = %self.path.display(), "looking up link in file");

        let _guard = self.lock.lock().await;
        let rows = self.load().await?;

        lookup
            .pick(&rows, |row| (row.uid.as_str(), row.original_url.as_str()))
            .ok_or_else(|| StorageError::NotFound(lookup.to_string()))?
            .to_link()
    }

    async fn insert(&self, record: Record) -> Result<ShortCode> {
        let mut codes = self.insert_batch(vec![record]).await?;
        codes
            .pop()
            .ok_or_else(|| StorageError::InvalidData("insert produced no short code".to_string()))
    }

    async fn insert_batch(&self, records: Vec<Record>) -> Result<Vec<ShortCode>> {
        let _guard = self.lock.lock().await;
        let mut rows = self.load().await?;

        let plan = dedup::plan(records, |url| {
            rows.iter()
                .find(|row| row.original_url == url)
                .map(|row| ShortCode::new_unchecked(row.uid.as_str()))
        });
        debug!(
            written = plan.fresh.len(),
            reused = plan.reused(),
            path = %self.path.display(),
            "storing links in file"
        );

        if !plan.fresh.is_empty() {
            rows.extend(plan.fresh.into_iter().map(FileRow::from));
            self.save(&rows).await?;
        }

        Ok(plan.codes)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UserUrl>> {
        let _guard = self.lock.lock().await;
        let rows = self.load().await?;

        Ok(rows
            .into_iter()
            .filter(|row| !row.is_deleted && row.user_id.as_deref() == Some(owner.as_str()))
            .map(|row| UserUrl {
                original_url: row.original_url,
                short_url: row.short_url,
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn request_delete(&self, request: DeleteRequest) {
        debug!(owner = %request.owner, "file storage ignores delete requests");
    }

    async fn destroy(&self) {}
}
