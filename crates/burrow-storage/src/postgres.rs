use crate::deletion::{DeleteQueue, DeleteSink};
use crate::settings::{DeleteWorkerSettings, PoolSettings};
use async_trait::async_trait;
use burrow_core::dedup;
use burrow_core::{
    DeleteRequest, Lookup, OwnerId, Record, Result, ShortCode, Storage, StorageError, StoredLink,
    UserUrl,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const SCHEMA: &str = include_str!("../ddl/postgres/short_links.sql");

/// PostgreSQL implementation of the storage contract.
///
/// Deduplication is a pre-check by URL followed by a plain insert, without a
/// transaction around the pair. Two callers racing on the same new URL both
/// pass the pre-check; the unique index on `original_url` lets one insert win
/// and the other one gets [`StorageError::UniqueViolation`].
///
/// Soft deletes go through a [`DeleteQueue`] owned by this instance and are
/// applied in the background.
#[derive(Debug)]
pub struct PostgresStorage {
    pool: PgPool,
    deletes: DeleteQueue,
}

impl PostgresStorage {
    /// Creates a storage from an existing pool and starts its delete worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(pool: PgPool, worker: DeleteWorkerSettings) -> Self {
        let sink = Arc::new(PgDeleteSink { pool: pool.clone() });
        let deletes = DeleteQueue::spawn(sink, worker);
        Self { pool, deletes }
    }

    /// Creates a storage whose pool connects on first use.
    ///
    /// Nothing is dialled here, so an unreachable server only shows up on the
    /// first query or [`Storage::ping`]. Must be called from within a tokio
    /// runtime.
    pub fn lazy(dsn: &str, pool: &PoolSettings, worker: DeleteWorkerSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool.max_connections)
            .acquire_timeout(pool.acquire_timeout)
            .connect_lazy(dsn)
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool, worker))
    }

    /// Creates a storage and makes sure the `short_links` table exists.
    pub async fn connect(
        dsn: &str,
        pool: &PoolSettings,
        worker: DeleteWorkerSettings,
    ) -> Result<Self> {
        let storage = Self::lazy(dsn, pool, worker)?;
        if let Err(e) = storage.ensure_schema().await {
            storage.deletes.shutdown().await;
            storage.pool.close().await;
            return Err(e);
        }
        Ok(storage)
    }

    /// Creates the `short_links` table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        info!("short_links schema ensured");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn code_for_url(&self, url: &str) -> Result<Option<ShortCode>> {
        let uid: Option<Option<String>> =
            sqlx::query_scalar("SELECT uid FROM short_links WHERE original_url = $1 LIMIT 1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(uid.flatten().map(ShortCode::new_unchecked))
    }
}

/// Applies soft deletes with one `UPDATE` per call.
#[derive(Debug)]
struct PgDeleteSink {
    pool: PgPool,
}

#[async_trait]
impl DeleteSink for PgDeleteSink {
    async fn mark_deleted(&self, codes: &[String], owner: &OwnerId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET is_deleted = TRUE
            WHERE uid = ANY($1)
              AND user_id = $2
            "#,
        )
        .bind(codes)
        .bind(owner.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::AcquireTimeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => StorageError::Unavailable(message),
        sqlx::Error::RowNotFound => StorageError::NotFound(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn link_from_row(row: &PgRow) -> Result<StoredLink> {
    let uid: Option<String> = row.try_get("uid").map_err(map_sqlx_error)?;
    let original_url: Option<String> = row.try_get("original_url").map_err(map_sqlx_error)?;
    let short_url: Option<String> = row.try_get("short_url").map_err(map_sqlx_error)?;
    let user_id: Option<String> = row.try_get("user_id").map_err(map_sqlx_error)?;
    let is_deleted: Option<bool> = row.try_get("is_deleted").map_err(map_sqlx_error)?;

    let owner = user_id
        .filter(|id| !id.is_empty())
        .map(OwnerId::new)
        .transpose()?;

    Ok(StoredLink {
        short_code: ShortCode::new_unchecked(uid.unwrap_or_default()),
        original_url: original_url.unwrap_or_default(),
        short_url: short_url.unwrap_or_default(),
        owner,
        deleted: is_deleted.unwrap_or(false),
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn get(&self, lookup: &Lookup) -> Result<StoredLink> {
        trace!(lookup = %lookup, "looking up link in postgres");

        if lookup.is_empty() {
            return Err(StorageError::NotFound(lookup.to_string()));
        }

        let row = sqlx::query(
            r#"
            SELECT uid, original_url, short_url, user_id, is_deleted
            FROM short_links
            WHERE uid = $1
               OR original_url = $2
            ORDER BY (uid = $1) IS TRUE DESC, id
            LIMIT 1
            "#,
        )
        .bind(lookup.code_str())
        .bind(lookup.url_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(lookup.to_string()));
        };

        link_from_row(&row)
    }

    async fn insert(&self, record: Record) -> Result<ShortCode> {
        if let Some(code) = self.code_for_url(&record.original_url).await? {
            debug!(url = %record.original_url, code = %code, "url already stored");
            return Ok(code);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO short_links (uid, original_url, short_url, user_id, is_deleted)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.short_code.as_str())
        .bind(&record.original_url)
        .bind(&record.short_url)
        .bind(record.owner.as_ref().map(OwnerId::as_str))
        .bind(record.deleted)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record.short_code),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::UniqueViolation(record.original_url))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn insert_batch(&self, records: Vec<Record>) -> Result<Vec<ShortCode>> {
        let urls: Vec<String> = records.iter().map(|r| r.original_url.clone()).collect();

        let existing: HashMap<String, String> = sqlx::query(
            r#"
            SELECT original_url, uid
            FROM short_links
            WHERE original_url = ANY($1)
            "#,
        )
        .bind(&urls)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .iter()
        .map(|row| {
            let url: Option<String> = row.try_get("original_url")?;
            let uid: Option<String> = row.try_get("uid")?;
            Ok(url.zip(uid))
        })
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(map_sqlx_error)?
        .into_iter()
        .flatten()
        .collect();

        let plan = dedup::plan(records, |url| {
            existing.get(url).map(|uid| ShortCode::new_unchecked(uid.as_str()))
        });
        debug!(
            written = plan.fresh.len(),
            reused = plan.reused(),
            "storing links in postgres"
        );

        if plan.fresh.is_empty() {
            return Ok(plan.codes);
        }

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        let mut conflicts = Vec::new();

        for record in &plan.fresh {
            let result = sqlx::query(
                r#"
                INSERT INTO short_links (uid, original_url, short_url, user_id, is_deleted)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(record.short_code.as_str())
            .bind(&record.original_url)
            .bind(&record.short_url)
            .bind(record.owner.as_ref().map(OwnerId::as_str))
            .bind(record.deleted)
            .execute(&mut *conn)
            .await;

            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    conflicts.push(record.original_url.clone());
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        if !conflicts.is_empty() {
            warn!(conflicts = conflicts.len(), "batch insert raced with another writer");
            return Err(StorageError::UniqueViolation(conflicts.join(", ")));
        }

        Ok(plan.codes)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<UserUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT original_url, short_url
            FROM short_links
            WHERE user_id = $1
              AND is_deleted IS NOT TRUE
            ORDER BY id
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter()
            .map(|row| {
                let original_url: Option<String> =
                    row.try_get("original_url").map_err(map_sqlx_error)?;
                let short_url: Option<String> = row.try_get("short_url").map_err(map_sqlx_error)?;
                Ok(UserUrl {
                    original_url: original_url.unwrap_or_default(),
                    short_url: short_url.unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn ping(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "postgres ping failed");
                false
            }
        }
    }

    async fn request_delete(&self, request: DeleteRequest) {
        self.deletes.submit(request);
    }

    async fn destroy(&self) {
        self.deletes.shutdown().await;
        self.pool.close().await;
        info!("postgres storage closed");
    }
}
