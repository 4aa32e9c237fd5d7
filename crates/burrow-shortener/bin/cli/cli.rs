use burrow_core::{CoreError, OwnerId, ShortCode};
use burrow_storage::settings::{
    DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_DELETE_SHARDS, DEFAULT_MAX_CONNECTIONS, DEFAULT_MIN_SHARD_LEN,
};
use burrow_storage::{DeleteWorkerSettings, PoolSettings, StorageSettings};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const USER_ENV: &str = "BURROW_USER";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "Shorten, resolve and manage links")]
pub struct CLI {
    /// Prefix of every short link handed out.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Keep links in this JSON file.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// Keep links in PostgreSQL. Wins over `--file-storage-path`.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV, hide_env_values = true)]
    pub database_dsn: Option<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    #[arg(long, default_value_t = DEFAULT_ACQUIRE_TIMEOUT.as_millis() as u64)]
    pub acquire_timeout_ms: u64,

    /// Concurrent updates issued per delete request.
    #[arg(long, default_value_t = DEFAULT_DELETE_SHARDS)]
    pub delete_shards: usize,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Acting user. Links created without one are anonymous.
    #[arg(short = 'u', long, env = USER_ENV, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a URL and print its short link.
    Shorten { url: String },
    /// Print the URL behind a short code.
    Resolve {
        #[arg(value_parser = parse_code)]
        code: ShortCode,
    },
    /// Shorten a JSON array of `{original_url, correlation_id}` entries.
    Batch {
        /// Read the batch from this file instead of stdin.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the links of the acting user.
    List,
    /// Soft-delete short codes owned by the acting user.
    Delete {
        #[arg(required = true, value_parser = parse_code)]
        codes: Vec<ShortCode>,
    },
    /// Check that the storage backend is reachable.
    Ping,
}

fn parse_code(code: &str) -> Result<ShortCode, CoreError> {
    ShortCode::new(code)
}

impl CLI {
    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            database_dsn: self.database_dsn.clone(),
            file_storage_path: self.file_storage_path.clone(),
            pool: PoolSettings::builder()
                .max_connections(self.max_connections)
                .acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
                .build(),
            delete_worker: DeleteWorkerSettings::builder()
                .shards(self.delete_shards)
                .min_shard_len(DEFAULT_MIN_SHARD_LEN)
                .build(),
        }
    }

    pub fn owner(&self) -> Result<Option<OwnerId>, CoreError> {
        self.user.as_deref().map(OwnerId::new).transpose()
    }
}
