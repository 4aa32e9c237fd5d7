use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid owner id: {0}")]
    InvalidOwner(String),
}

/// Errors surfaced by every storage backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("no record matches {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("timed out acquiring a connection: {0}")]
    AcquireTimeout(String),
    #[error("original url already stored: {0}")]
    UniqueViolation(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("storage file error: {0}")]
    Io(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage query failed: {0}")]
    Query(String),
}

impl StorageError {
    /// Whether this error means "already exists" rather than "something is broken".
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StorageError::UniqueViolation(_))
    }
}

impl From<CoreError> for StorageError {
    fn from(value: CoreError) -> Self {
        StorageError::InvalidData(value.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value.to_string())
    }
}
