//! JSON shapes exchanged with the HTTP layer.
//!
//! Batch requests are `[{"original_url", "correlation_id"}]`, batch responses
//! `[{"correlation_id", "short_url"}]`, and per-user listings
//! `[{"original_url", "short_url"}]`. Delete requests are a bare array of
//! short codes.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub original_url: String,
    pub correlation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub original_url: String,
    pub short_url: String,
}

/// Parses a batch-insert payload.
pub fn parse_batch(payload: &[u8]) -> Result<Vec<BatchEntry>> {
    serde_json::from_slice(payload)
        .map_err(|e| StorageError::Malformed(format!("expected batch entries: {e}")))
}

/// Parses a delete payload: a JSON array of short codes.
pub fn parse_code_list(payload: &[u8]) -> Result<Vec<String>> {
    serde_json::from_slice(payload)
        .map_err(|e| StorageError::Malformed(format!("expected an array of short codes: {e}")))
}

/// Serializes a response body.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::InvalidData(e.to_string()))
}
