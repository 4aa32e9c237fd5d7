//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the record model, the storage contract implemented
//! by every backend, and the insert-time deduplication rule they share.

pub mod base58;
pub mod dedup;
pub mod error;
pub mod record;
pub mod shortcode;
pub mod storage;
pub mod wire;

pub use error::{CoreError, Result, StorageError};
pub use record::{Lookup, OwnerId, Record, Resolution, StoredLink};
pub use shortcode::ShortCode;
pub use storage::{DeleteRequest, Storage};
pub use wire::{BatchEntry, BatchResult, UserUrl};
