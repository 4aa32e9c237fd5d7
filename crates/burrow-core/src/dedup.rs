//! Insert-time deduplication shared by every backend.
//!
//! An original URL is stored at most once. Inserting a URL that is already
//! stored is a no-op and the caller gets the existing short code back. Each
//! record of a batch is checked independently against the store state at the
//! time the batch begins; a URL repeated within one batch is written once.

use crate::record::Record;
use crate::shortcode::ShortCode;
use std::collections::HashMap;

/// What a backend has to do for a batch of inserts.
#[derive(Debug, Default)]
pub struct InsertPlan {
    /// The short code the caller gets back for each input record, in input order.
    pub codes: Vec<ShortCode>,
    /// The records that must be physically written, in input order.
    pub fresh: Vec<Record>,
}

impl InsertPlan {
    /// Number of input records that resolved to an existing mapping.
    pub fn reused(&self) -> usize {
        self.codes.len() - self.fresh.len()
    }
}

/// Splits `records` into reused and fresh mappings.
///
/// `existing` is asked for the stored short code of an original URL.
pub fn plan<F>(records: Vec<Record>, mut existing: F) -> InsertPlan
where
    F: FnMut(&str) -> Option<ShortCode>,
{
    let mut plan = InsertPlan {
        codes: Vec::with_capacity(records.len()),
        fresh: Vec::with_capacity(records.len()),
    };
    let mut pending: HashMap<String, ShortCode> = HashMap::new();

    for record in records {
        if let Some(code) = existing(&record.original_url) {
            plan.codes.push(code);
            continue;
        }

        if let Some(code) = pending.get(&record.original_url) {
            plan.codes.push(code.clone());
            continue;
        }

        pending.insert(record.original_url.clone(), record.short_code.clone());
        plan.codes.push(record.short_code.clone());
        plan.fresh.push(record);
    }

    plan
}
