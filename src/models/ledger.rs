//! Fetch ledger records.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One saved file: its logical filename, when it was saved and the hash of
/// the bytes saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub filename: String,
    pub fetched_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Aggregate counts over the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: u64,
    /// Metadata records under `documents/`.
    pub documents: u64,
    /// Files under `files/`, images included.
    pub files: u64,
    pub images: u64,
    /// Entries outside `documents/` and `files/`.
    pub other: u64,
    pub last_fetched: Option<DateTime<Utc>>,
}
