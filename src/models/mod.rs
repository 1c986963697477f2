//! Data models for crsacquire.

mod document;
mod ledger;

pub use document::{Document, Format, FormatProvenance, FormatType};
pub use ledger::{LedgerEntry, LedgerStats};
