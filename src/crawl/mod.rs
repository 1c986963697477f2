//! Crawlers that discover documents and hand them to the store.
//!
//! Both strategies share the same substrate: an [`HttpClient`] (or any other
//! [`Fetcher`]) for retrieval, the content-addressed naming in
//! [`crate::storage::content`], the [`FetchLedger`] and a [`Sink`].
//!
//! [`HttpClient`]: crate::http_client::HttpClient
//! [`Fetcher`]: crate::http_client::Fetcher
//! [`FetchLedger`]: crate::repository::FetchLedger
//! [`Sink`]: crate::storage::Sink

pub mod link_graph;
pub mod listing;

pub use link_graph::{cache_path, extract_links, LinkGraphCrawler, TraversalReport, VisitedSet};
pub use listing::{extract_image_paths, ListingCrawler, ListingReport};

use regex::bytes::{Regex, RegexBuilder};

use crate::error::Result;

/// Compile a page-scanning pattern that matches raw bytes.
///
/// Unicode mode is off so `.` and negated classes also match bytes that are
/// not valid UTF-8, such as Latin-1 characters in a path.
pub fn byte_pattern(pattern: &str) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern).unicode(false).build()?)
}

/// What happened to one listing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The record and all its files were fetched and stored.
    Fetched,
    /// Dated before the cutoff.
    TooOld,
    /// The exact record is already in the ledger.
    AlreadyRecorded,
}

impl DocumentOutcome {
    /// Whether any fetching happened.
    pub fn did_work(self) -> bool {
        matches!(self, Self::Fetched)
    }
}
