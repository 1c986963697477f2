//! crsacquire - incremental acquisition of Congressional Research Service
//! reports.
//!
//! Two crawlers share one substrate: content-addressed filenames, a SQLite
//! ledger of everything already saved, and a pluggable storage sink. Re-runs
//! only fetch what is new or changed.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod http_client;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod storage;

pub use error::{Error, Result};
