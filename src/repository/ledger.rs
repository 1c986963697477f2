//! Persistent record of every file saved, keyed by logical filename.
//!
//! The table layout is `fetched(filename, fetch_date, content_hash)`. A
//! filename present here has been saved with the recorded hash and never needs
//! to be fetched again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::{connect, parse_datetime};
use crate::error::Result;
use crate::models::{LedgerEntry, LedgerStats};

/// SQLite-backed fetch ledger.
pub struct FetchLedger {
    db_path: PathBuf,
    /// Filenames reserved by in-flight work that has not been recorded yet.
    claims: Mutex<HashSet<String>>,
}

impl FetchLedger {
    /// Open the ledger, creating its table on first use.
    pub fn open(db_path: &Path) -> Result<Self> {
        let ledger = Self {
            db_path: db_path.to_path_buf(),
            claims: Mutex::new(HashSet::new()),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = connect(&self.db_path)?;
        let existed: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'fetched'",
                [],
                |row| row.get(0),
            )?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS fetched (
                filename TEXT,
                fetch_date DATETIME,
                content_hash TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_fetched_filename
                ON fetched(filename);
            CREATE INDEX IF NOT EXISTS idx_fetched_content_hash
                ON fetched(content_hash);
        "#,
        )?;
        if !existed {
            info!("Initialized database table 'fetched'.");
        }
        Ok(())
    }

    /// Hash recorded for `filename`, or `None` if it was never saved.
    pub fn has(&self, filename: &str) -> Result<Option<String>> {
        let conn = connect(&self.db_path)?;
        let hash = conn
            .query_row(
                "SELECT content_hash FROM fetched WHERE filename = ?1 LIMIT 1",
                params![filename],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Record that `filename` was saved with `content_hash`.
    ///
    /// Any row sharing the hash (under any filename) or the filename is
    /// replaced, inside one immediate transaction, so each hash and each
    /// filename has at most one current row.
    pub fn record(&self, filename: &str, content_hash: &str) -> Result<()> {
        self.record_at(filename, content_hash, Utc::now())
    }

    pub(crate) fn record_at(
        &self,
        filename: &str,
        content_hash: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = connect(&self.db_path)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let replaced = tx.execute(
            "DELETE FROM fetched WHERE content_hash = ?1 OR filename = ?2",
            params![content_hash, filename],
        )?;
        tx.execute(
            "INSERT INTO fetched (filename, fetch_date, content_hash) VALUES (?1, ?2, ?3)",
            params![filename, fetched_at.to_rfc3339(), content_hash],
        )?;
        tx.commit()?;

        if replaced > 0 {
            debug!("Replaced {} ledger row(s) for {}", replaced, filename);
        }
        self.release(filename);
        Ok(())
    }

    /// Reserve `filename` for the caller.
    ///
    /// Returns false if it is already recorded or claimed by someone else. A
    /// claim lasts until the filename is recorded or released.
    pub fn claim(&self, filename: &str) -> Result<bool> {
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        if claims.contains(filename) || self.has(filename)?.is_some() {
            return Ok(false);
        }
        claims.insert(filename.to_string());
        Ok(true)
    }

    /// Drop a claim without recording (e.g. after a failed fetch).
    pub fn release(&self, filename: &str) {
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        claims.remove(filename);
    }

    /// Filenames recorded under `content_hash`.
    pub fn filenames_for_hash(&self, content_hash: &str) -> Result<Vec<String>> {
        let conn = connect(&self.db_path)?;
        let mut stmt = conn.prepare("SELECT filename FROM fetched WHERE content_hash = ?1")?;
        let names = stmt
            .query_map(params![content_hash], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Most recently recorded entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LedgerEntry>> {
        let conn = connect(&self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT filename, fetch_date, content_hash FROM fetched
             ORDER BY fetch_date DESC, rowid DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(LedgerEntry {
                    filename: row.get(0)?,
                    fetched_at: parse_datetime(&row.get::<_, String>(1)?),
                    content_hash: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Counts by kind of entry.
    pub fn stats(&self) -> Result<LedgerStats> {
        let conn = connect(&self.db_path)?;
        let (total, documents, files, images, last): (i64, i64, i64, i64, Option<String>) = conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(filename LIKE 'documents/%'), 0),
                    COALESCE(SUM(filename LIKE 'files/%'), 0),
                    COALESCE(SUM(filename LIKE 'files/%\_images\_%' ESCAPE '\'), 0),
                    MAX(fetch_date)
                FROM fetched
                "#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        Ok(LedgerStats {
            total: total as u64,
            documents: documents as u64,
            files: files as u64,
            images: images as u64,
            other: (total - documents - files).max(0) as u64,
            last_fetched: last.as_deref().map(parse_datetime),
        })
    }
}
