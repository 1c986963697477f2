//! Ledger schema compatibility.
//!
//! Verifies that the ledger opens databases created by earlier versions of
//! the fetcher, which made the bare `fetched` table without indexes and
//! stored naive `YYYY-MM-DD HH:MM:SS.ffffff` timestamps.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use rusqlite::{Connection, Result as SqliteResult};
use tempfile::TempDir;

use crsacquire::repository::FetchLedger;

/// Column name -> declared type for a table.
fn table_columns(conn: &Connection, table: &str) -> SqliteResult<BTreeMap<String, String>> {
    let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let columns = pragma
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?.to_uppercase()))
        })?
        .collect::<SqliteResult<BTreeMap<_, _>>>()?;
    Ok(columns)
}

fn index_names(conn: &Connection) -> SqliteResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='fetched' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(names)
}

#[test]
fn test_fresh_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crs_scraper_database.db");
    FetchLedger::open(&path).unwrap();

    let conn = Connection::open(&path).unwrap();
    let columns = table_columns(&conn, "fetched").unwrap();
    assert_eq!(
        columns,
        BTreeMap::from([
            ("content_hash".to_string(), "TEXT".to_string()),
            ("fetch_date".to_string(), "DATETIME".to_string()),
            ("filename".to_string(), "TEXT".to_string()),
        ])
    );
    assert_eq!(
        index_names(&conn).unwrap(),
        vec!["idx_fetched_content_hash", "idx_fetched_filename"]
    );
}

#[test]
fn test_opens_legacy_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crs_scraper_database.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE fetched (filename text, fetch_date datetime, content_hash text);
             INSERT INTO fetched VALUES
                ('documents/20160501_R1_aa.json', '2016-05-02 10:30:00.500000', 'aa');",
        )
        .unwrap();
    }

    let ledger = FetchLedger::open(&path).unwrap();
    assert_eq!(
        ledger.has("documents/20160501_R1_aa.json").unwrap(),
        Some("aa".to_string())
    );

    let recent = ledger.recent(1).unwrap();
    assert_eq!(
        recent[0].fetched_at,
        Utc.with_ymd_and_hms(2016, 5, 2, 10, 30, 0).unwrap() + chrono::Duration::milliseconds(500)
    );

    let conn = Connection::open(&path).unwrap();
    assert_eq!(index_names(&conn).unwrap().len(), 2);
}

#[test]
fn test_legacy_duplicate_hashes_collapse_on_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crs_scraper_database.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE fetched (filename text, fetch_date datetime, content_hash text);
             INSERT INTO fetched VALUES ('files/a.pdf', '2016-05-02 10:30:00', 'h');
             INSERT INTO fetched VALUES ('files/b.pdf', '2016-05-03 10:30:00', 'h');",
        )
        .unwrap();
    }

    let ledger = FetchLedger::open(&path).unwrap();
    ledger.record("files/c.pdf", "h").unwrap();

    assert_eq!(ledger.filenames_for_hash("h").unwrap(), vec!["files/c.pdf"]);
    assert_eq!(ledger.stats().unwrap().total, 1);
}
