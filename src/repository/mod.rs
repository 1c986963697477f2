//! Repository layer for the fetch ledger.
//!
//! The ledger lives in a local SQLite file accessed through rusqlite. SQLite
//! connections are cheap, so each operation opens its own.

mod ledger;

pub use ledger::FetchLedger;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::error::Result;

/// Open a connection with a busy timeout so concurrent writers wait rather
/// than fail.
pub(crate) fn connect(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
///
/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM:SS[.ffffff]` form older
/// ledgers stored.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_datetime_rfc3339() {
        assert_eq!(
            parse_datetime("2016-05-01T12:00:00+00:00"),
            Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_datetime_sqlite_text() {
        assert_eq!(
            parse_datetime("2016-05-01 12:00:00.250000"),
            Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap()
                + chrono::Duration::milliseconds(250)
        );
        assert_eq!(
            parse_datetime("2016-05-01 12:00:00"),
            Utc.with_ymd_and_hms(2016, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_datetime_invalid() {
        assert_eq!(parse_datetime("yesterday"), DateTime::UNIX_EPOCH);
    }
}
