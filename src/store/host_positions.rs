//! The host-position register (spec §4.5): per-source-host monotonic byte
//! offset into the replicated event log, consumed here only to reject
//! out-of-order batches.

use rusqlite::Connection;

use crate::error::{EngineError, Result};

/// Returns the stored position for `host`, or 0 if the host has never
/// been seen.
pub fn get(conn: &Connection, host: &str) -> Result<u64> {
    let position: Option<i64> = conn
        .query_row(
            "SELECT position FROM host_positions WHERE host = ?1",
            [host],
            |row| row.get(0),
        )
        .ok();
    Ok(position.unwrap_or(0) as u64)
}

/// Fails with `Position` if `position` does not equal the stored position;
/// otherwise advances it by `len` (spec §4.5).
pub fn advance(conn: &Connection, host: &str, position: u64, len: u64) -> Result<()> {
    let stored = get(conn, host)?;
    if position != stored {
        return Err(EngineError::Position {
            host: host.to_string(),
            expected: stored,
            got: position,
        });
    }
    conn.execute(
        "INSERT INTO host_positions (host, position) VALUES (?1, ?2)\
         ON CONFLICT(host) DO UPDATE SET position = excluded.position",
        rusqlite::params![host, (stored + len) as i64],
    )?;
    Ok(())
}
