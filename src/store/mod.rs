//! Persistence layer: a `rusqlite`-backed database holding the edge store,
//! the settings register, and the host-position register in one
//! transactional scope (spec §4.1, §4.2, §6). Grounded on
//! `sombra::sqlite_adapter::SqliteGraphDB` for the `rusqlite` idiom (pragma
//! setup, `Connection`, prepared statements) and on
//! `sombra::db::transaction::Transaction` for the shape of a transaction
//! wrapper that the rest of the crate drives.

pub mod edges;
pub mod host_positions;
pub mod settings;

use std::path::Path;

use rusqlite::Connection;

use crate::config::Config;
use crate::error::Result;
use crate::model::{Edge, Polarity};
use crate::time::MAX_TIME;

/// The opened database. Owns the single `rusqlite::Connection` — per
/// spec §5 the connection is single-owner and single-threaded within the
/// core.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_path(&config.db_path, config.sync_mode.pragma_value())
    }

    pub fn open_path(path: impl AsRef<Path>, synchronous: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", synchronous)?;
        conn.pragma_update(None, "foreign_keys", true)?;

        let edges_existed = table_exists(&conn, "activity_edges")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS activity_edges (\
                time INTEGER PRIMARY KEY, \
                rising INTEGER NOT NULL\
             )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (\
                kind INTEGER PRIMARY KEY, \
                value INTEGER NOT NULL, \
                time INTEGER NOT NULL\
             )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS host_positions (\
                host TEXT PRIMARY KEY, \
                position INTEGER NOT NULL\
             )",
            [],
        )?;

        if !edges_existed {
            conn.execute(
                "INSERT INTO activity_edges (time, rising) VALUES (0, 0), (?1, 1)",
                [MAX_TIME as i64],
            )?;
        }

        Ok(Self { conn })
    }

    /// In-memory database, for tests (spec §8 fixtures).
    #[cfg(any(test, feature = "test-util"))]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(
            "CREATE TABLE activity_edges (time INTEGER PRIMARY KEY, rising INTEGER NOT NULL)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE settings (kind INTEGER PRIMARY KEY, value INTEGER NOT NULL, time INTEGER NOT NULL)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE host_positions (host TEXT PRIMARY KEY, position INTEGER NOT NULL)",
            [],
        )?;
        conn.execute(
            "INSERT INTO activity_edges (time, rising) VALUES (0, 0), (?1, 1)",
            [MAX_TIME as i64],
        )?;
        Ok(Self { conn })
    }

    /// Runs `f` inside one transaction, committing atomically on success
    /// and rolling back on error or panic-unwind (spec §4.1's "Transactional"
    /// requirement, and spec §5's cancellation rule that an aborted batch
    /// leaves no partial transaction).
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Read-only convenience for queries that don't need a writable
    /// transaction (spec §4.4's "pure functions over the edge store").
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn row_to_edge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Edge> {
    let time: i64 = row.get(0)?;
    let polarity: Polarity = row.get(1)?;
    Ok(Edge::new(time as u64, polarity))
}
