//! The edge store (spec §4.1): point mutations and the window query that
//! both the updater and the metric queries are built on.

use rusqlite::Connection;

use super::row_to_edge;
use crate::error::{EngineError, Result};
use crate::model::{Edge, Polarity};
use crate::time::MAX_TIME;

/// Returns every edge in `[L, U]` where `L` is the greatest edge time
/// strictly less than `start` (or 0 if none) and `U` is the smallest edge
/// time strictly greater than `end` (or `MAX_TIME` if none), ordered by
/// ascending time (spec §4.1).
pub fn edges_spanning(conn: &Connection, start: u64, end: u64) -> Result<Vec<Edge>> {
    let lower: i64 = conn.query_row(
        "SELECT COALESCE(MAX(time), 0) FROM activity_edges WHERE time < ?1",
        [start as i64],
        |row| row.get(0),
    )?;
    let upper: i64 = conn.query_row(
        "SELECT COALESCE(MIN(time), ?2) FROM activity_edges WHERE time > ?1",
        [end as i64, MAX_TIME as i64],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT time, rising FROM activity_edges WHERE time >= ?1 AND time <= ?2 ORDER BY time ASC",
    )?;
    let rows = stmt.query_map([lower, upper], row_to_edge)?;
    let mut edges = Vec::new();
    for row in rows {
        edges.push(row?);
    }
    Ok(edges)
}

/// Fails if an edge already exists at `edge.time`.
pub fn insert(conn: &Connection, edge: Edge) -> Result<()> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO activity_edges (time, rising) VALUES (?1, ?2)",
        rusqlite::params![edge.time as i64, edge.polarity],
    )?;
    if changed == 0 {
        return Err(EngineError::corruption(format!(
            "edge already exists at time {}",
            edge.time
        )));
    }
    Ok(())
}

/// Fails if no edge exists at `time`.
pub fn delete(conn: &Connection, time: u64) -> Result<()> {
    let changed = conn.execute("DELETE FROM activity_edges WHERE time = ?1", [time as i64])?;
    if changed == 0 {
        return Err(EngineError::corruption(format!(
            "no edge to delete at time {time}"
        )));
    }
    Ok(())
}

/// The second-to-last edge by time (used for the rest-start and
/// session-start queries,
/// spec §4.1, §4.4).
pub fn second_to_last(conn: &Connection) -> Result<Edge> {
    conn.query_row(
        "SELECT time, rising FROM activity_edges ORDER BY time DESC LIMIT 1 OFFSET 1",
        [],
        row_to_edge,
    )
    .map_err(|_| EngineError::corruption("fewer than two edges in store"))
}

/// Checks the global invariants of spec §3 hold for the full edge
/// sequence. Used by tests and by the property-test harness; not on the
/// hot path.
pub fn check_invariants(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("SELECT time, rising FROM activity_edges ORDER BY time ASC")?;
    let rows = stmt.query_map([], row_to_edge)?;
    let mut edges = Vec::new();
    for row in rows {
        edges.push(row?);
    }
    if edges.len() < 2 {
        return Err(EngineError::corruption("fewer than two sentinel edges"));
    }
    let first = edges[0];
    let last = *edges.last().expect("checked len >= 2");
    if first.time != 0 || first.polarity != Polarity::Falling {
        return Err(EngineError::corruption("missing (0, falling) sentinel"));
    }
    if last.time != MAX_TIME || last.polarity != Polarity::Rising {
        return Err(EngineError::corruption("missing (MAX_TIME, rising) sentinel"));
    }
    for pair in edges.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.time >= b.time {
            return Err(EngineError::corruption("edges not strictly increasing"));
        }
        if a.polarity == b.polarity {
            return Err(EngineError::corruption("adjacent edges share polarity"));
        }
        if a.polarity == Polarity::Falling {
            let pause_len = b.time - a.time;
            if pause_len < crate::updater::MIN_PAUSE {
                return Err(EngineError::corruption(format!(
                    "pause [{}, {}) shorter than MIN_PAUSE",
                    a.time, b.time
                )));
            }
        }
    }
    Ok(())
}
