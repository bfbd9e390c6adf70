//! Metric queries (spec §4.4): pure functions over the committed edge
//! store, each grounded directly on `ergometer.database.ActivityEdge`'s
//! `activity_total`/`session_start`/`rest_start`.

use rusqlite::Connection;

use crate::error::Result;
use crate::intervals::overlapping_pairs;
use crate::store::edges;
use crate::time::{MAX_TIME, MIN_TIME};

/// Sum of activity-interval lengths intersected with `[start, end]`.
pub fn activity_total(conn: &Connection, start: u64, end: u64) -> Result<u64> {
    let edges = edges::edges_spanning(conn, start, end)?;
    let total = overlapping_pairs(&edges, false)
        .into_iter()
        .map(|(rising, falling)| {
            let lo = rising.time.max(start);
            let hi = falling.time.min(end);
            hi.saturating_sub(lo)
        })
        .sum();
    Ok(total)
}

/// The timestamp at which the current session began.
///
/// Walks every consecutive pair of edges from newest to oldest — not
/// just falling/rising pause pairs, mirroring
/// `ergometer.database.ActivityEdge.session_start` exactly, which filters
/// purely by gap length regardless of which edge polarity opened it —
/// and returns the later edge's time of the second gap found whose
/// length is at least `rest_target`, or `MIN_TIME` if fewer than two
/// such gaps exist.
pub fn session_start(conn: &Connection, rest_target: u64) -> Result<u64> {
    let edges = edges::edges_spanning(conn, MIN_TIME, MAX_TIME)?;
    let mut found = edges
        .windows(2)
        .rev()
        .filter(|w| w[1].time - w[0].time >= rest_target)
        .take(2);
    let _most_recent = found.next();
    match found.next() {
        Some(w) => Ok(w[1].time),
        None => Ok(MIN_TIME),
    }
}

/// The start of the current (possibly still open) pause: the falling
/// edge with the largest time not equal to `MAX_TIME`.
pub fn rest_start(conn: &Connection) -> Result<u64> {
    Ok(edges::second_to_last(conn)?.time)
}
