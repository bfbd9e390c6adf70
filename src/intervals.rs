//! Shared helper for pairing up edges into intervals, used by both the
//! activity updater (pauses) and the metric queries (activities). Ported
//! from `ergometer.database.get_overlapping_intervals`.

use crate::model::Edge;

/// Drops leading edges whose `rising` flag equals `as_pauses`, then pairs
/// up what's left two at a time. With `as_pauses = false` this yields
/// `(rising, falling)` activity pairs (drop leading falling edges first);
/// with `as_pauses = true` it yields `(falling, rising)` pause pairs (drop
/// leading rising edges first). A trailing unpaired edge, if any, is
/// dropped — mirroring Python's `zip(iterator, iterator)`, which silently
/// discards a final odd element.
pub fn overlapping_pairs(edges: &[Edge], as_pauses: bool) -> Vec<(Edge, Edge)> {
    let start = edges
        .iter()
        .position(|e| e.is_rising() != as_pauses)
        .unwrap_or(edges.len());
    edges[start..]
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}
