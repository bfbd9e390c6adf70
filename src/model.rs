//! Data model for the activity timeline (spec §3).

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::time::MAX_TIME;

/// Whether an edge marks the start of activity (`Rising`) or the start of
/// a pause (`Falling`). Spec §9 asks for a two-variant tagged value in
/// place of the Python original's `bool`, so exhaustive matches read as
/// case analysis rather than an `if`/`else` on an unnamed flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Rising,
    Falling,
}

impl Polarity {
    pub fn is_rising(self) -> bool {
        matches!(self, Polarity::Rising)
    }

    pub fn opposite(self) -> Polarity {
        match self {
            Polarity::Rising => Polarity::Falling,
            Polarity::Falling => Polarity::Rising,
        }
    }
}

impl ToSql for Polarity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let v: i64 = if self.is_rising() { 1 } else { 0 };
        Ok(ToSqlOutput::from(v))
    }
}

impl FromSql for Polarity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(Polarity::Falling),
            1 => Ok(Polarity::Rising),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

/// A point on the timeline where activity begins or a pause begins
/// (spec §3). `time` is unique across all edges and is bounded by
/// `MAX_TIME`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub time: u64,
    pub polarity: Polarity,
}

impl Edge {
    pub fn new(time: u64, polarity: Polarity) -> Self {
        debug_assert!(time <= MAX_TIME);
        Self { time, polarity }
    }

    pub fn rising(time: u64) -> Self {
        Self::new(time, Polarity::Rising)
    }

    pub fn falling(time: u64) -> Self {
        Self::new(time, Polarity::Falling)
    }

    pub fn is_rising(&self) -> bool {
        self.polarity.is_rising()
    }
}

impl PartialOrd for Edge {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Edge {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time.cmp(&other.time)
    }
}

/// A closed-open span `[start, end)` between two edges or two
/// timestamps. Used both for activity/pause intervals (edges) and for
/// overlap checks on bare timestamps (spec §4.5's `Interval.overlaps`).
#[derive(Debug, Clone, Copy)]
pub struct TimeSpan {
    pub start: u64,
    pub end: u64,
}

impl TimeSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True iff the open interval `(start, end)` of one span properly
    /// straddles a boundary of the other, matching `ergometer.util.Interval.overlaps`:
    /// `self.start < other.start < self.end or self.start < other.end < self.end`.
    pub fn overlaps(&self, other: TimeSpan) -> bool {
        (self.start < other.start && other.start < self.end)
            || (self.start < other.end && other.end < self.end)
    }
}
