//! The day-boundary rule, ported from `ergometer/time.py`. Consumed as a
//! pure function elsewhere in the crate — nothing here reads the system
//! clock.

use chrono::{DateTime, Local, TimeZone, Timelike};

/// An implementation constant that must exceed any real timestamp. The
/// Python reference uses `math.inf`; this crate uses `2^40 - 1` so it fits
/// in a plain `u64` and participates in arithmetic without special-casing
/// infinities (spec §6).
pub const MAX_TIME: u64 = (1u64 << 40) - 1;

/// Sentinel "no such interval yet" return value (spec §4.4, §9).
pub const MIN_TIME: u64 = 0;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Hour at which the tracked "day" begins, local time.
const DAY_START_HOUR: u32 = 4;

/// Returns the integer timestamp of the most recent local 04:00 at or
/// before `now` (spec §6).
pub fn day_start_of(now: DateTime<Local>) -> u64 {
    let shifted = if now.hour() < DAY_START_HOUR {
        now - chrono::Duration::days(1)
    } else {
        now
    };
    let start = shifted
        .date_naive()
        .and_hms_opt(DAY_START_HOUR, 0, 0)
        .expect("valid time-of-day");
    let start = Local.from_local_datetime(&start).single().unwrap_or_else(|| {
        // DST fold/gap: fall back to the earliest valid local representation.
        Local.from_local_datetime(&start).earliest().expect("some local time exists")
    });
    start.timestamp().max(0) as u64
}

/// `day_start <= t < day_start + 1 day` (spec §6).
pub fn is_on_day(t: u64, day_start: u64) -> bool {
    day_start <= t && t < day_start + SECONDS_PER_DAY
}
