//! The settings register (spec §4.2): `kind -> (value, timestamp)`,
//! lazily materialized with defaults, last-writer-by-timestamp wins.

use rusqlite::Connection;

use crate::config::Config;
use crate::error::Result;
use crate::wire::SettingKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingValue {
    pub value: u64,
    pub time: u64,
}

/// Lazily materializes with the default value and timestamp 0 if absent
/// (spec §4.2). Does not persist the default until `update_if_newer` is
/// called — a read-only connection never needs write access.
pub fn get(conn: &Connection, kind: SettingKind, config: &Config) -> Result<SettingValue> {
    let row: Option<(i64, i64)> = conn
        .query_row(
            "SELECT value, time FROM settings WHERE kind = ?1",
            [kind.wire_byte()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .ok();
    Ok(match row {
        Some((value, time)) => SettingValue {
            value: value as u64,
            time: time as u64,
        },
        None => SettingValue {
            value: kind.default_value(config),
            time: 0,
        },
    })
}

/// Assigns only when the stored timestamp is strictly less than `time`
/// (spec §4.2). Returns `true` if the stored value changed.
pub fn update_if_newer(conn: &Connection, kind: SettingKind, value: u64, time: u64) -> Result<bool> {
    let current = conn
        .query_row(
            "SELECT time FROM settings WHERE kind = ?1",
            [kind.wire_byte()],
            |row| row.get::<_, i64>(0),
        )
        .ok();
    let current_time = current.map(|t| t as u64).unwrap_or(0);
    let should_update = current_time < time;
    if should_update {
        conn.execute(
            "INSERT INTO settings (kind, value, time) VALUES (?1, ?2, ?3)\
             ON CONFLICT(kind) DO UPDATE SET value = excluded.value, time = excluded.time",
            rusqlite::params![kind.wire_byte(), value as i64, time as i64],
        )?;
    }
    Ok(should_update)
}
