//! The 16-byte wire/file record format (spec §6) and the closed set of
//! setting kinds (spec §4.2, §9).

use crate::config::Config;
use crate::error::{EngineError, Result};

pub const RECORD_LEN: usize = 16;

/// The three recognized setting kinds, closed per spec §4.2. The mapping
/// from discriminant to on-wire `event_type` byte is fixed and must not be
/// renumbered (spec §9's "stable mapping" note) — it is expressed as a
/// static table, not a method on a dynamically extended enum, to resolve
/// the source's "cyclic" event-to-setting lookup (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKind {
    DailyTarget,
    SessionTarget,
    RestTarget,
}

pub const ALL_SETTING_KINDS: [SettingKind; 3] = [
    SettingKind::DailyTarget,
    SettingKind::SessionTarget,
    SettingKind::RestTarget,
];

impl SettingKind {
    pub fn wire_byte(self) -> u8 {
        match self {
            SettingKind::DailyTarget => 1,
            SettingKind::SessionTarget => 2,
            SettingKind::RestTarget => 3,
        }
    }

    pub fn from_wire_byte(b: u8) -> Option<Self> {
        ALL_SETTING_KINDS.into_iter().find(|k| k.wire_byte() == b)
    }

    pub fn default_value(self, config: &Config) -> u64 {
        match self {
            SettingKind::DailyTarget => config.daily_target_default,
            SettingKind::SessionTarget => config.session_target_default,
            SettingKind::RestTarget => config.rest_target_default,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SettingKind::DailyTarget => "daily_target",
            SettingKind::SessionTarget => "session_target",
            SettingKind::RestTarget => "rest_target",
        }
    }
}

/// A decoded event record: either an `action` (a point activity) or an
/// update to one of the closed `SettingKind`s. `event_type` bytes outside
/// `0..=3` are surfaced to the caller as `BadInput` so they can be logged
/// and skipped per spec §7, rather than panicking here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRecord {
    Action { value: u32, time: u64 },
    Setting { kind: SettingKind, value: u32, time: u64 },
}

impl EventRecord {
    /// Decodes one 16-byte little-endian record:
    /// `u8 event_type; u8x3 pad; u32 value; u64 time`.
    pub fn decode(bytes: &[u8; RECORD_LEN]) -> Result<Self> {
        let event_type = bytes[0];
        let value = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let time = u64::from_le_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
            bytes[15],
        ]);
        if event_type == 0 {
            return Ok(EventRecord::Action { value, time });
        }
        match SettingKind::from_wire_byte(event_type) {
            Some(kind) => Ok(EventRecord::Setting { kind, value, time }),
            None => Err(EngineError::BadInput(format!(
                "unknown event_type byte {event_type}"
            ))),
        }
    }
}

/// Decodes a batch of concatenated 16-byte records. `bytes.len() % 16`
/// must be zero per spec §6's subscribe contract; that precondition is
/// enforced by the transport layer, so a mismatched length here is treated
/// as `BadInput` rather than silently truncated.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Result<EventRecord>>> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(EngineError::BadInput(format!(
            "batch length {} is not a multiple of {RECORD_LEN}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let arr: [u8; RECORD_LEN] = chunk.try_into().expect("chunks_exact yields RECORD_LEN");
            EventRecord::decode(&arr)
        })
        .collect())
}
