//! Engine configuration, grounded on `sombra::db::config::Config`: a plain
//! struct with a `Default` impl and named constructors for common
//! profiles, rather than a builder.

use std::path::PathBuf;

/// How aggressively SQLite is told to flush to disk. Mirrors the shape of
/// `sombra::db::config::SyncMode` — a small closed enum of durability
/// profiles rather than a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// `synchronous = FULL`, `journal_mode = WAL`. Safe default.
    Full,
    /// `synchronous = NORMAL`, `journal_mode = WAL`. Faster, still crash-safe
    /// under WAL.
    Normal,
}

impl SyncMode {
    pub fn pragma_value(self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Normal => "NORMAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    pub sync_mode: SyncMode,
    /// Default `daily_target`, in seconds, used only the first time a
    /// database is created (spec §3).
    pub daily_target_default: u64,
    pub session_target_default: u64,
    pub rest_target_default: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("ergobreak.sqlite"),
            sync_mode: SyncMode::Full,
            daily_target_default: 8 * 3600,
            session_target_default: 3600,
            rest_target_default: 5 * 60,
        }
    }
}

impl Config {
    /// Favors throughput over durability guarantees beyond what WAL mode
    /// already provides; suitable for local interactive use where a crash
    /// loses at most the in-flight batch.
    pub fn desktop() -> Self {
        Self {
            sync_mode: SyncMode::Normal,
            ..Self::default()
        }
    }

    pub fn at_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }
}
