//! Error kinds for the activity engine, matching spec §7.

use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error kinds raised by the edge store, the updater, and the cache
/// controller. Propagation matches spec §7: `Position` is raised out of
/// the controller for the transport wrapper to retry on; `Corruption`
/// indicates a violated invariant and should abort the owning process;
/// `BadInput` is for malformed records, which callers log and skip rather
/// than propagate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("sqlite error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch position mismatch for host {host:?}: expected {expected}, got {got}")]
    Position {
        host: String,
        expected: u64,
        got: u64,
    },

    #[error("corruption detected: {0}")]
    Corruption(String),

    #[error("bad input: {0}")]
    BadInput(String),
}

impl EngineError {
    pub fn corruption(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(detail = %msg, "invariant violated");
        Self::Corruption(msg)
    }
}
