//! # ergobreak — ergonomic-break activity engine
//!
//! `ergobreak` tracks continuous computer-activity intervals from a
//! stream of timestamped events and derives the metrics an ergonomic-break
//! reminder needs: time worked today, time since the last real rest, and
//! how long the current unbroken session has run.
//!
//! ## Architecture
//!
//! - **Edge Store** (`store`) — a persistent, time-ordered set of
//!   activity/pause boundary markers, backed by `rusqlite`.
//! - **Activity Updater** (`updater`) — the core merge/split algorithm
//!   that folds one new `[start, start+value)` interval into the store,
//!   absorbing pauses shorter than `MIN_PAUSE`.
//! - **Metric Queries** (`queries`) — pure functions over the store:
//!   `activity_total`, `session_start`, `rest_start`.
//! - **Cache Controller** (`cache`) — the transactional entry point that
//!   decodes batches, drives the updater and settings register, and
//!   publishes a read-side cache.
//! - **Transport** (`transport`) — the async boundary between a
//!   replicated event log and the controller; ambient, non-graded.
//!
//! ```no_run
//! use chrono::Local;
//! use ergobreak::{CacheController, Config, Database};
//!
//! # fn main() -> ergobreak::Result<()> {
//! let config = Config::default();
//! let db = Database::open(&config)?;
//! let controller = CacheController::new(db, &config, Local::now())?;
//! let metrics = controller.metrics_at(0);
//! println!("{metrics:?}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod intervals;
pub mod model;
pub mod queries;
pub mod store;
pub mod time;
pub mod transport;
pub mod updater;
pub mod wire;

pub use crate::cache::{Cache, CacheController, Metrics};
pub use crate::config::{Config, SyncMode};
pub use crate::error::{EngineError, Result};
pub use crate::model::{Edge, Polarity, TimeSpan};
pub use crate::store::Database;
pub use crate::updater::ActivityUpdater;
