//! The Cache Controller (spec §4.5): the single owner of the database
//! connection, applying decoded batches transactionally and maintaining
//! a published read-side cache. Grounded on
//! `ergometer.database.update_database`/`init` and, for the published
//! snapshot, `ergometer.model.Model.metrics_at`.

use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::model::TimeSpan;
use crate::queries;
use crate::store::{host_positions, settings, Database};
use crate::time::{day_start_of, is_on_day, SECONDS_PER_DAY};
use crate::updater::ActivityUpdater;
use crate::wire::{decode_batch, EventRecord, SettingKind};

/// The published, read-side snapshot of the controller's state. Cheap to
/// clone — this is the "shallow copy of the map" spec §5 describes
/// publishing after each commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cache {
    pub day_start: u64,
    pub daily_total: u64,
    pub session_start: u64,
    pub rest_start: u64,
    pub daily_target: u64,
    pub session_target: u64,
    pub rest_target: u64,
}

/// The UI-facing tuple computed at read time (spec §4.6), separate from
/// the committed cache fields it's derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub daily_value: u64,
    pub rest_value: u64,
    pub session_value: u64,
    pub daily_target: u64,
    pub session_target: u64,
    pub rest_target: u64,
}

/// Owns the database connection and the published cache. Single-owner,
/// single-threaded mutation per spec §5; `snapshot()` lets a reader
/// thread observe the cache without touching the connection.
pub struct CacheController {
    db: Database,
    cache: Arc<RwLock<Cache>>,
}

impl CacheController {
    /// Builds the initial cache from a full recomputation over the
    /// already-open store (`ergometer.database.init`).
    pub fn new(db: Database, config: &Config, now: DateTime<Local>) -> Result<Self> {
        let conn = db.connection();
        let day_start = day_start_of(now);
        let day_end = day_start + SECONDS_PER_DAY;
        let rest_target = settings::get(conn, SettingKind::RestTarget, config)?.value;
        let cache = Cache {
            day_start,
            daily_total: queries::activity_total(conn, day_start, day_end)?,
            session_start: queries::session_start(conn, rest_target)?,
            rest_start: queries::rest_start(conn)?,
            daily_target: settings::get(conn, SettingKind::DailyTarget, config)?.value,
            session_target: settings::get(conn, SettingKind::SessionTarget, config)?.value,
            rest_target,
        };
        Ok(Self {
            db,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    /// A cheap, independently-readable copy of the published cache.
    pub fn snapshot(&self) -> Cache {
        *self.cache.read()
    }

    /// The read-only handle a UI thread can hold onto to call
    /// `snapshot()` without sharing the controller itself.
    pub fn snapshot_handle(&self) -> Arc<RwLock<Cache>> {
        Arc::clone(&self.cache)
    }

    /// The spec §4.6 UI-facing read-out, computed from the current cache
    /// at an arbitrary `now` (`ergometer.model.Model.metrics_at`).
    pub fn metrics_at(&self, now: u64) -> Metrics {
        let cache = self.snapshot();
        let daily_value = if is_on_day(now, cache.day_start) {
            cache.daily_total
        } else {
            0
        };
        let rest_value = now.saturating_sub(cache.rest_start);
        let session_value = if rest_value < cache.rest_target {
            now.saturating_sub(cache.session_start)
        } else {
            0
        };
        Metrics {
            daily_value,
            rest_value,
            session_value,
            daily_target: cache.daily_target,
            session_target: cache.session_target,
            rest_target: cache.rest_target,
        }
    }

    /// Applies one decoded batch from `host` at log offset `position`
    /// (spec §4.5). Runs entirely inside one transaction; on success,
    /// publishes the recomputed cache. On any error the transaction rolls
    /// back and the published cache is untouched.
    pub fn apply(
        &mut self,
        now: DateTime<Local>,
        host: &str,
        position: u64,
        bytes: &[u8],
    ) -> Result<()> {
        let previous = self.snapshot();
        let records = decode_batch(bytes)?;

        let next = self.db.with_transaction(|tx| {
            host_positions::advance(tx, host, position, bytes.len() as u64)?;

            let today_start = day_start_of(now);
            let mut day_start = previous.day_start;
            let mut daily_total = Some(previous.daily_total);
            if day_start != today_start {
                day_start = today_start;
                daily_total = None;
            }

            let mut updater = ActivityUpdater::new();
            let mut min_activity_start = crate::time::MAX_TIME;
            let mut max_activity_end = 0u64;
            let mut rest_target_changed = false;
            let mut rest_target = previous.rest_target;
            let mut daily_target = previous.daily_target;
            let mut session_target = previous.session_target;

            for record in records {
                match record {
                    Ok(EventRecord::Action { value, time }) => {
                        min_activity_start = min_activity_start.min(time);
                        max_activity_end = max_activity_end.max(time + value as u64);
                        let increase = updater.update(tx, time, value as u64)?;
                        if let Some(total) = daily_total.as_mut() {
                            if is_on_day(time, day_start) {
                                *total += increase;
                            }
                        }
                    }
                    Ok(EventRecord::Setting { kind, value, time }) => {
                        let changed =
                            settings::update_if_newer(tx, kind, value as u64, time)?;
                        if changed {
                            match kind {
                                SettingKind::RestTarget => {
                                    rest_target = value as u64;
                                    rest_target_changed = true;
                                }
                                SettingKind::DailyTarget => daily_target = value as u64,
                                SettingKind::SessionTarget => session_target = value as u64,
                            }
                        }
                    }
                    Err(err) => {
                        warn!(%err, "skipping unrecognized event record");
                    }
                }
            }

            let daily_total = match daily_total {
                Some(total) => total,
                None => queries::activity_total(tx, day_start, day_start + SECONDS_PER_DAY)?,
            };

            let mut session_start = previous.session_start;
            let needs_session_refresh = rest_target_changed
                || TimeSpan::new(min_activity_start, max_activity_end).overlaps(TimeSpan::new(
                    session_start.saturating_sub(rest_target),
                    session_start,
                ))
                || max_activity_end >= previous.rest_start + rest_target;
            if needs_session_refresh {
                session_start = queries::session_start(tx, rest_target)?;
            }

            let rest_start = if max_activity_end > previous.rest_start {
                max_activity_end
            } else {
                previous.rest_start
            };

            Ok(Cache {
                day_start,
                daily_total,
                session_start,
                rest_start,
                daily_target,
                session_target,
                rest_target,
            })
        })?;

        *self.cache.write() = next;
        debug!(host, position, len = bytes.len(), "applied batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(event_type: u8, value: u32, time: u64) -> Vec<u8> {
        let mut buf = vec![0u8; 16];
        buf[0] = event_type;
        buf[4..8].copy_from_slice(&value.to_le_bytes());
        buf[8..16].copy_from_slice(&time.to_le_bytes());
        buf
    }

    #[test]
    fn fresh_store_starts_at_defaults() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let controller = CacheController::new(db, &config, noon()).unwrap();
        let cache = controller.snapshot();
        assert_eq!(cache.daily_total, 0);
        assert_eq!(cache.rest_target, config.rest_target_default);
    }

    #[test]
    fn apply_action_advances_daily_total_and_position() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let mut controller = CacheController::new(db, &config, noon()).unwrap();
        let day_start = controller.snapshot().day_start;

        let bytes = record(0, 30, day_start + 100);
        controller.apply(noon(), "host-a", 0, &bytes).unwrap();

        let cache = controller.snapshot();
        assert_eq!(cache.daily_total, 30);
        assert_eq!(cache.rest_start, day_start + 130);
    }

    #[test]
    fn apply_rejects_position_mismatch() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let mut controller = CacheController::new(db, &config, noon()).unwrap();
        let bytes = record(0, 1, 1_000);
        let err = controller.apply(noon(), "host-a", 16, &bytes).unwrap_err();
        assert!(matches!(err, EngineError::Position { .. }));
    }

    #[test]
    fn apply_updates_a_setting() {
        let db = Database::open_in_memory().unwrap();
        let config = Config::default();
        let mut controller = CacheController::new(db, &config, noon()).unwrap();
        let bytes = record(3, 600, 1);
        controller.apply(noon(), "host-a", 0, &bytes).unwrap();
        assert_eq!(controller.snapshot().rest_target, 600);
    }
}
