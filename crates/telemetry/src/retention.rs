//! Periodic cleanup of aged failure telemetry.
//!
//! Deletes failure records older than the retention horizon, together with
//! each record's attempt record and recovery marker. Records that fail to
//! parse count as expired. The sweep never deletes a key it did not itself
//! read as expired or corrupt in the same pass, so a write interleaved
//! between scan and delete cannot be clobbered (attempt ids are never
//! reused, which makes the derived attempt/marker deletes safe too).

use std::sync::Arc;
use std::time::Duration;

use steno_core::record::{AttemptRecord, FailureRecord};
use steno_store::{keys, KeyValueStore};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;

/// Sweeps aged and corrupt telemetry out of the durable store.
pub struct RetentionSweeper {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Delete failure records older than `max_age_days` (and anything that
    /// no longer parses), returning the number of failure records removed.
    /// Idempotent: sweeping an already-clean store deletes nothing.
    pub fn sweep(&self, max_age_days: i64) -> usize {
        let cutoff = self.clock.now() - chrono::Duration::days(max_age_days);
        let mut deleted = 0;

        let entries = match self.store.scan_by_prefix(keys::FAILURE_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep: failed to scan failure records");
                return 0;
            }
        };

        for (key, value) in entries {
            let expired = match serde_json::from_value::<FailureRecord>(value) {
                Ok(record) => record.failure_timestamp < cutoff,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Retention sweep: corrupt record counts as expired");
                    true
                }
            };
            if !expired {
                continue;
            }

            self.delete_key(&key);
            if let Some(attempt_id) = keys::strip_prefix(&key, keys::FAILURE_PREFIX) {
                self.delete_key(&keys::attempt_key(&attempt_id));
                self.delete_key(&keys::recovery_key(&attempt_id));
            }
            deleted += 1;
        }

        deleted += self.sweep_stale_attempts(cutoff);

        if deleted > 0 {
            tracing::info!(deleted, "Retention sweep: purged old records");
        } else {
            tracing::debug!("Retention sweep: nothing to purge");
        }
        deleted
    }

    /// Remove attempt records past the horizon that never reached a
    /// terminal outcome (abandoned checkouts); corrupt entries count as
    /// expired here too.
    fn sweep_stale_attempts(&self, cutoff: steno_core::types::Timestamp) -> usize {
        let entries = match self.store.scan_by_prefix(keys::ATTEMPT_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep: failed to scan attempt records");
                return 0;
            }
        };

        let mut deleted = 0;
        for (key, value) in entries {
            let expired = match serde_json::from_value::<AttemptRecord>(value) {
                Ok(record) => record.created_at < cutoff,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Retention sweep: corrupt attempt counts as expired");
                    true
                }
            };
            if expired {
                self.delete_key(&key);
                deleted += 1;
            }
        }
        deleted
    }

    fn delete_key(&self, key: &str) {
        if let Err(e) = self.store.delete(key) {
            tracing::error!(key, error = %e, "Retention sweep: delete failed");
        }
    }

    /// Run the periodic sweep loop until `cancel` is triggered.
    pub async fn run_sweep_loop(
        self: Arc<Self>,
        interval: Duration,
        max_age_days: i64,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            max_age_days,
            interval_secs = interval.as_secs(),
            "Retention sweep loop started"
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention sweep loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep(max_age_days);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
