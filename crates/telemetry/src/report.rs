//! On-demand report generation.
//!
//! Thin read layer over the durable store: scans the failure namespace,
//! decodes records (dropping corrupt entries in the same pass), reads the
//! recovery markers, and delegates the aggregation to the pure builder in
//! [`steno_core::report`]. Nothing is cached -- every call reflects the
//! store as it is right now.

use std::collections::HashSet;
use std::sync::Arc;

use steno_core::record::{FailureRecord, RecoveryMarker};
use steno_core::report::{build_report, FailureReport};
use steno_core::types::AttemptId;
use steno_store::{keys, KeyValueStore};

use crate::clock::Clock;

/// Builds [`FailureReport`]s from the current store contents.
pub struct ReportGenerator {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Generate a report over all persisted failure records.
    pub fn generate(&self) -> FailureReport {
        let failures = self.load_failures();
        let recovered = self.load_recovered();
        build_report(&failures, &recovered, self.clock.now())
    }

    /// Load and decode every persisted failure record.
    ///
    /// Entries that scan as valid JSON but no longer decode as a
    /// [`FailureRecord`] are corrupt at the schema level; they are deleted
    /// here the same way the store drops byte-level corruption.
    pub fn load_failures(&self) -> Vec<FailureRecord> {
        let entries = match self.store.scan_by_prefix(keys::FAILURE_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan failure records");
                return Vec::new();
            }
        };

        let mut failures = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value::<FailureRecord>(value) {
                Ok(record) => failures.push(record),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Dropping undecodable failure record");
                    if let Err(e) = self.store.delete(&key) {
                        tracing::error!(key, error = %e, "Failed to delete undecodable record");
                    }
                }
            }
        }
        failures
    }

    /// Attempt ids with a recovery marker (their retry later succeeded).
    fn load_recovered(&self) -> HashSet<AttemptId> {
        let entries = match self.store.scan_by_prefix(keys::RECOVERY_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan recovery markers");
                return HashSet::new();
            }
        };

        let mut recovered = HashSet::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::from_value::<RecoveryMarker>(value) {
                Ok(marker) => {
                    recovered.insert(marker.attempt_id);
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Dropping undecodable recovery marker");
                    if let Err(e) = self.store.delete(&key) {
                        tracing::error!(key, error = %e, "Failed to delete undecodable marker");
                    }
                }
            }
        }
        recovered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
