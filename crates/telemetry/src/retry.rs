//! Retry queue and automatic reattempt timers.
//!
//! Every retryable failure gets a queue entry with a next-attempt timestamp.
//! Only transient infrastructure failures (per
//! [`steno_core::classifier::is_temporary_failure`]) additionally arm a
//! one-shot background timer; all other retryable failures wait for an
//! explicit user or support-triggered retry, driven through
//! [`RetryScheduler::process_due`].
//!
//! Firing an entry publishes [`RecoveryEvent::RetryDue`] -- the host payment
//! form performs the actual reattempt and records it as a new attempt
//! correlated via `parent_attempt_id`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use steno_core::classifier::is_temporary_failure;
use steno_core::record::FailureRecord;
use steno_core::types::{AttemptId, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::bus::{RecoveryEvent, RecoveryEventBus};
use crate::clock::Clock;

/// One queued retryable failure.
#[derive(Debug, Clone)]
pub struct RetryQueueEntry {
    pub attempt_id: AttemptId,
    /// The failure that put this entry in the queue.
    pub record: FailureRecord,
    /// Retries fired so far; never exceeds the configured maximum.
    pub retry_count: u32,
    pub next_retry_at: Timestamp,
}

/// Schedules and bounds retries for failed attempts.
pub struct RetryScheduler {
    entries: Mutex<Vec<RetryQueueEntry>>,
    auto_timers: Mutex<HashMap<AttemptId, CancellationToken>>,
    bus: RecoveryEventBus,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
    max_retries: u32,
    /// Parent token for all armed timers; cancelled on dispose.
    cancel: CancellationToken,
}

impl RetryScheduler {
    pub fn new(
        bus: RecoveryEventBus,
        clock: Arc<dyn Clock>,
        retry_delay: Duration,
        max_retries: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            auto_timers: Mutex::new(HashMap::new()),
            bus,
            clock,
            retry_delay,
            max_retries,
            cancel,
        }
    }

    /// Queue a retry for a failed attempt.
    ///
    /// Non-retryable failures are a no-op. At most one live entry exists per
    /// attempt id, so repeated failure signals for the same attempt do not
    /// multiply retries. Temporary failures also arm the one-shot automatic
    /// reattempt timer.
    pub fn enqueue(self: &Arc<Self>, record: &FailureRecord) {
        if !record.retryable {
            tracing::debug!(attempt_id = %record.attempt_id(), "Failure not retryable; skipping queue");
            return;
        }

        let attempt_id = record.attempt_id().clone();
        {
            let mut entries = self.entries.lock().expect("retry queue lock poisoned");
            if entries.iter().any(|e| e.attempt_id == attempt_id) {
                tracing::debug!(attempt_id = %attempt_id, "Retry already queued");
                return;
            }
            let delay = chrono::Duration::from_std(self.retry_delay)
                .unwrap_or_else(|_| chrono::Duration::seconds(5));
            entries.push(RetryQueueEntry {
                attempt_id: attempt_id.clone(),
                record: record.clone(),
                retry_count: 0,
                next_retry_at: self.clock.now() + delay,
            });
        }

        if is_temporary_failure(&record.error_code) {
            self.arm_auto_timer(attempt_id);
        }
    }

    /// Arm the one-shot automatic reattempt timer for a temporary failure.
    fn arm_auto_timer(self: &Arc<Self>, attempt_id: AttemptId) {
        let token = self.cancel.child_token();
        self.auto_timers
            .lock()
            .expect("timer map lock poisoned")
            .insert(attempt_id.clone(), token.clone());

        let scheduler = Arc::clone(self);
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    tracing::debug!(attempt_id = %attempt_id, "Automatic retry timer fired");
                    scheduler.fire(&attempt_id);
                }
            }
        });
    }

    /// Fire the retry for one queued entry.
    ///
    /// Publishes [`RecoveryEvent::RetryDue`] and pushes the entry's next-due
    /// timestamp forward; an entry whose retry budget is already spent is
    /// dropped and escalated as [`RecoveryEvent::RetriesExhausted`].
    pub fn fire(&self, attempt_id: &AttemptId) {
        let event = {
            let mut entries = self.entries.lock().expect("retry queue lock poisoned");
            let Some(pos) = entries.iter().position(|e| &e.attempt_id == attempt_id) else {
                tracing::debug!(attempt_id = %attempt_id, "No queued retry to fire");
                return;
            };

            if entries[pos].retry_count >= self.max_retries {
                entries.remove(pos);
                tracing::warn!(
                    attempt_id = %attempt_id,
                    max_retries = self.max_retries,
                    "Retries exhausted; escalating"
                );
                RecoveryEvent::RetriesExhausted {
                    attempt_id: attempt_id.clone(),
                }
            } else {
                let delay = chrono::Duration::from_std(self.retry_delay)
                    .unwrap_or_else(|_| chrono::Duration::seconds(5));
                let entry = &mut entries[pos];
                entry.retry_count += 1;
                entry.next_retry_at = self.clock.now() + delay;
                RecoveryEvent::RetryDue {
                    attempt_id: attempt_id.clone(),
                    retry_count: entry.retry_count,
                }
            }
        };

        if matches!(event, RecoveryEvent::RetriesExhausted { .. }) {
            self.drop_auto_timer(attempt_id);
        }
        self.bus.publish(event);
    }

    /// Fire every entry whose next-attempt time has passed. Driven by the
    /// network-restored lifecycle signal and by manual recovery flows.
    pub fn process_due(&self) {
        let now = self.clock.now();
        let due: Vec<AttemptId> = {
            let entries = self.entries.lock().expect("retry queue lock poisoned");
            entries
                .iter()
                .filter(|e| e.next_retry_at <= now)
                .map(|e| e.attempt_id.clone())
                .collect()
        };
        for attempt_id in due {
            self.fire(&attempt_id);
        }
    }

    /// Remove the entry for an attempt whose successor succeeded (or that
    /// no longer needs retrying), cancelling any armed timer.
    pub fn resolve(&self, attempt_id: &AttemptId) {
        let removed = {
            let mut entries = self.entries.lock().expect("retry queue lock poisoned");
            let before = entries.len();
            entries.retain(|e| &e.attempt_id != attempt_id);
            before != entries.len()
        };
        self.drop_auto_timer(attempt_id);
        if removed {
            tracing::debug!(attempt_id = %attempt_id, "Retry entry resolved");
        }
    }

    fn drop_auto_timer(&self, attempt_id: &AttemptId) {
        if let Some(token) = self
            .auto_timers
            .lock()
            .expect("timer map lock poisoned")
            .remove(attempt_id)
        {
            token.cancel();
        }
    }

    /// Attempt ids currently queued for retry.
    pub fn queued_ids(&self) -> Vec<AttemptId> {
        self.entries
            .lock()
            .expect("retry queue lock poisoned")
            .iter()
            .map(|e| e.attempt_id.clone())
            .collect()
    }

    /// Current retry count for a queued attempt.
    pub fn retry_count(&self, attempt_id: &AttemptId) -> Option<u32> {
        self.entries
            .lock()
            .expect("retry queue lock poisoned")
            .iter()
            .find(|e| &e.attempt_id == attempt_id)
            .map(|e| e.retry_count)
    }

    /// The queued failure record for a pending retry, if any. Used by
    /// manual recovery flows to re-present the failure context.
    pub fn queued_record(&self, attempt_id: &AttemptId) -> Option<FailureRecord> {
        self.entries
            .lock()
            .expect("retry queue lock poisoned")
            .iter()
            .find(|e| &e.attempt_id == attempt_id)
            .map(|e| e.record.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
