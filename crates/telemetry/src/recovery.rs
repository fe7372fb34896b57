//! Recovery orchestration.
//!
//! Composes the classifier's verdict into side effects: queue the retry,
//! fire the out-of-band alert for high-priority failures, and schedule the
//! customer recovery notification. All network side effects are
//! fire-and-forget -- the payment flow never blocks on, or sees errors from,
//! the recovery machinery.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use steno_core::classifier::SupportPriority;
use steno_core::record::FailureRecord;
use steno_core::types::AttemptId;

use crate::bus::{RecoveryEvent, RecoveryEventBus};
use crate::clock::Clock;
use crate::notify::RecoveryNotifier;
use crate::retry::RetryScheduler;
use crate::transport::{FailureAlert, Transport};

/// Drives retry queueing, alerting, and customer notification for failures.
pub struct RecoveryOrchestrator {
    scheduler: Arc<RetryScheduler>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn RecoveryNotifier>,
    bus: RecoveryEventBus,
    clock: Arc<dyn Clock>,
    /// Attempts with a notification already scheduled; keeps at most one
    /// in-flight notification per attempt id.
    scheduled_notices: Arc<Mutex<HashSet<AttemptId>>>,
}

impl RecoveryOrchestrator {
    pub fn new(
        scheduler: Arc<RetryScheduler>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn RecoveryNotifier>,
        bus: RecoveryEventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            transport,
            notifier,
            bus,
            clock,
            scheduled_notices: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// React to one recorded failure.
    ///
    /// Always queues the retry (a no-op for non-retryable failures). High
    /// priority additionally triggers the immediate out-of-band alert; any
    /// retryable or high-priority failure gets a recovery notification,
    /// deduplicated per attempt id.
    pub fn on_failure(&self, record: &FailureRecord) {
        self.scheduler.enqueue(record);

        let high_priority = record.support_priority == SupportPriority::High;
        if high_priority {
            self.spawn_alert(record.clone());
        }
        if record.retryable || high_priority {
            self.schedule_notification(record.clone());
        }
    }

    /// Send the immediate alert in the background; best effort only.
    fn spawn_alert(&self, record: FailureRecord) {
        let transport = Arc::clone(&self.transport);
        let bus = self.bus.clone();
        let alert_timestamp = self.clock.now();

        tokio::spawn(async move {
            let alert = FailureAlert::new(&record, alert_timestamp);
            match transport.send_alert(&alert).await {
                Ok(()) => {
                    tracing::debug!(attempt_id = %record.attempt_id(), "Immediate alert delivered");
                    bus.publish(RecoveryEvent::AlertSent {
                        attempt_id: record.attempt_id().clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt_id = %record.attempt_id(),
                        error = %e,
                        "Immediate alert delivery failed"
                    );
                }
            }
        });
    }

    /// Schedule the customer recovery notification, at most once per
    /// attempt id. A failed send releases the slot so a later failure event
    /// can schedule again.
    fn schedule_notification(&self, record: FailureRecord) {
        let attempt_id = record.attempt_id().clone();
        {
            let mut scheduled = self
                .scheduled_notices
                .lock()
                .expect("notification set lock poisoned");
            if !scheduled.insert(attempt_id.clone()) {
                tracing::debug!(attempt_id = %attempt_id, "Recovery notification already scheduled");
                return;
            }
        }
        self.bus.publish(RecoveryEvent::NotificationScheduled {
            attempt_id: attempt_id.clone(),
        });

        let notifier = Arc::clone(&self.notifier);
        let scheduled_notices = Arc::clone(&self.scheduled_notices);
        tokio::spawn(async move {
            match notifier.send_recovery_notice(&record).await {
                Ok(()) => {
                    tracing::debug!(attempt_id = %attempt_id, "Recovery notification sent");
                }
                Err(e) => {
                    tracing::warn!(
                        attempt_id = %attempt_id,
                        error = %e,
                        "Recovery notification failed"
                    );
                    scheduled_notices
                        .lock()
                        .expect("notification set lock poisoned")
                        .remove(&attempt_id);
                }
            }
        });
    }

    /// Attempts with a notification currently scheduled or sent.
    pub fn scheduled_notifications(&self) -> usize {
        self.scheduled_notices
            .lock()
            .expect("notification set lock poisoned")
            .len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
