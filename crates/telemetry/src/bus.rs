//! Recovery event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The pipeline cannot re-run a payment itself; when a retry becomes due it
//! publishes a [`RecoveryEvent`] and the host payment form reacts (re-submit
//! the charge, prompt the user, surface a support banner). The bus is the
//! only push channel out of the pipeline.

use serde::Serialize;
use steno_core::types::AttemptId;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// RecoveryEvent
// ---------------------------------------------------------------------------

/// A recovery-flow event published to the host application.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// A queued retry is due; the host should re-attempt the payment with a
    /// fresh attempt correlated via `parent_attempt_id`.
    RetryDue {
        attempt_id: AttemptId,
        retry_count: u32,
    },
    /// The retry budget for this attempt is exhausted; only manual recovery
    /// remains.
    RetriesExhausted { attempt_id: AttemptId },
    /// The out-of-band high-priority alert was delivered.
    AlertSent { attempt_id: AttemptId },
    /// A recovery notification was scheduled for the customer.
    NotificationScheduled { attempt_id: AttemptId },
}

impl RecoveryEvent {
    /// The attempt this event concerns.
    pub fn attempt_id(&self) -> &AttemptId {
        match self {
            RecoveryEvent::RetryDue { attempt_id, .. }
            | RecoveryEvent::RetriesExhausted { attempt_id }
            | RecoveryEvent::AlertSent { attempt_id }
            | RecoveryEvent::NotificationScheduled { attempt_id } => attempt_id,
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryEventBus
// ---------------------------------------------------------------------------

/// In-process fan-out bus for [`RecoveryEvent`]s.
///
/// Cloning is cheap (shared sender); any number of subscribers receive every
/// published event. With no subscribers events are silently dropped -- the
/// durable store, not the bus, is the source of truth.
#[derive(Clone)]
pub struct RecoveryEventBus {
    sender: broadcast::Sender<RecoveryEvent>,
}

impl RecoveryEventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: RecoveryEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.sender.subscribe()
    }
}

impl Default for RecoveryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = RecoveryEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(RecoveryEvent::RetryDue {
            attempt_id: AttemptId::new("pay_1_abc"),
            retry_count: 1,
        });

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.attempt_id().as_str(), "pay_1_abc");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = RecoveryEventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(RecoveryEvent::RetriesExhausted {
            attempt_id: AttemptId::new("pay_2_def"),
        });

        assert_eq!(
            rx1.recv().await.unwrap(),
            rx2.recv().await.unwrap()
        );
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = RecoveryEventBus::default();
        bus.publish(RecoveryEvent::AlertSent {
            attempt_id: AttemptId::new("pay_3_ghi"),
        });
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = RecoveryEvent::NotificationScheduled {
            attempt_id: AttemptId::new("pay_4_jkl"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "notification_scheduled");
        assert_eq!(json["attempt_id"], "pay_4_jkl");
    }
}
