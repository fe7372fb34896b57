//! Shared fixtures for the telemetry integration tests: a recording mock
//! transport with a failure switch, a manually driven clock, and record
//! builders mirroring what the payment form submits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;

use steno_core::record::{FailureDetails, SubscriptionDetails, UserInfo};
use steno_core::types::{AttemptId, Timestamp};
use steno_store::MemoryStore;
use steno_telemetry::clock::ManualClock;
use steno_telemetry::notify::NoopNotifier;
use steno_telemetry::tracker::FailureTracker;
use steno_telemetry::transport::{FailureAlert, FailureBatch, Transport, TransportError};
use steno_telemetry::TrackerConfig;

/// Fixed test epoch: 2023-11-14T22:13:20Z.
const TEST_EPOCH_SECS: i64 = 1_700_000_000;

/// Transport double recording every batch and alert, with a switch to make
/// sends fail.
#[derive(Default)]
pub struct MockTransport {
    batches: Mutex<Vec<Vec<AttemptId>>>,
    alerts: Mutex<Vec<AttemptId>>,
    fail_sends: AtomicBool,
}

impl MockTransport {
    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Attempt ids of every delivered batch, in delivery order.
    pub fn delivered_batches(&self) -> Vec<Vec<AttemptId>> {
        self.batches.lock().unwrap().clone()
    }

    /// Attempt ids of every delivered alert.
    pub fn delivered_alerts(&self) -> Vec<AttemptId> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_failures(&self, batch: &FailureBatch<'_>) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::HttpStatus(503));
        }
        let ids = batch
            .failures
            .iter()
            .map(|f| f.attempt_id().clone())
            .collect();
        self.batches.lock().unwrap().push(ids);
        Ok(())
    }

    async fn send_alert(&self, alert: &FailureAlert<'_>) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::HttpStatus(503));
        }
        self.alerts
            .lock()
            .unwrap()
            .push(alert.failure_data.attempt_id().clone());
        Ok(())
    }
}

/// Fully wired tracker over in-memory ports, with handles to drive and
/// inspect them.
pub struct TrackerFixture {
    pub tracker: FailureTracker,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<MockTransport>,
}

fn test_epoch() -> Timestamp {
    chrono::Utc.timestamp_opt(TEST_EPOCH_SECS, 0).unwrap()
}

/// Install a test subscriber so `RUST_LOG=steno_telemetry=debug` works when
/// debugging a failing test. Safe to call from every test; only the first
/// call wins.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steno_telemetry=warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Build a tracker over a memory store, manual clock, mock transport, and
/// no-op notifier.
pub fn tracker_fixture() -> TrackerFixture {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(test_epoch()));
    let transport = Arc::new(MockTransport::default());

    let tracker = FailureTracker::builder()
        .config(TrackerConfig::default())
        .store(store.clone())
        .clock(clock.clone())
        .transport(transport.clone())
        .notifier(Arc::new(NoopNotifier))
        .build();

    TrackerFixture {
        tracker,
        store,
        clock,
        transport,
    }
}

/// A signed-in customer.
pub fn user() -> UserInfo {
    UserInfo {
        user_id: Some("user_42".to_string()),
        email: Some("learner@example.test".to_string()),
        name: Some("Avery".to_string()),
    }
}

/// A card subscription purchase at the given price.
pub fn subscription(price: f64) -> SubscriptionDetails {
    SubscriptionDetails {
        plan: "pro".to_string(),
        price,
        duration: "monthly".to_string(),
        payment_method: "card".to_string(),
    }
}

/// A failure signal with the given gateway error code.
pub fn failure_details(code: &str) -> FailureDetails {
    FailureDetails {
        error_kind: "card_error".to_string(),
        error_code: code.to_string(),
        error_message: format!("{code} from gateway"),
        ..Default::default()
    }
}

/// Let spawned fire-and-forget tasks run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Poll until `predicate` holds or ~one virtual second passes.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
