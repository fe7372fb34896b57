//! The failure tracker service facade.
//!
//! [`FailureTracker`] wires the pipeline together behind the surface the
//! payment-form collaborator consumes: explicit construction via
//! [`FailureTracker::builder`] with injected ports, an explicit
//! [`start`](FailureTracker::start)/[`dispose`](FailureTracker::dispose)
//! lifecycle for the background loops, and fire-and-forget telemetry
//! methods that log-and-swallow their own errors -- telemetry must never be
//! able to break checkout.
//!
//! All methods that spawn background work (`start`, the tracking methods,
//! lifecycle signals) must be called from within a tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use steno_core::classifier::ClassifierConfig;
use steno_core::export::{to_csv, ExportFormat, ExportedData, FailureExport};
use steno_core::record::{
    FailureDetails, FailureRecord, SubscriptionDetails, SuccessDetails, SuccessRecord, UserInfo,
};
use steno_core::report::FailureReport;
use steno_core::types::AttemptId;
use steno_store::{KeyValueStore, MemoryStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::FailureBuffer;
use crate::bus::{RecoveryEvent, RecoveryEventBus};
use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::env::{EnvironmentInfoProvider, StaticEnvironment};
use crate::notify::{EmailNotifier, NoopNotifier, RecoveryNotifier, SmtpConfig};
use crate::recorder::AttemptRecorder;
use crate::recovery::RecoveryOrchestrator;
use crate::report::ReportGenerator;
use crate::retention::RetentionSweeper;
use crate::retry::RetryScheduler;
use crate::transport::{HttpTransport, Transport};

// ---------------------------------------------------------------------------
// LifecycleSignal
// ---------------------------------------------------------------------------

/// Host lifecycle signals the tracker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The tab became hidden; ship what we have.
    Hidden,
    /// The page is unloading; best-effort final flush (data loss on a hard
    /// crash is accepted).
    Unload,
    /// Connectivity returned; drive due retries and re-ship the buffer.
    NetworkRestored,
}

// ---------------------------------------------------------------------------
// FailureTracker
// ---------------------------------------------------------------------------

/// Payment failure telemetry and recovery service.
pub struct FailureTracker {
    config: TrackerConfig,
    recorder: AttemptRecorder,
    buffer: Arc<FailureBuffer>,
    scheduler: Arc<RetryScheduler>,
    orchestrator: RecoveryOrchestrator,
    reports: ReportGenerator,
    sweeper: Arc<RetentionSweeper>,
    bus: RecoveryEventBus,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl FailureTracker {
    /// Start building a tracker with injected ports.
    pub fn builder() -> FailureTrackerBuilder {
        FailureTrackerBuilder::default()
    }

    /// Spawn the periodic flush and retention loops.
    ///
    /// Idempotent: a second call logs and does nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Failure tracker already started");
            return;
        }

        let mut tasks = self.tasks.lock().expect("task list lock poisoned");
        tasks.push(tokio::spawn(Arc::clone(&self.buffer).run_flush_loop(
            self.config.flush_interval,
            self.cancel.child_token(),
        )));
        tasks.push(tokio::spawn(Arc::clone(&self.sweeper).run_sweep_loop(
            self.config.sweep_interval,
            self.config.retention_max_age_days,
            self.cancel.child_token(),
        )));
        tracing::info!("Failure tracker started");
    }

    /// Stop the background loops, cancel pending retry timers, and perform
    /// a final best-effort flush.
    pub async fn dispose(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().expect("task list lock poisoned");
            tasks.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
        self.buffer.flush().await;
        tracing::info!("Failure tracker disposed");
    }

    // -- recorder surface ---------------------------------------------------

    /// Record the start of a payment attempt. Returns `None` only when the
    /// attempt could not be persisted (logged, never raised).
    pub fn track_payment_attempt(
        &self,
        user: UserInfo,
        subscription: SubscriptionDetails,
    ) -> Option<AttemptId> {
        match self.recorder.begin(user, subscription) {
            Ok(attempt_id) => Some(attempt_id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to record payment attempt");
                None
            }
        }
    }

    /// Record the start of a retry of `parent`. The new attempt is
    /// correlated via `parent_attempt_id`; a later success resolves the
    /// parent's retry queue entry.
    pub fn track_retry_attempt(
        &self,
        parent: AttemptId,
        user: UserInfo,
        subscription: SubscriptionDetails,
    ) -> Option<AttemptId> {
        match self.recorder.begin_retry_of(parent, user, subscription) {
            Ok(attempt_id) => Some(attempt_id),
            Err(e) => {
                tracing::error!(error = %e, "Failed to record retry attempt");
                None
            }
        }
    }

    /// Record a payment failure: classify, persist, buffer for shipment,
    /// and drive the recovery flow. Returns the failure record so the UI
    /// can render the suggested action.
    pub fn track_payment_failure(
        &self,
        attempt_id: &AttemptId,
        details: FailureDetails,
    ) -> Option<FailureRecord> {
        let record = match self.recorder.complete_failure(attempt_id, details) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(attempt_id = %attempt_id, error = %e, "Failed to record payment failure");
                return None;
            }
        };

        self.buffer.push(record.clone());
        self.orchestrator.on_failure(&record);
        Some(record)
    }

    /// Record a payment success. Removes the attempt from durable storage
    /// and, for retries, resolves the parent's retry queue entry.
    pub fn track_payment_success(
        &self,
        attempt_id: &AttemptId,
        details: SuccessDetails,
    ) -> Option<SuccessRecord> {
        let record = match self.recorder.complete_success(attempt_id, details) {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(attempt_id = %attempt_id, error = %e, "Failed to record payment success");
                return None;
            }
        };

        if let Some(parent) = &record.attempt.parent_attempt_id {
            self.scheduler.resolve(parent);
        }
        Some(record)
    }

    /// Re-run the recovery flow for a failure (dashboard-triggered).
    pub fn initiate_recovery_flow(&self, record: &FailureRecord) {
        self.orchestrator.on_failure(record);
    }

    // -- reporting surface --------------------------------------------------

    /// Generate a failure report from the current store contents.
    pub fn generate_failure_report(&self) -> FailureReport {
        self.reports.generate()
    }

    /// Export persisted failures for external analysis.
    pub fn export_failure_data(&self, format: ExportFormat) -> ExportedData {
        let failures = self.reports.load_failures();
        match format {
            ExportFormat::Csv => ExportedData::Csv(to_csv(&failures)),
            ExportFormat::Json => ExportedData::Structured(FailureExport {
                report: self.reports.generate(),
                failures,
            }),
        }
    }

    // -- lifecycle surface --------------------------------------------------

    /// React to a host lifecycle signal.
    pub fn on_lifecycle(&self, signal: LifecycleSignal) {
        tracing::debug!(?signal, "Lifecycle signal");
        match signal {
            LifecycleSignal::Hidden | LifecycleSignal::Unload => {
                self.spawn_flush();
            }
            LifecycleSignal::NetworkRestored => {
                self.scheduler.process_due();
                self.spawn_flush();
            }
        }
    }

    /// Flush the buffer now and report whether it was delivered.
    pub async fn flush_now(&self) -> bool {
        self.buffer.flush().await
    }

    /// Run a retention sweep now, returning the number of purged records.
    pub fn sweep_now(&self) -> usize {
        self.sweeper.sweep(self.config.retention_max_age_days)
    }

    /// Subscribe to recovery events (retries due, exhaustion, alerts).
    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.bus.subscribe()
    }

    /// Attempt ids currently queued for retry.
    pub fn queued_retries(&self) -> Vec<AttemptId> {
        self.scheduler.queued_ids()
    }

    /// Records buffered and not yet shipped.
    pub fn buffered_failures(&self) -> usize {
        self.buffer.len()
    }

    fn spawn_flush(&self) {
        let buffer = Arc::clone(&self.buffer);
        tokio::spawn(async move {
            buffer.flush().await;
        });
    }
}

// ---------------------------------------------------------------------------
// FailureTrackerBuilder
// ---------------------------------------------------------------------------

/// Builder wiring the tracker's injected ports.
///
/// Every port has a production default: in-memory store, system clock, HTTP
/// transport against the configured endpoints, SMTP notifier when
/// configured (no-op otherwise), and an empty environment snapshot.
#[derive(Default)]
pub struct FailureTrackerBuilder {
    config: Option<TrackerConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Arc<dyn RecoveryNotifier>>,
    environment: Option<Arc<dyn EnvironmentInfoProvider>>,
}

impl FailureTrackerBuilder {
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn RecoveryNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn EnvironmentInfoProvider>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Wire the pipeline. Does not spawn anything; call
    /// [`FailureTracker::start`] from within a runtime.
    pub fn build(self) -> FailureTracker {
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(HttpTransport::new(
                config.collector_endpoint.clone(),
                config.alert_endpoint.clone(),
            )) as Arc<dyn Transport>
        });
        let notifier = self.notifier.unwrap_or_else(|| match SmtpConfig::from_env() {
            Some(smtp) => Arc::new(EmailNotifier::new(smtp)) as Arc<dyn RecoveryNotifier>,
            None => Arc::new(NoopNotifier) as Arc<dyn RecoveryNotifier>,
        });
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(StaticEnvironment::default()) as Arc<dyn EnvironmentInfoProvider>);

        let classifier: ClassifierConfig = config.classifier.clone();
        let bus = RecoveryEventBus::default();
        let cancel = CancellationToken::new();

        let scheduler = Arc::new(RetryScheduler::new(
            bus.clone(),
            Arc::clone(&clock),
            config.retry_delay,
            config.max_retries,
            cancel.child_token(),
        ));
        let buffer = Arc::new(FailureBuffer::new(
            Arc::clone(&transport),
            Arc::clone(&clock),
        ));
        let orchestrator = RecoveryOrchestrator::new(
            Arc::clone(&scheduler),
            Arc::clone(&transport),
            notifier,
            bus.clone(),
            Arc::clone(&clock),
        );
        let recorder = AttemptRecorder::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            environment,
            classifier,
        );
        let reports = ReportGenerator::new(Arc::clone(&store), Arc::clone(&clock));
        let sweeper = Arc::new(RetentionSweeper::new(store, clock));

        FailureTracker {
            config,
            recorder,
            buffer,
            scheduler,
            orchestrator,
            reports,
            sweeper,
            bus,
            cancel,
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }
}
