//! In-memory failure buffer and flush loop.
//!
//! The buffer is a shipment cursor, not a source of truth: every record in
//! it is already persisted in the durable store. Records accumulate in
//! insertion order and ship as whole batches; a batch that fails to send is
//! prepended back in front of anything buffered meanwhile, so a retried
//! batch always ships before younger records (at-least-once delivery, the
//! collector dedupes by attempt id).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use steno_core::record::FailureRecord;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::transport::{FailureBatch, Transport};

/// Buffers failure records between flushes to the collector.
pub struct FailureBuffer {
    pending: Mutex<Vec<FailureRecord>>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
}

impl FailureBuffer {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            transport,
            clock,
        }
    }

    /// Append a record to the current buffer generation.
    pub fn push(&self, record: FailureRecord) {
        self.pending
            .lock()
            .expect("buffer lock poisoned")
            .push(record);
    }

    /// Number of records awaiting shipment.
    pub fn len(&self) -> usize {
        self.pending.lock().expect("buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ship the current buffer generation as one batch.
    ///
    /// Swaps the buffer for an empty one before the send, so records pushed
    /// during the network call land in the next generation. On transport
    /// failure the whole in-flight batch is restored to the front of the
    /// buffer -- never partially, and ahead of anything newer.
    ///
    /// Returns `true` when the buffer was empty or the batch was delivered.
    pub async fn flush(&self) -> bool {
        let mut batch = {
            let mut pending = self.pending.lock().expect("buffer lock poisoned");
            if pending.is_empty() {
                return true;
            }
            std::mem::take(&mut *pending)
        };

        let payload = FailureBatch::new(&batch, self.clock.now());
        match self.transport.send_failures(&payload).await {
            Ok(()) => {
                tracing::debug!(count = batch.len(), "Failure batch delivered");
                true
            }
            Err(e) => {
                tracing::warn!(
                    count = batch.len(),
                    error = %e,
                    "Failure batch delivery failed; restoring buffer"
                );
                let mut pending = self.pending.lock().expect("buffer lock poisoned");
                let newer = std::mem::take(&mut *pending);
                batch.extend(newer);
                *pending = batch;
                false
            }
        }
    }

    /// Run the periodic flush loop until `cancel` is triggered.
    pub async fn run_flush_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Failure buffer flush loop started"
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Failure buffer flush loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use steno_core::classifier::{classify, ClassifierConfig};
    use steno_core::record::{
        AttemptRecord, EnvironmentSnapshot, FailureDetails, SubscriptionDetails, UserInfo,
    };
    use steno_core::types::AttemptId;

    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::{FailureAlert, TransportError};

    #[derive(Default)]
    struct RecordingTransport {
        batches: Mutex<Vec<Vec<AttemptId>>>,
        fail_sends: AtomicBool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
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

        async fn send_alert(&self, _alert: &FailureAlert<'_>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn failure(id: &str) -> FailureRecord {
        let at = chrono::Utc.timestamp_opt(100, 0).unwrap();
        let attempt = AttemptRecord::new(
            AttemptId::new(id),
            at,
            UserInfo::default(),
            SubscriptionDetails::default(),
            EnvironmentSnapshot::default(),
        );
        let classification =
            classify(&ClassifierConfig::default(), "CARD_DECLINED", None, 0.0, false, 0.0);
        FailureRecord::from_attempt(attempt, FailureDetails::default(), classification, at)
    }

    fn buffer_with(transport: Arc<RecordingTransport>) -> FailureBuffer {
        let clock = Arc::new(ManualClock::new(
            chrono::Utc.timestamp_opt(1_000, 0).unwrap(),
        ));
        FailureBuffer::new(transport, clock)
    }

    #[tokio::test]
    async fn flush_of_empty_buffer_is_a_no_op() {
        let transport = Arc::new(RecordingTransport::default());
        let buffer = buffer_with(transport.clone());
        assert!(buffer.flush().await);
        assert!(transport.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_ships_records_in_insertion_order() {
        let transport = Arc::new(RecordingTransport::default());
        let buffer = buffer_with(transport.clone());
        buffer.push(failure("pay_1_a"));
        buffer.push(failure("pay_2_b"));

        assert!(buffer.flush().await);
        assert!(buffer.is_empty());

        let batches = transport.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![AttemptId::new("pay_1_a"), AttemptId::new("pay_2_b")]
        );
    }

    #[tokio::test]
    async fn failed_flush_restores_the_exact_batch() {
        let transport = Arc::new(RecordingTransport::default());
        transport.fail_sends.store(true, Ordering::SeqCst);
        let buffer = buffer_with(transport.clone());
        buffer.push(failure("pay_1_a"));
        buffer.push(failure("pay_2_b"));

        assert!(!buffer.flush().await);
        // No duplication, no loss.
        assert_eq!(buffer.len(), 2);

        transport.fail_sends.store(false, Ordering::SeqCst);
        assert!(buffer.flush().await);
        let batches = transport.batches.lock().unwrap();
        assert_eq!(
            batches[0],
            vec![AttemptId::new("pay_1_a"), AttemptId::new("pay_2_b")]
        );
    }

    #[tokio::test]
    async fn restored_batch_precedes_newer_records() {
        let transport = Arc::new(RecordingTransport::default());
        transport.fail_sends.store(true, Ordering::SeqCst);
        let buffer = buffer_with(transport.clone());
        buffer.push(failure("pay_1_old"));
        assert!(!buffer.flush().await);

        // A record buffered after the failed send must ship behind the
        // retried batch.
        buffer.push(failure("pay_2_new"));
        transport.fail_sends.store(false, Ordering::SeqCst);
        assert!(buffer.flush().await);

        let batches = transport.batches.lock().unwrap();
        assert_eq!(
            batches[0],
            vec![AttemptId::new("pay_1_old"), AttemptId::new("pay_2_new")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flush_loop_ships_on_the_interval_and_stops_on_cancel() {
        let transport = Arc::new(RecordingTransport::default());
        let buffer = Arc::new(buffer_with(transport.clone()));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            buffer
                .clone()
                .run_flush_loop(Duration::from_secs(30), cancel.clone()),
        );

        buffer.push(failure("pay_1_a"));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(buffer.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
