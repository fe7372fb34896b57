//! Collector and alert transport.
//!
//! [`HttpTransport`] posts JSON payloads to the remote collector and alert
//! endpoints. Delivery is at-least-once: the buffer re-ships a whole batch
//! after a transport failure, so the collector must dedupe by attempt id.
//! The per-batch retry policy lives in the buffer, not here -- a transport
//! call is exactly one request.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use steno_core::record::FailureRecord;
use steno_core::types::Timestamp;
use uuid::Uuid;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Message type discriminator for failure batches.
const MSG_TYPE_FAILURES: &str = "payment_failures";

/// Message type discriminator for immediate alerts.
const MSG_TYPE_ALERT: &str = "immediate_alert";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for transport failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote endpoint returned a non-2xx status code.
    #[error("Collector returned HTTP {0}")]
    HttpStatus(u16),
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One shipped batch of failure records.
///
/// `batch_id` is fresh per send attempt and exists purely for collector-side
/// log correlation; dedup happens on the attempt ids inside `failures`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureBatch<'a> {
    pub r#type: &'static str,
    pub batch_id: Uuid,
    pub failures: &'a [FailureRecord],
    pub timestamp: Timestamp,
}

impl<'a> FailureBatch<'a> {
    pub fn new(failures: &'a [FailureRecord], timestamp: Timestamp) -> Self {
        Self {
            r#type: MSG_TYPE_FAILURES,
            batch_id: Uuid::new_v4(),
            failures,
            timestamp,
        }
    }
}

/// Out-of-band alert for a single high-priority failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAlert<'a> {
    pub r#type: &'static str,
    pub priority: &'static str,
    pub failure_data: &'a FailureRecord,
    pub alert_timestamp: Timestamp,
}

impl<'a> FailureAlert<'a> {
    pub fn new(failure: &'a FailureRecord, alert_timestamp: Timestamp) -> Self {
        Self {
            r#type: MSG_TYPE_ALERT,
            priority: failure.support_priority.as_str(),
            failure_data: failure,
            alert_timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Port for shipping telemetry off the client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ship a batch of failure records to the collector.
    async fn send_failures(&self, batch: &FailureBatch<'_>) -> Result<(), TransportError>;

    /// Send an immediate out-of-band alert for one failure.
    async fn send_alert(&self, alert: &FailureAlert<'_>) -> Result<(), TransportError>;
}

/// Production transport posting JSON over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    collector_url: String,
    alert_url: String,
}

impl HttpTransport {
    /// Create a transport with a pre-configured HTTP client.
    pub fn new(collector_url: impl Into<String>, alert_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            collector_url: collector_url.into(),
            alert_url: alert_url.into(),
        }
    }

    /// Execute a single POST request and check the response status.
    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<(), TransportError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_failures(&self, batch: &FailureBatch<'_>) -> Result<(), TransportError> {
        self.post_json(&self.collector_url, batch).await
    }

    async fn send_alert(&self, alert: &FailureAlert<'_>) -> Result<(), TransportError> {
        self.post_json(&self.alert_url, alert).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
