//! Payment attempt lifecycle records.
//!
//! An [`AttemptRecord`] is created when a payment flow begins and transitions
//! to exactly one terminal outcome: a [`FailureRecord`] (retained as
//! telemetry) or a [`SuccessRecord`] (returned to the caller, never
//! persisted). All persisted/shipped types serialize with camelCase field
//! names to match the collector's JSON contract.

use serde::{Deserialize, Serialize};

use crate::classifier::{Classification, SuggestedAction, SupportPriority};
use crate::types::{AttemptId, Timestamp};

// ---------------------------------------------------------------------------
// AttemptStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// The attempt was started and has not reached a terminal outcome yet.
    Initiated,
    /// The attempt ended in a failure; a [`FailureRecord`] exists for it.
    Failed,
    /// The attempt ended in a successful charge.
    Succeeded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Initiated => "initiated",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Succeeded => "succeeded",
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot structs
// ---------------------------------------------------------------------------

/// Identity of the paying user. All fields are optional: anonymous checkout
/// is a supported flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// The subscription the user attempted to purchase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub plan: String,
    pub price: f64,
    /// Billing period label, e.g. `"monthly"`.
    pub duration: String,
    pub payment_method: String,
}

/// Client environment captured once per attempt.
///
/// Filled in by the host application's environment provider; the pipeline
/// never reads platform globals itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    pub user_agent: String,
    /// `"<width>x<height>"`.
    pub screen_resolution: String,
    pub locale: String,
    pub time_zone: String,
    /// Effective connection type as reported by the host, e.g. `"4g"`.
    pub network_type: String,
    pub referrer: String,
    pub current_path: String,
    pub app_version: String,
    pub session_duration_ms: u64,
}

/// Partial card metadata attached to a failure.
///
/// Never contains the full card number or CVV; callers must only supply the
/// redacted summary the gateway echoes back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub last_four: String,
    pub brand: String,
    pub expiry_month: String,
    pub expiry_year: String,
}

/// Client-side diagnostics sampled at failure time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDiagnostics {
    pub memory_used_bytes: Option<u64>,
    pub memory_total_bytes: Option<u64>,
    /// Script errors collected by the host during the session.
    pub browser_errors: Vec<String>,
    pub network_latency_ms: u64,
}

// ---------------------------------------------------------------------------
// AttemptRecord
// ---------------------------------------------------------------------------

/// A payment attempt as persisted under `payment_attempt_<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    /// Set when this attempt is a retry of an earlier failed attempt.
    pub parent_attempt_id: Option<AttemptId>,
    pub created_at: Timestamp,
    pub user: UserInfo,
    pub subscription: SubscriptionDetails,
    pub environment: EnvironmentSnapshot,
    pub status: AttemptStatus,
}

impl AttemptRecord {
    pub fn new(
        attempt_id: AttemptId,
        created_at: Timestamp,
        user: UserInfo,
        subscription: SubscriptionDetails,
        environment: EnvironmentSnapshot,
    ) -> Self {
        Self {
            attempt_id,
            parent_attempt_id: None,
            created_at,
            user,
            subscription,
            environment,
            status: AttemptStatus::Initiated,
        }
    }

    /// Mark this attempt as a retry of `parent`.
    pub fn with_parent(mut self, parent: AttemptId) -> Self {
        self.parent_attempt_id = Some(parent);
        self
    }
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// Raw failure signal supplied by the payment-form collaborator.
///
/// Everything classification-related (`retryable`, priority, suggested
/// action) is derived by the classifier, not set here; `is_retryable` is
/// only an explicit caller override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    /// Coarse failure category tag from the gateway integration,
    /// e.g. `"card_error"`, `"network_error"`.
    pub error_kind: String,
    pub error_code: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    /// Raw gateway response payload, passed through opaquely.
    pub gateway_response: serde_json::Value,
    pub card: CardSummary,
    pub diagnostics: ClientDiagnostics,
    pub form_validation_errors: Vec<String>,
    /// Explicit caller override: `Some(false)` forces non-retryable.
    pub is_retryable: Option<bool>,
    pub customer_lifetime_value: f64,
    pub is_existing_customer: bool,
}

impl Default for FailureDetails {
    fn default() -> Self {
        Self {
            error_kind: "unknown".to_string(),
            error_code: "UNKNOWN_ERROR".to_string(),
            error_message: "Unknown error occurred".to_string(),
            stack_trace: None,
            gateway_response: serde_json::Value::Object(Default::default()),
            card: CardSummary::default(),
            diagnostics: ClientDiagnostics::default(),
            form_validation_errors: Vec::new(),
            is_retryable: None,
            customer_lifetime_value: 0.0,
            is_existing_customer: false,
        }
    }
}

/// A terminal failure, persisted under `payment_failure_<id>`.
///
/// Flat extension of the originating [`AttemptRecord`]: the attempt fields
/// are flattened into the same JSON object, matching the shipped wire shape.
/// Immutable once written; a retried attempt produces a new record pair
/// correlated via `parent_attempt_id`, never a mutation of this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    #[serde(flatten)]
    pub attempt: AttemptRecord,
    pub failure_timestamp: Timestamp,
    pub error_kind: String,
    pub error_code: String,
    pub error_message: String,
    pub stack_trace: Option<String>,
    pub gateway_response: serde_json::Value,
    pub card: CardSummary,
    pub diagnostics: ClientDiagnostics,
    pub form_validation_errors: Vec<String>,
    pub time_to_failure_ms: u64,
    /// Classifier output. Never set directly by callers.
    pub retryable: bool,
    /// Classifier output. Never set directly by callers.
    pub support_priority: SupportPriority,
    /// Classifier output. Never set directly by callers.
    pub suggested_action: SuggestedAction,
    pub revenue_impact: f64,
    pub customer_lifetime_value: f64,
    pub is_existing_customer: bool,
}

impl FailureRecord {
    /// Build the terminal failure record from an attempt, the raw failure
    /// signal, and the classifier's verdict.
    pub fn from_attempt(
        mut attempt: AttemptRecord,
        details: FailureDetails,
        classification: Classification,
        failure_timestamp: Timestamp,
    ) -> Self {
        attempt.status = AttemptStatus::Failed;
        let time_to_failure_ms = (failure_timestamp - attempt.created_at)
            .num_milliseconds()
            .max(0) as u64;
        let revenue_impact = attempt.subscription.price;
        Self {
            attempt,
            failure_timestamp,
            error_kind: details.error_kind,
            error_code: details.error_code,
            error_message: details.error_message,
            stack_trace: details.stack_trace,
            gateway_response: details.gateway_response,
            card: details.card,
            diagnostics: details.diagnostics,
            form_validation_errors: details.form_validation_errors,
            time_to_failure_ms,
            retryable: classification.retryable,
            support_priority: classification.support_priority,
            suggested_action: classification.suggested_action,
            revenue_impact,
            customer_lifetime_value: details.customer_lifetime_value,
            is_existing_customer: details.is_existing_customer,
        }
    }

    pub fn attempt_id(&self) -> &AttemptId {
        &self.attempt.attempt_id
    }
}

// ---------------------------------------------------------------------------
// Success
// ---------------------------------------------------------------------------

/// Raw success signal supplied by the payment-form collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessDetails {
    pub transaction_id: String,
    pub amount_charged: f64,
    pub gateway_fee: f64,
    pub gateway_response: serde_json::Value,
}

/// A terminal success.
///
/// Returned to the caller for its own bookkeeping; success is not failure
/// telemetry, so this is never persisted and the originating attempt key is
/// deleted when it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRecord {
    #[serde(flatten)]
    pub attempt: AttemptRecord,
    pub success_timestamp: Timestamp,
    pub transaction_id: String,
    pub amount_charged: f64,
    pub gateway_fee: f64,
    pub time_to_success_ms: u64,
}

impl SuccessRecord {
    pub fn from_attempt(
        mut attempt: AttemptRecord,
        details: SuccessDetails,
        success_timestamp: Timestamp,
    ) -> Self {
        attempt.status = AttemptStatus::Succeeded;
        let time_to_success_ms = (success_timestamp - attempt.created_at)
            .num_milliseconds()
            .max(0) as u64;
        Self {
            attempt,
            success_timestamp,
            transaction_id: details.transaction_id,
            amount_charged: details.amount_charged,
            gateway_fee: details.gateway_fee,
            time_to_success_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// RecoveryMarker
// ---------------------------------------------------------------------------

/// Compact marker persisted under `payment_recovery_<parentAttemptId>` when
/// a retry attempt succeeds while its parent's failure record still exists.
///
/// The report generator counts these to compute the retry success rate
/// without mutating the (immutable) parent failure record. The retention
/// sweep removes a marker in the same pass as its parent failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryMarker {
    /// The failed attempt that was recovered.
    pub attempt_id: AttemptId,
    /// The successor attempt whose success recovered it.
    pub succeeded_attempt_id: AttemptId,
    pub recovered_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
