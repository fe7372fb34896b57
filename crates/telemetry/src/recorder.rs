//! Attempt lifecycle recorder.
//!
//! Creates and persists [`AttemptRecord`]s when a payment flow begins and
//! resolves them to their terminal outcome. This is the only component that
//! constructs attempt ids.
//!
//! A missing attempt at completion time is recoverable noise (the store may
//! have been cleared concurrently): it is logged and reported as `None`,
//! never raised as an error into the payment flow.

use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;
use steno_core::classifier::{classify, ClassifierConfig};
use steno_core::record::{
    AttemptRecord, FailureDetails, FailureRecord, RecoveryMarker, SubscriptionDetails,
    SuccessDetails, SuccessRecord, UserInfo,
};
use steno_core::types::AttemptId;
use steno_store::{keys, KeyValueStore};

use crate::clock::Clock;
use crate::env::EnvironmentInfoProvider;
use crate::error::TelemetryError;

/// Prefix of every attempt id.
const ATTEMPT_ID_PREFIX: &str = "pay";

/// Random alphanumeric suffix length. Together with the millisecond
/// timestamp this makes collisions a programmer error, not a runtime
/// condition to handle.
const ATTEMPT_ID_SUFFIX_LEN: usize = 9;

/// Records payment attempt lifecycles into the durable store.
pub struct AttemptRecorder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    environment: Arc<dyn EnvironmentInfoProvider>,
    classifier: ClassifierConfig,
}

impl AttemptRecorder {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        environment: Arc<dyn EnvironmentInfoProvider>,
        classifier: ClassifierConfig,
    ) -> Self {
        Self {
            store,
            clock,
            environment,
            classifier,
        }
    }

    /// Begin a new payment attempt: build the record with status
    /// `initiated` and persist it immediately, so a page reload cannot lose
    /// the attempt.
    pub fn begin(
        &self,
        user: UserInfo,
        subscription: SubscriptionDetails,
    ) -> Result<AttemptId, TelemetryError> {
        self.begin_attempt(None, user, subscription)
    }

    /// Begin a retry of a previously failed attempt. The new attempt is
    /// correlated to its parent via `parent_attempt_id`; the parent's
    /// failure record is never mutated.
    pub fn begin_retry_of(
        &self,
        parent: AttemptId,
        user: UserInfo,
        subscription: SubscriptionDetails,
    ) -> Result<AttemptId, TelemetryError> {
        self.begin_attempt(Some(parent), user, subscription)
    }

    fn begin_attempt(
        &self,
        parent: Option<AttemptId>,
        user: UserInfo,
        subscription: SubscriptionDetails,
    ) -> Result<AttemptId, TelemetryError> {
        let attempt_id = self.generate_attempt_id();
        let mut record = AttemptRecord::new(
            attempt_id.clone(),
            self.clock.now(),
            user,
            subscription,
            self.environment.snapshot(),
        );
        if let Some(parent) = parent {
            record = record.with_parent(parent);
        }

        self.store.write(
            &keys::attempt_key(&attempt_id),
            &serde_json::to_value(&record)?,
        )?;
        tracing::debug!(attempt_id = %attempt_id, parent = ?record.parent_attempt_id, "Payment attempt recorded");
        Ok(attempt_id)
    }

    /// Resolve an attempt to its failure outcome.
    ///
    /// Classifies the raw signal, persists the failure record under the
    /// `payment_failure_` key (retained for reporting), marks the attempt
    /// record failed, and returns the record for downstream handling.
    pub fn complete_failure(
        &self,
        attempt_id: &AttemptId,
        details: FailureDetails,
    ) -> Result<Option<FailureRecord>, TelemetryError> {
        let Some(attempt) = self.load_attempt(attempt_id)? else {
            tracing::warn!(attempt_id = %attempt_id, "No attempt record for failure; dropping");
            return Ok(None);
        };

        let classification = classify(
            &self.classifier,
            &details.error_code,
            details.is_retryable,
            details.customer_lifetime_value,
            details.is_existing_customer,
            attempt.subscription.price,
        );
        let record =
            FailureRecord::from_attempt(attempt, details, classification, self.clock.now());

        self.store.write(
            &keys::failure_key(attempt_id),
            &serde_json::to_value(&record)?,
        )?;
        // Keep the attempt record's status in step; it is retained until the
        // retention sweep removes it together with the failure record.
        self.store.write(
            &keys::attempt_key(attempt_id),
            &serde_json::to_value(&record.attempt)?,
        )?;

        tracing::info!(
            attempt_id = %attempt_id,
            error_code = %record.error_code,
            priority = record.support_priority.as_str(),
            retryable = record.retryable,
            "Payment failure recorded"
        );
        Ok(Some(record))
    }

    /// Resolve an attempt to its success outcome.
    ///
    /// Builds the success record, deletes the attempt key (success is not
    /// failure telemetry), and -- when this attempt was a retry whose parent
    /// still has a failure record -- writes the recovery marker so reports
    /// can account for the recovered failure.
    pub fn complete_success(
        &self,
        attempt_id: &AttemptId,
        details: SuccessDetails,
    ) -> Result<Option<SuccessRecord>, TelemetryError> {
        let Some(attempt) = self.load_attempt(attempt_id)? else {
            tracing::warn!(attempt_id = %attempt_id, "No attempt record for success; dropping");
            return Ok(None);
        };

        let record = SuccessRecord::from_attempt(attempt, details, self.clock.now());
        self.store.delete(&keys::attempt_key(attempt_id))?;

        if let Some(parent) = &record.attempt.parent_attempt_id {
            self.mark_recovered(parent, attempt_id)?;
        }

        tracing::info!(
            attempt_id = %attempt_id,
            transaction_id = %record.transaction_id,
            "Payment success recorded"
        );
        Ok(Some(record))
    }

    /// Write the recovery marker for a recovered parent failure.
    fn mark_recovered(
        &self,
        parent: &AttemptId,
        succeeded: &AttemptId,
    ) -> Result<(), TelemetryError> {
        if self.store.read(&keys::failure_key(parent))?.is_none() {
            // Parent failure already swept or never recorded; nothing to
            // account for.
            return Ok(());
        }
        let marker = RecoveryMarker {
            attempt_id: parent.clone(),
            succeeded_attempt_id: succeeded.clone(),
            recovered_at: self.clock.now(),
        };
        self.store.write(
            &keys::recovery_key(parent),
            &serde_json::to_value(&marker)?,
        )?;
        tracing::info!(attempt_id = %parent, succeeded_attempt_id = %succeeded, "Failure recovered by retry");
        Ok(())
    }

    /// Load and decode an attempt record; a corrupt entry is dropped and
    /// treated as absent.
    fn load_attempt(&self, attempt_id: &AttemptId) -> Result<Option<AttemptRecord>, TelemetryError> {
        let key = keys::attempt_key(attempt_id);
        let Some(value) = self.store.read(&key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(attempt_id = %attempt_id, error = %e, "Dropping corrupt attempt record");
                self.store.delete(&key)?;
                Ok(None)
            }
        }
    }

    /// Generate a fresh attempt id: `pay_<epoch-millis>_<random suffix>`.
    fn generate_attempt_id(&self) -> AttemptId {
        let suffix: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(ATTEMPT_ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        AttemptId::new(format!(
            "{ATTEMPT_ID_PREFIX}_{}_{suffix}",
            self.clock.now().timestamp_millis()
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
