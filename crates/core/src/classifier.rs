//! Failure classification domain logic.
//!
//! Pure functions mapping a raw gateway error code plus business context to
//! `{retryable, support priority, suggested action}`. No I/O; thresholds are
//! injected via [`ClassifierConfig`] so the ordinal policy (existing and
//! high-value customers always outrank price-only signals) stays fixed while
//! the cut-off values remain tunable.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Ordered suggested-action lookup: the first entry whose code fragment is a
/// substring of the error code wins. The declared order is part of the
/// contract -- `NETWORK` precedes `TIMEOUT`, so `NETWORK_TIMEOUT` resolves to
/// the network action.
pub const ACTION_TABLE: &[(&str, SuggestedAction)] = &[
    ("NETWORK", SuggestedAction::RetryWithBetterConnection),
    ("CARD_DECLINED", SuggestedAction::TryDifferentPaymentMethod),
    ("VALIDATION", SuggestedAction::FixFormErrors),
    ("TIMEOUT", SuggestedAction::RetryImmediately),
    ("SERVER_ERROR", SuggestedAction::ContactSupport),
];

/// Code fragments that mark a failure as fatal-system and therefore not
/// worth re-attempting. Caller overrides cannot make these retryable.
pub const NON_RETRYABLE_CODES: &[&str] = &["INTERNAL_ERROR", "FATAL"];

/// Code fragments that mark a failure as transient infrastructure trouble.
/// Only these get an automatic background reattempt; every other retryable
/// failure waits for an explicit user or support-triggered retry.
pub const TEMPORARY_CODES: &[&str] = &[
    "NETWORK_ERROR",
    "TIMEOUT",
    "TEMPORARY_UNAVAILABLE",
    "RATE_LIMITED",
];

// ---------------------------------------------------------------------------
// SupportPriority
// ---------------------------------------------------------------------------

/// Urgency tier used to route failures to automated retry vs. human
/// follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportPriority {
    High,
    Medium,
    Low,
}

impl SupportPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportPriority::High => "high",
            SupportPriority::Medium => "medium",
            SupportPriority::Low => "low",
        }
    }

    /// Parse from a string, defaulting to `Low` for unknown values.
    pub fn from_str(s: &str) -> Self {
        match s {
            "high" => SupportPriority::High,
            "medium" => SupportPriority::Medium,
            _ => SupportPriority::Low,
        }
    }
}

// ---------------------------------------------------------------------------
// SuggestedAction
// ---------------------------------------------------------------------------

/// Canonical recovery action tag surfaced to the payment UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    RetryWithBetterConnection,
    TryDifferentPaymentMethod,
    FixFormErrors,
    RetryImmediately,
    ContactSupport,
}

impl SuggestedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestedAction::RetryWithBetterConnection => "retry_with_better_connection",
            SuggestedAction::TryDifferentPaymentMethod => "try_different_payment_method",
            SuggestedAction::FixFormErrors => "fix_form_errors",
            SuggestedAction::RetryImmediately => "retry_immediately",
            SuggestedAction::ContactSupport => "contact_support",
        }
    }
}

// ---------------------------------------------------------------------------
// ClassifierConfig
// ---------------------------------------------------------------------------

/// Tunable thresholds for the priority policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Customer lifetime value above which a failure is always high priority.
    pub high_customer_ltv: f64,
    /// Subscription price above which a failure is always high priority.
    pub high_subscription_price: f64,
    /// Subscription price above which a retryable failure is medium priority.
    pub medium_subscription_price: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            high_customer_ltv: 1000.0,
            high_subscription_price: 100.0,
            medium_subscription_price: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// The classifier's verdict for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retryable: bool,
    pub support_priority: SupportPriority,
    pub suggested_action: SuggestedAction,
}

/// Classify a failure from its error code and business context.
///
/// - `retryable`: `false` when the caller explicitly passed
///   `Some(false)`, or when the code matches [`NON_RETRYABLE_CODES`];
///   `true` otherwise.
/// - `support_priority`: `High` for existing customers, lifetime value
///   above the LTV threshold, or price above the high-price threshold;
///   `Medium` for retryable failures above the medium-price threshold;
///   `Low` otherwise.
/// - `suggested_action`: first-match lookup in [`ACTION_TABLE`].
pub fn classify(
    config: &ClassifierConfig,
    error_code: &str,
    is_retryable_override: Option<bool>,
    customer_lifetime_value: f64,
    is_existing_customer: bool,
    subscription_price: f64,
) -> Classification {
    let retryable = is_retryable_override != Some(false)
        && !NON_RETRYABLE_CODES
            .iter()
            .any(|fragment| error_code.contains(fragment));

    let support_priority = if is_existing_customer
        || customer_lifetime_value > config.high_customer_ltv
        || subscription_price > config.high_subscription_price
    {
        SupportPriority::High
    } else if retryable && subscription_price > config.medium_subscription_price {
        SupportPriority::Medium
    } else {
        SupportPriority::Low
    };

    Classification {
        retryable,
        support_priority,
        suggested_action: suggested_action(error_code),
    }
}

/// First-match suggested-action lookup over [`ACTION_TABLE`]; unmatched
/// codes default to [`SuggestedAction::ContactSupport`].
pub fn suggested_action(error_code: &str) -> SuggestedAction {
    ACTION_TABLE
        .iter()
        .find(|(fragment, _)| error_code.contains(fragment))
        .map(|(_, action)| *action)
        .unwrap_or(SuggestedAction::ContactSupport)
}

/// True iff the code marks transient infrastructure trouble (see
/// [`TEMPORARY_CODES`]). Decides automatic vs. queued-only retry scheduling.
pub fn is_temporary_failure(error_code: &str) -> bool {
    TEMPORARY_CODES
        .iter()
        .any(|fragment| error_code.contains(fragment))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_code(code: &str) -> Classification {
        classify(&ClassifierConfig::default(), code, None, 0.0, false, 0.0)
    }

    // -- suggested_action --

    #[test]
    fn action_table_first_match_rule() {
        assert_eq!(
            suggested_action("NETWORK_ERROR"),
            SuggestedAction::RetryWithBetterConnection
        );
        assert_eq!(
            suggested_action("CARD_DECLINED"),
            SuggestedAction::TryDifferentPaymentMethod
        );
        assert_eq!(
            suggested_action("VALIDATION_FAILED"),
            SuggestedAction::FixFormErrors
        );
        assert_eq!(
            suggested_action("GATEWAY_TIMEOUT"),
            SuggestedAction::RetryImmediately
        );
        assert_eq!(
            suggested_action("SERVER_ERROR"),
            SuggestedAction::ContactSupport
        );
    }

    #[test]
    fn network_timeout_resolves_to_network_action() {
        // NETWORK precedes TIMEOUT in the declared table order.
        assert_eq!(
            suggested_action("NETWORK_TIMEOUT"),
            SuggestedAction::RetryWithBetterConnection
        );
    }

    #[test]
    fn unmatched_codes_default_to_contact_support() {
        assert_eq!(
            suggested_action("UNKNOWN_ERROR"),
            SuggestedAction::ContactSupport
        );
        assert_eq!(suggested_action(""), SuggestedAction::ContactSupport);
    }

    // -- retryable --

    #[test]
    fn retryable_by_default() {
        assert!(classify_code("CARD_DECLINED").retryable);
        assert!(classify_code("UNKNOWN_ERROR").retryable);
    }

    #[test]
    fn caller_override_forces_non_retryable() {
        let c = classify(
            &ClassifierConfig::default(),
            "CARD_DECLINED",
            Some(false),
            0.0,
            false,
            0.0,
        );
        assert!(!c.retryable);
    }

    #[test]
    fn fatal_system_codes_are_non_retryable() {
        assert!(!classify_code("INTERNAL_ERROR").retryable);
        assert!(!classify_code("FATAL_GATEWAY_FAULT").retryable);
        // Even an explicit caller opt-in cannot override the fatal table.
        let c = classify(
            &ClassifierConfig::default(),
            "INTERNAL_ERROR",
            Some(true),
            0.0,
            false,
            0.0,
        );
        assert!(!c.retryable);
    }

    #[test]
    fn validation_codes_stay_retryable() {
        // User-fixable, not fatal: the user corrects the form and retries.
        assert!(classify_code("VALIDATION_FAILED").retryable);
    }

    // -- support_priority --

    #[test]
    fn existing_customer_is_never_low() {
        for price in [0.0, 5.0, 19.99, 500.0] {
            let c = classify(
                &ClassifierConfig::default(),
                "CARD_DECLINED",
                None,
                0.0,
                true,
                price,
            );
            assert_eq!(c.support_priority, SupportPriority::High);
        }
    }

    #[test]
    fn high_ltv_outranks_price() {
        let c = classify(
            &ClassifierConfig::default(),
            "UNKNOWN_ERROR",
            None,
            1500.0,
            false,
            5.0,
        );
        assert_eq!(c.support_priority, SupportPriority::High);
    }

    #[test]
    fn expensive_subscription_is_high() {
        let c = classify(
            &ClassifierConfig::default(),
            "UNKNOWN_ERROR",
            None,
            0.0,
            false,
            199.99,
        );
        assert_eq!(c.support_priority, SupportPriority::High);
    }

    #[test]
    fn retryable_moderate_price_is_medium() {
        let c = classify(
            &ClassifierConfig::default(),
            "CARD_DECLINED",
            None,
            0.0,
            false,
            29.99,
        );
        assert_eq!(c.support_priority, SupportPriority::Medium);
    }

    #[test]
    fn non_retryable_moderate_price_is_low() {
        let c = classify(
            &ClassifierConfig::default(),
            "INTERNAL_ERROR",
            None,
            0.0,
            false,
            29.99,
        );
        assert_eq!(c.support_priority, SupportPriority::Low);
    }

    #[test]
    fn cheap_subscription_is_low() {
        let c = classify(
            &ClassifierConfig::default(),
            "CARD_DECLINED",
            None,
            0.0,
            false,
            9.99,
        );
        assert_eq!(c.support_priority, SupportPriority::Low);
    }

    #[test]
    fn thresholds_are_exclusive_bounds() {
        let config = ClassifierConfig::default();
        // Exactly at a threshold does not cross it.
        let at_high = classify(&config, "CARD_DECLINED", None, 0.0, false, 100.0);
        assert_eq!(at_high.support_priority, SupportPriority::Medium);
        let at_medium = classify(&config, "CARD_DECLINED", None, 0.0, false, 20.0);
        assert_eq!(at_medium.support_priority, SupportPriority::Low);
    }

    // -- scenario coverage --

    #[test]
    fn existing_customer_card_declined_scenario() {
        let c = classify(
            &ClassifierConfig::default(),
            "CARD_DECLINED",
            None,
            0.0,
            true,
            199.99,
        );
        assert_eq!(c.support_priority, SupportPriority::High);
        assert!(c.retryable);
        assert_eq!(
            c.suggested_action,
            SuggestedAction::TryDifferentPaymentMethod
        );
    }

    // -- is_temporary_failure --

    #[test]
    fn temporary_codes_match_by_substring() {
        assert!(is_temporary_failure("NETWORK_ERROR"));
        assert!(is_temporary_failure("GATEWAY_TIMEOUT"));
        assert!(is_temporary_failure("TEMPORARY_UNAVAILABLE"));
        assert!(is_temporary_failure("RATE_LIMITED"));
    }

    #[test]
    fn non_temporary_codes_do_not_match() {
        assert!(!is_temporary_failure("CARD_DECLINED"));
        assert!(!is_temporary_failure("VALIDATION_FAILED"));
        assert!(!is_temporary_failure("UNKNOWN_ERROR"));
    }

    // -- string representations --

    #[test]
    fn priority_as_str_round_trips() {
        for p in [
            SupportPriority::High,
            SupportPriority::Medium,
            SupportPriority::Low,
        ] {
            assert_eq!(SupportPriority::from_str(p.as_str()), p);
        }
        assert_eq!(SupportPriority::from_str("garbage"), SupportPriority::Low);
    }

    #[test]
    fn action_serializes_to_snake_case_tag() {
        let json = serde_json::to_value(SuggestedAction::FixFormErrors).unwrap();
        assert_eq!(json, "fix_form_errors");
    }
}
