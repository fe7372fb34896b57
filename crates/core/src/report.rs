//! Failure report aggregation.
//!
//! Pure aggregation over a slice of [`FailureRecord`]s: grouped counts and
//! revenue sums plus top-line scalar metrics. Derived data only -- reports
//! are regenerated from current store contents on every request and never
//! persisted or cached.

use std::collections::{HashMap, HashSet};

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::classifier::SupportPriority;
use crate::record::FailureRecord;
use crate::types::{AttemptId, Timestamp};
use crate::user_agent;

/// How many entries `top_error_messages` keeps.
const TOP_ERROR_MESSAGE_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One grouping bucket: key, failure count, and summed revenue impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
    pub revenue_impact: f64,
}

/// Aggregated failure telemetry, derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub generated_at: Timestamp,
    pub total_failures: u64,
    pub total_revenue_impact: f64,
    /// Mean milliseconds from attempt start to failure; 0 for an empty set.
    pub average_time_to_failure_ms: f64,
    /// Recovered retryable failures / all retryable failures; 0 when there
    /// are no retryable failures.
    pub retry_success_rate: f64,
    pub failures_by_kind: Vec<GroupCount>,
    pub failures_by_error_code: Vec<GroupCount>,
    pub failures_by_payment_method: Vec<GroupCount>,
    /// Zero-padded hour-of-day buckets (`"00"`–`"23"`), only hours with at
    /// least one failure.
    pub failures_by_hour: Vec<GroupCount>,
    pub failures_by_device: Vec<GroupCount>,
    pub failures_by_browser: Vec<GroupCount>,
    /// Most frequent error messages, count-descending, at most five.
    pub top_error_messages: Vec<GroupCount>,
    /// Distinct non-anonymous users with at least one failure.
    pub affected_customers: u64,
    /// High-priority retryable failures, worth manual recovery outreach,
    /// ordered by revenue impact descending.
    pub urgent_recovery_opportunities: Vec<AttemptId>,
}

impl FailureReport {
    /// The report for an empty store: every scalar is 0, never NaN.
    pub fn empty(generated_at: Timestamp) -> Self {
        Self {
            generated_at,
            total_failures: 0,
            total_revenue_impact: 0.0,
            average_time_to_failure_ms: 0.0,
            retry_success_rate: 0.0,
            failures_by_kind: Vec::new(),
            failures_by_error_code: Vec::new(),
            failures_by_payment_method: Vec::new(),
            failures_by_hour: Vec::new(),
            failures_by_device: Vec::new(),
            failures_by_browser: Vec::new(),
            top_error_messages: Vec::new(),
            affected_customers: 0,
            urgent_recovery_opportunities: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build a report from failure records and the set of recovered attempt ids
/// (attempts whose retry later succeeded, per the stored recovery markers).
pub fn build_report(
    failures: &[FailureRecord],
    recovered: &HashSet<AttemptId>,
    generated_at: Timestamp,
) -> FailureReport {
    if failures.is_empty() {
        return FailureReport::empty(generated_at);
    }

    let total_failures = failures.len() as u64;
    let total_revenue_impact: f64 = failures.iter().map(|f| f.revenue_impact).sum();
    let total_time_to_failure: u64 = failures.iter().map(|f| f.time_to_failure_ms).sum();
    let average_time_to_failure_ms = total_time_to_failure as f64 / total_failures as f64;

    let retryable_total = failures.iter().filter(|f| f.retryable).count();
    let recovered_count = failures
        .iter()
        .filter(|f| f.retryable && recovered.contains(f.attempt_id()))
        .count();
    let retry_success_rate = if retryable_total > 0 {
        recovered_count as f64 / retryable_total as f64
    } else {
        0.0
    };

    let affected_customers = failures
        .iter()
        .filter_map(|f| f.attempt.user.user_id.as_deref())
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut urgent: Vec<&FailureRecord> = failures
        .iter()
        .filter(|f| f.support_priority == SupportPriority::High && f.retryable)
        .collect();
    urgent.sort_by(|a, b| {
        b.revenue_impact
            .total_cmp(&a.revenue_impact)
            .then_with(|| a.attempt_id().cmp(b.attempt_id()))
    });
    let urgent_recovery_opportunities = urgent
        .into_iter()
        .map(|f| f.attempt_id().clone())
        .collect();

    FailureReport {
        generated_at,
        total_failures,
        total_revenue_impact,
        average_time_to_failure_ms,
        retry_success_rate,
        failures_by_kind: group_by(failures, |f| f.error_kind.clone()),
        failures_by_error_code: group_by(failures, |f| f.error_code.clone()),
        failures_by_payment_method: group_by(failures, |f| {
            f.attempt.subscription.payment_method.clone()
        }),
        failures_by_hour: group_by(failures, |f| {
            format!("{:02}", f.failure_timestamp.hour())
        }),
        failures_by_device: group_by(failures, |f| {
            user_agent::device_class(&f.attempt.environment.user_agent)
                .as_str()
                .to_string()
        }),
        failures_by_browser: group_by(failures, |f| {
            user_agent::browser(&f.attempt.environment.user_agent)
                .as_str()
                .to_string()
        }),
        top_error_messages: top_messages(failures),
        affected_customers,
        urgent_recovery_opportunities,
    }
}

/// Aggregate count and revenue by a derived key, sorted by key for
/// deterministic output.
fn group_by<F>(failures: &[FailureRecord], key_fn: F) -> Vec<GroupCount>
where
    F: Fn(&FailureRecord) -> String,
{
    let mut aggregates: HashMap<String, (u64, f64)> = HashMap::new();
    for failure in failures {
        let entry = aggregates.entry(key_fn(failure)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += failure.revenue_impact;
    }

    let mut groups: Vec<GroupCount> = aggregates
        .into_iter()
        .map(|(key, (count, revenue_impact))| GroupCount {
            key,
            count,
            revenue_impact,
        })
        .collect();
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Most frequent error messages: count descending, key ascending on ties,
/// truncated to [`TOP_ERROR_MESSAGE_LIMIT`].
fn top_messages(failures: &[FailureRecord]) -> Vec<GroupCount> {
    let mut groups = group_by(failures, |f| f.error_message.clone());
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups.truncate(TOP_ERROR_MESSAGE_LIMIT);
    groups
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
