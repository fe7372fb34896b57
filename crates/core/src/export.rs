//! Export surface for external analysis tooling.
//!
//! Structured export pairs the raw failure records with a freshly generated
//! report; CSV export flattens the records into a delimited text table for
//! spreadsheet import.

use serde::{Deserialize, Serialize};

use crate::record::FailureRecord;
use crate::report::FailureReport;

/// Requested export encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Structured export payload: raw records plus the derived report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureExport {
    pub failures: Vec<FailureRecord>,
    pub report: FailureReport,
}

/// Result of an export request.
#[derive(Debug, Clone)]
pub enum ExportedData {
    Structured(FailureExport),
    Csv(String),
}

/// Column order of the CSV table. Documented so downstream spreadsheets can
/// rely on it.
const CSV_COLUMNS: &[&str] = &[
    "attemptId",
    "failureTimestamp",
    "errorKind",
    "errorCode",
    "errorMessage",
    "paymentMethod",
    "plan",
    "price",
    "revenueImpact",
    "retryable",
    "supportPriority",
    "suggestedAction",
    "userId",
];

/// Render failure records as a CSV table with a header row.
pub fn to_csv(failures: &[FailureRecord]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');

    for failure in failures {
        let fields = [
            failure.attempt_id().to_string(),
            failure.failure_timestamp.to_rfc3339(),
            failure.error_kind.clone(),
            failure.error_code.clone(),
            failure.error_message.clone(),
            failure.attempt.subscription.payment_method.clone(),
            failure.attempt.subscription.plan.clone(),
            failure.attempt.subscription.price.to_string(),
            failure.revenue_impact.to_string(),
            failure.retryable.to_string(),
            failure.support_priority.as_str().to_string(),
            failure.suggested_action.as_str().to_string(),
            failure.attempt.user.user_id.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Quote a field when it contains a delimiter, quote, or newline; quotes
/// inside quoted fields are doubled per RFC 4180.
fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
