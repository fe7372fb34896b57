//! Canonical store key schema for payment telemetry.
//!
//! Three prefixes make up the pipeline's namespace; scan and sweep
//! operations never touch keys outside it:
//!
//! | Prefix              | Holds                                  |
//! |---------------------|----------------------------------------|
//! | `payment_attempt_`  | In-flight and failed attempt records   |
//! | `payment_failure_`  | Terminal failure records               |
//! | `payment_recovery_` | Recovery markers for succeeded retries |

use steno_core::types::AttemptId;

use crate::StoreError;

/// Prefix for in-flight attempt records.
pub const ATTEMPT_PREFIX: &str = "payment_attempt_";

/// Prefix for terminal failure records.
pub const FAILURE_PREFIX: &str = "payment_failure_";

/// Prefix for recovery markers written when a retry attempt succeeds.
pub const RECOVERY_PREFIX: &str = "payment_recovery_";

/// Key of the attempt record for `id`.
pub fn attempt_key(id: &AttemptId) -> String {
    format!("{ATTEMPT_PREFIX}{id}")
}

/// Key of the failure record for `id`.
pub fn failure_key(id: &AttemptId) -> String {
    format!("{FAILURE_PREFIX}{id}")
}

/// Key of the recovery marker for the failed attempt `id`.
pub fn recovery_key(id: &AttemptId) -> String {
    format!("{RECOVERY_PREFIX}{id}")
}

/// Extract the attempt id from a prefixed key, if it carries that prefix.
pub fn strip_prefix<'a>(key: &'a str, prefix: &str) -> Option<AttemptId> {
    key.strip_prefix(prefix).map(AttemptId::new)
}

/// Validate that a key stays inside the flat namespace charset
/// `[A-Za-z0-9_.-]`. Keeps file-backed stores free of path separators and
/// escaping concerns.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
