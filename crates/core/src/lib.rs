//! steno-core
//!
//! Pure domain logic for the payment failure telemetry pipeline: record
//! types, the failure classifier, user-agent derivation, report aggregation,
//! and the export surface. No I/O and no async -- everything here is a plain
//! function over values, so the policy layer stays unit-testable without a
//! browser, a network, or a clock.

pub mod classifier;
pub mod export;
pub mod record;
pub mod report;
pub mod types;
pub mod user_agent;
