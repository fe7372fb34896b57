//! steno-telemetry
//!
//! The payment failure telemetry and recovery pipeline: attempt lifecycle
//! recording, durable persistence via `steno-store`, deterministic failure
//! classification via `steno-core`, buffered at-least-once shipment to a
//! remote collector, bounded retry scheduling, high-priority escalation, and
//! retention sweeping.
//!
//! The entry point is [`tracker::FailureTracker`]: an explicitly
//! constructed service (no global singleton) with injected ports for the
//! store, clock, transport, notifier, and environment, plus an explicit
//! `start()`/`dispose()` lifecycle for its background loops.
//!
//! Error stance: failures in the telemetry flow itself are logged and
//! swallowed -- the host's checkout flow only ever receives classification
//! data, never a telemetry error.

pub mod buffer;
pub mod bus;
pub mod clock;
pub mod config;
pub mod env;
pub mod error;
pub mod notify;
pub mod recorder;
pub mod recovery;
pub mod report;
pub mod retention;
pub mod retry;
pub mod tracker;
pub mod transport;

pub use bus::{RecoveryEvent, RecoveryEventBus};
pub use config::TrackerConfig;
pub use error::TelemetryError;
pub use tracker::{FailureTracker, FailureTrackerBuilder, LifecycleSignal};
