//! Pipeline error type.
//!
//! Telemetry errors never propagate into the host's payment flow: the
//! tracker facade logs and swallows them, returning `None`/empty data to the
//! caller. The typed variants exist for internal plumbing and for tests.

use steno_store::StoreError;

use crate::notify::NotifyError;
use crate::transport::TransportError;

/// Error type spanning the telemetry pipeline's fallible layers.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Durable store failure (I/O, serialization, invalid key).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Collector or alert transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Recovery notification failure.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// A record could not be encoded or decoded.
    #[error("Record serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
