//! steno-store
//!
//! Durable key/value persistence for payment telemetry records. The store is
//! a narrow injected port: a flat string-keyed namespace of JSON values that
//! survives page reloads, bounded by whatever quota the host grants.
//!
//! Contract notes:
//! - All operations are synchronous from the caller's perspective.
//! - [`KeyValueStore::scan_by_prefix`] must tolerate partial or corrupted
//!   entries: anything that fails to deserialize is deleted and skipped,
//!   never surfaced as an error. Corruption cleanup is idempotent -- scanning
//!   a clean store again is a no-op.
//! - Scan results are sorted by key so iteration order is deterministic
//!   across implementations.

use serde_json::Value;

pub mod file;
pub mod keys;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem-level failure (permissions, disk full, etc.).
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized for writing.
    #[error("Store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The key contains characters outside the flat namespace charset.
    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}

// ---------------------------------------------------------------------------
// KeyValueStore
// ---------------------------------------------------------------------------

/// Flat key/value persistence port.
///
/// Keys are restricted to `[A-Za-z0-9_.-]` (see [`keys::validate_key`]) so
/// file-backed implementations can map keys to file names without any
/// escaping or traversal concerns.
pub trait KeyValueStore: Send + Sync {
    /// Write (insert or overwrite) a value under `key`.
    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Read the value stored under `key`, if any.
    ///
    /// An entry that exists but cannot be parsed is treated as corrupt:
    /// deleted, logged, and reported as absent.
    fn read(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Delete the value stored under `key`. Deleting a missing key is a
    /// no-op.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Return all `(key, value)` entries whose key starts with `prefix`,
    /// sorted by key. Corrupt entries are deleted and skipped.
    fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError>;
}
