//! In-memory store implementation.
//!
//! Reference implementation of [`KeyValueStore`] over a locked `HashMap`.
//! Values held here are always well-formed JSON, so the corrupt-entry path
//! of the contract never triggers; the file-backed store exercises it.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::{keys, KeyValueStore, StoreError};

/// Process-local [`KeyValueStore`] used in tests and as the default store
/// when the host has not wired a durable backend yet.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        keys::validate_key(key)?;
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .remove(key);
        Ok(())
    }

    fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let mut matches: Vec<(String, Value)> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches)
    }
}
