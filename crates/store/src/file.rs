//! File-backed store implementation.
//!
//! Maps each key to `<root>/<key>.json`. This is the durable backend for
//! desktop shells and tests: one small JSON document per record, readable
//! with any text tooling, deleted file-by-file by the retention sweep.
//!
//! Corrupt files (unreadable bytes, invalid JSON) are deleted and skipped
//! during reads and scans rather than surfaced -- a half-written record from
//! a crashed session must never wedge the pipeline.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::{keys, KeyValueStore, StoreError};

const FILE_EXTENSION: &str = "json";

/// [`KeyValueStore`] holding one JSON file per key under a root directory.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{FILE_EXTENSION}"))
    }

    /// Delete a corrupt entry, logging but otherwise ignoring the outcome;
    /// a second scan finding the file already gone is the expected case.
    fn drop_corrupt(&self, key: &str, path: &Path, reason: &str) {
        tracing::warn!(key, reason, "Dropping corrupt store entry");
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::error!(key, error = %e, "Failed to delete corrupt store entry");
            }
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn write(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        keys::validate_key(key)?;
        let bytes = serde_json::to_vec(value)?;
        fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.drop_corrupt(key, &path, &e.to_string());
                Ok(None)
            }
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut matches = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }

            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.drop_corrupt(&key, &path, &e.to_string());
                    continue;
                }
            };
            match serde_json::from_slice(&bytes) {
                Ok(value) => matches.push((key, value)),
                Err(e) => self.drop_corrupt(&key, &path, &e.to_string()),
            }
        }

        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn store() -> (tempfile::TempDir, JsonFileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path()).expect("store");
        (dir, store)
    }

    #[test]
    fn write_read_round_trip_is_deep_equal() {
        let (_dir, store) = store();
        let value = json!({
            "attemptId": "pay_1_abc",
            "subscription": {"plan": "pro", "price": 29.99},
            "status": "initiated",
        });
        store.write("payment_attempt_pay_1_abc", &value).unwrap();
        assert_eq!(store.read("payment_attempt_pay_1_abc").unwrap(), Some(value));
    }

    #[test]
    fn read_missing_key_is_none() {
        let (_dir, store) = store();
        assert_eq!(store.read("payment_attempt_nope").unwrap(), None);
    }

    #[test]
    fn corrupt_entry_is_dropped_by_scan_and_stays_gone() {
        let (dir, store) = store();
        store
            .write("payment_failure_good", &json!({"errorCode": "X"}))
            .unwrap();
        fs::write(dir.path().join("payment_failure_bad.json"), b"{not json").unwrap();

        let scanned = store.scan_by_prefix("payment_failure_").unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].0, "payment_failure_good");
        assert!(!dir.path().join("payment_failure_bad.json").exists());

        // Re-scanning the now-clean store is a no-op.
        let again = store.scan_by_prefix("payment_failure_").unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn corrupt_entry_is_dropped_by_read() {
        let (dir, store) = store();
        fs::write(dir.path().join("payment_failure_bad.json"), b"][").unwrap();
        assert_eq!(store.read("payment_failure_bad").unwrap(), None);
        assert!(!dir.path().join("payment_failure_bad.json").exists());
    }

    #[test]
    fn scan_ignores_keys_outside_the_prefix_and_foreign_files() {
        let (dir, store) = store();
        store.write("payment_failure_a", &json!(1)).unwrap();
        store.write("payment_attempt_b", &json!(2)).unwrap();
        fs::write(dir.path().join("notes.txt"), b"not ours").unwrap();

        let scanned = store.scan_by_prefix("payment_failure_").unwrap();
        assert_eq!(scanned.len(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn delete_missing_key_is_ok() {
        let (_dir, store) = store();
        store.delete("payment_failure_nope").unwrap();
    }

    #[test]
    fn keys_with_path_separators_are_rejected() {
        let (_dir, store) = store();
        assert_matches!(
            store.write("../../etc/passwd", &json!(1)),
            Err(StoreError::InvalidKey(_))
        );
    }
}
