//! Environment info port.
//!
//! The attempt recorder snapshots the client environment once per attempt.
//! The snapshot comes through this port instead of ambient platform reads,
//! so the pipeline runs identically in a browser shell, a desktop shell, or
//! a test.

use std::sync::Mutex;

use steno_core::record::EnvironmentSnapshot;

/// Supplies the client environment snapshot attached to each attempt.
pub trait EnvironmentInfoProvider: Send + Sync {
    fn snapshot(&self) -> EnvironmentSnapshot;
}

/// Provider holding a snapshot the host fills in once per session and may
/// update as the session evolves (e.g. the current path on navigation).
#[derive(Default)]
pub struct StaticEnvironment {
    snapshot: Mutex<EnvironmentSnapshot>,
}

impl StaticEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Replace the stored snapshot.
    pub fn update(&self, snapshot: EnvironmentSnapshot) {
        *self.snapshot.lock().expect("environment lock poisoned") = snapshot;
    }
}

impl EnvironmentInfoProvider for StaticEnvironment {
    fn snapshot(&self) -> EnvironmentSnapshot {
        self.snapshot
            .lock()
            .expect("environment lock poisoned")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_the_snapshot() {
        let provider = StaticEnvironment::default();
        assert_eq!(provider.snapshot().current_path, "");

        provider.update(EnvironmentSnapshot {
            current_path: "/billing".to_string(),
            ..Default::default()
        });
        assert_eq!(provider.snapshot().current_path, "/billing");
    }
}
