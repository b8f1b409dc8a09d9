//! Failure-isolating adapter over a [`KvBackend`].

use super::KvBackend;
use std::sync::Arc;

/// The only path from the workspace to durable storage.
///
/// No operation returns an error or panics: backend failures are logged and
/// reported as `false` / `None` / an empty listing, and the caller carries on
/// with in-memory state.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn KvBackend>,
}

impl PersistentStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Wrap a concrete backend.
    pub fn from_backend(backend: impl KvBackend + 'static) -> Self {
        Self::new(Arc::new(backend))
    }

    /// Read a value. Absent and unreadable keys both yield `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "persistent read failed");
                None
            }
        }
    }

    /// Write a value. Returns `false` if the backend refused it.
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.backend.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "persistent write failed");
                false
            }
        }
    }

    /// Remove a key. Returns `false` if the backend failed.
    pub fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "persistent remove failed");
                false
            }
        }
    }

    /// Snapshot of all keys, or `None` if the backend cannot enumerate.
    pub fn try_list_keys(&self) -> Option<Vec<String>> {
        match self.backend.keys() {
            Ok(keys) => Some(keys),
            Err(e) => {
                tracing::warn!(error = %e, "persistent key listing failed");
                None
            }
        }
    }

    /// Snapshot of all keys; empty if the backend cannot enumerate.
    pub fn list_keys(&self) -> Vec<String> {
        self.try_list_keys().unwrap_or_default()
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore").finish_non_exhaustive()
    }
}
