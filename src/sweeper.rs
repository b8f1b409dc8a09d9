//! Orphan sweep of persisted task fields.
//!
//! Deleting a task leaves its persisted keys behind. The sweep lists every
//! key, picks the ones under a task-field prefix whose owner no longer
//! exists, and removes them together with their paired timestamp keys.
//! It is housekeeping: a failed removal is recorded and skipped, and a
//! failed listing ends the sweep without touching anything.

use crate::kv::PersistentStore;
use crate::persist::{PersistedKey, TIMESTAMP_SUFFIX};
use std::collections::HashSet;

/// Result of an orphan sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys under a task-field prefix that were examined.
    pub scanned: usize,
    /// Keys that were removed.
    pub removed: Vec<String>,
    /// Keys whose removal failed.
    pub failed: Vec<String>,
    /// The backend could not enumerate keys; nothing was examined.
    pub listing_failed: bool,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.removed.is_empty() && self.failed.is_empty() && !self.listing_failed
    }
}

/// Removes persisted records whose owning entity is gone.
#[derive(Clone, Debug)]
pub struct OrphanSweeper {
    store: PersistentStore,
}

impl OrphanSweeper {
    pub fn new(store: PersistentStore) -> Self {
        Self { store }
    }

    /// Run one sweep against the given set of live entity ids.
    pub fn sweep(&self, live_ids: &HashSet<String>) -> SweepReport {
        let mut report = SweepReport::default();

        let keys = match self.store.try_list_keys() {
            Some(keys) => keys,
            None => {
                report.listing_failed = true;
                return report;
            }
        };

        let listed: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let mut handled: HashSet<String> = HashSet::new();

        for key in &keys {
            if PersistedKey::parse(key).is_none() {
                continue;
            }
            report.scanned += 1;

            if handled.contains(key) || !Self::is_orphan(key, live_ids) {
                continue;
            }

            handled.insert(key.clone());
            self.remove_into(key, &mut report);

            // The pair may belong to a live task whose id ends in the suffix
            let pair = format!("{}{}", key, TIMESTAMP_SUFFIX);
            if !handled.contains(&pair) && Self::is_orphan(&pair, live_ids) {
                if listed.contains(pair.as_str()) {
                    handled.insert(pair.clone());
                    self.remove_into(&pair, &mut report);
                } else {
                    // Not in the snapshot; remove in case it appeared since
                    self.store.remove(&pair);
                }
            }
        }

        if !report.removed.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                scanned = report.scanned,
                removed = report.removed.len(),
                failed = report.failed.len(),
                "orphan sweep finished"
            );
        } else {
            tracing::debug!(scanned = report.scanned, "orphan sweep found nothing");
        }

        report
    }

    fn remove_into(&self, key: &str, report: &mut SweepReport) {
        if self.store.remove(key) {
            report.removed.push(key.to_string());
        } else {
            report.failed.push(key.to_string());
        }
    }

    fn is_orphan(key: &str, live_ids: &HashSet<String>) -> bool {
        match PersistedKey::parse(key) {
            Some(parsed) => !parsed.is_owned(|id| live_ids.contains(id)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvBackend, MemoryBackend};

    fn live(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn seeded_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for (k, v) in [
            ("task-notes-alive", "keep"),
            ("task-notes-alive-timestamp", "1"),
            ("task-notes-dead", "gone"),
            ("task-notes-dead-timestamp", "1"),
            ("task-comments-dead", "[]"),
            ("task-comments-dead-timestamp", "1"),
            ("theme", "dark"),
        ] {
            backend.set(k, v).unwrap();
        }
        backend
    }

    #[test]
    fn test_sweep_removes_orphans_only() {
        let backend = seeded_backend();
        let sweeper = OrphanSweeper::new(PersistentStore::from_backend(backend.clone()));

        let report = sweeper.sweep(&live(&["alive"]));

        assert_eq!(report.scanned, 6);
        assert_eq!(report.removed.len(), 4);
        assert!(report.failed.is_empty());
        assert_eq!(
            backend.keys().unwrap(),
            vec!["task-notes-alive", "task-notes-alive-timestamp", "theme"]
        );
    }

    #[test]
    fn test_second_sweep_is_noop() {
        let backend = seeded_backend();
        let sweeper = OrphanSweeper::new(PersistentStore::from_backend(backend.clone()));

        sweeper.sweep(&live(&["alive"]));
        let second = sweeper.sweep(&live(&["alive"]));

        assert!(second.is_clean());
        assert_eq!(second.scanned, 2);
    }

    #[test]
    fn test_timestamp_key_of_live_suffixed_id_is_kept() {
        let backend = MemoryBackend::new();
        backend.set("task-notes-a", "dead task a").unwrap();
        backend.set("task-notes-a-timestamp", "live task a-timestamp").unwrap();
        let sweeper = OrphanSweeper::new(PersistentStore::from_backend(backend.clone()));

        let report = sweeper.sweep(&live(&["a-timestamp"]));

        assert_eq!(report.removed, vec!["task-notes-a"]);
        assert!(backend.contains_key("task-notes-a-timestamp"));
    }
}
