//! Replication Tracker - word list epochs and per-worker acknowledgements
//!
//! Each `initialize` for a (tenant, category) takes the next epoch. Workers
//! report the epoch they hold after applying it; a key is consistent when
//! every worker holds the latest epoch.

use dashmap::DashMap;
use serde::Serialize;

use crate::types::WordListCategory;

/// Replication state of one (tenant, category) word list across the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationStatus {
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub category: WordListCategory,
    pub locale: String,
    /// Epoch of the most recent broadcast
    pub latest_version: u64,
    /// Epoch acknowledged by each worker, indexed by worker; `None` if never
    pub worker_versions: Vec<Option<u64>>,
}

impl ReplicationStatus {
    pub fn is_consistent(&self) -> bool {
        self.worker_versions
            .iter()
            .all(|v| *v == Some(self.latest_version))
    }

    /// Workers that have not acknowledged the latest epoch
    pub fn stale_workers(&self) -> Vec<usize> {
        self.worker_versions
            .iter()
            .enumerate()
            .filter(|(_, v)| v.map_or(true, |v| v < self.latest_version))
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug)]
pub struct ReplicationTracker {
    workers: usize,
    lists: DashMap<(String, WordListCategory), ReplicationStatus>,
}

impl ReplicationTracker {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            lists: DashMap::new(),
        }
    }

    /// Allocate the next epoch for (tenant, category). Epochs start at 1.
    pub fn begin(&self, tenant_id: &str, locale: &str, category: WordListCategory) -> u64 {
        let mut status = self
            .lists
            .entry((tenant_id.to_string(), category))
            .or_insert_with(|| ReplicationStatus {
                tenant_id: tenant_id.to_string(),
                category,
                locale: locale.to_string(),
                latest_version: 0,
                worker_versions: vec![None; self.workers],
            });
        status.latest_version += 1;
        status.locale = locale.to_string();
        status.latest_version
    }

    /// Record that `worker` now holds `version` for (tenant, category).
    pub fn acknowledge(
        &self,
        tenant_id: &str,
        category: WordListCategory,
        worker: usize,
        version: u64,
    ) {
        if let Some(mut status) = self.lists.get_mut(&(tenant_id.to_string(), category)) {
            if let Some(held) = status.worker_versions.get_mut(worker) {
                *held = Some(held.map_or(version, |h| h.max(version)));
            }
        }
    }

    pub fn status(&self, tenant_id: &str, category: WordListCategory) -> Option<ReplicationStatus> {
        self.lists
            .get(&(tenant_id.to_string(), category))
            .map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epochs_increase_per_key() {
        let tracker = ReplicationTracker::new(2);
        assert_eq!(tracker.begin("a", "en", WordListCategory::Banned), 1);
        assert_eq!(tracker.begin("a", "en", WordListCategory::Banned), 2);
        assert_eq!(tracker.begin("a", "en", WordListCategory::Suspect), 1);
        assert_eq!(tracker.begin("b", "en", WordListCategory::Banned), 1);
    }

    #[test]
    fn test_consistency_and_stale_workers() {
        let tracker = ReplicationTracker::new(3);
        let v1 = tracker.begin("a", "en", WordListCategory::Banned);
        for w in 0..3 {
            tracker.acknowledge("a", WordListCategory::Banned, w, v1);
        }
        assert!(tracker.status("a", WordListCategory::Banned).unwrap().is_consistent());

        let v2 = tracker.begin("a", "fr", WordListCategory::Banned);
        tracker.acknowledge("a", WordListCategory::Banned, 0, v2);
        tracker.acknowledge("a", WordListCategory::Banned, 2, v2);

        let status = tracker.status("a", WordListCategory::Banned).unwrap();
        assert!(!status.is_consistent());
        assert_eq!(status.stale_workers(), vec![1]);
        assert_eq!(status.locale, "fr");
        assert_eq!(status.worker_versions, vec![Some(2), Some(1), Some(2)]);
    }

    #[test]
    fn test_acknowledge_never_regresses() {
        let tracker = ReplicationTracker::new(1);
        tracker.begin("a", "en", WordListCategory::Banned);
        tracker.begin("a", "en", WordListCategory::Banned);
        tracker.acknowledge("a", WordListCategory::Banned, 0, 2);
        tracker.acknowledge("a", WordListCategory::Banned, 0, 1);
        tracker.acknowledge("a", WordListCategory::Banned, 7, 2);
        let status = tracker.status("a", WordListCategory::Banned).unwrap();
        assert_eq!(status.worker_versions, vec![Some(2)]);
        assert!(tracker.status("missing", WordListCategory::Banned).is_none());
    }
}
