//! Time-ordered, retention-bounded record of status snapshots.
//!
//! [`History`] is the plain in-memory sequence. [`HistoryStore`] owns one
//! behind a lock, loads it from a [`HistoryStorage`] slot at startup and
//! writes it back after every round.

pub mod retention;
pub mod storage;
pub mod store;

pub use retention::{DEFAULT_RETENTION_DAYS, RetentionPolicy};
pub use storage::{FileStorage, HistoryStorage, MemoryStorage};
pub use store::{CommitOutcome, HistoryStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::monitoring::Snapshot;

/// Snapshots in ascending timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    snapshots: Vec<Arc<Snapshot>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from snapshots in any order.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        let mut snapshots: Vec<_> = snapshots.into_iter().map(Arc::new).collect();
        snapshots.sort_by_key(|snapshot| snapshot.timestamp());
        Self { snapshots }
    }

    /// Append a snapshot. Normally lands at the tail; a snapshot older than the
    /// tail (clock stepped backwards) is inserted where it keeps the order.
    pub fn append(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let index = self.snapshots.partition_point(|s| s.timestamp() <= snapshot.timestamp());
        self.snapshots.insert(index, Arc::clone(&snapshot));
        snapshot
    }

    /// Drop every snapshot with `timestamp < cutoff`. Returns how many were removed.
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let expired = self.snapshots.partition_point(|s| s.timestamp() < cutoff);
        self.snapshots.drain(..expired).count()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.last().cloned()
    }

    pub fn all(&self) -> Vec<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter().map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Serialize in the persisted layout: a pretty-printed JSON array of snapshots.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let snapshots: Vec<&Snapshot> = self.iter().collect();
        serde_json::to_vec_pretty(&snapshots)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let snapshots: Vec<Snapshot> = serde_json::from_slice(bytes)?;
        Ok(Self::from_snapshots(snapshots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::ProbeResult;
    use chrono::{TimeDelta, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn snapshot_at(timestamp: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot::new(timestamp);
        snapshot.insert(ProbeResult::from_status("ca", 403, 40));
        snapshot.insert(ProbeResult::unreachable("ak", 5000, "Unreachable"));
        snapshot
    }

    fn is_sorted(history: &History) -> bool {
        history.all().windows(2).all(|pair| pair[0].timestamp() <= pair[1].timestamp())
    }

    #[test]
    fn test_prune_keeps_only_retention_window() {
        let mut history = History::new();
        history.append(snapshot_at(now() - TimeDelta::days(40)));
        history.append(snapshot_at(now() - TimeDelta::days(10)));

        let removed = history.prune_older_than(now() - TimeDelta::days(30));

        assert_eq!(removed, 1);
        let all = history.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].timestamp(), now() - TimeDelta::days(10));
    }

    #[test]
    fn test_prune_boundary_is_inclusive_of_cutoff() {
        let cutoff = now() - TimeDelta::days(30);
        let mut history = History::new();
        history.append(snapshot_at(cutoff - TimeDelta::milliseconds(1)));
        history.append(snapshot_at(cutoff));

        assert_eq!(history.prune_older_than(cutoff), 1);
        assert!(history.iter().all(|s| s.timestamp() >= cutoff));
    }

    #[test]
    fn test_prune_on_empty_history() {
        let mut history = History::new();
        assert_eq!(history.prune_older_than(now()), 0);
        assert!(history.latest().is_none());
    }

    #[test]
    fn test_out_of_order_append_stays_sorted() {
        let mut history = History::new();
        for offset in [5, 1, 9, 3, 3, 7] {
            history.append(snapshot_at(now() - TimeDelta::hours(offset)));
            history.prune_older_than(now() - TimeDelta::hours(8));
            assert!(is_sorted(&history));
        }

        assert_eq!(history.len(), 5);
        assert_eq!(history.latest().unwrap().timestamp(), now() - TimeDelta::hours(1));
    }

    #[test]
    fn test_json_round_trip() {
        let mut history = History::new();
        history.append(snapshot_at(now() - TimeDelta::hours(6)));
        history.append(snapshot_at(now() - TimeDelta::hours(3)));

        let bytes = history.to_json().unwrap();
        let reloaded = History::from_json(&bytes).unwrap();
        assert_eq!(reloaded, history);

        // A second save of the reloaded history is byte-identical.
        assert_eq!(reloaded.to_json().unwrap(), bytes);
    }

    #[test]
    fn test_from_json_sorts_unordered_input() {
        let raw = r#"[
            { "timestamp": "2024-07-01T09:00:00.000Z", "states": {} },
            { "timestamp": "2024-07-01T03:00:00.000Z", "states": {} }
        ]"#;

        let history = History::from_json(raw.as_bytes()).unwrap();
        assert!(is_sorted(&history));
        assert_eq!(history.latest().unwrap().timestamp_iso(), "2024-07-01T09:00:00.000Z");
    }
}
