use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::History;
use super::storage::HistoryStorage;
use crate::error::HistoryError;
use crate::monitoring::Snapshot;

/// Result of committing one round to the store.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub snapshot: Arc<Snapshot>,
    pub pruned: usize,
    pub persisted: bool,
}

/// Owner of the authoritative [`History`].
///
/// Reads hand out `Arc`ed snapshots and never a live view, so a reader can
/// not observe a half-applied round. Writes to storage are serialized and each
/// one carries the full sequence.
pub struct HistoryStore {
    history: RwLock<History>,
    storage: Arc<dyn HistoryStorage>,
    /// Held across serialize-and-write so files land in mutation order.
    write_lock: Mutex<()>,
    /// Bumped on every in-memory change while the history write lock is held.
    generation: AtomicU64,
    /// Generation of the most recent successful write.
    persisted_generation: AtomicU64,
}

impl HistoryStore {
    /// Load the history from `storage`. Missing or unreadable data yields an
    /// empty history; this never fails.
    pub async fn load(storage: Arc<dyn HistoryStorage>) -> Self {
        let history = match storage.read().await {
            Ok(Some(bytes)) => match History::from_json(&bytes) {
                Ok(history) => {
                    info!(records = history.len(), source = %storage.describe(), "Loaded historical records");
                    history
                }
                Err(e) => {
                    warn!(error = %e, source = %storage.describe(), "History is corrupt, starting empty");
                    History::new()
                }
            },
            Ok(None) => {
                info!(source = %storage.describe(), "No history found, starting empty");
                History::new()
            }
            Err(e) => {
                error!(error = %e, "Failed to load history, starting empty");
                History::new()
            }
        };

        Self::with_history(history, storage)
    }

    pub fn with_history(history: History, storage: Arc<dyn HistoryStorage>) -> Self {
        Self {
            history: RwLock::new(history),
            storage,
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            persisted_generation: AtomicU64::new(0),
        }
    }

    /// Add a snapshot without persisting it.
    pub async fn append(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut history = self.history.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        history.append(snapshot)
    }

    /// Remove snapshots older than `cutoff` without persisting.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut history = self.history.write().await;
        let removed = history.prune_older_than(cutoff);
        if removed > 0 {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// Write the full in-memory history to storage.
    pub async fn persist(&self) -> Result<(), HistoryError> {
        let _write = self.write_lock.lock().await;
        let (bytes, generation) = {
            let history = self.history.read().await;
            (history.to_json()?, self.generation.load(Ordering::SeqCst))
        };
        self.write_bytes(&bytes, generation).await
    }

    /// Append, prune and persist as one step.
    ///
    /// The in-memory change is applied even when the write fails; the failure
    /// is logged and the next commit writes everything again.
    pub async fn commit(&self, snapshot: Snapshot, cutoff: DateTime<Utc>) -> CommitOutcome {
        let _write = self.write_lock.lock().await;

        let (snapshot, pruned, serialized, generation) = {
            let mut history = self.history.write().await;
            let snapshot = history.append(snapshot);
            let pruned = history.prune_older_than(cutoff);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (snapshot, pruned, history.to_json(), generation)
        };

        if pruned > 0 {
            info!(pruned, "Pruned old records");
        }

        let written = match serialized {
            Ok(bytes) => self.write_bytes(&bytes, generation).await,
            Err(e) => Err(e.into()),
        };
        let persisted = match written {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to save history, will retry next round");
                false
            }
        };

        CommitOutcome { snapshot, pruned, persisted }
    }

    /// Write `bytes`, which were serialized at `generation`. Callers hold `write_lock`.
    async fn write_bytes(&self, bytes: &[u8], generation: u64) -> Result<(), HistoryError> {
        self.storage.write(bytes).await?;
        self.persisted_generation.store(generation, Ordering::SeqCst);
        debug!(bytes = bytes.len(), destination = %self.storage.describe(), "History persisted");
        Ok(())
    }

    pub async fn latest(&self) -> Option<Arc<Snapshot>> {
        self.history.read().await.latest()
    }

    pub async fn all(&self) -> Vec<Arc<Snapshot>> {
        self.history.read().await.all()
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.is_empty()
    }

    /// Whether in-memory changes have not reached storage yet.
    pub fn is_dirty(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.persisted_generation.load(Ordering::SeqCst)
    }
}
