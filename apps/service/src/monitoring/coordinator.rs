use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use futures::future::join_all;
use tracing::warn;

use super::prober::{Prober, TASK_FAILED_NOTE};
use super::types::{ProbeResult, Snapshot};
use crate::targets::TargetRegistry;

/// Runs one probe per target concurrently and assembles a snapshot.
///
/// A failing target never fails the round: it is recorded as unreachable and
/// the round still yields exactly one result per target.
#[derive(Clone)]
pub struct RoundCoordinator {
    prober: Arc<Prober>,
}

impl RoundCoordinator {
    pub fn new(prober: Arc<Prober>) -> Self {
        Self { prober }
    }

    pub async fn run_round(&self, targets: &TargetRegistry, now: DateTime<Utc>) -> Snapshot {
        let (ids, handles): (Vec<_>, Vec<_>) = targets
            .iter()
            .map(|target| {
                let prober = Arc::clone(&self.prober);
                let target = target.clone();
                let id = target.id().to_string();
                (id, tokio::spawn(async move { prober.probe(&target).await }))
            })
            .unzip();

        let joined = join_all(handles).await;

        // Millisecond precision so the persisted timestamp reloads unchanged.
        let mut snapshot = Snapshot::new(now.trunc_subsecs(3));
        for (id, outcome) in ids.into_iter().zip(joined) {
            let result = outcome.unwrap_or_else(|e| {
                warn!(target_id = %id, error = %e, "Probe task did not complete");
                ProbeResult::unreachable(id, 0, TASK_FAILED_NOTE)
            });
            snapshot.insert(result);
        }

        snapshot
    }
}
