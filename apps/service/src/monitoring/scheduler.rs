use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::coordinator::RoundCoordinator;
use super::types::Snapshot;
use crate::clock::{Clock, SystemClock};
use crate::error::RoundError;
use crate::history::{HistoryStore, RetentionPolicy};
use crate::targets::TargetRegistry;

/// Default period between timer-driven rounds.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);

/// Shortest period the timer accepts.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RoundInFlight,
}

/// Triggers status rounds on a fixed period and on demand.
///
/// At most one round runs at a time. Callers of
/// [`trigger_round_and_await`](Self::trigger_round_and_await) that queue behind
/// an in-flight round receive that round's snapshot instead of starting another.
/// Once started, a round runs to completion even if the caller goes away.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    coordinator: RoundCoordinator,
    registry: Arc<TargetRegistry>,
    history: Arc<HistoryStore>,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
    interval: Duration,
    round_lock: Arc<Mutex<()>>,
    rounds_completed: AtomicU64,
    /// Snapshot of the most recently completed round.
    last_round: watch::Sender<Option<Arc<Snapshot>>>,
    state: watch::Sender<SchedulerState>,
}

/// Builder for [`Scheduler`].
pub struct SchedulerBuilder {
    coordinator: RoundCoordinator,
    registry: Arc<TargetRegistry>,
    history: Arc<HistoryStore>,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl SchedulerBuilder {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Scheduler {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let (last_round, _) = watch::channel(None);
        let interval = if self.interval < MIN_CHECK_INTERVAL {
            warn!(
                interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
                "Check interval too short, using the minimum"
            );
            MIN_CHECK_INTERVAL
        } else {
            self.interval
        };

        Scheduler {
            inner: Arc::new(Inner {
                coordinator: self.coordinator,
                registry: self.registry,
                history: self.history,
                retention: self.retention,
                clock: self.clock,
                interval,
                round_lock: Arc::new(Mutex::new(())),
                rounds_completed: AtomicU64::new(0),
                last_round,
                state,
            }),
        }
    }
}

impl Scheduler {
    pub fn builder(
        coordinator: RoundCoordinator,
        registry: Arc<TargetRegistry>,
        history: Arc<HistoryStore>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            coordinator,
            registry,
            history,
            retention: RetentionPolicy::default(),
            clock: Arc::new(SystemClock),
            interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.inner.history
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.inner.registry
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    pub fn rounds_completed(&self) -> u64 {
        self.inner.rounds_completed.load(Ordering::Acquire)
    }

    /// Run a round and return its snapshot, or join the round already in flight.
    pub async fn trigger_round_and_await(&self) -> Result<Arc<Snapshot>, RoundError> {
        let observed = self.rounds_completed();
        let guard = Arc::clone(&self.inner.round_lock).lock_owned().await;

        if self.rounds_completed() != observed {
            let joined = self.inner.last_round.borrow().clone();
            if let Some(joined) = joined {
                debug!("Joined the round that was in flight");
                return Ok(joined);
            }
        }

        self.execute_round(guard).await
    }

    /// Run a round unless one is already in flight.
    pub async fn try_trigger(&self) -> Result<Option<Arc<Snapshot>>, RoundError> {
        match Arc::clone(&self.inner.round_lock).try_lock_owned() {
            Ok(guard) => self.execute_round(guard).await.map(Some),
            Err(_) => {
                info!("Round already in flight, skipping trigger");
                Ok(None)
            }
        }
    }

    /// Run a round only if no history exists yet.
    pub async fn ensure_bootstrapped(&self) -> Result<Option<Arc<Snapshot>>, RoundError> {
        if !self.inner.history.is_empty().await {
            return Ok(None);
        }

        info!("No history yet, running bootstrap round");
        self.trigger_round_and_await().await.map(Some)
    }

    /// Bootstrap if needed, then run a round every interval until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.ensure_bootstrapped().await {
            error!(error = %e, "Bootstrap round failed");
        }

        let period = self.inner.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = period.as_secs(), targets = self.inner.registry.len(), "Scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.try_trigger().await {
                        error!(error = %e, "Scheduled round failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    async fn execute_round(&self, guard: OwnedMutexGuard<()>) -> Result<Arc<Snapshot>, RoundError> {
        let inner = Arc::clone(&self.inner);
        let round = tokio::spawn(async move {
            let _guard = guard;
            inner.run_round().await
        });

        Ok(round.await?)
    }
}

impl Inner {
    async fn run_round(&self) -> Arc<Snapshot> {
        let _in_flight = InFlight::enter(&self.state);
        let started = Instant::now();

        info!(targets = self.registry.len(), "Starting status round");

        let snapshot = self.coordinator.run_round(&self.registry, self.clock.now()).await;
        let summary = snapshot.summary();
        let outcome = self.history.commit(snapshot, self.retention.cutoff(self.clock.now())).await;
        self.last_round.send_replace(Some(Arc::clone(&outcome.snapshot)));
        self.rounds_completed.fetch_add(1, Ordering::AcqRel);

        info!(
            targets = summary.total,
            online = summary.online,
            secured = summary.secured,
            not_found = summary.not_found,
            server_error = summary.server_error,
            other = summary.other,
            unreachable = summary.unreachable,
            pruned = outcome.pruned,
            persisted = outcome.persisted,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Status round complete"
        );

        outcome.snapshot
    }
}

/// Marks the scheduler busy for as long as it lives.
struct InFlight<'a>(&'a watch::Sender<SchedulerState>);

impl<'a> InFlight<'a> {
    fn enter(state: &'a watch::Sender<SchedulerState>) -> Self {
        state.send_replace(SchedulerState::RoundInFlight);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SchedulerState::Idle);
    }
}
