//! statusboard core: probes a fixed set of jurisdiction endpoints on a timer,
//! classifies their reachability and keeps a bounded, durable history of the
//! results.
//!
//! ```text
//! Scheduler ──trigger──▶ RoundCoordinator ──per target──▶ Prober ──▶ Checker (HTTP)
//!     │                         │
//!     │                         └──▶ Snapshot
//!     └──commit(append, prune, persist)──▶ HistoryStore ──▶ HistoryStorage (file)
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod monitoring;
pub mod targets;

use std::sync::Arc;

use tracing::info;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ConfigError, HistoryError, RoundError, ServiceError, StorageError};
pub use history::{FileStorage, History, HistoryStorage, HistoryStore, MemoryStorage, RetentionPolicy};
pub use monitoring::{
    Checker, Classification, HttpChecker, ProbeResult, Prober, RoundCoordinator, Scheduler, SchedulerState, Snapshot,
};
pub use targets::{Target, TargetRegistry};

/// Assemble the scheduler and everything below it from `config`, loading
/// whatever history is already on disk.
pub async fn build_scheduler(config: &Config) -> Result<Scheduler, ServiceError> {
    let registry = Arc::new(config.registry());
    let prober = Arc::new(Prober::http(config.timeout())?);
    let storage = Arc::new(FileStorage::new(&config.monitoring.history_path));
    let history = Arc::new(HistoryStore::load(storage).await);

    info!(
        targets = registry.len(),
        records = history.len().await,
        probe_timeout_secs = prober.timeout().as_secs(),
        "Status core ready"
    );

    Ok(Scheduler::builder(RoundCoordinator::new(prober), registry, history)
        .interval(config.interval())
        .retention(config.retention())
        .build())
}
