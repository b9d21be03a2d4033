/// Monitoring engine module - probes targets and runs status rounds
///
/// This module is responsible for:
/// - Fetching a status code from each target (`checker`)
/// - Classifying single probes (`prober`)
/// - Fanning probes out into one snapshot per round (`coordinator`)
/// - Triggering rounds on a timer or on demand (`scheduler`)
pub mod checker;
pub mod coordinator;
pub mod prober;
pub mod scheduler;
pub mod types;

pub use checker::{Checker, HttpChecker, TransportError};
pub use coordinator::RoundCoordinator;
pub use prober::{DEFAULT_PROBE_TIMEOUT, Prober};
pub use scheduler::{DEFAULT_CHECK_INTERVAL, MIN_CHECK_INTERVAL, Scheduler, SchedulerState};
pub use types::{Classification, ProbeKind, ProbeResult, RoundSummary, Snapshot, TargetEntry};
