//! Retention window for the status history.
//!
//! Snapshots older than the window are dropped after every round, which keeps
//! the persisted file bounded no matter how long the service runs.

use chrono::{DateTime, TimeDelta, Utc};

pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Retention policy for stored snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Days to keep snapshots
    pub retention_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { retention_days: DEFAULT_RETENTION_DAYS }
    }
}

impl RetentionPolicy {
    pub fn new(retention_days: u32) -> Self {
        Self { retention_days }
    }

    pub fn window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.retention_days))
    }

    /// Oldest timestamp still retained at `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window()).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
