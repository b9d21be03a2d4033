use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::debug;
use url::Url;

use super::checker::{Checker, HttpChecker, TransportError};
use super::types::ProbeResult;
use crate::targets::Target;

/// Upper bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error note recorded when a target cannot be reached.
pub const UNREACHABLE_NOTE: &str = "Unreachable";
/// Error note recorded when a target's URL cannot be parsed.
pub const INVALID_URL_NOTE: &str = "Invalid URL";
/// Error note recorded when the probe task itself died.
pub const TASK_FAILED_NOTE: &str = "Probe task failed";

/// Probes one target and classifies the outcome. Never fails: every failure
/// mode is encoded in the returned [`ProbeResult`].
pub struct Prober {
    checker: Arc<dyn Checker>,
    timeout: Duration,
}

impl Prober {
    pub fn new(checker: Arc<dyn Checker>, timeout: Duration) -> Self {
        Self { checker, timeout }
    }

    /// A prober backed by a real HTTP client.
    pub fn http(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpChecker::new(timeout)?), timeout))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe(&self, target: &Target) -> ProbeResult {
        let start = Instant::now();

        let url = match Url::parse(target.url()) {
            Ok(url) => url,
            Err(e) => {
                debug!(target_id = target.id(), url = target.url(), error = %e, "Malformed target URL");
                return ProbeResult::unreachable(target.id(), elapsed_ms(start), INVALID_URL_NOTE);
            }
        };

        // The checker enforces its own timeout; this bounds fakes and misbehaving transports too.
        let outcome = match timeout(self.timeout, self.checker.fetch_status(&url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        };
        let latency_ms = elapsed_ms(start);

        match outcome {
            Ok(code) => {
                debug!(target_id = target.id(), code, duration_ms = latency_ms, "Probe answered");
                ProbeResult::from_status(target.id(), code, latency_ms)
            }
            Err(TransportError::InvalidUrl(reason)) => {
                debug!(target_id = target.id(), %reason, "Target URL rejected by transport");
                ProbeResult::unreachable(target.id(), latency_ms, INVALID_URL_NOTE)
            }
            Err(e) => {
                debug!(target_id = target.id(), error = %e, duration_ms = latency_ms, "Probe failed");
                ProbeResult::unreachable(target.id(), latency_ms, UNREACHABLE_NOTE)
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::monitoring::types::Classification;

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every request with a fixed status.
    pub(crate) struct FixedChecker {
        pub status: u16,
        pub calls: AtomicUsize,
    }

    impl FixedChecker {
        pub fn new(status: u16) -> Self {
            Self { status, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl Checker for FixedChecker {
        async fn fetch_status(&self, _url: &Url) -> Result<u16, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.status)
        }
    }

    struct RefusingChecker;

    #[async_trait::async_trait]
    impl Checker for RefusingChecker {
        async fn fetch_status(&self, _url: &Url) -> Result<u16, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    struct HangingChecker;

    #[async_trait::async_trait]
    impl Checker for HangingChecker {
        async fn fetch_status(&self, _url: &Url) -> Result<u16, TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_secured_probe() {
        let prober = Prober::new(Arc::new(FixedChecker::new(403)), DEFAULT_PROBE_TIMEOUT);
        let result = prober.probe(&Target::new("ca", "https://api-ca.metrc.com")).await;

        assert_eq!(result.target_id, "ca");
        assert_eq!(result.status_code, 403);
        assert_eq!(result.classification, Classification::Secured);
        assert!(result.error_note.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let prober = Prober::new(Arc::new(RefusingChecker), DEFAULT_PROBE_TIMEOUT);
        let result = prober.probe(&Target::new("ny", "https://api-ny.metrc.com")).await;

        assert_eq!(result.status_code, 0);
        assert_eq!(result.classification, Classification::Unreachable);
        assert_eq!(result.error_note.as_deref(), Some(UNREACHABLE_NOTE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_transport_times_out() {
        let prober = Prober::new(Arc::new(HangingChecker), DEFAULT_PROBE_TIMEOUT);
        let result = prober.probe(&Target::new("ak", "https://api-ak.metrc.com")).await;

        assert_eq!(result.status_code, 0);
        assert_eq!(result.classification, Classification::Unreachable);
        assert_eq!(result.error_note.as_deref(), Some(UNREACHABLE_NOTE));
        assert!(result.latency_ms >= 5000);
    }

    #[tokio::test]
    async fn test_malformed_url_is_unreachable() {
        let checker = Arc::new(FixedChecker::new(200));
        let prober = Prober::new(checker.clone(), DEFAULT_PROBE_TIMEOUT);
        let result = prober.probe(&Target::new("gu", "not a url")).await;

        assert_eq!(result.classification, Classification::Unreachable);
        assert_eq!(result.error_note.as_deref(), Some(INVALID_URL_NOTE));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
    }
}
