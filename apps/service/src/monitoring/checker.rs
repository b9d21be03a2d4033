use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Why a probe never produced an HTTP status.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Transport used by the prober to fetch a status code.
///
/// Any status code is a successful fetch; only failures to obtain a response
/// at all are errors.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn fetch_status(&self, url: &Url) -> Result<u16, TransportError>;
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("statusboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, timeout))
    }

    /// Wrap a preconfigured client. `timeout` should match the client's own.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn fetch_status(&self, url: &Url) -> Result<u16, TransportError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| self.classify_error(e))?;

        Ok(response.status().as_u16())
    }
}

impl HttpChecker {
    fn classify_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else if error.is_builder() {
            TransportError::InvalidUrl(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}
