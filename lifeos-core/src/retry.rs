//! Retrying HTTP client for outbound upstream calls.
//!
//! One logical call becomes at most `max_attempts` network calls. A network
//! error or a status in the transient set on attempt `i` is followed by a wait
//! of `base_delay * 2^i` (no jitter), including after the final attempt, so
//! five attempts spend at most 1+2+4+8+16 = 31 units waiting before
//! `RetryExhausted` is returned. Any other non-success status is surfaced
//! immediately. Backoff waits are `tokio` sleeps, so a request that is
//! backing off never blocks other requests. Dropping the returned future or
//! firing the caller's `CancellationToken` aborts the in-flight attempt and
//! skips the remaining retries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Rate limited, internal server error, service unavailable.
pub const DEFAULT_TRANSIENT_STATUSES: [u16; 3] = [429, 500, 503];

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            transient_statuses: config.transient_statuses.clone(),
        }
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }

    pub fn is_transient_status(&self, status: u16) -> bool {
        self.transient_statuses.contains(&status)
    }

    /// Waits between consecutive attempts: `base_delay * 2^i` for
    /// `i in 0..attempts - 1`.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let unit_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        // tokio-retry yields factor * base^n starting at n = 1; halving a base
        // of 2 starts the series at exactly one unit.
        ExponentialBackoff::from_millis(2)
            .factor(unit_ms)
            .map(|d| d / 2)
            .take(self.attempts() - 1)
    }

    /// Wait after a transient failure on the last attempt:
    /// `base_delay * 2^(attempts - 1)`.
    pub fn final_wait(&self) -> Duration {
        let exponent = u32::try_from(self.attempts() - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(2u32.saturating_pow(exponent))
    }

    /// Idle time of a fully exhausted call.
    pub fn worst_case_wait(&self) -> Duration {
        self.backoff().sum::<Duration>() + self.final_wait()
    }
}

// ============================================================================
// Request / response / error types
// ============================================================================

/// Description of one logical outbound call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    /// Overrides the policy's per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful upstream response, body already read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("all {attempts} attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: Box<HttpError> },

    #[error("request cancelled")]
    Cancelled,
}

impl HttpError {
    /// HTTP status of the failure, looking through `RetryExhausted`.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

// ============================================================================
// RetryingHttpClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingHttpClient {
    pub fn new(policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(policy.attempt_timeout).build()?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Perform `spec`, retrying transient failures per the policy.
    pub async fn send(&self, spec: &RequestSpec) -> Result<HttpResponse, HttpError> {
        let attempts = AtomicUsize::new(0);

        let result = RetryIf::start(
            self.policy.backoff(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                self.attempt_once(spec, attempt)
            },
            |e: &HttpError| self.is_transient(e),
        )
        .await;

        let made = attempts.load(Ordering::SeqCst);
        match result {
            Ok(response) => {
                if made > 1 {
                    tracing::info!(attempts = made, url = %redact(&spec.url), "Upstream call succeeded after retry");
                }
                Ok(response)
            }
            Err(e) if self.is_transient(&e) => {
                tracing::error!(
                    attempts = made,
                    error = %e,
                    "All upstream retry attempts failed"
                );
                tokio::time::sleep(self.policy.final_wait()).await;
                Err(HttpError::RetryExhausted {
                    attempts: made,
                    last: Box::new(e),
                })
            }
            Err(e) => {
                tracing::error!(attempt = made, error = %e, "Upstream call failed, not retrying");
                Err(e)
            }
        }
    }

    /// Like [`send`](Self::send), but gives up as soon as `cancel` fires,
    /// aborting the in-flight attempt and any remaining retries.
    pub async fn send_cancellable(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, HttpError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(url = %redact(&spec.url), "Upstream call cancelled by caller");
                Err(HttpError::Cancelled)
            }
            result = self.send(spec) => result,
        }
    }

    fn is_transient(&self, error: &HttpError) -> bool {
        match error {
            HttpError::Network(_) => true,
            HttpError::Status { status, .. } => self.policy.is_transient_status(*status),
            HttpError::RetryExhausted { .. } | HttpError::Cancelled => false,
        }
    }

    async fn attempt_once(
        &self,
        spec: &RequestSpec,
        attempt: usize,
    ) -> Result<HttpResponse, HttpError> {
        let timeout = spec.timeout.unwrap_or(self.policy.attempt_timeout);
        let mut request = self
            .client
            .request(spec.method.clone(), &spec.url)
            .timeout(timeout);
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        // Errors are stripped of their URL: the query string may carry a key.
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let e = e.without_url();
                tracing::warn!(attempt, error = %e, "Upstream network error");
                return Err(e.into());
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;

        if status.is_success() {
            return Ok(HttpResponse { status, body });
        }

        if self.policy.is_transient_status(status.as_u16()) {
            tracing::warn!(attempt, status = status.as_u16(), "Transient upstream status");
        }

        Err(HttpError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Strip the query string (which may carry the API key) for logging.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// ============================================================================
// TESTS
// ============================================================================
