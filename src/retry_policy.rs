//! ISAPI camera protocol client
//! Transient failure classification and retry with exponential backoff
//!
//! A failed attempt is retried only when it is transient: a request timeout,
//! rate limiting, a gateway/availability 5xx, or a transport-level failure.
//! Between attempts the driver sleeps
//!
//! ```text
//! delay = min(base_delay * 2^(attempt - 1), max_delay) + jitter,  jitter in [0, max_jitter)
//! ```
//!
//! With defaults that is ~1s then ~2s across a budget of 3 attempts.
//! Cancelling the token aborts a pending sleep at once and never counts as a
//! retryable failure.

use crate::isapi_error::{ IsapiError, ProtocolError };
use crate::request_log::{ RequestContext, RequestLog };
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Total attempts per request, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(4000);

const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// Statuses worth repeating unchanged: 408, 429, 500, 502, 503, 504
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Transport failures worth repeating: timeouts and connection-level errors.
///
/// Caller cancellation never reaches here; it is reported as
/// [`IsapiError::Cancelled`] before the transport sees it.
pub fn is_transient_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

/// Attempt budget and backoff shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            max_jitter,
        }
    }

    /// Single attempt, never sleeps
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt after `attempt` (1-indexed), without jitter
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
    }

    /// Delay before the attempt after `attempt`, jitter included
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        self.base_backoff(attempt) + jitter
    }

    /// Run `operation` until it succeeds, fails terminally, or the budget is spent.
    ///
    /// `operation` receives the 1-indexed attempt number. A transient HTTP
    /// status on the last attempt is returned as is; a transient transport
    /// failure on the last attempt becomes an "exhausted retries" error.
    pub async fn run<T, F, Fut>(
        &self,
        context: &RequestContext<'_>,
        log: &dyn RequestLog,
        cancel: &CancellationToken,
        mut operation: F
    ) -> Result<T, IsapiError>
        where F: FnMut(u32) -> Fut, Fut: Future<Output = Result<T, IsapiError>>
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(IsapiError::Cancelled);
            }

            let err = match operation(attempt).await {
                Ok(value) => {
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if attempt >= self.max_attempts {
                return Err(match err {
                    IsapiError::Protocol(protocol) => IsapiError::Protocol(protocol),
                    other => IsapiError::Protocol(ProtocolError::exhausted(other)),
                });
            }

            let delay = self.backoff_delay(attempt);
            log.backoff_scheduled(context, attempt, delay, &err.to_string());

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(IsapiError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
