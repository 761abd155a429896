//! Backoff policy for requests to the events API.
//!
//! An attempt is repeated only when its [`EventError`] says so
//! (`is_retryable`): rate limiting, 5xx/408 responses, timeouts and refused
//! connections. Everything else is returned straight away.

use std::future::Future;
use std::time::Duration;

use crate::error::{EventError, EventResult};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Wait before the first retry; doubles on every further one.
    pub initial_delay: Duration,
    /// Upper bound on any single wait, including a server's `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// How long to wait after failed attempt number `attempt` (0-based).
    ///
    /// A rate-limited response waits at least its `Retry-After`, still
    /// capped by `max_delay`.
    pub fn delay_after(&self, attempt: u32, error: &EventError) -> Duration {
        let backoff = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let wait = match error {
            EventError::RateLimited(secs) => backoff.max(Duration::from_secs(*secs)),
            _ => backoff,
        };
        wait.min(self.max_delay)
    }

    /// Run `attempt` until it succeeds, fails for good, or retries run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> EventResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EventResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        tracing::info!(operation, retries, "Event request succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    let delay = self.delay_after(retries, &e);
                    retries += 1;
                    tracing::warn!(
                        operation,
                        retry = retries,
                        of = self.max_retries,
                        ?delay,
                        "Event request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retries > 0 {
                        tracing::error!(operation, retries, "Event request failed after retrying: {}", e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
