//! Retry with exponential backoff.
//!
//! The orchestrator retries a whole cycle, never a single request, so a
//! retried cycle always restarts from the committed watermark.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::PipelineError;

/// Exponential backoff schedule.
///
/// The delay before retry `n` (0-based) is `min(initial * factor^n, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: u32,
    pub cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            factor: 2,
            cap: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    /// Delay to wait after the `attempt`-th consecutive failure (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial.min(self.cap);
        for _ in 0..attempt {
            delay = delay.saturating_mul(self.factor.max(1));
            if delay >= self.cap {
                return self.cap;
            }
        }
        delay
    }
}

/// Runs an operation until it succeeds.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    pub backoff: Backoff,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Unbounded retries with the given backoff.
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Run `operation` until it returns `Ok`, sleeping between attempts.
    ///
    /// With `max_attempts` set, the last error is returned once the attempts
    /// are used up.
    pub async fn retry<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut failures: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if failures > 0 {
                        info!(operation = %name, attempts = failures + 1, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if self.max_attempts.is_some_and(|max| failures >= max) {
                        error!(operation = %name, attempts = failures, error = %e, "Giving up");
                        return Err(e);
                    }

                    let delay = self.backoff.delay(failures - 1);
                    warn!(
                        operation = %name,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
