//! Bounded retry with a caller-supplied delay schedule

use std::future::Future;
use std::time::Duration;

/// How many extra attempts to make and how long to wait before each
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one
    pub max_retries: u32,

    /// Delay unit; attempt `n` waits `n * base_delay`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Linear backoff: the n-th retry waits `n * base_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, E, F, Fut>(&self, should_retry: impl Fn(&E) -> bool, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        retry_with(self.max_retries, |n| self.delay_for(n), should_retry, op).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Generic bounded retry loop.
///
/// `delay` receives the retry number (starting at 1) and returns how long to
/// sleep before that retry.
pub async fn retry_with<T, E, F, Fut>(
    max_retries: u32,
    delay: impl Fn(u32) -> Duration,
    should_retry: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries && should_retry(&err) => {
                attempt += 1;
                let wait = delay(attempt);
                tracing::warn!(
                    "[retry {}/{}] retryable failure, waiting {:.1}s",
                    attempt,
                    max_retries,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}
