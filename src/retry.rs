//! Bounded retry with exponential backoff.
//!
//! A [`RetryPolicy`] wraps any fallible async operation. The wait after the
//! n-th failed attempt is `base * 2^(n-1)`, clamped into `[min_wait, max_wait]`,
//! and only errors accepted by the caller's predicate are retried.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for one kind of remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included
    pub max_attempts: u32,
    /// Multiplier of the exponential term
    pub base: Duration,
    /// Lower bound of every wait
    pub min_wait: Duration,
    /// Upper bound of every wait
    pub max_wait: Duration,
}

impl RetryPolicy {
    /// Exponential backoff clamped into `[min_wait, max_wait]` with a 1s multiplier.
    pub const fn exponential(max_attempts: u32, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts,
            base: Duration::from_secs(1),
            min_wait,
            max_wait,
        }
    }

    /// Constant wait between attempts.
    pub const fn fixed(max_attempts: u32, wait: Duration) -> Self {
        Self {
            max_attempts,
            base: wait,
            min_wait: wait,
            max_wait: wait,
        }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    pub fn wait_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.base.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// `max_attempts` is used up. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && retryable(&e) => {
                    let wait = self.wait_after(attempt);
                    debug!(
                        label,
                        attempt,
                        max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if retryable(&e) {
                        warn!(label, attempts = attempt, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use std::cell::Cell;

    #[test]
    fn test_wait_schedule_is_clamped() {
        let lookup = RetryPolicy::exponential(5, Duration::from_secs(4), Duration::from_secs(60));
        let waits: Vec<u64> = (1..=8).map(|n| lookup.wait_after(n).as_secs()).collect();
        assert_eq!(waits, vec![4, 4, 4, 8, 16, 32, 60, 60]);

        let download = RetryPolicy::exponential(3, Duration::from_secs(4), Duration::from_secs(10));
        assert_eq!(download.wait_after(1), Duration::from_secs(4));
        assert_eq!(download.wait_after(4), Duration::from_secs(8));
        assert_eq!(download.wait_after(5), Duration::from_secs(10));

        let page = RetryPolicy::fixed(6, Duration::from_secs(3));
        assert_eq!(page.wait_after(1), Duration::from_secs(3));
        assert_eq!(page.wait_after(5), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(4), Duration::from_secs(60));
        let attempts = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let result: Result<(), MonitorError> = policy
            .run(
                "always-429",
                || {
                    attempts.set(attempts.get() + 1);
                    async { Err(MonitorError::RateLimited { retry_after: None }) }
                },
                MonitorError::is_rate_limited,
            )
            .await;

        assert!(matches!(result, Err(MonitorError::RateLimited { .. })));
        assert_eq!(attempts.get(), 5);
        // 4 + 4 + 4 + 8 seconds of backoff between the five attempts
        assert!(start.elapsed() >= Duration::from_secs(20));
        assert!(start.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_returned_immediately() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(4), Duration::from_secs(60));
        let attempts = Cell::new(0u32);

        let result: Result<(), MonitorError> = policy
            .run(
                "bad-status",
                || {
                    attempts.set(attempts.get() + 1);
                    async {
                        Err(MonitorError::Http {
                            status: 404,
                            url: "https://example.org".to_string(),
                        })
                    }
                },
                MonitorError::is_rate_limited,
            )
            .await;

        assert!(matches!(result, Err(MonitorError::Http { status: 404, .. })));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let policy = RetryPolicy::exponential(3, Duration::from_secs(4), Duration::from_secs(10));
        let attempts = Cell::new(0u32);

        let result = policy
            .run(
                "flaky",
                || {
                    attempts.set(attempts.get() + 1);
                    let n = attempts.get();
                    async move {
                        if n < 3 {
                            Err(MonitorError::Http {
                                status: 503,
                                url: "https://example.org".to_string(),
                            })
                        } else {
                            Ok(n)
                        }
                    }
                },
                MonitorError::is_transient,
            )
            .await;

        assert_eq!(result.ok(), Some(3));
    }
}
