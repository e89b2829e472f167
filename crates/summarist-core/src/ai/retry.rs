//! Exponential backoff for opening summary requests
//!
//! Only the request-initiation phase is retried. Once a response stream is
//! open, a failure while reading it is final for that attempt.

use std::future::Future;
use std::time::Duration;

use crate::config::InteractiveConfig;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each further failure
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&InteractiveConfig> for RetryPolicy {
    fn from(config: &InteractiveConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): 1s, 2s, 4s, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .unwrap_or(Duration::MAX)
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
pub async fn retry_with_backoff<F, Fut, T>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                tracing::debug!(
                    error = %e,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Summary request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_delay_saturates() {
        let policy = RetryPolicy::from(&InteractiveConfig {
            max_attempts: 5,
            initial_retry_delay_ms: u64::MAX,
        });
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(u64::MAX));
        assert_eq!(policy.backoff_delay(40), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_failures() {
        let start = Instant::now();
        let attempts_at = Mutex::new(Vec::new());

        let result = retry_with_backoff(RetryPolicy::default(), || {
            let mut seen = attempts_at.lock().unwrap();
            seen.push(start.elapsed());
            let n = seen.len();
            async move {
                if n < 3 {
                    Err(Error::Transport("connection refused".to_string()))
                } else {
                    Ok("opened")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "opened");

        let seen = attempts_at.lock().unwrap();
        assert_eq!(seen.len(), 3);
        let first_wait = seen[1] - seen[0];
        let second_wait = seen[2] - seen[1];
        let tolerance = Duration::from_millis(50);
        assert!(first_wait >= Duration::from_millis(1000) && first_wait < Duration::from_millis(1000) + tolerance);
        assert!(second_wait >= Duration::from_millis(2000) && second_wait < Duration::from_millis(2000) + tolerance);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry_with_backoff(RetryPolicy::default(), || {
            calls += 1;
            async { Err(Error::Transport("down".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = retry_with_backoff(RetryPolicy::default(), || {
            calls += 1;
            async {
                Err(Error::Status {
                    status: 401,
                    body: "unauthorized".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Status { status: 401, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&InteractiveConfig {
            max_attempts: 0,
            initial_retry_delay_ms: 250,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(500));
    }
}
