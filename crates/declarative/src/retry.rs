//! Retry of transient upstream failures with exponential backoff.

use crate::client::{ClientError, ClientResult};
use crate::context::Clock;
use std::time::Duration;

/// Backoff policy for retryable client errors
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier applied per attempt
    pub backoff_factor: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// A config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Callback for retry notifications.
pub trait RetryCallback {
    /// `attempt` is 1-indexed and names the attempt that just failed.
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &ClientError, delay: Duration);
}

/// Callback that logs each retry at warn level.
pub struct LogCallback<'a> {
    /// What is being retried, e.g. "get Event Hub /subscriptions/..."
    pub what: &'a str,
}

impl RetryCallback for LogCallback<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &ClientError, delay: Duration) {
        log::warn!(
            "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
            self.what,
            attempt,
            max_attempts,
            error,
            delay.as_secs_f64()
        );
    }
}

/// Run `operation`, retrying retryable errors with backoff on `clock`.
///
/// Non-retryable errors (including `NotFound`) are returned immediately.
pub fn with_retry<T, F>(
    config: &RetryConfig,
    clock: &dyn Clock,
    callback: Option<&dyn RetryCallback>,
    mut operation: F,
) -> ClientResult<T>
where
    F: FnMut() -> ClientResult<T>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                if let Some(cb) = callback {
                    cb.on_retry(attempt + 1, max_attempts, &e, delay);
                }
                clock.sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ManualClock;
    use std::cell::Cell;

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig::new(5, Duration::from_secs(10), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(30));
    }

    #[test]
    fn test_success_first_try() {
        let clock = ManualClock::new();
        let result = with_retry(&RetryConfig::default(), &clock, None, || Ok::<_, ClientError>(42));
        assert_eq!(result.unwrap(), 42);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_retries_transient_errors() {
        let clock = ManualClock::new();
        let attempts = Cell::new(0);
        let result = with_retry(&RetryConfig::default(), &clock, None, || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(ClientError::api(503, "busy"))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let clock = ManualClock::new();
        let attempts = Cell::new(0);
        let result: ClientResult<()> = with_retry(&RetryConfig::default(), &clock, None, || {
            attempts.set(attempts.get() + 1);
            Err(ClientError::api(400, "bad request"))
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let clock = ManualClock::new();
        let attempts = Cell::new(0);
        let result: ClientResult<()> = with_retry(&RetryConfig::default(), &clock, None, || {
            attempts.set(attempts.get() + 1);
            Err(ClientError::Transport("reset".into()))
        });
        assert_eq!(result, Err(ClientError::Transport("reset".into())));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_no_retry_config() {
        let clock = ManualClock::new();
        let attempts = Cell::new(0);
        let _: ClientResult<()> = with_retry(&RetryConfig::no_retry(), &clock, None, || {
            attempts.set(attempts.get() + 1);
            Err(ClientError::api(429, "throttled"))
        });
        assert_eq!(attempts.get(), 1);
    }
}
