//! Caller-side retry for operations that failed with a retryable error

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::domain::result::Result;

/// Exponential backoff for conflicts and deadline aborts.
///
/// Only errors whose `is_retryable()` is true are retried; anything else is
/// returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(attempt, max_attempts = self.max_attempts, error = %e, "retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1).min(16)))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::domain::result::Error;

    #[test]
    fn test_retries_conflicts_until_success() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result = policy.run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::Conflict("Conflict on update".to_string()))
            } else {
                Ok(calls.get())
            }
        });

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<()> = policy.run(|| {
            calls.set(calls.get() + 1);
            Err(Error::Timeout(Duration::from_millis(1)))
        });

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_errors_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = RetryPolicy::default().run(|| {
            calls.set(calls.get() + 1);
            Err(Error::invalid_amount("negative"))
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(4), Duration::from_millis(80));
    }
}
