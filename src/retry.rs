use std::time::Duration;

use crate::error::Error;

/// Attempt count and fixed delay between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    interval: Duration,
}

impl RetryPolicy {
    /// Fails with [`Error::InvalidAttempts`] when `max_attempts` is zero.
    pub fn new(max_attempts: u32, interval: Duration) -> crate::Result<Self> {
        if max_attempts < 1 {
            return Err(Error::InvalidAttempts {
                times: max_attempts,
            });
        }
        Ok(Self {
            max_attempts: max_attempts as usize,
            interval,
        })
    }

    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            interval: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a failed `attempt` (1-based) leaves room for another one.
    pub(crate) fn allows_retry_after(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    pub(crate) fn delay_before_retry(&self) -> Option<Duration> {
        (!self.interval.is_zero()).then_some(self.interval)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
