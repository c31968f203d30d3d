use std::time::Duration;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::RetryPolicy;

/// Constant delay between reconnection attempts
#[derive(Debug, Clone, PartialEq)]
pub struct FixedInterval {
    interval: Duration,
    max_retries: u32,
}

impl FixedInterval {
    pub fn new(interval: Duration, max_retries: u32) -> Result<Self> {
        if interval.is_zero() {
            return Err(DomainError::InvalidRetryDelay(
                "fixed interval cannot be zero".to_string(),
            ));
        }

        Ok(Self {
            interval,
            max_retries,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_retries: 20,
        }
    }
}

impl RetryPolicy for FixedInterval {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }
        Some(self.interval)
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
