use std::time::Duration;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::RetryPolicy;

/// Exponential backoff for reconnection attempts.
///
/// Delay for attempt `n` is `base * multiplier^(n-1)`, capped at `max_delay`.
/// There is no jitter: the same attempt always yields the same delay.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        max_retries: u32,
        multiplier: f64,
    ) -> Result<Self> {
        if multiplier <= 1.0 || !multiplier.is_finite() {
            return Err(DomainError::InvalidBackoffMultiplier);
        }

        if base_delay.is_zero() {
            return Err(DomainError::InvalidRetryDelay(
                "base delay cannot be zero".to_string(),
            ));
        }

        if max_delay < base_delay {
            return Err(DomainError::InvalidRetryDelay(format!(
                "max delay ({:?}) cannot be less than base delay ({:?})",
                max_delay, base_delay
            )));
        }

        Ok(Self {
            base_delay,
            max_delay,
            max_retries,
            multiplier,
        })
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 10,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt > self.max_retries {
            return None;
        }

        let exponent = attempt.saturating_sub(1);
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powf(f64::from(exponent));

        // Cap before converting back; the raw value overflows Duration for large attempts.
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return Some(self.max_delay);
        }

        Some(Duration::from_secs_f64(scaled).min(self.max_delay))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}
