use std::fmt;
use std::time::Duration;

use crate::domain::errors::{DomainError, Result};

/// Settings injected into the resilience manager
#[derive(Clone, PartialEq)]
pub struct MonitorSettings {
    health_check_interval: Duration,
    login_token: String,
}

impl MonitorSettings {
    pub fn new(health_check_interval: Duration, login_token: String) -> Result<Self> {
        if health_check_interval.is_zero() {
            return Err(DomainError::InvalidHealthCheckInterval);
        }

        if login_token.trim().is_empty() {
            return Err(DomainError::EmptyLoginToken);
        }

        Ok(Self {
            health_check_interval,
            login_token,
        })
    }

    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    pub fn login_token(&self) -> &str {
        &self.login_token
    }
}

// Keeps the token out of logs.
impl fmt::Debug for MonitorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorSettings")
            .field("health_check_interval", &self.health_check_interval)
            .field("login_token", &"<redacted>")
            .finish()
    }
}
