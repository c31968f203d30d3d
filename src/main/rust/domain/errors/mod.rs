use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid backoff multiplier: must be > 1.0")]
    InvalidBackoffMultiplier,

    #[error("Invalid retry delay: {0}")]
    InvalidRetryDelay(String),

    #[error("Invalid health check interval: must be greater than zero")]
    InvalidHealthCheckInterval,

    #[error("Login token cannot be empty")]
    EmptyLoginToken,

    #[error("Connection manager is no longer running")]
    ManagerUnavailable,
}

/// Failures reported by or about the gateway session.
///
/// Clonable so a single failure can be kept in `ConnectionStatus` and
/// carried by the emitted event at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Session teardown failed: {0}")]
    DestroyFailed(String),

    #[error("Gateway disconnected: {0}")]
    Disconnected(String),

    #[error("Gateway session error: {0}")]
    Session(String),

    #[error("Health check failed - connection lost")]
    HealthCheckFailed,

    #[error("Max reconnection attempts reached ({attempts} attempts)")]
    RetriesExhausted { attempts: u32 },
}

pub type Result<T> = std::result::Result<T, DomainError>;
