use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::errors::GatewayError;

/// Lifecycle signals pushed by the gateway session
#[derive(Debug, Clone, PartialEq)]
pub enum GatewaySignal {
    Ready,
    Resumed,
    Error(GatewayError),
    Disconnected { reason: String },
    Reconnecting,
}

/// Port for the realtime gateway connection
#[async_trait]
pub trait GatewaySession: Send + Sync {
    /// Subscribe to lifecycle signals
    fn signals(&self) -> broadcast::Receiver<GatewaySignal>;

    /// Whether the session is currently live
    fn is_ready(&self) -> bool;

    /// Establish a new session
    async fn login(&self, token: &str) -> Result<(), GatewayError>;

    /// Tear down the current session, if any
    async fn destroy(&self) -> Result<(), GatewayError>;
}
