use std::time::SystemTime;

use crate::domain::errors::GatewayError;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEventKind {
    Connected,
    Disconnected { error: Option<GatewayError> },
    Reconnecting { attempt: u32 },
    Error { error: GatewayError },
}

/// Immutable notification emitted by the resilience manager
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    kind: ConnectionEventKind,
    timestamp: SystemTime,
}

impl ConnectionEvent {
    pub fn new(kind: ConnectionEventKind) -> Self {
        Self {
            kind,
            timestamp: SystemTime::now(),
        }
    }

    pub fn connected() -> Self {
        Self::new(ConnectionEventKind::Connected)
    }

    pub fn disconnected(error: Option<GatewayError>) -> Self {
        Self::new(ConnectionEventKind::Disconnected { error })
    }

    pub fn reconnecting(attempt: u32) -> Self {
        Self::new(ConnectionEventKind::Reconnecting { attempt })
    }

    pub fn error(error: GatewayError) -> Self {
        Self::new(ConnectionEventKind::Error { error })
    }

    pub fn kind(&self) -> &ConnectionEventKind {
        &self.kind
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ConnectionEventKind::Connected => "connected",
            ConnectionEventKind::Disconnected { .. } => "disconnected",
            ConnectionEventKind::Reconnecting { .. } => "reconnecting",
            ConnectionEventKind::Error { .. } => "error",
        }
    }
}
