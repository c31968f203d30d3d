use std::time::{Duration, SystemTime};

use crate::domain::errors::GatewayError;

/// Connectivity record owned by the resilience manager.
///
/// `reconnect_attempts` only grows while disconnected and drops to zero in
/// the same call that marks the connection live.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionStatus {
    is_connected: bool,
    last_connected_at: Option<SystemTime>,
    reconnect_attempts: u32,
    last_error: Option<GatewayError>,
}

impl ConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn last_connected_at(&self) -> Option<SystemTime> {
        self.last_connected_at
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn last_error(&self) -> Option<&GatewayError> {
        self.last_error.as_ref()
    }

    /// Time since the connection was last established, while connected
    pub fn connected_for(&self) -> Option<Duration> {
        if !self.is_connected {
            return None;
        }
        self.last_connected_at
            .and_then(|at| SystemTime::now().duration_since(at).ok())
    }

    pub fn mark_connected(&mut self, at: SystemTime) {
        self.is_connected = true;
        self.last_connected_at = Some(at);
        self.reconnect_attempts = 0;
        self.last_error = None;
    }

    pub fn mark_disconnected(&mut self, error: Option<GatewayError>) {
        self.is_connected = false;
        if error.is_some() {
            self.last_error = error;
        }
    }

    /// Count one scheduled reconnection attempt and return its number
    pub fn record_reconnect_attempt(&mut self) -> u32 {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.reconnect_attempts
    }

    pub fn record_error(&mut self, error: GatewayError) {
        self.last_error = Some(error);
    }
}
