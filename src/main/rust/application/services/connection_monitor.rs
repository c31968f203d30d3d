use std::sync::Arc;

use super::resilience_manager::{ConnectionResilienceManager, EventCallback};
use crate::domain::entities::ConnectionStatus;
use crate::domain::errors::Result;

/// Connection monitoring use case over the resilience manager
pub struct ConnectionMonitor {
    manager: Arc<ConnectionResilienceManager>,
}

impl ConnectionMonitor {
    pub fn new(manager: Arc<ConnectionResilienceManager>) -> Self {
        Self { manager }
    }

    /// Start monitoring, registering `on_event` first so no event is missed
    pub async fn start_monitoring(&self, on_event: Option<EventCallback>) -> Result<()> {
        if let Some(callback) = on_event {
            self.manager.on_connection_event(callback)?;
        }

        self.manager.start_monitoring().await
    }

    pub async fn stop_monitoring(&self) -> Result<()> {
        self.manager.stop_monitoring().await
    }

    pub async fn force_reconnect(&self) -> Result<bool> {
        self.manager.reconnect().await
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.manager.get_connection_status()
    }
}
