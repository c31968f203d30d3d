use async_trait::async_trait;

use crate::domain::errors::Result;
use crate::domain::ports::AlertNotifier;
use crate::domain::value_objects::{Alert, AlertLevel};

/// Delivers alerts as structured log records under the `alerts` target
pub struct TracingAlertNotifier;

impl TracingAlertNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingAlertNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertNotifier for TracingAlertNotifier {
    async fn send_alert(&self, alert: Alert) -> Result<()> {
        let title = alert.title();
        let error = alert.error();

        match alert.level() {
            AlertLevel::Info => {
                tracing::info!(target: "alerts", %title, error = ?error, "{}", alert.message())
            }
            AlertLevel::Warn => {
                tracing::warn!(target: "alerts", %title, error = ?error, "{}", alert.message())
            }
            AlertLevel::Error => {
                tracing::error!(target: "alerts", %title, error = ?error, "{}", alert.message())
            }
        }

        Ok(())
    }
}
