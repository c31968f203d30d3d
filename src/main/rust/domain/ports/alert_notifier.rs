use async_trait::async_trait;

use crate::domain::errors::Result;
use crate::domain::value_objects::Alert;

/// Port for operator alert delivery
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send_alert(&self, alert: Alert) -> Result<()>;
}
