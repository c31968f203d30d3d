mod alert_notifier;
mod gateway_session;
mod metrics_reporter;
mod retry_policy;

pub use alert_notifier::AlertNotifier;
pub use gateway_session::{GatewaySession, GatewaySignal};
pub use metrics_reporter::MetricsReporter;
pub use retry_policy::RetryPolicy;
