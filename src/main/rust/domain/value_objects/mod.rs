mod alert;
mod connection_event;
mod connection_state;
mod exponential_backoff;
mod fixed_interval;
mod monitor_settings;

pub use alert::{Alert, AlertLevel};
pub use connection_event::{ConnectionEvent, ConnectionEventKind};
pub use connection_state::ConnectionState;
pub use exponential_backoff::ExponentialBackoff;
pub use fixed_interval::FixedInterval;
pub use monitor_settings::MonitorSettings;
