mod connection_monitor;
mod connection_service;
mod resilience_manager;

pub use connection_monitor::ConnectionMonitor;
pub use connection_service::{ConnectionService, RECONNECT_ALERT_INTERVAL};
pub use resilience_manager::{ConnectionResilienceManager, EventCallback};
