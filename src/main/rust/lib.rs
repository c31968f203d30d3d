pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{
    ConnectionMonitor, ConnectionResilienceManager, ConnectionService, EventCallback,
};
pub use config::{Config, ReconnectionStrategy};
pub use domain::entities::ConnectionStatus;
pub use domain::errors::{DomainError, GatewayError, Result};
pub use domain::ports::{AlertNotifier, GatewaySession, GatewaySignal, MetricsReporter, RetryPolicy};
pub use domain::value_objects::{
    Alert, AlertLevel, ConnectionEvent, ConnectionEventKind, ConnectionState, ExponentialBackoff,
    FixedInterval, MonitorSettings,
};
pub use infrastructure::alerts::TracingAlertNotifier;
pub use infrastructure::gateway::{InMemoryGateway, TcpGateway};
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
