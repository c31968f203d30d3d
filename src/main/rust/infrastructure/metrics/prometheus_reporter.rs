use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::ConnectionState;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Connection state (0=Idle, 1=Reconnecting, 2=Connected)
    pub static ref CONNECTION_STATE: Gauge = Gauge::new(
        "gateway_connection_state",
        "Current gateway connection state"
    ).expect("metric can be created");

    pub static ref RECONNECT_ATTEMPTS: IntCounter = IntCounter::new(
        "gateway_reconnect_attempts_total",
        "Total number of scheduled reconnection attempts"
    ).expect("metric can be created");

    pub static ref BACKOFF_SECONDS: Gauge = Gauge::new(
        "gateway_reconnect_backoff_seconds",
        "Delay before the most recently scheduled reconnection attempt"
    ).expect("metric can be created");

    pub static ref HEALTH_CHECKS: IntCounter = IntCounter::new(
        "gateway_health_checks_total",
        "Total number of connection health checks"
    ).expect("metric can be created");

    // Health checks that disagreed with the believed state
    pub static ref HEALTH_CHECK_RECONCILIATIONS: IntCounter = IntCounter::new(
        "gateway_health_check_reconciliations_total",
        "Health checks that found a missed lifecycle signal"
    ).expect("metric can be created");

    pub static ref RETRIES_EXHAUSTED: IntCounter = IntCounter::new(
        "gateway_reconnect_retries_exhausted_total",
        "Times automatic reconnection gave up"
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(CONNECTION_STATE.clone()))?;
        REGISTRY.register(Box::new(RECONNECT_ATTEMPTS.clone()))?;
        REGISTRY.register(Box::new(BACKOFF_SECONDS.clone()))?;
        REGISTRY.register(Box::new(HEALTH_CHECKS.clone()))?;
        REGISTRY.register(Box::new(HEALTH_CHECK_RECONCILIATIONS.clone()))?;
        REGISTRY.register(Box::new(RETRIES_EXHAUSTED.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_state_change(&self, state: &ConnectionState) {
        CONNECTION_STATE.set(state.as_metric());
    }

    fn report_reconnect_attempt(&self) {
        RECONNECT_ATTEMPTS.inc();
    }

    fn report_backoff(&self, delay_secs: f64) {
        BACKOFF_SECONDS.set(delay_secs);
    }

    fn report_health_check(&self, consistent: bool) {
        HEALTH_CHECKS.inc();
        if !consistent {
            HEALTH_CHECK_RECONCILIATIONS.inc();
        }
    }

    fn report_retries_exhausted(&self) {
        RETRIES_EXHAUSTED.inc();
    }
}
