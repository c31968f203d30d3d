use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_resilience::{
    ConnectionEvent, ConnectionEventKind, ConnectionResilienceManager, ConnectionState,
    EventCallback, ExponentialBackoff, FixedInterval, GatewayError, GatewaySignal,
    InMemoryGateway, MetricsReporter, MonitorSettings, RetryPolicy,
};
use tokio::sync::mpsc;
use tokio::time;

const LONG_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Default)]
struct RecordingMetrics {
    reconnect_attempts: AtomicU32,
    health_checks: AtomicU32,
    reconciliations: AtomicU32,
    exhausted: AtomicU32,
    states: Mutex<Vec<ConnectionState>>,
}

impl MetricsReporter for RecordingMetrics {
    fn report_state_change(&self, state: &ConnectionState) {
        self.states.lock().unwrap().push(*state);
    }

    fn report_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
    }

    fn report_backoff(&self, _delay_secs: f64) {}

    fn report_health_check(&self, consistent: bool) {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if !consistent {
            self.reconciliations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn report_retries_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    gateway: Arc<InMemoryGateway>,
    metrics: Arc<RecordingMetrics>,
    manager: Arc<ConnectionResilienceManager>,
}

fn harness(policy: Box<dyn RetryPolicy>, health_check_interval: Duration) -> Harness {
    let gateway = Arc::new(InMemoryGateway::new());
    let metrics = Arc::new(RecordingMetrics::default());
    let settings = MonitorSettings::new(health_check_interval, "token".to_string()).unwrap();
    let manager = Arc::new(ConnectionResilienceManager::new(
        gateway.clone(),
        policy,
        settings,
        metrics.clone(),
    ));
    Harness {
        gateway,
        metrics,
        manager,
    }
}

fn collector() -> (EventCallback, mpsc::UnboundedReceiver<ConnectionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: EventCallback = Box::new(move |event: &ConnectionEvent| -> anyhow::Result<()> {
        tx.send(event.clone())?;
        Ok(())
    });
    (callback, rx)
}

async fn next_kind(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEventKind {
    events.recv().await.unwrap().kind().clone()
}

async fn assert_quiet(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) {
    let next = time::timeout(Duration::from_secs(600), events.recv()).await;
    assert!(next.is_err(), "unexpected event: {:?}", next);
}

fn assert_delay(elapsed: Duration, expected: Duration) {
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "expected ~{:?}, waited {:?}",
        expected,
        elapsed
    );
}

/// Mark the gateway live through its signal stream, without a login call
async fn connect(h: &Harness, events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) {
    h.gateway.set_ready(true);
    h.gateway.emit(GatewaySignal::Ready);
    assert_eq!(next_kind(events).await, ConnectionEventKind::Connected);
}

fn login_failed() -> GatewayError {
    GatewayError::LoginFailed("gateway unavailable".to_string())
}

#[tokio::test(start_paused = true)]
async fn test_retries_stop_after_max_attempts() {
    let h = harness(Box::new(ExponentialBackoff::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected {
            error: Some(GatewayError::Disconnected("socket closed".to_string()))
        }
    );

    for attempt in 1..=10 {
        assert_eq!(
            next_kind(&mut events).await,
            ConnectionEventKind::Reconnecting { attempt }
        );
        assert_eq!(
            next_kind(&mut events).await,
            ConnectionEventKind::Error {
                error: login_failed()
            }
        );
    }

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error {
            error: GatewayError::RetriesExhausted { attempts: 10 }
        }
    );
    assert_quiet(&mut events).await;

    let status = h.manager.get_connection_status();
    assert!(!status.is_connected());
    assert_eq!(status.reconnect_attempts(), 10);
    assert_eq!(
        status.last_error(),
        Some(&GatewayError::RetriesExhausted { attempts: 10 })
    );
    assert_eq!(h.gateway.login_calls(), 10);
    assert_eq!(h.metrics.reconnect_attempts.load(Ordering::SeqCst), 10);
    assert_eq!(h.metrics.exhausted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_between_attempts() {
    let h = harness(Box::new(ExponentialBackoff::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
    let scheduled = time::Instant::now();
    next_kind(&mut events).await;
    assert_delay(scheduled.elapsed(), Duration::from_secs(1));

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 2 }
    );
    let scheduled = time::Instant::now();
    next_kind(&mut events).await;
    assert_delay(scheduled.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_during_backoff() {
    let h = harness(Box::new(ExponentialBackoff::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_next_logins(2);
    h.gateway.drop_connection("socket closed");

    next_kind(&mut events).await;
    for attempt in 1..=2 {
        assert_eq!(
            next_kind(&mut events).await,
            ConnectionEventKind::Reconnecting { attempt }
        );
        assert!(matches!(
            next_kind(&mut events).await,
            ConnectionEventKind::Error { .. }
        ));
    }
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 3 }
    );

    // Attempt 3 is still waiting on its 4s timer.
    assert!(h.manager.reconnect().await.unwrap());

    assert_eq!(next_kind(&mut events).await, ConnectionEventKind::Connected);
    assert_quiet(&mut events).await;

    let status = h.manager.get_connection_status();
    assert!(status.is_connected());
    assert_eq!(status.reconnect_attempts(), 0);
    assert!(status.last_error().is_none());
    assert_eq!(h.gateway.login_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_failure_resumes_automatic_retry() {
    let h = harness(Box::new(ExponentialBackoff::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    assert!(!h.manager.reconnect().await.unwrap());

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error {
            error: login_failed()
        }
    );
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 2 }
    );
    assert_eq!(h.gateway.login_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_disconnect_is_ignored() {
    let h = harness(Box::new(ExponentialBackoff::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    h.gateway.drop_connection("socket closed");

    assert!(matches!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected { .. }
    ));
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
    assert!(matches!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error { .. }
    ));
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 2 }
    );

    assert_eq!(h.manager.get_connection_status().reconnect_attempts(), 2);
    h.manager.stop_monitoring().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_ready_emits_single_connected() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.emit(GatewaySignal::Ready);
    h.gateway.emit(GatewaySignal::Resumed);

    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_monitoring_cancels_pending_work() {
    let h = harness(
        Box::new(FixedInterval::default()),
        Duration::from_secs(30),
    );
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    h.manager.stop_monitoring().await.unwrap();
    h.manager.stop_monitoring().await.unwrap();

    time::sleep(Duration::from_secs(600)).await;

    assert!(events.try_recv().is_err());
    assert_eq!(h.gateway.login_calls(), 0);
    assert_eq!(h.metrics.health_checks.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_monitoring_is_idempotent() {
    let h = harness(
        Box::new(FixedInterval::default()),
        Duration::from_secs(30),
    );
    h.manager.start_monitoring().await.unwrap();
    h.manager.start_monitoring().await.unwrap();

    time::sleep(Duration::from_secs(95)).await;

    assert_eq!(h.metrics.health_checks.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_detects_recovery() {
    let h = harness(
        Box::new(ExponentialBackoff::default()),
        Duration::from_secs(30),
    );
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    // Live session whose Ready signal was never observed
    h.gateway.set_ready(true);

    let started = time::Instant::now();
    assert_eq!(next_kind(&mut events).await, ConnectionEventKind::Connected);
    assert_delay(started.elapsed(), Duration::from_secs(30));

    let status = h.manager.get_connection_status();
    assert!(status.is_connected());
    assert_eq!(status.reconnect_attempts(), 0);
    assert_eq!(h.metrics.reconciliations.load(Ordering::SeqCst), 1);
    assert_eq!(h.metrics.reconnect_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_detects_silent_disconnect() {
    let h = harness(
        Box::new(ExponentialBackoff::default()),
        Duration::from_secs(30),
    );
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.set_ready(false);

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected {
            error: Some(GatewayError::HealthCheckFailed)
        }
    );
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
    assert_eq!(
        h.manager.get_connection_status().last_error(),
        Some(&GatewayError::HealthCheckFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_gateway_error_while_connected_is_a_disconnect() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    let error = GatewayError::Session("invalid session".to_string());
    h.gateway.emit(GatewaySignal::Error(error.clone()));

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected { error: Some(error) }
    );
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_without_monitoring_does_not_retry() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();

    connect(&h, &mut events).await;
    h.gateway.drop_connection("socket closed");

    assert!(matches!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected { .. }
    ));
    assert_quiet(&mut events).await;
    assert_eq!(h.gateway.login_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_subscribers_do_not_block_delivery() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let failing: EventCallback =
        Box::new(|_event: &ConnectionEvent| -> anyhow::Result<()> { anyhow::bail!("boom") });
    let panicking: EventCallback =
        Box::new(|_event: &ConnectionEvent| -> anyhow::Result<()> { panic!("subscriber bug") });
    let (callback, mut events) = collector();

    h.manager.on_connection_event(failing).unwrap();
    h.manager.on_connection_event(panicking).unwrap();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.drop_connection("socket closed");

    assert!(matches!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected { .. }
    ));
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_observes_updated_status() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (tx, mut observed) = mpsc::unbounded_channel();
    let manager = Arc::clone(&h.manager);
    h.manager
        .on_connection_event(Box::new(move |event: &ConnectionEvent| -> anyhow::Result<()> {
            let status = manager.get_connection_status();
            tx.send((
                event.name(),
                status.is_connected(),
                status.reconnect_attempts(),
            ))?;
            Ok(())
        }))
        .unwrap();
    h.manager.start_monitoring().await.unwrap();

    h.gateway.set_ready(true);
    h.gateway.emit(GatewaySignal::Ready);
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");

    assert_eq!(observed.recv().await.unwrap(), ("connected", true, 0));
    assert_eq!(observed.recv().await.unwrap(), ("disconnected", false, 0));
    assert_eq!(observed.recv().await.unwrap(), ("reconnecting", false, 1));
}

#[tokio::test(start_paused = true)]
async fn test_state_reported_to_metrics() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    let states = h.metrics.states.lock().unwrap().clone();
    assert!(states.contains(&ConnectionState::Connected));
    assert_eq!(
        states.last(),
        Some(&ConnectionState::Reconnecting { attempt: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_retry_after_in_flight_failure() {
    let policy = FixedInterval::new(Duration::from_secs(1), 5).unwrap();
    let h = harness(Box::new(policy), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.set_login_delay(Duration::from_secs(10));
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    // Attempt 1 is now blocked in login
    time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.gateway.login_calls(), 1);

    h.manager.stop_monitoring().await.unwrap();
    h.manager.start_monitoring().await.unwrap();

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error {
            error: login_failed()
        }
    );
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 2 }
    );
    assert_eq!(h.manager.get_connection_status().reconnect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_reschedules_cancelled_retry() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    h.manager.stop_monitoring().await.unwrap();
    h.manager.start_monitoring().await.unwrap();

    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 2 }
    );
    assert!(matches!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error { .. }
    ));
    assert_eq!(h.gateway.login_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_after_exhaustion() {
    let policy = FixedInterval::new(Duration::from_secs(1), 2).unwrap();
    let h = harness(Box::new(policy), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_all_logins(true);
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    for attempt in 1..=2 {
        assert_eq!(
            next_kind(&mut events).await,
            ConnectionEventKind::Reconnecting { attempt }
        );
        next_kind(&mut events).await;
    }
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Error {
            error: GatewayError::RetriesExhausted { attempts: 2 }
        }
    );

    h.gateway.fail_all_logins(false);
    assert!(h.manager.reconnect().await.unwrap());

    assert_eq!(next_kind(&mut events).await, ConnectionEventKind::Connected);
    let status = h.manager.get_connection_status();
    assert!(status.is_connected());
    assert_eq!(status.reconnect_attempts(), 0);
    assert!(status.last_error().is_none());
    assert_eq!(h.gateway.login_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_joins_in_flight_attempt() {
    let policy = FixedInterval::new(Duration::from_secs(1), 5).unwrap();
    let h = harness(Box::new(policy), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.set_login_delay(Duration::from_secs(10));
    h.gateway.drop_connection("socket closed");
    next_kind(&mut events).await;
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );

    time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.gateway.login_calls(), 1);

    assert!(h.manager.reconnect().await.unwrap());

    assert_eq!(h.gateway.login_calls(), 1);
    assert_eq!(next_kind(&mut events).await, ConnectionEventKind::Connected);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_manual_reconnect_drops_live_session() {
    let h = harness(Box::new(FixedInterval::default()), LONG_INTERVAL);
    let (callback, mut events) = collector();
    h.manager.on_connection_event(callback).unwrap();
    h.manager.start_monitoring().await.unwrap();

    connect(&h, &mut events).await;
    h.gateway.fail_next_logins(1);

    assert!(!h.manager.reconnect().await.unwrap());

    let status = h.manager.get_connection_status();
    assert!(!status.is_connected());
    assert_eq!(status.last_error(), Some(&login_failed()));
    assert_eq!(h.gateway.destroy_calls(), 1);
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Disconnected {
            error: Some(login_failed())
        }
    );
    assert_eq!(
        next_kind(&mut events).await,
        ConnectionEventKind::Reconnecting { attempt: 1 }
    );
}
