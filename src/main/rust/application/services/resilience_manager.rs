use std::future::pending;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use crate::domain::entities::ConnectionStatus;
use crate::domain::errors::{DomainError, GatewayError, Result};
use crate::domain::ports::{GatewaySession, GatewaySignal, MetricsReporter, RetryPolicy};
use crate::domain::value_objects::{ConnectionEvent, ConnectionState, MonitorSettings};

/// Subscriber callback for connection events
pub type EventCallback = Box<dyn Fn(&ConnectionEvent) -> anyhow::Result<()> + Send + Sync>;

type AttemptOutcome = std::result::Result<(), GatewayError>;

enum Command {
    StartMonitoring(oneshot::Sender<()>),
    StopMonitoring(oneshot::Sender<()>),
    Reconnect(oneshot::Sender<bool>),
    Subscribe(EventCallback),
}

/// Handle to the connection resilience task.
///
/// The task is the only owner of the connection status, the reconnection
/// timer and the health-check timer. Everything it does runs on that one
/// task, so gateway signals, timer expiries and commands never interleave.
/// Dropping the handle stops the task and cancels its timers.
pub struct ConnectionResilienceManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl ConnectionResilienceManager {
    /// Spawn the manager task. Must be called from within a tokio runtime.
    pub fn new(
        gateway: Arc<dyn GatewaySession>,
        retry_policy: Box<dyn RetryPolicy>,
        settings: MonitorSettings,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::new());
        let signals = gateway.signals();

        let actor = ManagerActor {
            gateway,
            retry_policy,
            settings,
            metrics,
            status: ConnectionStatus::new(),
            status_tx,
            subscribers: Vec::new(),
            monitoring: false,
            reconnecting: false,
            interrupted: false,
            reconnect_timer: None,
            health_check: None,
            attempt: None,
            commands: commands_rx,
            signals: Some(signals),
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            status: status_rx,
        }
    }

    /// Start the health-check loop and automatic reconnection (idempotent)
    pub async fn start_monitoring(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::StartMonitoring(ack_tx))?;
        ack_rx.await.map_err(|_| DomainError::ManagerUnavailable)
    }

    /// Cancel all pending timers and stop automatic reconnection (idempotent)
    pub async fn stop_monitoring(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::StopMonitoring(ack_tx))?;
        ack_rx.await.map_err(|_| DomainError::ManagerUnavailable)
    }

    /// Run a reconnection attempt now, pausing any scheduled one.
    ///
    /// Resolves to whether the attempt re-established the session. Fails only
    /// when the manager task is gone.
    pub async fn reconnect(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Reconnect(reply_tx))?;
        reply_rx.await.map_err(|_| DomainError::ManagerUnavailable)
    }

    /// Copy of the current status
    pub fn get_connection_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Register a subscriber. Subscribers are never removed.
    pub fn on_connection_event(&self, callback: EventCallback) -> Result<()> {
        self.send(Command::Subscribe(callback))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| DomainError::ManagerUnavailable)
    }
}

struct InFlightAttempt {
    handle: JoinHandle<AttemptOutcome>,
    /// Restart the automatic sequence if this attempt fails
    resume_automatic: bool,
    waiters: Vec<oneshot::Sender<bool>>,
}

enum Step {
    Command(Command),
    Signal(std::result::Result<GatewaySignal, RecvError>),
    AttemptFinished(AttemptOutcome),
    ReconnectTimerFired,
    HealthCheck,
}

struct ManagerActor {
    gateway: Arc<dyn GatewaySession>,
    retry_policy: Box<dyn RetryPolicy>,
    settings: MonitorSettings,
    metrics: Arc<dyn MetricsReporter>,
    status: ConnectionStatus,
    status_tx: watch::Sender<ConnectionStatus>,
    subscribers: Vec<EventCallback>,
    monitoring: bool,
    reconnecting: bool,
    /// Automatic reconnection was cut short by `stop_monitoring`
    interrupted: bool,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    health_check: Option<Interval>,
    attempt: Option<InFlightAttempt>,
    commands: mpsc::UnboundedReceiver<Command>,
    signals: Option<broadcast::Receiver<GatewaySignal>>,
}

impl ManagerActor {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                signal = next_signal(&mut self.signals) => Step::Signal(signal),
                outcome = join_attempt(&mut self.attempt) => Step::AttemptFinished(outcome),
                _ = fire(&mut self.reconnect_timer) => Step::ReconnectTimerFired,
                _ = tick(&mut self.health_check) => Step::HealthCheck,
            };
            self.apply(step);
        }

        self.stop_monitoring();
        if let Some(in_flight) = self.attempt.take() {
            in_flight.handle.abort();
        }
        tracing::debug!("Connection manager task finished");
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Command(command) => self.handle_command(command),
            Step::Signal(Ok(signal)) => self.handle_signal(signal),
            Step::Signal(Err(RecvError::Lagged(skipped))) => {
                tracing::warn!(
                    skipped,
                    "Missed gateway signals; health check will reconcile state"
                );
            }
            Step::Signal(Err(RecvError::Closed)) => {
                tracing::warn!("Gateway signal stream closed; relying on health checks");
                self.signals = None;
            }
            Step::AttemptFinished(outcome) => self.finish_attempt(outcome),
            Step::ReconnectTimerFired => self.on_reconnect_timer(),
            Step::HealthCheck => self.perform_health_check(),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartMonitoring(ack) => {
                self.start_monitoring();
                let _ = ack.send(());
            }
            Command::StopMonitoring(ack) => {
                self.stop_monitoring();
                let _ = ack.send(());
            }
            Command::Reconnect(reply) => self.reconnect(reply),
            Command::Subscribe(callback) => self.subscribers.push(callback),
        }
    }

    fn handle_signal(&mut self, signal: GatewaySignal) {
        match signal {
            GatewaySignal::Ready => self.handle_connection_established(),
            GatewaySignal::Resumed => {
                tracing::info!("Gateway session resumed");
                self.handle_connection_established();
            }
            GatewaySignal::Error(error) => self.handle_connection_error(error),
            GatewaySignal::Disconnected { reason } => {
                tracing::warn!(%reason, "Gateway disconnected");
                self.handle_connection_lost(Some(GatewayError::Disconnected(reason)));
            }
            GatewaySignal::Reconnecting => {
                tracing::info!(
                    attempts = self.status.reconnect_attempts(),
                    "Gateway session is reconnecting"
                );
            }
        }
    }

    fn start_monitoring(&mut self) {
        if self.monitoring {
            return;
        }

        self.monitoring = true;
        let period = self.settings.health_check_interval();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.health_check = Some(interval);

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            "Connection monitoring started"
        );

        if std::mem::take(&mut self.interrupted) && !self.status.is_connected() {
            match self.attempt.as_mut() {
                Some(in_flight) => in_flight.resume_automatic = true,
                None => self.start_reconnection(),
            }
        }
    }

    fn stop_monitoring(&mut self) {
        if !self.monitoring {
            return;
        }

        self.interrupted = self.reconnecting
            || self
                .attempt
                .as_ref()
                .is_some_and(|in_flight| in_flight.resume_automatic);
        self.monitoring = false;
        self.reconnecting = false;
        self.health_check = None;
        self.reconnect_timer = None;
        if let Some(in_flight) = self.attempt.as_mut() {
            in_flight.resume_automatic = false;
        }
        self.publish_status();

        tracing::info!("Connection monitoring stopped");
    }

    fn handle_connection_established(&mut self) {
        self.reconnecting = false;
        self.interrupted = false;
        self.reconnect_timer = None;

        if self.status.is_connected() {
            tracing::debug!("Gateway already marked connected; ignoring duplicate signal");
            return;
        }

        self.status.mark_connected(SystemTime::now());
        self.retry_policy.reset();
        self.publish_status();

        tracing::info!("Gateway connection established successfully");
        self.emit(ConnectionEvent::connected());
    }

    fn handle_connection_error(&mut self, error: GatewayError) {
        tracing::error!(%error, "Gateway connection error");

        if self.status.is_connected() {
            self.handle_connection_lost(Some(error));
            return;
        }

        self.status.record_error(error.clone());
        self.publish_status();
        self.emit(ConnectionEvent::error(error));
    }

    fn handle_connection_lost(&mut self, error: Option<GatewayError>) {
        if !self.status.is_connected() {
            return;
        }

        self.status.mark_disconnected(error.clone());
        self.publish_status();

        tracing::warn!(error = ?error, "Gateway connection lost");
        self.emit(ConnectionEvent::disconnected(error));

        if !self.monitoring {
            return;
        }

        match self.attempt.as_mut() {
            // The running attempt owns the guard; retry automatically if it fails.
            Some(in_flight) => in_flight.resume_automatic = true,
            None => self.start_reconnection(),
        }
    }

    /// Ask the policy about the next attempt before counting it, so the
    /// counter never exceeds the number of attempts actually scheduled.
    fn start_reconnection(&mut self) {
        if self.reconnecting || self.attempt.is_some() || self.status.is_connected() {
            return;
        }

        let attempt = self.status.reconnect_attempts().saturating_add(1);
        let Some(delay) = self.retry_policy.next_delay(attempt) else {
            let attempts = self.status.reconnect_attempts();
            tracing::error!(
                attempts,
                max_retries = self.retry_policy.max_retries(),
                "Max reconnection attempts reached, stopping automatic reconnection"
            );
            let error = GatewayError::RetriesExhausted { attempts };
            self.status.record_error(error.clone());
            self.publish_status();
            self.metrics.report_retries_exhausted();
            self.emit(ConnectionEvent::error(error));
            return;
        };

        self.reconnecting = true;
        self.status.record_reconnect_attempt();
        self.publish_status();
        self.metrics.report_reconnect_attempt();
        self.metrics.report_backoff(delay.as_secs_f64());

        tracing::info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnection attempt"
        );
        self.emit(ConnectionEvent::reconnecting(attempt));

        self.reconnect_timer = Some(Box::pin(time::sleep(delay)));
    }

    fn on_reconnect_timer(&mut self) {
        self.reconnect_timer = None;

        if !self.reconnecting || self.attempt.is_some() {
            return;
        }

        self.spawn_attempt(true, Vec::new());
    }

    fn reconnect(&mut self, reply: oneshot::Sender<bool>) {
        tracing::info!("Manual reconnection requested");

        if let Some(in_flight) = self.attempt.as_mut() {
            tracing::debug!("Reconnection attempt already in flight; waiting on its outcome");
            in_flight.waiters.push(reply);
            return;
        }

        // Pause the automatic sequence; it resumes if the manual attempt fails.
        let resume_automatic = std::mem::replace(&mut self.reconnecting, false);
        self.reconnect_timer = None;
        self.spawn_attempt(resume_automatic, vec![reply]);
    }

    fn spawn_attempt(&mut self, resume_automatic: bool, waiters: Vec<oneshot::Sender<bool>>) {
        let gateway = Arc::clone(&self.gateway);
        let token = self.settings.login_token().to_string();
        let handle = tokio::spawn(async move { reestablish_session(gateway.as_ref(), &token).await });

        self.attempt = Some(InFlightAttempt {
            handle,
            resume_automatic,
            waiters,
        });
    }

    fn finish_attempt(&mut self, outcome: AttemptOutcome) {
        let Some(in_flight) = self.attempt.take() else {
            return;
        };
        let succeeded = outcome.is_ok();

        match outcome {
            Ok(()) => {
                tracing::info!("Reconnection attempt succeeded");
                self.handle_connection_established();
            }
            Err(error) => {
                tracing::error!(%error, "Reconnection attempt failed");
                self.reconnecting = false;

                if self.status.is_connected() && !self.gateway.is_ready() {
                    // The attempt tore down the live session before failing.
                    self.handle_connection_lost(Some(error));
                } else {
                    self.status.record_error(error.clone());
                    self.publish_status();
                    self.emit(ConnectionEvent::error(error));

                    if in_flight.resume_automatic && self.monitoring {
                        self.start_reconnection();
                    }
                }
            }
        }

        for waiter in in_flight.waiters {
            let _ = waiter.send(succeeded);
        }
    }

    fn perform_health_check(&mut self) {
        let actually_connected = self.gateway.is_ready();
        let believed_connected = self.status.is_connected();
        self.metrics
            .report_health_check(actually_connected == believed_connected);

        if believed_connected && !actually_connected {
            tracing::warn!("Health check detected connection inconsistency");
            self.handle_connection_lost(Some(GatewayError::HealthCheckFailed));
        } else if !believed_connected && actually_connected {
            tracing::info!("Health check detected connection recovery");
            self.handle_connection_established();
        } else {
            tracing::debug!(connected = believed_connected, "Health check consistent");
        }
    }

    fn current_state(&self) -> ConnectionState {
        if self.status.is_connected() {
            ConnectionState::Connected
        } else if self.reconnecting || self.attempt.is_some() {
            ConnectionState::Reconnecting {
                attempt: self.status.reconnect_attempts(),
            }
        } else {
            ConnectionState::Idle
        }
    }

    /// Publish a copy of the status before any event that depends on it
    fn publish_status(&self) {
        self.status_tx.send_replace(self.status.clone());
        self.metrics.report_state_change(&self.current_state());
    }

    fn emit(&self, event: ConnectionEvent) {
        for (index, subscriber) in self.subscribers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| subscriber(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::error!(
                    subscriber = index,
                    event = event.name(),
                    %error,
                    "Error in connection event callback"
                ),
                Err(_) => tracing::error!(
                    subscriber = index,
                    event = event.name(),
                    "Connection event callback panicked"
                ),
            }
        }
    }
}

async fn reestablish_session(gateway: &dyn GatewaySession, token: &str) -> AttemptOutcome {
    tracing::info!("Attempting to reconnect to gateway");

    if gateway.is_ready() {
        gateway.destroy().await?;
    }

    gateway.login(token).await
}

async fn next_signal(
    signals: &mut Option<broadcast::Receiver<GatewaySignal>>,
) -> std::result::Result<GatewaySignal, RecvError> {
    match signals {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn join_attempt(attempt: &mut Option<InFlightAttempt>) -> AttemptOutcome {
    match attempt {
        Some(in_flight) => match (&mut in_flight.handle).await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(GatewayError::Session(format!(
                "reconnection task failed: {}",
                join_error
            ))),
        },
        None => pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
