use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::connection_monitor::ConnectionMonitor;
use super::resilience_manager::EventCallback;
use crate::domain::entities::ConnectionStatus;
use crate::domain::errors::{GatewayError, Result};
use crate::domain::ports::AlertNotifier;
use crate::domain::value_objects::{Alert, AlertLevel, ConnectionEvent, ConnectionEventKind};

/// Only every Nth reconnection attempt raises an alert
pub const RECONNECT_ALERT_INTERVAL: u32 = 5;

type EventSender = Arc<Mutex<Option<mpsc::UnboundedSender<ConnectionEvent>>>>;

struct AlertForwarding {
    events: EventSender,
    forwarder: JoinHandle<()>,
}

/// Application service exposing connection monitoring to the rest of the app
pub struct ConnectionService {
    monitor: ConnectionMonitor,
    alerts: Arc<dyn AlertNotifier>,
    forwarding: tokio::sync::Mutex<Option<AlertForwarding>>,
    shutting_down: AtomicBool,
}

impl ConnectionService {
    pub fn new(monitor: ConnectionMonitor, alerts: Arc<dyn AlertNotifier>) -> Self {
        Self {
            monitor,
            alerts,
            forwarding: tokio::sync::Mutex::new(None),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Start monitoring and alert forwarding (no-op if already started)
    pub async fn start(&self) -> Result<()> {
        let mut forwarding = self.forwarding.lock().await;
        if forwarding.is_some() {
            return Ok(());
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let events: EventSender = Arc::new(Mutex::new(Some(events_tx)));

        // Events are queued here and alerted off the manager task, in order.
        let callback_events = Arc::clone(&events);
        let callback: EventCallback = Box::new(move |event: &ConnectionEvent| {
            let sender = callback_events
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(sender) = sender.as_ref() {
                sender
                    .send(event.clone())
                    .map_err(|_| anyhow::anyhow!("alert forwarder has stopped"))?;
            }
            Ok(())
        });

        let forwarder = tokio::spawn(forward_events(events_rx, Arc::clone(&self.alerts)));
        self.monitor.start_monitoring(Some(callback)).await?;

        *forwarding = Some(AlertForwarding { events, forwarder });
        tracing::info!("Connection service started");
        Ok(())
    }

    /// Stop monitoring and drain pending alerts (no-op if not started)
    pub async fn stop(&self) -> Result<()> {
        let Some(active) = self.forwarding.lock().await.take() else {
            return Ok(());
        };

        let stopped = self.monitor.stop_monitoring().await;

        // The manager keeps the callback; dropping the sender detaches it.
        active
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Err(e) = active.forwarder.await {
            tracing::warn!(error = %e, "Alert forwarder ended abnormally");
        }

        tracing::info!("Connection service stopped");
        stopped
    }

    /// Manually reconnect. Refused while the service is shutting down.
    pub async fn force_reconnect(&self) -> Result<bool> {
        if self.is_shutting_down() {
            tracing::warn!("Cannot reconnect during shutdown");
            return Ok(false);
        }

        tracing::info!("Manual reconnection requested via ConnectionService");
        self.monitor.force_reconnect().await
    }

    /// Copy of the current connection status
    pub fn get_status(&self) -> ConnectionStatus {
        self.monitor.connection_status()
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Deliver an alert outside the event stream; failures are logged
    pub async fn notify(&self, alert: Alert) {
        let title = alert.title().to_string();
        if let Err(e) = self.alerts.send_alert(alert).await {
            tracing::error!(%title, error = %e, "Failed to deliver alert");
        }
    }

    /// Map a connection event to an operator alert, if it warrants one
    pub fn alert_for(event: &ConnectionEvent) -> Option<Alert> {
        match event.kind() {
            ConnectionEventKind::Connected => Some(Alert::new(
                AlertLevel::Info,
                "Connection Restored",
                "Gateway connection has been successfully established",
            )),
            ConnectionEventKind::Disconnected { error } => {
                let alert = Alert::new(
                    AlertLevel::Warn,
                    "Connection Lost",
                    "Gateway connection has been lost. Attempting automatic reconnection...",
                );
                Some(match error {
                    Some(error) => alert.with_error(error),
                    None => alert,
                })
            }
            ConnectionEventKind::Reconnecting { attempt }
                if *attempt % RECONNECT_ALERT_INTERVAL == 0 =>
            {
                Some(Alert::new(
                    AlertLevel::Info,
                    "Reconnection Attempt",
                    format!("Attempting to reconnect to the gateway (attempt {})", attempt),
                ))
            }
            ConnectionEventKind::Reconnecting { .. } => None,
            ConnectionEventKind::Error {
                error: error @ GatewayError::RetriesExhausted { .. },
            } => Some(
                Alert::new(
                    AlertLevel::Error,
                    "Reconnection Abandoned",
                    "Automatic reconnection has stopped; manual reconnection is still possible",
                )
                .with_error(error),
            ),
            ConnectionEventKind::Error { error } => Some(
                Alert::new(
                    AlertLevel::Error,
                    "Connection Error",
                    "Gateway connection error occurred",
                )
                .with_error(error),
            ),
        }
    }
}

async fn forward_events(
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    alerts: Arc<dyn AlertNotifier>,
) {
    while let Some(event) = events.recv().await {
        tracing::debug!(event = event.name(), "Handling connection event");

        let Some(alert) = ConnectionService::alert_for(&event) else {
            continue;
        };

        if let Err(e) = alerts.send_alert(alert).await {
            tracing::error!(
                event = event.name(),
                error = %e,
                "Error handling connection event"
            );
        }
    }
}
