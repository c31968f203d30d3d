use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::GatewayError;
use crate::domain::ports::{GatewaySession, GatewaySignal};

/// Capacity of the lifecycle signal channel; slow subscribers lag past this
const SIGNAL_CAPACITY: usize = 64;

const READY_LINE: &str = "READY";
const RESUMED_LINE: &str = "RESUMED";
const RECONNECT_LINE: &str = "RECONNECT";
const ERROR_PREFIX: &str = "ERROR ";

type GatewayLines = Lines<BufReader<OwnedReadHalf>>;

struct GatewayConnection {
    id: Uuid,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

/// Gateway session over a line-oriented TCP relay.
///
/// `login` sends `IDENTIFY <token>` and waits for `READY`. After that, the
/// control lines `RESUMED`, `RECONNECT` and `ERROR <message>` map to
/// lifecycle signals; all other lines are dispatch traffic for other layers.
pub struct TcpGateway {
    addr: String,
    handshake_timeout: Duration,
    ready: Arc<AtomicBool>,
    signals: broadcast::Sender<GatewaySignal>,
    connection: Mutex<Option<GatewayConnection>>,
}

impl TcpGateway {
    pub fn new(addr: impl Into<String>, handshake_timeout: Duration) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            addr: addr.into(),
            handshake_timeout,
            ready: Arc::new(AtomicBool::new(false)),
            signals,
            connection: Mutex::new(None),
        }
    }

    async fn handshake(&self, token: &str) -> Result<(OwnedWriteHalf, GatewayLines), GatewayError> {
        let stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            GatewayError::LoginFailed(format!("failed to connect to {}: {}", self.addr, e))
        })?;
        let (read_half, mut write_half) = stream.into_split();

        write_half
            .write_all(format!("IDENTIFY {}\n", token).as_bytes())
            .await
            .map_err(|e| GatewayError::LoginFailed(format!("failed to identify: {}", e)))?;

        let mut lines = BufReader::new(read_half).lines();
        match lines.next_line().await {
            Ok(Some(line)) if line.trim() == READY_LINE => Ok((write_half, lines)),
            Ok(Some(line)) => Err(GatewayError::LoginFailed(format!(
                "unexpected handshake reply: {}",
                line.trim()
            ))),
            Ok(None) => Err(GatewayError::LoginFailed(
                "gateway closed the connection during handshake".to_string(),
            )),
            Err(e) => Err(GatewayError::LoginFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl GatewaySession for TcpGateway {
    fn signals(&self) -> broadcast::Receiver<GatewaySignal> {
        self.signals.subscribe()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn login(&self, token: &str) -> Result<(), GatewayError> {
        let mut connection = self.connection.lock().await;
        if let Some(previous) = connection.take() {
            tracing::debug!(session_id = %previous.id, "Replacing existing gateway session");
            previous.reader.abort();
            self.ready.store(false, Ordering::SeqCst);
        }

        let (writer, lines) = tokio::time::timeout(self.handshake_timeout, self.handshake(token))
            .await
            .map_err(|_| {
                GatewayError::LoginFailed(format!(
                    "handshake timed out after {:?}",
                    self.handshake_timeout
                ))
            })??;

        let id = Uuid::new_v4();
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(session_id = %id, addr = %self.addr, "Gateway session established");

        // Ready goes out before the reader can relay anything buffered behind it.
        let _ = self.signals.send(GatewaySignal::Ready);
        let reader = tokio::spawn(read_session(
            id,
            lines,
            Arc::clone(&self.ready),
            self.signals.clone(),
        ));
        *connection = Some(GatewayConnection { id, writer, reader });
        Ok(())
    }

    async fn destroy(&self) -> Result<(), GatewayError> {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Ok(());
        };

        connection.reader.abort();
        self.ready.store(false, Ordering::SeqCst);
        connection
            .writer
            .shutdown()
            .await
            .map_err(|e| GatewayError::DestroyFailed(e.to_string()))?;

        tracing::info!(session_id = %connection.id, "Gateway session destroyed");
        Ok(())
    }
}

async fn read_session(
    id: Uuid,
    mut lines: GatewayLines,
    ready: Arc<AtomicBool>,
    signals: broadcast::Sender<GatewaySignal>,
) {
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_control_line(&line) {
                Some(signal) => {
                    let _ = signals.send(signal);
                }
                None => tracing::trace!(session_id = %id, "Gateway dispatch received"),
            },
            Ok(None) => break "connection closed by gateway".to_string(),
            Err(e) => break e.to_string(),
        }
    };

    ready.store(false, Ordering::SeqCst);
    tracing::warn!(session_id = %id, %reason, "Gateway session ended");
    let _ = signals.send(GatewaySignal::Disconnected { reason });
}

fn parse_control_line(line: &str) -> Option<GatewaySignal> {
    let line = line.trim();
    match line {
        RESUMED_LINE => Some(GatewaySignal::Resumed),
        RECONNECT_LINE => Some(GatewaySignal::Reconnecting),
        _ => line
            .strip_prefix(ERROR_PREFIX)
            .map(|message| GatewaySignal::Error(GatewayError::Session(message.to_string()))),
    }
}
