use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::errors::GatewayError;
use crate::domain::ports::{GatewaySession, GatewaySignal};

const SIGNAL_CAPACITY: usize = 64;

/// Scriptable in-process gateway session.
///
/// Logins succeed unless failures were queued with [`fail_next_logins`] or
/// all logins are forced to fail. A successful login marks the session ready
/// and pushes `Ready`, like a real gateway does.
///
/// [`fail_next_logins`]: InMemoryGateway::fail_next_logins
pub struct InMemoryGateway {
    ready: AtomicBool,
    signals: broadcast::Sender<GatewaySignal>,
    queued_failures: Mutex<VecDeque<GatewayError>>,
    fail_all_logins: AtomicBool,
    login_delay_ms: AtomicU64,
    login_calls: AtomicU32,
    destroy_calls: AtomicU32,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            ready: AtomicBool::new(false),
            signals,
            queued_failures: Mutex::new(VecDeque::new()),
            fail_all_logins: AtomicBool::new(false),
            login_delay_ms: AtomicU64::new(0),
            login_calls: AtomicU32::new(0),
            destroy_calls: AtomicU32::new(0),
        }
    }

    /// Push a lifecycle signal to subscribers
    pub fn emit(&self, signal: GatewaySignal) {
        let _ = self.signals.send(signal);
    }

    /// Change readiness without emitting any signal
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Drop the session: not ready, followed by a `Disconnected` signal
    pub fn drop_connection(&self, reason: &str) {
        self.set_ready(false);
        self.emit(GatewaySignal::Disconnected {
            reason: reason.to_string(),
        });
    }

    pub fn fail_next_logins(&self, count: usize) {
        let mut failures = self
            .queued_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for _ in 0..count {
            failures.push_back(GatewayError::LoginFailed("gateway unavailable".to_string()));
        }
    }

    pub fn fail_all_logins(&self, fail: bool) {
        self.fail_all_logins.store(fail, Ordering::SeqCst);
    }

    /// Make every login take `delay` before it resolves
    pub fn set_login_delay(&self, delay: Duration) {
        self.login_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn login_calls(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> u32 {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewaySession for InMemoryGateway {
    fn signals(&self) -> broadcast::Receiver<GatewaySignal> {
        self.signals.subscribe()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn login(&self, _token: &str) -> Result<(), GatewayError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.login_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let queued = self
            .queued_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = queued {
            return Err(error);
        }

        if self.fail_all_logins.load(Ordering::SeqCst) {
            return Err(GatewayError::LoginFailed("gateway unavailable".to_string()));
        }

        self.set_ready(true);
        self.emit(GatewaySignal::Ready);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), GatewayError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.set_ready(false);
        Ok(())
    }
}
