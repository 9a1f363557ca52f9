//! Broker session lifecycle: connect, subscribe, drop detection, reconnect.

pub mod backoff;
pub mod mqtt;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

pub use backoff::Backoff;
pub use mqtt::MqttTransport;

use crate::config::ReconnectConfig;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection refused: {0}")]
    Refused(String),
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Raw message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Message { topic: String, payload: Vec<u8> },
    Disconnected,
}

/// Broker connection seam. All deliveries are at-least-once.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Negotiate a new session; resolves once the broker acknowledged it.
    async fn open(&self) -> Result<(), ConnectionError>;
    async fn subscribe(&self, topic: &str) -> Result<(), ConnectionError>;
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ConnectionError>;
    /// Wait for the next event of the open session.
    async fn next_event(&self) -> SessionEvent;
}

/// At most one reconnect loop holds the permit at any time.
#[derive(Debug, Default)]
pub struct ReconnectGuard {
    in_flight: Arc<AtomicBool>,
}

impl ReconnectGuard {
    pub fn try_acquire(&self) -> Option<ReconnectPermit> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReconnectPermit { in_flight: self.in_flight.clone() })
    }

    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct ReconnectPermit {
    in_flight: Arc<AtomicBool>,
}

impl Drop for ReconnectPermit {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Owns the channel session. Inbound messages are forwarded to the receiver
/// returned by [`ConnectionManager::new`].
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    topics: Vec<String>,
    state: Mutex<SessionState>,
    reconnect_guard: ReconnectGuard,
    reconnect: ReconnectConfig,
    connect_timeout: Duration,
    inbound: mpsc::Sender<InboundMessage>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: Arc<T>,
        topics: Vec<String>,
        reconnect: ReconnectConfig,
        connect_timeout: Duration,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<InboundMessage>) {
        let (inbound, rx) = mpsc::channel(capacity);
        let manager = Arc::new(Self {
            transport,
            topics,
            state: Mutex::new(SessionState::Disconnected),
            reconnect_guard: ReconnectGuard::default(),
            reconnect,
            connect_timeout,
            inbound,
        });
        (manager, rx)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    pub fn reconnect_in_flight(&self) -> bool {
        self.reconnect_guard.is_held()
    }

    /// Establish the session. A no-op while a session is already up, being
    /// negotiated, or being re-established.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ConnectionError> {
        {
            let mut state = self.state.lock().await;
            if *state != SessionState::Disconnected {
                tracing::debug!(state = ?*state, "connect skipped");
                return Ok(());
            }
            *state = SessionState::Connecting;
        }

        match self.open_session().await {
            Ok(()) => {
                self.start_driver();
                Ok(())
            }
            Err(e) => {
                *self.state.lock().await = SessionState::Disconnected;
                tracing::error!("MQTT connect failed: {}", e);
                Err(e)
            }
        }
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.transport.publish(topic, payload).await
    }

    /// Record an unexpected session drop and start the reconnect loop unless
    /// one is already running.
    pub async fn notify_disconnected(self: &Arc<Self>) {
        // Only the permit holder writes the state.
        let Some(permit) = self.reconnect_guard.try_acquire() else {
            tracing::debug!("reconnect already in flight");
            return;
        };
        *self.state.lock().await = SessionState::Reconnecting;
        tracing::warn!("MQTT session lost, preparing to reconnect");

        let manager = self.clone();
        tokio::spawn(async move { manager.reconnect_loop(permit).await });
    }

    async fn open_session(&self) -> Result<(), ConnectionError> {
        match tokio::time::timeout(self.connect_timeout, self.transport.open()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout(self.connect_timeout)),
        }
        *self.state.lock().await = SessionState::Connected;
        tracing::info!("Connected to MQTT broker");

        for topic in &self.topics {
            match self.transport.subscribe(topic).await {
                Ok(()) => tracing::info!(%topic, "Subscribed"),
                Err(e) => tracing::error!(%topic, "Subscription failed: {}", e),
            }
        }
        Ok(())
    }

    fn start_driver(self: &Arc<Self>) {
        let manager = self.clone();
        tokio::spawn(async move { manager.drive().await });
    }

    async fn drive(self: Arc<Self>) {
        loop {
            match self.transport.next_event().await {
                SessionEvent::Message { topic, payload } => {
                    if self.inbound.send(InboundMessage { topic, payload }).await.is_err() {
                        tracing::debug!("inbound receiver closed, stopping session driver");
                        return;
                    }
                }
                SessionEvent::Disconnected => {
                    self.notify_disconnected().await;
                    return;
                }
            }
        }
    }

    async fn reconnect_loop(self: Arc<Self>, permit: ReconnectPermit) {
        let mut backoff = Backoff::from_config(&self.reconnect);
        loop {
            let delay = backoff.next_delay();
            tracing::info!(attempt = backoff.attempt(), delay_ms = delay.as_millis() as u64, "Reconnecting to MQTT broker");
            tokio::time::sleep(delay).await;

            match self.open_session().await {
                Ok(()) => break,
                Err(e) => tracing::warn!(attempt = backoff.attempt(), "Reconnect failed: {}", e),
            }
        }
        // Release before the driver starts so the next drop can reconnect.
        drop(permit);
        self.start_driver();
    }
}
