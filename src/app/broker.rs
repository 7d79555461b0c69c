//! Broker session — connection lifecycle and message dispatch.
//!
//! ```text
//!            connect ok + subscribe ok
//!  Disconnected ──▶ Connecting ───────────────▶ Connected
//!       ▲               │ error                    │ link lost
//!       │               ▼                          │
//!       └──── wait reconnect_backoff ◀─────────────┘
//! ```
//!
//! [`BrokerSession::ensure_connected`] is the only call in the engine that
//! may block for an unbounded time: it retries with a fixed backoff until a
//! session is up and the command topic is subscribed.  The device has no
//! other useful work while offline, so this is the intended contract.
//! Subscriptions do not survive a reconnect and are reissued every time.
//!
//! Publishing never retries; a failure is returned and the caller moves on.
//!
//! [`LinkedTransport`] binds a transport to the network link under it so
//! that a lost station is restored by the same retry loop.

use log::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{ConnectionError, PublishError};

use super::ports::{BrokerTransport, Clock, NetworkLink};

/// Connection lifecycle.  Only `Connected` is ever observed outside
/// [`BrokerSession::ensure_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct BrokerSession<T: BrokerTransport> {
    transport: T,
    state: ConnectionState,
    client_id: String,
    access_token: String,
    command_topic: String,
    backoff_ms: u32,
    /// Completed (re)connects since boot.
    sessions: u32,
}

impl<T: BrokerTransport> BrokerSession<T> {
    pub fn new(transport: T, config: &SyncConfig) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            client_id: config.client_id.clone(),
            access_token: config.access_token.clone(),
            command_topic: config.command_topic.clone(),
            backoff_ms: config.reconnect_backoff_ms,
            sessions: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Block until a session is up and the command topic is subscribed.
    ///
    /// Returns `Some(attempts)` when a (re)connect happened, `None` when the
    /// session was already up.
    pub fn ensure_connected(&mut self, clock: &mut impl Clock) -> Option<u32> {
        if self.state == ConnectionState::Connected && self.transport.is_connected() {
            return None;
        }
        if self.state == ConnectionState::Connected {
            warn!("MQTT: session lost");
        }
        self.state = ConnectionState::Disconnected;

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            self.state = ConnectionState::Connecting;
            info!("MQTT: connecting (attempt {})", attempts);

            match self.try_connect() {
                Ok(()) => {
                    self.state = ConnectionState::Connected;
                    self.sessions = self.sessions.wrapping_add(1);
                    info!(
                        "MQTT: connected, subscribed to '{}' after {} attempt(s)",
                        self.command_topic, attempts
                    );
                    return Some(attempts);
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    warn!("MQTT: {} — retrying in {} ms", e, self.backoff_ms);
                    clock.delay_ms(self.backoff_ms);
                }
            }
        }
    }

    fn try_connect(&mut self) -> Result<(), ConnectionError> {
        self.transport.connect(&self.client_id, &self.access_token)?;
        if !self.transport.is_connected() {
            return Err(ConnectionError::Transport);
        }
        self.transport
            .subscribe(&self.command_topic)
            .map_err(|_| ConnectionError::SubscribeFailed)
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Send one message.  No internal retry.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.state != ConnectionState::Connected {
            return Err(PublishError::NotConnected);
        }
        self.transport.publish(topic, payload)
    }

    /// Hand every buffered message on the command topic to `on_command`
    /// before returning.  Traffic on other topics is dropped.
    pub fn poll_inbound(&mut self, mut on_command: impl FnMut(&[u8])) {
        let command_topic = self.command_topic.as_str();
        self.transport.poll(&mut |topic, payload| {
            if topic == command_topic {
                on_command(payload);
            } else {
                debug!("MQTT: ignoring message on '{}'", topic);
            }
        });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    /// Number of sessions established since boot.
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

// ───────────────────────────────────────────────────────────────
// Link-bound transport
// ───────────────────────────────────────────────────────────────

/// A broker transport stacked on a [`NetworkLink`].
///
/// `connect` restores the link first, and the session counts as up only
/// while both the link and the broker are.  A dropped station therefore
/// surfaces as a lost session, and each backoff round of
/// [`BrokerSession::ensure_connected`] retries the link before the broker.
pub struct LinkedTransport<T: BrokerTransport, L: NetworkLink> {
    inner: T,
    link: L,
}

impl<T: BrokerTransport, L: NetworkLink> LinkedTransport<T, L> {
    pub fn new(inner: T, link: L) -> Self {
        Self { inner, link }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}

impl<T: BrokerTransport, L: NetworkLink> BrokerTransport for LinkedTransport<T, L> {
    fn connect(&mut self, client_id: &str, access_token: &str) -> Result<(), ConnectionError> {
        if !self.link.is_up() {
            warn!("MQTT: network link down, restoring before connect");
            self.link.restore()?;
        }
        self.inner.connect(client_id, access_token)
    }

    fn is_connected(&self) -> bool {
        self.link.is_up() && self.inner.is_connected()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        self.inner.subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.link.is_up() {
            return Err(PublishError::NotConnected);
        }
        self.inner.publish(topic, payload)
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        self.inner.poll(on_message);
    }
}
