//! MQTT broker transport.
//!
//! Implements [`BrokerTransport`] on top of the ESP-IDF MQTT client.  The
//! client delivers events on its own task; inbound messages cross into the
//! tick loop through a bounded `embassy-sync` channel and the session flag
//! through an atomic.
//!
//! ```text
//! ┌──────────────┐  InboundFrame  ┌──────────────┐
//! │  MQTT task   │──────────────▶│  Tick loop    │
//! │  (callback)  │  connected:    │  (poll)       │
//! └──────────────┘  AtomicBool    └──────────────┘
//! ```
//!
//! The client's built-in reconnect is disabled: every session goes through
//! [`BrokerTransport::connect`] so the command topic is subscribed again.
//! Sessions are also numbered, and a session opened behind the engine's back
//! does not count as connected.
//!
//! Frames that do not fit ([`MAX_TOPIC_LEN`], [`MAX_INBOUND_PAYLOAD`]) or
//! arrive while the channel is full are dropped with a warning.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` from `esp_idf_svc`.
//! - **all other targets**: an in-memory broker with scripted connect
//!   results, a publish log, and [`MqttTransport::inject`] for inbound
//!   traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::ports::BrokerTransport;
use crate::error::{ConnectionError, PublishError};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};
#[cfg(target_os = "espidf")]
use log::info;

pub const MAX_TOPIC_LEN: usize = 64;
pub const MAX_INBOUND_PAYLOAD: usize = 512;
const INBOUND_DEPTH: usize = 8;

/// How long [`BrokerTransport::connect`] waits for the CONNACK.
pub const CONNECT_TIMEOUT_MS: u32 = 10_000;

/// One message received on a subscribed topic.
pub struct InboundFrame {
    pub topic: heapless::String<MAX_TOPIC_LEN>,
    pub payload: heapless::Vec<u8, MAX_INBOUND_PAYLOAD>,
}

type Inbox = Channel<CriticalSectionRawMutex, InboundFrame, INBOUND_DEPTH>;

/// State shared between the client task and the tick loop.
#[derive(Clone)]
struct Shared {
    inbox: Arc<Inbox>,
    connected: Arc<AtomicBool>,
    /// Sessions opened since boot.
    sessions: Arc<AtomicU32>,
}

impl Shared {
    fn new() -> Self {
        Self {
            inbox: Arc::new(Channel::new()),
            connected: Arc::new(AtomicBool::new(false)),
            sessions: Arc::new(AtomicU32::new(0)),
        }
    }

    /// CONNACK received.  Returns the new session number.
    fn open_session(&self) -> u32 {
        let n = self.sessions.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.connected.store(true, Ordering::Release);
        n
    }

    fn close_session(&self) {
        self.connected.store(false, Ordering::Release);
    }

    fn current_session(&self) -> u32 {
        self.sessions.load(Ordering::Acquire)
    }

    /// Up, and still the session `epoch` that was connected and subscribed.
    fn is_current(&self, epoch: u32) -> bool {
        self.connected.load(Ordering::Acquire) && self.current_session() == epoch
    }

    /// Queue a received message.  Returns `false` if it was dropped.
    fn deliver(&self, topic: &str, data: &[u8]) -> bool {
        let mut frame = InboundFrame {
            topic: heapless::String::new(),
            payload: heapless::Vec::new(),
        };
        if frame.topic.push_str(topic).is_err() {
            warn!("MQTT: dropping message, topic too long ({} bytes)", topic.len());
            return false;
        }
        if frame.payload.extend_from_slice(data).is_err() {
            warn!("MQTT: dropping oversized payload on '{}' ({} bytes)", topic, data.len());
            return false;
        }
        if self.inbox.try_send(frame).is_err() {
            warn!("MQTT: inbound queue full, dropping message on '{}'", topic);
            return false;
        }
        true
    }

    fn drain(&self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Ok(frame) = self.inbox.try_receive() {
            on_message(frame.topic.as_str(), &frame.payload);
        }
    }

    fn discard_pending(&self) {
        while self.inbox.try_receive().is_ok() {}
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct MqttTransport {
    url: String,
    client: Option<EspMqttClient<'static>>,
    shared: Shared,
    /// Session this transport connected and subscribed.
    epoch: u32,
}

#[cfg(target_os = "espidf")]
impl MqttTransport {
    /// `url` is `mqtt://host:port`.  Nothing connects until
    /// [`BrokerTransport::connect`].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
            shared: Shared::new(),
            epoch: 0,
        }
    }

    fn wait_for_session(&self) -> Result<(), ConnectionError> {
        const STEP_MS: u32 = 50;
        let mut waited = 0;
        while waited < CONNECT_TIMEOUT_MS {
            if self.shared.connected.load(Ordering::Acquire) {
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(u64::from(STEP_MS)));
            waited += STEP_MS;
        }
        Err(ConnectionError::Timeout)
    }
}

#[cfg(target_os = "espidf")]
impl BrokerTransport for MqttTransport {
    fn connect(&mut self, client_id: &str, access_token: &str) -> Result<(), ConnectionError> {
        // Tear down the previous client; its subscriptions go with it.
        self.client = None;
        self.shared.close_session();
        self.shared.discard_pending();

        let conf = MqttClientConfiguration {
            disable_auto_reconnect: true,
            client_id: Some(client_id),
            username: if access_token.is_empty() {
                None
            } else {
                Some(access_token)
            },
            ..Default::default()
        };

        let shared = self.shared.clone();
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    let n = shared.open_session();
                    debug!("MQTT: session #{} open", n);
                }
                EventPayload::Disconnected => shared.close_session(),
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    details: Details::Complete,
                    ..
                } => {
                    shared.deliver(topic, data);
                }
                EventPayload::Received { .. } => {
                    warn!("MQTT: dropping fragmented message");
                }
                EventPayload::Error(e) => {
                    warn!("MQTT: client error {:?}", e);
                }
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client init failed ({})", e);
            ConnectionError::Transport
        })?;

        self.client = Some(client);
        self.wait_for_session()?;
        self.epoch = self.shared.current_session();
        info!("MQTT: session #{} up at {}", self.epoch, self.url);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.shared.is_current(self.epoch)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        let client = self.client.as_mut().ok_or(ConnectionError::Transport)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| ConnectionError::SubscribeFailed)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(PublishError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|id| debug!("MQTT: published {} bytes to '{}' (id {})", payload.len(), topic, id))
            .map_err(|e| {
                warn!("MQTT: publish to '{}' failed ({})", topic, e);
                PublishError::Rejected
            })
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        self.shared.drain(on_message);
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct MqttTransport {
    url: String,
    shared: Shared,
    connect_script: std::collections::VecDeque<Result<(), ConnectionError>>,
    subscriptions: Vec<String>,
    published: Vec<(String, Vec<u8>)>,
    fail_publishes: bool,
    connects: u32,
    epoch: u32,
}

#[cfg(not(target_os = "espidf"))]
impl MqttTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            shared: Shared::new(),
            connect_script: std::collections::VecDeque::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
            fail_publishes: false,
            connects: 0,
            epoch: 0,
        }
    }

    /// Queue the result of the next connect attempts.  An empty script
    /// connects successfully.
    pub fn script_connects(&mut self, results: impl IntoIterator<Item = Result<(), ConnectionError>>) {
        self.connect_script.extend(results);
    }

    /// Deliver a message as if the broker had pushed it.  Returns `false`
    /// if it was dropped.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        self.shared.deliver(topic, payload)
    }

    /// Drop the broker session.
    pub fn sim_drop_session(&mut self) {
        self.shared.close_session();
        self.subscriptions.clear();
    }

    /// A session opened by the client on its own, as the client task's
    /// CONNACK handler would record it.  The broker holds no subscriptions.
    pub fn sim_background_session(&mut self) {
        self.shared.open_session();
        self.subscriptions.clear();
    }

    pub fn set_fail_publishes(&mut self, fail: bool) {
        self.fail_publishes = fail;
    }

    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.published
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn connects(&self) -> u32 {
        self.connects
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerTransport for MqttTransport {
    fn connect(&mut self, client_id: &str, _access_token: &str) -> Result<(), ConnectionError> {
        self.connects = self.connects.wrapping_add(1);
        self.subscriptions.clear();
        self.shared.discard_pending();
        self.shared.close_session();
        let result = self.connect_script.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.epoch = self.shared.open_session();
        }
        debug!("MQTT(sim): connect '{}' to {} -> {:?}", client_id, self.url, result);
        result
    }

    fn is_connected(&self) -> bool {
        self.shared.is_current(self.epoch)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::SubscribeFailed);
        }
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        if self.fail_publishes {
            return Err(PublishError::Rejected);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        self.shared.drain(on_message);
    }
}
