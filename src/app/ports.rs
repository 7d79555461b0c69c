//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SyncEngine (domain)
//! ```
//!
//! Driven adapters (CT sensor, relay GPIO, MQTT client, HTTP weather client,
//! system timer, event sinks) implement these traits.  The
//! [`SyncEngine`](super::engine::SyncEngine) consumes them via generics, so
//! the domain core never touches hardware or sockets directly.
//!
//! All port errors are typed — callers must handle every variant explicitly.

use crate::error::{ActuatorError, ConnectionError, FetchError, PublishError};

use super::telemetry::PowerReading;
use super::weather::WeatherReading;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain an electrical snapshot.
///
/// Always returns a value; a faulty channel reads as zero rather than failing.
pub trait SensorPort {
    fn read_power(&mut self) -> PowerReading;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the single relay output.
pub trait RelayPort {
    /// Energise (`true`) or release (`false`) the relay.
    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Broker transport port (driven adapter: domain ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Connect/status/send/receive primitive of the broker link.
///
/// Implementations never retry internally; retry policy belongs to
/// [`BrokerSession`](super::broker::BrokerSession).
pub trait BrokerTransport {
    /// Open a session, authenticating with `access_token` as user name.
    /// Any previous session is discarded together with its subscriptions.
    fn connect(&mut self, client_id: &str, access_token: &str) -> Result<(), ConnectionError>;

    /// Whether the broker session is currently up.
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError>;

    /// Hand one message to the client.  Bounded by the client's own timeout.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Deliver every message currently buffered, then return.  Never blocks
    /// waiting for new traffic.
    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8]));
}

// ───────────────────────────────────────────────────────────────
// Network link port (driven adapter: domain → station link)
// ───────────────────────────────────────────────────────────────

/// The network link a broker transport rides on (the WiFi station).
///
/// [`LinkedTransport`](super::broker::LinkedTransport) restores it before
/// every broker connect attempt, so the session retry loop also brings the
/// link back.
pub trait NetworkLink {
    /// Whether the link is currently usable.
    fn is_up(&self) -> bool;

    /// One attempt to bring the link up.  No internal retry or backoff.
    fn restore(&mut self) -> Result<(), ConnectionError>;
}

// ───────────────────────────────────────────────────────────────
// Weather source port (driven adapter: domain ← HTTP service)
// ───────────────────────────────────────────────────────────────

/// One round trip to the external weather service.
pub trait WeatherSource {
    /// Fetch the current conditions.  The returned reading has `valid` set.
    fn fetch(&mut self) -> Result<WeatherReading, FetchError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time plus the blocking delay used by reconnect backoff.
pub trait Clock {
    /// Milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`SyncEvent`](super::events::SyncEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::SyncEvent);
}
