//! Unified error types for the CTLink firmware.
//!
//! One enum per failure domain of the sync engine, each funnelling into the
//! top-level [`Error`].  None of these is fatal to the process: connection
//! errors are retried forever, publish and fetch errors degrade the current
//! cycle, malformed commands are ignored.  All variants are `Copy` so they can
//! ride inside [`SyncEvent`](crate::app::events::SyncEvent)s without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Broker connection, authentication or subscription failed.
    Connection(ConnectionError),
    /// An outbound message could not be delivered.
    Publish(PublishError),
    /// The external weather reading could not be refreshed.
    Fetch(FetchError),
    /// An inbound command was not understood.
    Command(MalformedCommand),
    /// The relay output could not be driven.
    Actuator(ActuatorError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "connection: {e}"),
            Self::Publish(e) => write!(f, "publish: {e}"),
            Self::Fetch(e) => write!(f, "fetch: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Connection errors
// ---------------------------------------------------------------------------

/// Broker session could not be (re)established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// The network link or client could not be created.
    Transport,
    /// The broker refused the CONNECT (carries the client return code).
    Refused(i32),
    /// No CONNACK arrived within the connect timeout.
    Timeout,
    /// Connected, but the command topic subscription failed.
    SubscribeFailed,
    /// The station link under the broker is down and could not be restored.
    LinkDown,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport unavailable"),
            Self::Refused(rc) => write!(f, "broker refused connection (rc={rc})"),
            Self::Timeout => write!(f, "connect timed out"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::LinkDown => write!(f, "network link down"),
        }
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Self::Connection(e)
    }
}

// ---------------------------------------------------------------------------
// Publish errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The session dropped before the message could be handed over.
    NotConnected,
    /// The client refused to enqueue the message.
    Rejected,
    /// Serialised payload exceeds the outbound buffer.
    PayloadTooLarge,
    /// The record could not be serialised.
    Serialize,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Rejected => write!(f, "rejected by client"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::Serialize => write!(f, "serialisation failed"),
        }
    }
}

impl From<PublishError> for Error {
    fn from(e: PublishError) -> Self {
        Self::Publish(e)
    }
}

// ---------------------------------------------------------------------------
// Weather fetch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// Connection, TLS or read failure.
    Transport,
    /// Upstream answered with a non-success HTTP status.
    Status(u16),
    /// Response body exceeds the receive buffer.
    BodyTooLarge,
    /// Response body is not the expected JSON document.
    Malformed,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "HTTP transport error"),
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::BodyTooLarge => write!(f, "response body too large"),
            Self::Malformed => write!(f, "malformed response"),
        }
    }
}

impl From<FetchError> for Error {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

// ---------------------------------------------------------------------------
// Inbound command errors
// ---------------------------------------------------------------------------

/// Why an inbound payload was not turned into a relay command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedCommand {
    /// Payload is not a JSON object.
    NotJson,
    /// No `state` key present.
    MissingState,
    /// `state` present but not interpretable as on/off.
    InvalidState,
}

impl fmt::Display for MalformedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => write!(f, "payload is not a JSON object"),
            Self::MissingState => write!(f, "no state field"),
            Self::InvalidState => write!(f, "state value not recognised"),
        }
    }
}

impl From<MalformedCommand> for Error {
    fn from(e: MalformedCommand) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
