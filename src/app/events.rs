//! Outbound application events.
//!
//! The [`SyncEngine`](super::engine::SyncEngine) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::error::{ActuatorError, MalformedCommand, PublishError};

/// Structured events emitted by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncEvent {
    /// The engine has started; relay forced to the given state.
    Started { relay_on: bool },

    /// A broker session was (re)established after `attempts` connect attempts.
    Connected { attempts: u32 },

    /// An inbound command was applied to the relay.
    CommandApplied { state: bool },

    /// An inbound payload was ignored.
    CommandIgnored(MalformedCommand),

    /// A well-formed command could not be driven onto the relay output.
    CommandFailed(ActuatorError),

    /// A telemetry record of `bytes` bytes was handed to the broker.
    TelemetryPublished { bytes: usize },

    /// This cycle's telemetry record was dropped.
    TelemetryDropped(PublishError),

    /// The relay attribute was published and acknowledged.
    RelayReported { state: bool },

    /// The relay attribute publish failed; retried next cycle.
    RelayReportDeferred(PublishError),
}
