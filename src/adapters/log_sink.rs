//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing sync events to the ESP-IDF logger
//! (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::SyncEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`SyncEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    published: u32,
    dropped: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Telemetry records published since boot.
    pub fn published(&self) -> u32 {
        self.published
    }

    /// Telemetry records dropped since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Started { relay_on } => {
                info!("START | relay={}", if *relay_on { "ON" } else { "OFF" });
            }
            SyncEvent::Connected { attempts } => {
                info!("LINK  | broker session up after {} attempt(s)", attempts);
            }
            SyncEvent::CommandApplied { state } => {
                info!("CMD   | relay -> {}", if *state { "ON" } else { "OFF" });
            }
            SyncEvent::CommandIgnored(e) => {
                warn!("CMD   | ignored: {}", e);
            }
            SyncEvent::CommandFailed(e) => {
                warn!("CMD   | not applied: {}", e);
            }
            SyncEvent::TelemetryPublished { bytes } => {
                self.published = self.published.wrapping_add(1);
                info!("TELEM | sent {} bytes (#{})", bytes, self.published);
            }
            SyncEvent::TelemetryDropped(e) => {
                self.dropped = self.dropped.wrapping_add(1);
                warn!("TELEM | dropped: {} ({} total)", e, self.dropped);
            }
            SyncEvent::RelayReported { state } => {
                info!("ATTR  | state={}", state);
            }
            SyncEvent::RelayReportDeferred(e) => {
                warn!("ATTR  | deferred: {}", e);
            }
        }
    }
}
