//! Relay state with edge-triggered attribute reporting.
//!
//! The relay output is written **only** in [`RelayState::apply_command`];
//! [`RelayState::publish_if_changed`] reports what was applied and never
//! touches the actuator.  The reported attribute therefore always echoes a
//! level that actually reached the GPIO.
//!
//! "Dirty" means the applied level differs from the last level the broker
//! accepted.  A failed report keeps it dirty so the next cycle retries.

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{ActuatorError, PublishError};

use super::broker::BrokerSession;
use super::commands::RelayCommand;
use super::ports::{BrokerTransport, RelayPort};

/// Outbound attribute body: `{"state": <bool>}`.
#[derive(Debug, Serialize)]
struct RelayAttribute {
    state: bool,
}

/// Result of a [`RelayState::publish_if_changed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing to report.
    Clean,
    /// Attribute accepted by the broker.
    Reported(bool),
    /// Publish failed; still dirty.
    Deferred(PublishError),
}

pub struct RelayState {
    is_on: bool,
    /// Last value the broker accepted.
    acknowledged: bool,
    dirty: bool,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Relay off, broker assumed to know it is off.
    pub const fn new() -> Self {
        Self {
            is_on: false,
            acknowledged: false,
            dirty: false,
        }
    }

    /// Drive the output to a known level at boot.  The acknowledged value is
    /// left untouched, so a boot level that differs from it gets reported.
    pub fn init(&mut self, hw: &mut impl RelayPort, on: bool) -> Result<(), ActuatorError> {
        hw.set_relay(on)?;
        self.is_on = on;
        self.dirty = self.is_on != self.acknowledged;
        Ok(())
    }

    /// Write the commanded level to the relay.
    ///
    /// On a GPIO failure `is_on` keeps the previous level and the error is
    /// returned; nothing unapplied is ever reported.
    pub fn apply_command(
        &mut self,
        cmd: RelayCommand,
        hw: &mut impl RelayPort,
    ) -> Result<bool, ActuatorError> {
        hw.set_relay(cmd.state)?;
        let changed = self.is_on != cmd.state;
        self.is_on = cmd.state;
        self.dirty = self.is_on != self.acknowledged;
        if changed {
            info!("Relay: {}", if self.is_on { "ON" } else { "OFF" });
        } else {
            debug!("Relay: command repeats current level ({})", self.is_on);
        }
        Ok(changed)
    }

    /// Publish the applied level as an attribute if the broker has not yet
    /// accepted it.
    pub fn publish_if_changed<T: BrokerTransport>(
        &mut self,
        session: &mut BrokerSession<T>,
    ) -> ReportOutcome {
        if !self.dirty {
            return ReportOutcome::Clean;
        }

        let body = RelayAttribute { state: self.is_on };
        let payload = match serde_json::to_vec(&body) {
            Ok(p) => p,
            Err(_) => return ReportOutcome::Deferred(PublishError::Serialize),
        };

        let topic = session.command_topic().to_owned();
        match session.publish(&topic, &payload) {
            Ok(()) => {
                self.acknowledged = self.is_on;
                self.dirty = false;
                info!("Relay: attribute state={} reported", self.is_on);
                ReportOutcome::Reported(self.is_on)
            }
            Err(e) => {
                warn!("Relay: attribute report failed ({}), will retry", e);
                ReportOutcome::Deferred(e)
            }
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Last value the broker accepted.
    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Whether a report is pending.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
