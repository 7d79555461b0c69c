//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`PowerMeter`] and the [`RelayDriver`], exposing them through
//! [`SensorPort`] and [`RelayPort`].  On non-espidf targets the CT driver
//! reads its simulated waveform and the relay pin can be any mock
//! `OutputPin`.

use embedded_hal::digital::OutputPin;

use crate::app::ports::{RelayPort, SensorPort};
use crate::app::telemetry::PowerReading;
use crate::drivers::relay::RelayDriver;
use crate::error::ActuatorError;
use crate::sensors::PowerMeter;

/// Concrete adapter that combines the board I/O behind port traits.
pub struct HardwareAdapter<P: OutputPin> {
    meter: PowerMeter,
    relay: RelayDriver<P>,
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(meter: PowerMeter, relay: RelayDriver<P>) -> Self {
        Self { meter, relay }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: OutputPin> SensorPort for HardwareAdapter<P> {
    fn read_power(&mut self) -> PowerReading {
        self.meter.read()
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<P: OutputPin> RelayPort for HardwareAdapter<P> {
    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.relay.set(on)
    }
}
