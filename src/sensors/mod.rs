//! Sensor subsystem — the CT driver and the aggregating [`PowerMeter`].
//!
//! The meter turns one CT burst into a full [`PowerReading`] using the
//! configured nominal voltage and power factor; the board has no voltage
//! channel.

pub mod ct;

use crate::app::telemetry::PowerReading;
use ct::{round_to, CtSensor};

pub struct PowerMeter {
    ct: CtSensor,
    nominal_voltage: f32,
    power_factor: f32,
}

impl PowerMeter {
    pub fn new(ct: CtSensor, nominal_voltage: f32, power_factor: f32) -> Self {
        Self {
            ct,
            nominal_voltage,
            power_factor,
        }
    }

    /// Sample the CT and derive the remaining quantities.
    pub fn read(&mut self) -> PowerReading {
        let irms = self.ct.read_irms();
        self.derive(irms)
    }

    /// Build a reading from an already-measured RMS current.
    pub fn derive(&self, irms: f32) -> PowerReading {
        let current = round_to(irms.max(0.0), 3);
        let voltage = round_to(self.nominal_voltage, 2);
        let apparent = current * voltage;
        PowerReading {
            current,
            voltage,
            real_power: round_to(apparent * self.power_factor, 2),
            apparent_power: round_to(apparent, 2),
        }
    }
}
