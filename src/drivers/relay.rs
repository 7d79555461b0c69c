//! Single-channel relay module driver.
//!
//! Generic over any `embedded_hal` [`OutputPin`] so the same driver runs on
//! an ESP-IDF `PinDriver` and on a host mock.  The usual opto-isolated
//! relay boards are active-low: driving the input LOW energises the coil.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::error::ActuatorError;

pub struct RelayDriver<P: OutputPin> {
    pin: P,
    active_low: bool,
    on: bool,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Take ownership of the pin and release the relay.
    pub fn new(pin: P, active_low: bool) -> Result<Self, ActuatorError> {
        let mut drv = Self {
            pin,
            active_low,
            on: false,
        };
        drv.write(false)?;
        Ok(drv)
    }

    /// Energise or release the coil.  `is_on` is only updated once the pin
    /// write succeeds.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.write(on)?;
        self.on = on;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        let high = on != self.active_low;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|e| {
            warn!("Relay GPIO write failed: {:?}", e);
            ActuatorError::GpioWriteFailed
        })
    }
}
