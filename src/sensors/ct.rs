//! Split-core current transformer (SCT-013 class) driver.
//!
//! Samples the burden-resistor voltage through an ADC1 channel and computes
//! RMS current over a burst of samples.  The DC bias of the input divider is
//! tracked with a first-order digital low-pass filter that persists between
//! bursts, so the estimate settles after the first few readings.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the CT channel via the oneshot API (initialised by
//! hw_init).  On host/test: synthesises a sine wave whose peak-to-peak
//! amplitude is set with [`sim_set_ct_amplitude`].

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

/// Samples per burst.  About 20 mains cycles at 50 Hz on the ESP32 ADC.
pub const SAMPLES_PER_READ: usize = 1480;
/// Amps per volt of burden signal for the fitted transformer.
pub const DEFAULT_CALIBRATION: f32 = 6.0;

const ADC_BITS: u32 = 12;
const ADC_COUNTS: u32 = 1 << ADC_BITS;
const SUPPLY_V: f32 = 3.3;

#[cfg(not(target_os = "espidf"))]
static SIM_CT_AMPLITUDE: AtomicU16 = AtomicU16::new(0);

/// Peak-to-peak ADC counts of the simulated CT waveform.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ct_amplitude(counts: u16) {
    SIM_CT_AMPLITUDE.store(counts, Ordering::Relaxed);
}

pub struct CtSensor {
    calibration: f32,
    /// Running estimate of the DC bias, in ADC counts.
    offset: f32,
    samples: usize,
    #[cfg(not(target_os = "espidf"))]
    sim_phase: u32,
    _adc_gpio: i32,
}

impl CtSensor {
    pub fn new(adc_gpio: i32) -> Self {
        Self {
            calibration: DEFAULT_CALIBRATION,
            offset: (ADC_COUNTS >> 1) as f32,
            samples: SAMPLES_PER_READ,
            #[cfg(not(target_os = "espidf"))]
            sim_phase: 0,
            _adc_gpio: adc_gpio,
        }
    }

    pub fn with_calibration(mut self, calibration: f32) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// One burst from the ADC, returned as RMS amps.
    pub fn read_irms(&mut self) -> f32 {
        let mut sum_sq = 0.0_f32;
        for _ in 0..self.samples {
            let raw = self.read_adc();
            sum_sq += self.filter(raw);
        }
        self.finish(sum_sq, self.samples)
    }

    /// RMS amps from a caller-supplied burst of raw samples.
    pub fn irms_from_samples(&mut self, samples: &[u16]) -> f32 {
        let mut sum_sq = 0.0_f32;
        for &raw in samples {
            sum_sq += self.filter(raw);
        }
        self.finish(sum_sq, samples.len())
    }

    /// Update the bias estimate and return the squared AC component.
    fn filter(&mut self, raw: u16) -> f32 {
        let sample = f32::from(raw);
        self.offset += (sample - self.offset) / ADC_COUNTS as f32;
        let ac = sample - self.offset;
        ac * ac
    }

    fn finish(&self, sum_sq: f32, n: usize) -> f32 {
        if n == 0 {
            return 0.0;
        }
        let ratio = self.calibration * SUPPLY_V / ADC_COUNTS as f32;
        ratio * (sum_sq / n as f32).max(0.0).sqrt()
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&mut self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_CT)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&mut self) -> u16 {
        // 50 Hz wave sampled at ~3.7 kHz: 74 samples per cycle.
        const STEPS: u32 = 74;
        let amplitude = f32::from(SIM_CT_AMPLITUDE.load(Ordering::Relaxed)) / 2.0;
        let angle = (self.sim_phase as f32 / STEPS as f32) * core::f32::consts::TAU;
        self.sim_phase = (self.sim_phase + 1) % STEPS;
        let mid = (ADC_COUNTS >> 1) as f32;
        (mid + amplitude * angle.sin()).clamp(0.0, (ADC_COUNTS - 1) as f32) as u16
    }
}

/// Round to `places` decimal places, half away from zero.
pub fn round_to(value: f32, places: u32) -> f32 {
    let scale = 10_f32.powi(places as i32);
    (value * scale).round() / scale
}
