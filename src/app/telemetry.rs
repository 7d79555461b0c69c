//! Telemetry composition — sensor snapshot + cached weather → one record.
//!
//! Pure: no I/O, no clock.  Weather keys are present only when the source
//! value is present; the observation time additionally requires the last
//! fetch to have succeeded.

use serde::Serialize;

use crate::error::PublishError;

use super::weather::WeatherReading;

/// Upper bound for a serialised telemetry record.
pub const MAX_TELEMETRY_PAYLOAD: usize = 600;

/// Electrical quantities from the sensor front end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerReading {
    /// RMS current, A.
    pub current: f32,
    /// RMS voltage, V.
    pub voltage: f32,
    /// Real power, W.
    pub real_power: f32,
    /// Apparent power, VA.
    pub apparent_power: f32,
}

/// A [`PowerReading`] stamped with the monotonic time it was taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub current: f32,
    pub voltage: f32,
    pub real_power: f32,
    pub apparent_power: f32,
    pub timestamp_ms: u64,
}

impl TelemetrySample {
    pub fn new(reading: PowerReading, timestamp_ms: u64) -> Self {
        Self {
            current: reading.current,
            voltage: reading.voltage,
            real_power: reading.real_power,
            apparent_power: reading.apparent_power,
            timestamp_ms,
        }
    }
}

/// Flat outbound record.  Field names are the broker-side telemetry keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub output_current: f32,
    pub output_voltage: f32,
    pub output_power: f32,
    pub apparent_power: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghi: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_index: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precip_mm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_cover_low: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_time: Option<String>,
}

impl TelemetryRecord {
    /// Serialise to JSON, refusing anything over [`MAX_TELEMETRY_PAYLOAD`].
    pub fn to_payload(&self) -> Result<Vec<u8>, PublishError> {
        let bytes = serde_json::to_vec(self).map_err(|_| PublishError::Serialize)?;
        if bytes.len() > MAX_TELEMETRY_PAYLOAD {
            return Err(PublishError::PayloadTooLarge);
        }
        Ok(bytes)
    }
}

/// Merge a sample and the cached weather into one record.
pub fn compose(sample: &TelemetrySample, weather: &WeatherReading) -> TelemetryRecord {
    let weather_time = (weather.valid && !weather.observation_time.is_empty())
        .then(|| weather.observation_time.as_str().to_owned());

    TelemetryRecord {
        output_current: sample.current,
        output_voltage: sample.voltage,
        output_power: sample.real_power,
        apparent_power: sample.apparent_power,
        ghi: finite(weather.ghi),
        temp_c: finite(weather.temperature),
        rh: finite(weather.humidity),
        wind_kmh: finite(weather.wind_speed),
        uv_index: finite(weather.uv_index),
        precip_mm: finite(weather.precipitation),
        cloud_cover: finite(weather.cloud_cover),
        cloud_cover_low: finite(weather.cloud_cover_low),
        weather_time,
    }
}

/// JSON has no NaN/inf; a non-finite value is treated as absent.
fn finite(v: Option<f32>) -> Option<f32> {
    v.filter(|x| x.is_finite())
}
