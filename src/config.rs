//! System configuration parameters
//!
//! All tunable parameters for the CTLink sync engine.  Defaults match the
//! deployed device: ThingsBoard demo broker, 5 s telemetry, 10 min weather.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shared-attribute topic: relay commands arrive here, relay state is echoed here.
pub const ATTRIBUTES_TOPIC: &str = "v1/devices/me/attributes";
/// Telemetry topic for the electrical + weather record.
pub const TELEMETRY_TOPIC: &str = "v1/devices/me/telemetry";
/// Open-Meteo forecast endpoint (the `current=` block is requested).
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    // --- Broker ---
    /// Broker host name
    pub broker_host: String,
    /// Broker TCP port
    pub broker_port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Device access token, sent as the MQTT user name
    pub access_token: String,
    /// Topic carrying relay commands and relay attribute reports
    pub command_topic: String,
    /// Topic carrying telemetry records
    pub telemetry_topic: String,

    // --- Timing ---
    /// Telemetry publish interval (milliseconds)
    pub telemetry_interval_ms: u32,
    /// Fixed delay between broker connect attempts (milliseconds)
    pub reconnect_backoff_ms: u32,
    /// Minimum spacing between weather fetch attempts (milliseconds)
    pub weather_fetch_interval_ms: u32,
    /// Tick loop sleep (milliseconds)
    pub loop_interval_ms: u32,

    // --- Weather ---
    /// Site latitude (degrees)
    pub latitude: f64,
    /// Site longitude (degrees)
    pub longitude: f64,
    /// Weather service endpoint
    pub weather_base_url: String,

    // --- Electrical ---
    /// Nominal mains voltage (the board has no voltage channel)
    pub nominal_voltage_v: f32,
    /// Assumed load power factor, (0, 1]
    pub power_factor: f32,
    /// CT calibration, amps per volt of burden signal
    pub ct_calibration: f32,

    // --- Relay ---
    /// Echo the relay attribute straight after a command is applied,
    /// rather than waiting for the next telemetry cycle.
    pub ack_on_command: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // Broker
            broker_host: "demo.thingsboard.io".into(),
            broker_port: 1883,
            client_id: "ESP32Client".into(),
            access_token: String::new(),
            command_topic: ATTRIBUTES_TOPIC.into(),
            telemetry_topic: TELEMETRY_TOPIC.into(),

            // Timing
            telemetry_interval_ms: 5_000,
            reconnect_backoff_ms: 5_000,
            weather_fetch_interval_ms: 10 * 60 * 1_000,
            loop_interval_ms: 100,

            // Weather
            latitude: 7.2986,
            longitude: 81.8547,
            weather_base_url: OPEN_METEO_BASE_URL.into(),

            // Electrical
            nominal_voltage_v: 230.0,
            power_factor: 0.71,
            ct_calibration: crate::sensors::ct::DEFAULT_CALIBRATION,

            // Relay
            ack_on_command: true,
        }
    }
}

impl SyncConfig {
    /// Broker URL in the form the MQTT client expects.
    pub fn broker_url(&self) -> String {
        format!("mqtt://{}:{}", self.broker_host, self.broker_port)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_host.is_empty() {
            return Err(ConfigError::ValidationFailed("broker_host must not be empty"));
        }
        if self.broker_port == 0 {
            return Err(ConfigError::ValidationFailed("broker_port must be non-zero"));
        }
        if self.command_topic.is_empty() || self.telemetry_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("topics must not be empty"));
        }
        if self.telemetry_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("telemetry_interval_ms must be > 0"));
        }
        if self.reconnect_backoff_ms == 0 {
            return Err(ConfigError::ValidationFailed("reconnect_backoff_ms must be > 0"));
        }
        if self.weather_fetch_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "weather_fetch_interval_ms must be > 0",
            ));
        }
        if self.loop_interval_ms == 0 || self.loop_interval_ms > self.telemetry_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "loop_interval_ms must be 1..=telemetry_interval_ms",
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::ValidationFailed("latitude must be -90–90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::ValidationFailed("longitude must be -180–180"));
        }
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(ConfigError::ValidationFailed("power_factor must be in (0, 1]"));
        }
        if !(self.nominal_voltage_v > 0.0) {
            return Err(ConfigError::ValidationFailed("nominal_voltage_v must be > 0"));
        }
        if !(self.ct_calibration > 0.0 && self.ct_calibration.is_finite()) {
            return Err(ConfigError::ValidationFailed("ct_calibration must be > 0"));
        }
        Ok(())
    }
}
