//! Staleness-bounded cache of the external weather reading.
//!
//! Exactly one [`WeatherReading`] is held.  [`WeatherCache::get_fresh`]
//! refreshes it at most once per fetch interval; a failed attempt consumes
//! the window just like a successful one so a broken upstream is not
//! hammered every telemetry cycle.
//!
//! Every quantity is an `Option`.  Several of them are legitimately zero
//! (irradiance and UV index at night), so "unavailable" must never be
//! encoded as a number.

use std::borrow::Cow;

use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::FetchError;

use super::ports::WeatherSource;

/// Variables requested in the `current=` block, in query order.
pub const CURRENT_FIELDS: &str = "shortwave_radiation,cloud_cover_low,cloud_cover,temperature_2m,relative_humidity_2m,wind_speed_10m,uv_index,precipitation";

/// Capacity of the ISO-8601 observation timestamp.
pub const OBSERVATION_TIME_CAP: usize = 32;

/// Latest known environmental conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherReading {
    /// Global horizontal irradiance, W/m².
    pub ghi: Option<f32>,
    /// Air temperature, °C.
    pub temperature: Option<f32>,
    /// Relative humidity, %.
    pub humidity: Option<f32>,
    /// Wind speed, km/h.
    pub wind_speed: Option<f32>,
    pub uv_index: Option<f32>,
    /// Precipitation, mm.
    pub precipitation: Option<f32>,
    /// Total cloud cover, %.
    pub cloud_cover: Option<f32>,
    /// Low cloud cover, %.
    pub cloud_cover_low: Option<f32>,
    /// Observation time as reported upstream; empty when unknown.
    pub observation_time: heapless::String<OBSERVATION_TIME_CAP>,
    /// Whether the most recent fetch attempt succeeded.
    pub valid: bool,
}

// ───────────────────────────────────────────────────────────────
// Open-Meteo wire format
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ForecastDoc<'a> {
    #[serde(default, borrow)]
    current: Option<CurrentBlock<'a>>,
}

#[derive(Deserialize, Default)]
struct CurrentBlock<'a> {
    #[serde(default, borrow)]
    time: Option<Cow<'a, str>>,
    #[serde(default)]
    shortwave_radiation: Option<f32>,
    #[serde(default)]
    temperature_2m: Option<f32>,
    #[serde(default)]
    relative_humidity_2m: Option<f32>,
    #[serde(default)]
    wind_speed_10m: Option<f32>,
    #[serde(default)]
    uv_index: Option<f32>,
    #[serde(default)]
    precipitation: Option<f32>,
    #[serde(default)]
    cloud_cover: Option<f32>,
    #[serde(default)]
    cloud_cover_low: Option<f32>,
}

/// Build the forecast query for a site.
pub fn build_query_url(base: &str, latitude: f64, longitude: f64) -> String {
    format!(
        "{base}?latitude={latitude:.6}&longitude={longitude:.6}&timezone=auto&current={CURRENT_FIELDS}"
    )
}

/// Extract the current conditions from a forecast response body.
///
/// A document without a `current` block yields a valid reading with every
/// field absent.
pub fn parse_forecast(body: &[u8]) -> Result<WeatherReading, FetchError> {
    let doc: ForecastDoc<'_> = serde_json::from_slice(body).map_err(|_| FetchError::Malformed)?;
    let cur = doc.current.unwrap_or_default();

    let mut observation_time = heapless::String::new();
    if let Some(t) = cur.time.as_deref() {
        if observation_time.push_str(t).is_err() {
            warn!("Weather: observation time '{}' too long, dropped", t);
            observation_time.clear();
        }
    }

    Ok(WeatherReading {
        ghi: cur.shortwave_radiation,
        temperature: cur.temperature_2m,
        humidity: cur.relative_humidity_2m,
        wind_speed: cur.wind_speed_10m,
        uv_index: cur.uv_index,
        precipitation: cur.precipitation,
        cloud_cover: cur.cloud_cover,
        cloud_cover_low: cur.cloud_cover_low,
        observation_time,
        valid: true,
    })
}

// ───────────────────────────────────────────────────────────────
// Cache
// ───────────────────────────────────────────────────────────────

pub struct WeatherCache<S: WeatherSource> {
    source: S,
    latest: WeatherReading,
    fetch_interval_ms: u64,
    /// Time of the last attempt, successful or not.
    last_attempt_ms: Option<u64>,
    attempts: u32,
}

impl<S: WeatherSource> WeatherCache<S> {
    pub fn new(source: S, fetch_interval_ms: u32) -> Self {
        Self {
            source,
            latest: WeatherReading::default(),
            fetch_interval_ms: u64::from(fetch_interval_ms),
            last_attempt_ms: None,
            attempts: 0,
        }
    }

    /// Freshest known reading, refreshing first if the window has elapsed
    /// or `force` is set.  Never fails; on error the previous numbers are
    /// kept and `valid` is cleared.
    pub fn get_fresh(&mut self, now_ms: u64, force: bool) -> &WeatherReading {
        if force || self.is_due(now_ms) {
            self.refresh(now_ms);
        }
        &self.latest
    }

    fn is_due(&self, now_ms: u64) -> bool {
        match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.fetch_interval_ms,
        }
    }

    fn refresh(&mut self, now_ms: u64) {
        self.attempts = self.attempts.wrapping_add(1);
        match self.source.fetch() {
            Ok(mut reading) => {
                reading.valid = true;
                info!(
                    "Weather: refreshed (ghi={:?} temp={:?} time='{}')",
                    reading.ghi, reading.temperature, reading.observation_time
                );
                self.latest = reading;
            }
            Err(e) => {
                warn!("Weather: fetch failed ({}), keeping stale values", e);
                self.latest.valid = false;
            }
        }
        self.last_attempt_ms = Some(now_ms);
        debug!("Weather: next attempt due in {} ms", self.fetch_interval_ms);
    }

    /// Cached reading without refreshing.
    pub fn latest(&self) -> &WeatherReading {
        &self.latest
    }

    /// Fetch attempts since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }
}
