//! Mock adapters for integration tests.
//!
//! Every mock records what the engine did to it so tests can assert on the
//! full call history without a broker, an HTTP server or real GPIO.

use std::collections::VecDeque;

use ctlink::app::events::SyncEvent;
use ctlink::app::ports::{
    BrokerTransport, Clock, EventSink, RelayPort, SensorPort, WeatherSource,
};
use ctlink::app::telemetry::PowerReading;
use ctlink::app::weather::WeatherReading;
use ctlink::error::{ActuatorError, ConnectionError, FetchError, PublishError};

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub reading: PowerReading,
    pub relay: bool,
    pub relay_writes: Vec<bool>,
    pub fail_writes: bool,
    pub samples: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            reading: PowerReading {
                current: 1.234,
                voltage: 230.5,
                real_power: 284.5,
                apparent_power: 284.44,
            },
            relay: false,
            relay_writes: Vec::new(),
            fail_writes: false,
            samples: 0,
        }
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_power(&mut self) -> PowerReading {
        self.samples += 1;
        self.reading
    }
}

impl RelayPort for MockHardware {
    fn set_relay(&mut self, on: bool) -> Result<(), ActuatorError> {
        if self.fail_writes {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.relay = on;
        self.relay_writes.push(on);
        Ok(())
    }
}

// ── MockTransport ─────────────────────────────────────────────

/// Scripted broker.  Each `connect` pops the next entry of
/// `connect_outcomes`; an empty script connects.
#[derive(Default)]
pub struct MockTransport {
    pub connect_outcomes: VecDeque<bool>,
    pub connected: bool,
    pub connects: u32,
    pub subscribes: Vec<String>,
    pub published: Vec<(String, String)>,
    pub publish_failures: VecDeque<PublishError>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_command(&mut self, payload: &str) {
        self.inbound
            .push_back((ctlink::config::ATTRIBUTES_TOPIC.to_owned(), payload.as_bytes().to_vec()));
    }

    pub fn on_topic(&self, topic: &str) -> Vec<&str> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_str())
            .collect()
    }

    pub fn attributes(&self) -> Vec<&str> {
        self.on_topic(ctlink::config::ATTRIBUTES_TOPIC)
    }

    pub fn telemetry(&self) -> Vec<&str> {
        self.on_topic(ctlink::config::TELEMETRY_TOPIC)
    }
}

impl BrokerTransport for MockTransport {
    fn connect(&mut self, _client_id: &str, _token: &str) -> Result<(), ConnectionError> {
        self.connects += 1;
        self.connected = self.connect_outcomes.pop_front().unwrap_or(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ConnectionError> {
        self.subscribes.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if let Some(e) = self.publish_failures.pop_front() {
            return Err(e);
        }
        self.published
            .push((topic.to_owned(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }

    fn poll(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        while let Some((topic, payload)) = self.inbound.pop_front() {
            on_message(&topic, &payload);
        }
    }
}

// ── MockWeather ───────────────────────────────────────────────

/// Scripted weather source; an empty script fails with `Transport`.
#[derive(Default)]
pub struct MockWeather {
    pub results: VecDeque<Result<WeatherReading, FetchError>>,
    pub fetches: u32,
}

#[allow(dead_code)]
impl MockWeather {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(reading: WeatherReading, n: usize) -> Self {
        Self {
            results: std::iter::repeat_n(Ok(reading), n).collect(),
            fetches: 0,
        }
    }
}

impl WeatherSource for MockWeather {
    fn fetch(&mut self) -> Result<WeatherReading, FetchError> {
        self.fetches += 1;
        self.results.pop_front().unwrap_or(Err(FetchError::Transport))
    }
}

// ── MockClock ─────────────────────────────────────────────────

/// Manual clock.  `delay_ms` advances time and is recorded.
#[derive(Default)]
pub struct MockClock {
    pub now: u64,
    pub delays: Vec<u32>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(now: u64) -> Self {
        Self {
            now,
            delays: Vec::new(),
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now += u64::from(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<SyncEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &SyncEvent) {
        self.events.push(*event);
    }
}

// ── Fixtures ──────────────────────────────────────────────────

#[allow(dead_code)]
pub fn full_weather(time: &str) -> WeatherReading {
    let mut observation_time = heapless::String::new();
    observation_time.push_str(time).unwrap();
    WeatherReading {
        ghi: Some(512.0),
        temperature: Some(29.5),
        humidity: Some(78.0),
        wind_speed: Some(11.25),
        uv_index: Some(7.5),
        precipitation: Some(0.0),
        cloud_cover: Some(35.0),
        cloud_cover_low: Some(10.0),
        observation_time,
        valid: true,
    }
}
