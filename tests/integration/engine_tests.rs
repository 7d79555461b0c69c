//! Integration tests for the SyncEngine tick pipeline.
//!
//! Drive the engine tick by tick against the recording mocks and check what
//! reached the broker, the relay and the event sink.

use serde_json::Value;

use crate::mock_hw::{
    full_weather, MockClock, MockHardware, MockTransport, MockWeather, RecordingSink,
};

use ctlink::app::broker::ConnectionState;
use ctlink::app::engine::SyncEngine;
use ctlink::app::events::SyncEvent;
use ctlink::config::{SyncConfig, ATTRIBUTES_TOPIC};
use ctlink::error::{ActuatorError, FetchError, MalformedCommand, PublishError};

struct Rig {
    engine: SyncEngine<MockTransport, MockWeather>,
    hw: MockHardware,
    clock: MockClock,
    sink: RecordingSink,
}

impl Rig {
    fn new(config: SyncConfig, transport: MockTransport, weather: MockWeather) -> Self {
        Self {
            engine: SyncEngine::new(config, transport, weather),
            hw: MockHardware::new(),
            clock: MockClock::at(0),
            sink: RecordingSink::new(),
        }
    }

    fn started(config: SyncConfig, weather: MockWeather) -> Self {
        let mut rig = Self::new(config, MockTransport::new(), weather);
        rig.engine
            .start(&mut rig.hw, &mut rig.clock, &mut rig.sink)
            .unwrap();
        rig
    }

    fn tick(&mut self) {
        self.engine.tick(&mut self.hw, &mut self.clock, &mut self.sink);
    }

    fn tick_at(&mut self, now: u64) {
        self.clock.now = now;
        self.tick();
    }

    fn transport(&mut self) -> &mut MockTransport {
        self.engine.session_mut().transport_mut()
    }

    fn sent(&self) -> &MockTransport {
        self.engine.session().transport()
    }
}

fn json(s: &str) -> Value {
    serde_json::from_str(s).unwrap()
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_drives_relay_off_and_primes_weather() {
    let rig = Rig::started(SyncConfig::default(), MockWeather::always(full_weather("t"), 1));

    assert_eq!(rig.hw.relay_writes, vec![false]);
    assert_eq!(rig.engine.weather().attempts(), 1);
    assert!(rig.engine.weather().latest().valid);
    assert_eq!(rig.sink.events, vec![SyncEvent::Started { relay_on: false }]);
    assert_eq!(rig.engine.session().state(), ConnectionState::Disconnected);
}

// ── Connection ────────────────────────────────────────────────

#[test]
fn two_failed_connects_mean_two_backoffs_and_one_subscribe() {
    let mut transport = MockTransport::new();
    transport.connect_outcomes.extend([false, false, true]);
    let mut rig = Rig::new(SyncConfig::default(), transport, MockWeather::new());

    rig.tick();

    assert_eq!(rig.clock.delays, vec![5_000, 5_000]);
    assert_eq!(rig.sent().subscribes, vec![ATTRIBUTES_TOPIC.to_owned()]);
    assert_eq!(rig.sent().connects, 3);
    assert!(rig.sink.events.contains(&SyncEvent::Connected { attempts: 3 }));
}

#[test]
fn backoff_uses_configured_delay() {
    let config = SyncConfig {
        reconnect_backoff_ms: 750,
        ..SyncConfig::default()
    };
    let mut transport = MockTransport::new();
    transport.connect_outcomes.extend([false, true]);
    let mut rig = Rig::new(config, transport, MockWeather::new());
    rig.tick();
    assert_eq!(rig.clock.delays, vec![750]);
}

#[test]
fn lost_session_is_restored_and_resubscribed_next_tick() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport().connected = false;

    rig.tick_at(100);

    assert_eq!(rig.sent().subscribes.len(), 2);
    assert_eq!(rig.engine.session().sessions(), 2);
    assert!(rig.clock.delays.is_empty());
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn off_command_while_on_is_reported_exactly_once() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport().push_command(r#"{"state":true}"#);
    rig.tick_at(100);
    assert!(rig.hw.relay);

    rig.transport().push_command(r#"{"state": false}"#);
    rig.tick_at(200);
    assert!(!rig.hw.relay);

    rig.tick_at(5_000);
    rig.tick_at(10_000);

    let attrs: Vec<Value> = rig.sent().attributes().into_iter().map(json).collect();
    assert_eq!(attrs, vec![json(r#"{"state":true}"#), json(r#"{"state":false}"#)]);
}

#[test]
fn malformed_commands_never_change_relay() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    for payload in [r#"{"brightness":1}"#, "true", r#"{"state":"maybe"}"#] {
        rig.transport().push_command(payload);
    }
    rig.tick_at(100);

    assert!(!rig.hw.relay);
    assert_eq!(rig.hw.relay_writes, vec![false]);
    assert!(rig.sent().attributes().is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(e, SyncEvent::CommandIgnored(_))),
        3
    );
    assert!(rig
        .sink
        .events
        .contains(&SyncEvent::CommandIgnored(MalformedCommand::MissingState)));
}

#[test]
fn commands_on_other_topics_are_ignored() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport()
        .inbound
        .push_back(("v1/devices/me/rpc/request/7".into(), br#"{"state":true}"#.to_vec()));
    rig.tick_at(100);
    assert!(!rig.hw.relay);
}

#[test]
fn last_command_in_a_batch_wins_and_only_net_change_is_reported() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport().push_command(r#"{"state":true}"#);
    rig.transport().push_command(r#"{"state":false}"#);
    rig.transport().push_command(r#"{"shared":{"state":"on"}}"#);
    rig.tick_at(100);

    assert!(rig.hw.relay);
    assert_eq!(rig.hw.relay_writes, vec![false, true, false, true]);
    assert_eq!(rig.sent().attributes(), vec![r#"{"state":true}"#]);
}

#[test]
fn without_immediate_ack_report_waits_for_telemetry_cycle() {
    let config = SyncConfig {
        ack_on_command: false,
        ..SyncConfig::default()
    };
    let mut rig = Rig::started(config, MockWeather::new());
    rig.tick_at(0);
    rig.transport().push_command(r#"{"state":true}"#);
    rig.tick_at(100);
    assert!(rig.sent().attributes().is_empty());
    assert!(rig.engine.relay().is_dirty());

    rig.tick_at(5_000);
    assert_eq!(rig.sent().attributes(), vec![r#"{"state":true}"#]);
    // Telemetry goes first within a cycle.
    let last_two: Vec<&str> = rig.sent().published[rig.sent().published.len() - 2..]
        .iter()
        .map(|(t, _)| t.as_str())
        .collect();
    assert_eq!(last_two, vec!["v1/devices/me/telemetry", ATTRIBUTES_TOPIC]);
}

#[test]
fn gpio_failure_is_not_reported() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.hw.fail_writes = true;
    rig.transport().push_command(r#"{"state":true}"#);
    rig.tick_at(100);

    assert!(!rig.engine.relay().is_on());
    assert!(rig.sent().attributes().is_empty());
    assert!(rig
        .sink
        .events
        .contains(&SyncEvent::CommandFailed(ActuatorError::GpioWriteFailed)));
}

#[test]
fn failed_attribute_report_is_retried_next_cycle() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport().push_command(r#"{"state":true}"#);
    rig.transport().publish_failures.push_back(PublishError::Rejected);
    rig.tick_at(100);
    assert!(rig.sent().attributes().is_empty());
    assert!(rig
        .sink
        .events
        .contains(&SyncEvent::RelayReportDeferred(PublishError::Rejected)));

    rig.tick_at(200);
    assert_eq!(rig.sent().attributes(), vec![r#"{"state":true}"#]);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_runs_on_first_tick_then_every_interval() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    for now in [0, 1_000, 4_999, 5_000, 9_999, 10_000, 10_050] {
        rig.tick_at(now);
    }
    assert_eq!(rig.sent().telemetry().len(), 3);
    assert_eq!(rig.hw.samples, 3);
    assert_eq!(rig.engine.last_telemetry_ms(), Some(10_000));
}

#[test]
fn irregular_ticks_never_double_publish() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.tick_at(12_345);
    rig.tick_at(12_346);
    rig.tick_at(17_344);
    assert_eq!(rig.sent().telemetry().len(), 2);
    rig.tick_at(17_345);
    assert_eq!(rig.sent().telemetry().len(), 3);
}

#[test]
fn telemetry_record_carries_sensor_and_weather() {
    let mut rig = Rig::started(
        SyncConfig::default(),
        MockWeather::always(full_weather("2025-03-01T12:00"), 1),
    );
    rig.tick_at(0);

    let record = json(rig.sent().telemetry()[0]);
    let obj = record.as_object().unwrap();
    assert_eq!(obj.len(), 13);
    assert_eq!(obj["output_current"], 1.234);
    assert_eq!(obj["output_voltage"], 230.5);
    assert_eq!(obj["output_power"], 284.5);
    assert_eq!(obj["ghi"], 512.0);
    assert_eq!(obj["weather_time"], "2025-03-01T12:00");
}

#[test]
fn failed_weather_refresh_keeps_numbers_without_timestamp() {
    let config = SyncConfig {
        weather_fetch_interval_ms: 5_000,
        ..SyncConfig::default()
    };
    let mut weather = MockWeather::always(full_weather("2025-03-01T12:00"), 1);
    weather.results.push_back(Err(FetchError::Status(502)));
    let mut rig = Rig::started(config, weather);

    rig.tick_at(0);
    rig.tick_at(5_000);

    let second = json(rig.sent().telemetry()[1]);
    assert_eq!(second["ghi"], 512.0);
    assert!(second.get("weather_time").is_none());
    assert_eq!(rig.engine.weather().attempts(), 2);
}

#[test]
fn weather_is_fetched_at_most_once_per_interval() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    let mut now = 0;
    while now < 600_000 {
        rig.tick_at(now);
        now += 5_000;
    }
    // start() forced one attempt at t=0; the window has not elapsed since.
    assert_eq!(rig.engine.weather().attempts(), 1);
    rig.tick_at(600_000);
    assert_eq!(rig.engine.weather().attempts(), 2);
}

#[test]
fn dropped_telemetry_still_advances_the_cadence() {
    let mut rig = Rig::started(SyncConfig::default(), MockWeather::new());
    rig.tick_at(0);
    rig.transport().publish_failures.push_back(PublishError::Rejected);
    rig.tick_at(5_000);

    assert_eq!(rig.engine.last_telemetry_ms(), Some(5_000));
    assert!(rig
        .sink
        .events
        .contains(&SyncEvent::TelemetryDropped(PublishError::Rejected)));
    rig.tick_at(6_000);
    assert_eq!(rig.sent().telemetry().len(), 1);
}
