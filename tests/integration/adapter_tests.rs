//! End-to-end tests with the simulation builds of the real adapters.
//!
//! The engine runs against the in-memory MQTT transport, the canned
//! Open-Meteo client and the hardware adapter over a mock relay pin, so the
//! inbound channel, the HTTP body handling and the relay polarity are all
//! exercised together.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use serde_json::Value;

use crate::mock_hw::{MockClock, RecordingSink};

use ctlink::adapters::hardware::HardwareAdapter;
use ctlink::adapters::mqtt::MqttTransport;
use ctlink::adapters::open_meteo::OpenMeteoClient;
use ctlink::adapters::wifi::{WifiLink, WifiState};
use ctlink::app::broker::LinkedTransport;
use ctlink::app::engine::SyncEngine;
use ctlink::app::events::SyncEvent;
use ctlink::config::{SyncConfig, ATTRIBUTES_TOPIC, TELEMETRY_TOPIC};
use ctlink::drivers::relay::RelayDriver;
use ctlink::error::ConnectionError;
use ctlink::sensors::ct::CtSensor;
use ctlink::sensors::PowerMeter;

/// Records the electrical level of the relay input.
#[derive(Default)]
struct LevelPin {
    high: bool,
}

impl ErrorType for LevelPin {
    type Error = Infallible;
}

impl OutputPin for LevelPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        Ok(())
    }
}

const FORECAST: &[u8] = br#"{
    "latitude": 7.3, "longitude": 81.86, "timezone": "Asia/Colombo",
    "current": {
        "time": "2025-03-01T12:00",
        "shortwave_radiation": 640.0,
        "cloud_cover_low": null,
        "temperature_2m": 30.1,
        "relative_humidity_2m": 70
    }
}"#;

fn hardware(config: &SyncConfig) -> HardwareAdapter<LevelPin> {
    let meter = PowerMeter::new(
        CtSensor::new(32)
            .with_calibration(config.ct_calibration)
            .with_samples(148),
        config.nominal_voltage_v,
        config.power_factor,
    );
    let relay = RelayDriver::new(LevelPin::default(), true).unwrap();
    HardwareAdapter::new(meter, relay)
}

fn rig() -> (
    SyncEngine<MqttTransport, OpenMeteoClient>,
    HardwareAdapter<LevelPin>,
) {
    let config = SyncConfig::default();
    let transport = MqttTransport::new(config.broker_url());
    let mut weather = OpenMeteoClient::new(&config);
    weather.sim_respond(FORECAST);
    let hw = hardware(&config);
    (SyncEngine::new(config, transport, weather), hw)
}

#[test]
fn command_through_mqtt_channel_drives_active_low_relay() {
    let (mut engine, mut hw) = rig();
    let (mut clock, mut sink) = (MockClock::at(0), RecordingSink::new());
    engine.start(&mut hw, &mut clock, &mut sink).unwrap();
    engine.tick(&mut hw, &mut clock, &mut sink);

    assert!(engine
        .session()
        .transport()
        .inject(ATTRIBUTES_TOPIC, br#"{"state":"on"}"#));
    clock.now = 100;
    engine.tick(&mut hw, &mut clock, &mut sink);

    assert!(engine.relay().is_on());
    assert!(sink.events.contains(&SyncEvent::RelayReported { state: true }));
    let published = engine.session().transport().published();
    let (topic, payload) = published.last().unwrap();
    assert_eq!(topic, ATTRIBUTES_TOPIC);
    assert_eq!(payload.as_slice(), br#"{"state":true}"#);
}

#[test]
fn telemetry_merges_simulated_ct_with_forecast() {
    let (mut engine, mut hw) = rig();
    let (mut clock, mut sink) = (MockClock::at(0), RecordingSink::new());
    engine.start(&mut hw, &mut clock, &mut sink).unwrap();
    engine.tick(&mut hw, &mut clock, &mut sink);

    let published = engine.session().transport().published();
    let (topic, payload) = &published[0];
    assert_eq!(topic, TELEMETRY_TOPIC);

    let record: Value = serde_json::from_slice(payload).unwrap();
    assert_eq!(record["output_voltage"], 230.0);
    assert_eq!(record["ghi"], 640.0);
    assert_eq!(record["temp_c"], 30.1);
    assert_eq!(record["rh"], 70.0);
    assert_eq!(record["weather_time"], "2025-03-01T12:00");
    assert!(record.get("cloud_cover_low").is_none());
    assert!(record.get("uv_index").is_none());
}

#[test]
fn refused_broker_is_retried_with_backoff() {
    let (mut engine, mut hw) = rig();
    engine
        .session_mut()
        .transport_mut()
        .script_connects([Err(ConnectionError::Refused(5)), Err(ConnectionError::Timeout)]);
    let (mut clock, mut sink) = (MockClock::at(0), RecordingSink::new());
    engine.tick(&mut hw, &mut clock, &mut sink);

    assert_eq!(clock.delays, vec![5_000, 5_000]);
    assert_eq!(engine.session().transport().connects(), 3);
    assert_eq!(
        engine.session().transport().subscriptions(),
        [ATTRIBUTES_TOPIC.to_owned()]
    );
}

#[test]
fn background_broker_session_is_resubscribed() {
    let (mut engine, mut hw) = rig();
    let (mut clock, mut sink) = (MockClock::at(0), RecordingSink::new());
    engine.tick(&mut hw, &mut clock, &mut sink);

    let transport = engine.session_mut().transport_mut();
    transport.sim_drop_session();
    transport.sim_background_session();
    clock.now = 100;
    engine.tick(&mut hw, &mut clock, &mut sink);

    assert_eq!(engine.session().transport().connects(), 2);
    assert_eq!(
        engine.session().transport().subscriptions(),
        [ATTRIBUTES_TOPIC.to_owned()]
    );
    assert!(sink.events.contains(&SyncEvent::Connected { attempts: 1 }));
}

type LinkedEngine = SyncEngine<LinkedTransport<MqttTransport, WifiLink>, OpenMeteoClient>;

fn linked_rig() -> (LinkedEngine, HardwareAdapter<LevelPin>) {
    let config = SyncConfig::default();
    let mut wifi = WifiLink::new();
    wifi.set_credentials("SiteAP", "ctlink-pass").unwrap();
    wifi.connect().unwrap();

    let transport = LinkedTransport::new(MqttTransport::new(config.broker_url()), wifi);
    let mut weather = OpenMeteoClient::new(&config);
    weather.sim_respond(FORECAST);
    let hw = hardware(&config);
    (SyncEngine::new(config, transport, weather), hw)
}

#[test]
fn station_drop_is_recovered_by_the_broker_retry_loop() {
    let (mut engine, mut hw) = linked_rig();
    let (mut clock, mut sink) = (MockClock::at(0), RecordingSink::new());
    engine.tick(&mut hw, &mut clock, &mut sink);

    // Same order as the device loop: poll sees the drop, then the tick runs.
    let wifi = engine.session_mut().transport_mut().link_mut();
    wifi.sim_drop_link();
    wifi.sim_fail_connects(2);
    wifi.poll(50);
    assert_eq!(wifi.state(), WifiState::Reconnecting { attempt: 0 });

    clock.now = 100;
    engine.tick(&mut hw, &mut clock, &mut sink);

    let transport = engine.session().transport();
    assert_eq!(transport.link().state(), WifiState::Connected);
    assert_eq!(transport.link().sim_connects(), 4);
    assert_eq!(clock.delays, vec![5_000, 5_000]);
    assert_eq!(transport.inner().connects(), 2);
    assert_eq!(transport.inner().subscriptions(), [ATTRIBUTES_TOPIC.to_owned()]);
    assert!(sink.events.contains(&SyncEvent::Connected { attempts: 3 }));
}
