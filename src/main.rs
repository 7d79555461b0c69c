//! CTLink Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single cooperative tick loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter     MqttTransport     OpenMeteoClient         │
//! │  (Sensor+Relay)      (BrokerTransport) (WeatherSource)         │
//! │  SystemClock         LogEventSink      WifiLink                │
//! │  (Clock + TWDT)      (EventSink)       (NetworkLink)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SyncEngine (pure logic)                   │    │
//! │  │  BrokerSession · RelayState · WeatherCache · compose   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use ctlink::adapters::hardware::HardwareAdapter;
use ctlink::adapters::log_sink::LogEventSink;
use ctlink::adapters::mqtt::MqttTransport;
use ctlink::adapters::open_meteo::OpenMeteoClient;
use ctlink::adapters::time::SystemClock;
use ctlink::adapters::wifi::WifiLink;
use ctlink::app::broker::LinkedTransport;
use ctlink::app::engine::SyncEngine;
use ctlink::app::ports::Clock;
use ctlink::config::SyncConfig;
use ctlink::drivers::relay::RelayDriver;
use ctlink::drivers::watchdog::{self, Watchdog};
use ctlink::pins;
use ctlink::sensors::ct::CtSensor;
use ctlink::sensors::PowerMeter;

// Credentials are baked in at build time; provisioning is out of scope.
const WIFI_SSID: &str = match option_env!("CTLINK_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASS: &str = match option_env!("CTLINK_WIFI_PASS") {
    Some(s) => s,
    None => "",
};
const ACCESS_TOKEN: &str = match option_env!("CTLINK_ACCESS_TOKEN") {
    Some(s) => s,
    None => "",
};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CTLink v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = SyncConfig {
        access_token: ACCESS_TOKEN.into(),
        ..SyncConfig::default()
    };
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("invalid configuration")?;
    if config.access_token.is_empty() {
        warn!("No broker access token configured; the broker will refuse the session");
    }

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    if let Err(e) = ctlink::drivers::hw_init::init_peripherals() {
        // Without the ADC there is nothing to report; halt and let the
        // watchdog reset us.
        error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    let relay_pin = PinDriver::output(peripherals.pins.gpio5)?;
    let relay = RelayDriver::new(relay_pin, pins::RELAY_ACTIVE_LOW)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let meter = PowerMeter::new(
        CtSensor::new(pins::CT_ADC_GPIO).with_calibration(config.ct_calibration),
        config.nominal_voltage_v,
        config.power_factor,
    );
    let mut hw = HardwareAdapter::new(meter, relay);

    let mut clock = SystemClock::new().with_watchdog(Watchdog::new(watchdog::DEFAULT_TIMEOUT_MS));

    // ── 4. Network link ───────────────────────────────────────
    let mut wifi = WifiLink::new(peripherals.modem, sysloop, Some(nvs))?;
    wifi.set_credentials(WIFI_SSID, WIFI_PASS)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    while let Err(e) = wifi.connect() {
        warn!("WiFi: {} — retrying in {} ms", e, config.reconnect_backoff_ms);
        clock.delay_ms(config.reconnect_backoff_ms);
    }

    // ── 5. Engine ─────────────────────────────────────────────
    // The station link rides under the broker transport so a dropped link
    // is restored by the session retry loop.
    let transport = LinkedTransport::new(MqttTransport::new(config.broker_url()), wifi);
    let weather = OpenMeteoClient::new(&config);
    let loop_interval = Duration::from_millis(u64::from(config.loop_interval_ms));
    let mut sink = LogEventSink::new();
    let mut engine = SyncEngine::new(config, transport, weather);

    if let Err(e) = engine.start(&mut hw, &mut clock, &mut sink) {
        error!("Relay init failed: {} — continuing, commands will retry the GPIO", e);
    }

    info!("System ready. Entering tick loop.");

    // ── 6. Tick loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();
        engine.session_mut().transport_mut().link_mut().poll(now);
        engine.tick(&mut hw, &mut clock, &mut sink);
        clock.feed_watchdog();
        std::thread::sleep(loop_interval);
    }
}
