//! Sync engine — the hexagonal core.
//!
//! [`SyncEngine`] owns the broker session, relay state and weather cache and
//! advances them one [`tick`](SyncEngine::tick) at a time.  All I/O flows
//! through port traits injected at call sites.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │        SyncEngine         │
//!    RelayPort ◀──▶│ Session · Relay · Weather │◀──▶ BrokerTransport
//!                  └──────────────────────────┘ ◀── WeatherSource
//! ```
//!
//! Per tick, in order:
//!
//! 1. ensure the broker session is up (may block with backoff)
//! 2. drain inbound commands onto the relay
//! 3. optionally acknowledge a relay change immediately
//! 4. every telemetry interval: sample, merge weather, publish telemetry,
//!    then report the relay attribute if it is still pending

use log::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::ActuatorError;

use super::broker::BrokerSession;
use super::commands::RelayCommand;
use super::events::SyncEvent;
use super::ports::{BrokerTransport, Clock, EventSink, RelayPort, SensorPort, WeatherSource};
use super::relay::{RelayState, ReportOutcome};
use super::telemetry::{self, TelemetrySample};
use super::weather::WeatherCache;

pub struct SyncEngine<T: BrokerTransport, W: WeatherSource> {
    config: SyncConfig,
    session: BrokerSession<T>,
    relay: RelayState,
    weather: WeatherCache<W>,
    /// `None` until the first telemetry cycle, which runs immediately.
    last_telemetry_ms: Option<u64>,
}

impl<T: BrokerTransport, W: WeatherSource> SyncEngine<T, W> {
    /// Construct the engine.  Nothing is connected or driven until
    /// [`start`](Self::start).
    pub fn new(config: SyncConfig, transport: T, source: W) -> Self {
        let session = BrokerSession::new(transport, &config);
        let weather = WeatherCache::new(source, config.weather_fetch_interval_ms);
        Self {
            config,
            session,
            relay: RelayState::new(),
            weather,
            last_telemetry_ms: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive the relay to OFF and prime the weather cache.
    pub fn start(
        &mut self,
        hw: &mut impl RelayPort,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<(), ActuatorError> {
        self.relay.init(hw, false)?;
        let now = clock.now_ms();
        let primed = self.weather.get_fresh(now, true).valid;
        info!("SyncEngine started (relay OFF, weather primed: {})", primed);
        sink.emit(&SyncEvent::Started { relay_on: false });
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle of the main loop.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`RelayPort`], avoiding a
    /// double mutable borrow of the board adapter.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + RelayPort),
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) {
        // 1. Session
        if let Some(attempts) = self.session.ensure_connected(clock) {
            sink.emit(&SyncEvent::Connected { attempts });
        }

        // 2. Inbound commands
        self.drain_commands(hw, sink);

        // 3. Immediate acknowledgement
        if self.config.ack_on_command {
            self.report_relay(sink);
        }

        // 4. Periodic telemetry
        let now = clock.now_ms();
        if self.telemetry_due(now) {
            self.publish_telemetry(hw, now, sink);
            self.report_relay(sink);
            self.last_telemetry_ms = Some(now);
        }
    }

    fn drain_commands(&mut self, hw: &mut impl RelayPort, sink: &mut impl EventSink) {
        let Self { session, relay, .. } = self;
        session.poll_inbound(|payload| match RelayCommand::parse(payload) {
            Ok(cmd) => match relay.apply_command(cmd, &mut *hw) {
                Ok(_) => sink.emit(&SyncEvent::CommandApplied { state: cmd.state }),
                Err(e) => {
                    warn!("Relay: command state={} not applied ({})", cmd.state, e);
                    sink.emit(&SyncEvent::CommandFailed(e));
                }
            },
            Err(e) => {
                debug!("Command ignored: {}", e);
                sink.emit(&SyncEvent::CommandIgnored(e));
            }
        });
    }

    fn telemetry_due(&self, now: u64) -> bool {
        match self.last_telemetry_ms {
            None => true,
            Some(last) => {
                now.saturating_sub(last) >= u64::from(self.config.telemetry_interval_ms)
            }
        }
    }

    fn publish_telemetry(&mut self, hw: &mut impl SensorPort, now: u64, sink: &mut impl EventSink) {
        let sample = TelemetrySample::new(hw.read_power(), now);
        let weather = self.weather.get_fresh(now, false);
        let record = telemetry::compose(&sample, weather);

        let result = record
            .to_payload()
            .and_then(|payload| {
                self.session
                    .publish(&self.config.telemetry_topic, &payload)
                    .map(|()| payload.len())
            });

        match result {
            Ok(bytes) => {
                debug!("Telemetry: {} bytes published", bytes);
                sink.emit(&SyncEvent::TelemetryPublished { bytes });
            }
            Err(e) => {
                warn!("Telemetry: dropped this cycle ({})", e);
                sink.emit(&SyncEvent::TelemetryDropped(e));
            }
        }
    }

    fn report_relay(&mut self, sink: &mut impl EventSink) {
        match self.relay.publish_if_changed(&mut self.session) {
            ReportOutcome::Clean => {}
            ReportOutcome::Reported(state) => sink.emit(&SyncEvent::RelayReported { state }),
            ReportOutcome::Deferred(e) => sink.emit(&SyncEvent::RelayReportDeferred(e)),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn session(&self) -> &BrokerSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BrokerSession<T> {
        &mut self.session
    }

    pub fn relay(&self) -> &RelayState {
        &self.relay
    }

    pub fn weather(&self) -> &WeatherCache<W> {
        &self.weather
    }

    pub fn last_telemetry_ms(&self) -> Option<u64> {
        self.last_telemetry_ms
    }
}
