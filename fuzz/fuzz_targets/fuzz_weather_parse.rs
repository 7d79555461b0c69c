//! Fuzz target: `parse_forecast` + `compose`
//!
//! Arbitrary response bodies go through the forecast parser; anything it
//! accepts is merged into a telemetry record, which must serialise without
//! panicking and always carry the electrical keys.
//!
//! cargo fuzz run fuzz_weather_parse

#![no_main]

use ctlink::app::telemetry::{compose, PowerReading, TelemetrySample, MAX_TELEMETRY_PAYLOAD};
use ctlink::app::weather::{parse_forecast, OBSERVATION_TIME_CAP};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(weather) = parse_forecast(data) else {
        return;
    };
    assert!(weather.valid, "parsed reading must be marked valid");
    assert!(weather.observation_time.len() <= OBSERVATION_TIME_CAP);

    let sample = TelemetrySample::new(PowerReading::default(), 0);
    let record = compose(&sample, &weather);
    if let Ok(payload) = record.to_payload() {
        assert!(payload.len() <= MAX_TELEMETRY_PAYLOAD);
        assert!(payload.starts_with(b"{\"output_current\":"));
    }
});
