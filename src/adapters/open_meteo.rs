//! Open-Meteo weather source.
//!
//! Implements [`WeatherSource`]: one HTTPS GET of the forecast endpoint's
//! `current=` block per fetch, parsed by
//! [`parse_forecast`](crate::app::weather::parse_forecast).
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` wrapped in the
//!   `embedded-svc` HTTP client, certificates from the IDF bundle.
//! - **all other targets**: serves a canned response body, or a scripted
//!   error, for host tests.

use log::debug;

use crate::app::ports::WeatherSource;
use crate::app::weather::{build_query_url, parse_forecast, WeatherReading};
use crate::config::SyncConfig;
use crate::error::FetchError;

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::Read,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use log::warn;

/// Largest response body accepted.  The `current=` block is well under this.
pub const MAX_BODY_BYTES: usize = 2048;

#[cfg(target_os = "espidf")]
const HTTP_TIMEOUT_MS: u64 = 10_000;

pub struct OpenMeteoClient {
    url: String,
    #[cfg(not(target_os = "espidf"))]
    canned: Result<Vec<u8>, FetchError>,
}

impl OpenMeteoClient {
    pub fn new(config: &SyncConfig) -> Self {
        Self::with_url(build_query_url(
            &config.weather_base_url,
            config.latitude,
            config.longitude,
        ))
    }

    pub fn with_url(url: String) -> Self {
        Self {
            url,
            #[cfg(not(target_os = "espidf"))]
            canned: Err(FetchError::Transport),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Simulation: body returned by the next fetches.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_respond(&mut self, body: &[u8]) {
        self.canned = Ok(body.to_vec());
    }

    /// Simulation: error returned by the next fetches.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail(&mut self, err: FetchError) {
        self.canned = Err(err);
    }

    #[cfg(target_os = "espidf")]
    fn get(&self) -> Result<heapless::Vec<u8, MAX_BODY_BYTES>, FetchError> {
        let conf = HttpClientConfiguration {
            timeout: Some(std::time::Duration::from_millis(HTTP_TIMEOUT_MS)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let conn = EspHttpConnection::new(&conf).map_err(|e| {
            warn!("Weather: HTTP init failed ({})", e);
            FetchError::Transport
        })?;
        let mut client = HttpClient::wrap(conn);

        let request = client
            .request(Method::Get, &self.url, &[("accept", "application/json")])
            .map_err(|_| FetchError::Transport)?;
        let mut response = request.submit().map_err(|_| FetchError::Transport)?;

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(FetchError::Status(status));
        }

        let mut body = heapless::Vec::<u8, MAX_BODY_BYTES>::new();
        let mut chunk = [0_u8; 256];
        loop {
            let n = response.read(&mut chunk).map_err(|_| FetchError::Transport)?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n])
                .map_err(|_| FetchError::BodyTooLarge)?;
        }
        Ok(body)
    }

    #[cfg(not(target_os = "espidf"))]
    fn get(&self) -> Result<Vec<u8>, FetchError> {
        let body = self.canned.clone()?;
        if body.len() > MAX_BODY_BYTES {
            return Err(FetchError::BodyTooLarge);
        }
        Ok(body)
    }
}

impl WeatherSource for OpenMeteoClient {
    fn fetch(&mut self) -> Result<WeatherReading, FetchError> {
        debug!("Weather: GET {}", self.url);
        let body = self.get()?;
        parse_forecast(&body)
    }
}
