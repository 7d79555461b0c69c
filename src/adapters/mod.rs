//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements             | Connects to              |
//! |--------------|------------------------|--------------------------|
//! | `hardware`   | SensorPort, RelayPort  | CT on ADC1, relay GPIO   |
//! | `log_sink`   | EventSink              | Serial log output        |
//! | `mqtt`       | BrokerTransport        | ESP-IDF MQTT client      |
//! | `open_meteo` | WeatherSource          | ESP-IDF HTTPS client     |
//! | `time`       | Clock                  | ESP32 system timer, TWDT |
//! | `wifi`       | —                      | ESP-IDF WiFi STA         |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod open_meteo;
pub mod time;
pub mod wifi;
