//! Application core — domain logic, zero direct I/O.
//!
//! Relay command handling, weather caching, telemetry composition and the
//! broker session lifecycle, orchestrated by [`engine::SyncEngine`].  All
//! interaction with hardware and the network happens through **port
//! traits** defined in [`ports`], keeping this layer testable on the host.

pub mod broker;
pub mod commands;
pub mod engine;
pub mod events;
pub mod ports;
pub mod relay;
pub mod telemetry;
pub mod weather;
