//! Irrigation bridge library.
//!
//! Bridges a remote sensor/pump device on MQTT to HTTP clients: decodes the
//! device's binary packets, tracks its last-known state, raises threshold
//! alerts and drives the pump through a debounced control loop.

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
