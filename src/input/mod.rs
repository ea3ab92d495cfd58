//! Input sources for the bridge.
//!
//! - `mqtt`: binary device packets over MQTT

pub mod mqtt;
