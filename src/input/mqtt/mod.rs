//! MQTT transport for the irrigation device.
//!
//! Receives sensor and status packets, publishes pump commands.

mod client;
mod integration;

pub use client::{MqttClient, MqttCommandPublisher, MqttEvent, MqttMessage};
pub use integration::MqttIntegration;
