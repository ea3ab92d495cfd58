//! Binary packet codec for the irrigation device.
//!
//! Sensor packets are 6 bytes: temperature, humidity and soil moisture as
//! little-endian signed 16-bit integers in tenths (e.g. 215 = 21.5).
//! Status packets are a single byte, `1` meaning the pump is running.
//! Commands are 2 bytes: a command tag followed by the value.

use serde::{Deserialize, Serialize};

/// Length of a sensor packet on the data topic.
pub const READING_LEN: usize = 6;

/// Length of an actuator status packet on the status topic.
pub const STATUS_LEN: usize = 1;

/// Command tag identifying a pump command.
pub const PUMP_COMMAND_TAG: u8 = 2;

/// One decoded sensor sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Air temperature (°C)
    pub temperature: f32,
    /// Relative humidity (%)
    pub humidity: f32,
    /// Soil moisture (%)
    pub soil_moisture: f32,
}

/// Actuator state as reported by the device itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorState {
    pub pump_on: bool,
}

/// Which inbound topic a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Data,
    Status,
    Other,
}

/// An inbound payload classified by topic and exact length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Reading(Reading),
    Status(ActuatorState),
    Unknown { len: usize },
}

impl Packet {
    /// Classify a payload. Anything that is not exactly a 6-byte data packet
    /// or a 1-byte status packet is `Unknown`.
    pub fn classify(kind: TopicKind, payload: &[u8]) -> Self {
        match kind {
            TopicKind::Data => match <&[u8; READING_LEN]>::try_from(payload) {
                Ok(bytes) => Packet::Reading(decode_reading(bytes)),
                Err(_) => Packet::Unknown { len: payload.len() },
            },
            TopicKind::Status => match <&[u8; STATUS_LEN]>::try_from(payload) {
                Ok(bytes) => Packet::Status(decode_actuator_status(bytes)),
                Err(_) => Packet::Unknown { len: payload.len() },
            },
            TopicKind::Other => Packet::Unknown { len: payload.len() },
        }
    }
}

fn decode_tenths(lo: u8, hi: u8) -> f32 {
    i16::from_le_bytes([lo, hi]) as f32 / 10.0
}

fn encode_tenths(value: f32) -> [u8; 2] {
    let raw = (value * 10.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    raw.to_le_bytes()
}

/// Decode a 6-byte sensor packet.
pub fn decode_reading(bytes: &[u8; READING_LEN]) -> Reading {
    Reading {
        temperature: decode_tenths(bytes[0], bytes[1]),
        humidity: decode_tenths(bytes[2], bytes[3]),
        soil_moisture: decode_tenths(bytes[4], bytes[5]),
    }
}

/// Decode a 1-byte status packet. Only `1` means on.
pub fn decode_actuator_status(bytes: &[u8; STATUS_LEN]) -> ActuatorState {
    ActuatorState {
        pump_on: bytes[0] == 1,
    }
}

/// Encode a pump command as `[PUMP_COMMAND_TAG, 0|1]`.
pub fn encode_pump_command(on: bool) -> [u8; 2] {
    [PUMP_COMMAND_TAG, u8::from(on)]
}

/// Decode a command packet back into its pump value, as the device does.
pub fn decode_pump_command(bytes: &[u8]) -> Option<bool> {
    match bytes {
        [PUMP_COMMAND_TAG, value] => Some(*value == 1),
        _ => None,
    }
}

/// Device-side encoding of a sensor packet.
pub fn encode_reading(reading: &Reading) -> [u8; READING_LEN] {
    let t = encode_tenths(reading.temperature);
    let h = encode_tenths(reading.humidity);
    let s = encode_tenths(reading.soil_moisture);
    [t[0], t[1], h[0], h[1], s[0], s[1]]
}

/// Device-side encoding of a status packet.
pub fn encode_actuator_status(state: &ActuatorState) -> [u8; STATUS_LEN] {
    [u8::from(state.pump_on)]
}
