//! Last-known device state.

use super::packet::{ActuatorState, Reading};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Last reading and pump state reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(flatten)]
    pub last_reading: Reading,
    pub pump_on: bool,
    /// Time of the last accepted sensor packet.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceState {
    /// Replace the whole reading at once.
    pub fn apply_reading(&mut self, reading: Reading, at: DateTime<Utc>) {
        self.last_reading = reading;
        self.updated_at = Some(at);
    }

    pub fn apply_status(&mut self, status: ActuatorState) {
        self.pump_on = status.pump_on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_flat_for_clients() {
        let mut state = DeviceState::default();
        state.apply_reading(
            Reading {
                temperature: 21.5,
                humidity: 55.0,
                soil_moisture: 40.0,
            },
            DateTime::from_timestamp(0, 0).unwrap(),
        );
        state.apply_status(ActuatorState { pump_on: true });

        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["temperature"], 21.5);
        assert_eq!(json["humidity"], 55.0);
        assert_eq!(json["soilMoisture"], 40.0);
        assert_eq!(json["pumpOn"], true);
        assert!(json["updatedAt"].is_string());
    }
}
