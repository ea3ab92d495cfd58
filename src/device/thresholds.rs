//! Threshold configuration and alert evaluation.

use super::packet::Reading;
use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive valid range for one measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }
}

/// Alert bounds for every measured quantity. Replaced wholesale, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub temperature: Range,
    pub humidity: Range,
    pub soil_moisture: Range,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature: Range::new(18.0, 30.0),
            humidity: Range::new(40.0, 80.0),
            soil_moisture: Range::new(30.0, 80.0),
        }
    }
}

impl ThresholdConfig {
    /// Reject non-finite bounds and inverted ranges.
    pub fn validate(&self) -> Result<()> {
        for (quantity, range) in [
            (Quantity::Temperature, self.temperature),
            (Quantity::Humidity, self.humidity),
            (Quantity::SoilMoisture, self.soil_moisture),
        ] {
            if !range.min.is_finite() || !range.max.is_finite() {
                return Err(BridgeError::InvalidThresholds(format!(
                    "{} bounds must be finite",
                    quantity
                )));
            }
            if range.min > range.max {
                return Err(BridgeError::InvalidThresholds(format!(
                    "{} min {} is greater than max {}",
                    quantity, range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Temperature,
    Humidity,
    SoilMoisture,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::SoilMoisture => "soil moisture",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Below,
    Above,
}

/// A reading crossed one configured bound. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub quantity: Quantity,
    pub bound: Bound,
    pub value: f32,
    pub limit: f32,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Bound::Below => write!(
                f,
                "ALERT: {} {:.1} below minimum {:.1}",
                self.quantity, self.value, self.limit
            ),
            Bound::Above => write!(
                f,
                "ALERT: {} {:.1} above maximum {:.1}",
                self.quantity, self.value, self.limit
            ),
        }
    }
}

/// Check every quantity against its range. Values equal to a bound are valid.
pub fn evaluate(reading: &Reading, config: &ThresholdConfig) -> Vec<Alert> {
    let checks = [
        (Quantity::Temperature, reading.temperature, config.temperature),
        (Quantity::Humidity, reading.humidity, config.humidity),
        (Quantity::SoilMoisture, reading.soil_moisture, config.soil_moisture),
    ];

    let mut alerts = Vec::new();
    for (quantity, value, range) in checks {
        if value < range.min {
            alerts.push(Alert {
                quantity,
                bound: Bound::Below,
                value,
                limit: range.min,
            });
        }
        if value > range.max {
            alerts.push(Alert {
                quantity,
                bound: Bound::Above,
                value,
                limit: range.max,
            });
        }
    }
    alerts
}
