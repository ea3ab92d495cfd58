//! Debounced auto-pump control.
//!
//! The decision logic is pure: it takes the latest reading, the actuator state
//! reported by the device, the thresholds and the current command state, and
//! returns the new command state, an optional command and the log trace.
//! Publishing and logging are left to the caller.

use super::packet::Reading;
use super::thresholds::ThresholdConfig;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

/// Tuning that is fixed for the lifetime of a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpSettings {
    /// Minimum time between two accepted commands.
    pub debounce: TimeDelta,
    /// A running pump stops once soil moisture reaches `max - target_offset`.
    pub target_offset: f32,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            debounce: TimeDelta::milliseconds(1000),
            target_offset: 5.0,
        }
    }
}

/// What the controller last asked the device to do. This is only a request;
/// the device's status packet is the truth about the pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpCommandState {
    pub last_commanded_on: Option<bool>,
    pub last_command_time: Option<DateTime<Utc>>,
}

/// A pump command accepted by the debounce gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpCommand {
    pub on: bool,
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.on { "ON" } else { "OFF" })
    }
}

/// Result of passing a desired value through the debounce gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Accepted,
    /// Same value as the last accepted command.
    Duplicate,
    /// Too soon after the last accepted command.
    Debounced { elapsed: TimeDelta },
}

/// Output of one controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpDecision {
    pub state: PumpCommandState,
    pub command: Option<PumpCommand>,
    pub outcome: Option<GateOutcome>,
    pub messages: Vec<String>,
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// Apply only the debounce gate to a desired pump value. An accepted command
/// carries no message; the caller records it once the command is handed off.
pub fn gate(
    desired: bool,
    settings: &PumpSettings,
    state: &PumpCommandState,
    now: DateTime<Utc>,
) -> PumpDecision {
    if state.last_commanded_on == Some(desired) {
        return PumpDecision {
            state: *state,
            command: None,
            outcome: Some(GateOutcome::Duplicate),
            messages: vec![format!("Pump already commanded {}, skipping", on_off(desired))],
        };
    }

    if let Some(last) = state.last_command_time {
        let elapsed = now - last;
        if elapsed < settings.debounce {
            return PumpDecision {
                state: *state,
                command: None,
                outcome: Some(GateOutcome::Debounced { elapsed }),
                messages: vec![format!(
                    "Pump {} debounced ({}ms since last command)",
                    on_off(desired),
                    elapsed.num_milliseconds()
                )],
            };
        }
    }

    PumpDecision {
        state: PumpCommandState {
            last_commanded_on: Some(desired),
            last_command_time: Some(now),
        },
        command: Some(PumpCommand { on: desired }),
        outcome: Some(GateOutcome::Accepted),
        messages: Vec::new(),
    }
}

/// Run the control rules for a fresh reading. First matching rule wins.
pub fn decide(
    reading: &Reading,
    actuator_is_on: bool,
    thresholds: &ThresholdConfig,
    settings: &PumpSettings,
    state: &PumpCommandState,
    now: DateTime<Utc>,
) -> PumpDecision {
    let soil = reading.soil_moisture;
    let band = thresholds.soil_moisture;

    let (desired, reason) = if soil > band.max {
        (
            false,
            format!("Soil {:.1}% above max {:.1}%, stopping pump", soil, band.max),
        )
    } else if soil < band.min {
        (
            true,
            format!("Soil {:.1}% below min {:.1}%, starting pump", soil, band.min),
        )
    } else if actuator_is_on {
        let target = band.max - settings.target_offset;
        if soil >= target {
            (
                false,
                format!("Soil {:.1}% reached target {:.1}%, stopping pump", soil, target),
            )
        } else {
            return PumpDecision {
                state: *state,
                command: None,
                outcome: None,
                messages: vec![format!(
                    "Pumping: soil {:.1}% until target {:.1}%",
                    soil, target
                )],
            };
        }
    } else {
        return PumpDecision {
            state: *state,
            command: None,
            outcome: None,
            messages: vec![format!("Soil {:.1}% within range, pump idle", soil)],
        };
    };

    let mut decision = gate(desired, settings, state, now);
    decision.messages.insert(0, reason);
    decision
}
