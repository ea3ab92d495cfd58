//! Irrigation controller service.
//!
//! Owns the device state, thresholds, pump command state and activity log for
//! one device, and runs the decode → evaluate → control cycle for every inbound
//! packet. The MQTT integration feeds it messages; the HTTP API reads it and
//! issues manual overrides.

use super::activity_log::{ActivityLog, LogEntry};
use super::clock::Clock;
use super::packet::{self, Packet, TopicKind};
use super::pump::{self, GateOutcome, PumpCommandState, PumpDecision, PumpSettings};
use super::state::DeviceState;
use super::thresholds::{self, ThresholdConfig};
use crate::config::Config;
use crate::error::Result;
use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Outbound side of the transport. Implementations must not block; a command
/// that cannot be sent right now is reported as an error and dropped.
pub trait CommandPublisher: Send + Sync {
    fn publish_command(&self, payload: &[u8]) -> Result<()>;
}

/// Everything one cycle reads and writes, kept under a single lock so API
/// requests never observe a half-finished cycle.
struct Core {
    device: DeviceState,
    thresholds: ThresholdConfig,
    pump: PumpCommandState,
}

/// What happened to a pump request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandOutcome {
    Sent,
    /// Accepted by the gate but the transport was unavailable.
    Dropped,
    Duplicate,
    Debounced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PumpRequestResult {
    pub on: bool,
    pub outcome: CommandOutcome,
}

pub struct Controller {
    data_topic: String,
    status_topic: String,
    settings: PumpSettings,
    core: Mutex<Core>,
    log: ActivityLog,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn CommandPublisher>,
}

impl Controller {
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn CommandPublisher>,
    ) -> Self {
        Self {
            data_topic: config.device.data_topic(),
            status_topic: config.device.status_topic(),
            settings: PumpSettings {
                debounce: config.control.debounce(),
                target_offset: config.control.target_offset,
            },
            core: Mutex::new(Core {
                device: DeviceState::default(),
                thresholds: config.thresholds,
                pump: PumpCommandState::default(),
            }),
            log: ActivityLog::new(config.control.log_capacity),
            clock,
            publisher,
        }
    }

    fn topic_kind(&self, topic: &str) -> TopicKind {
        if topic == self.data_topic {
            TopicKind::Data
        } else if topic == self.status_topic {
            TopicKind::Status
        } else {
            TopicKind::Other
        }
    }

    /// Route one inbound message by topic and exact length.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) {
        let now = self.clock.now();
        let mut core = self.core.lock();

        match Packet::classify(self.topic_kind(topic), payload) {
            Packet::Reading(reading) => {
                core.device.apply_reading(reading, now);
                self.log.push(
                    now,
                    format!(
                        "Sensor: T={:.1}°C H={:.1}% Soil={:.1}%",
                        reading.temperature, reading.humidity, reading.soil_moisture
                    ),
                );

                for alert in thresholds::evaluate(&reading, &core.thresholds) {
                    self.log.push(now, alert.to_string());
                }

                let decision = pump::decide(
                    &reading,
                    core.device.pump_on,
                    &core.thresholds,
                    &self.settings,
                    &core.pump,
                    now,
                );
                self.apply(&mut core, decision, now);
            }
            Packet::Status(status) => {
                core.device.apply_status(status);
                self.log.push(
                    now,
                    format!(
                        "Status: pump {}",
                        if status.pump_on { "ON" } else { "OFF" }
                    ),
                );
            }
            Packet::Unknown { len } => {
                warn!("[Control] Unknown packet on {} ({} bytes)", topic, len);
                self.log
                    .push(now, format!("Unknown packet on {} ({} bytes)", topic, len));
            }
        }
    }

    /// Manual override: the desired value is taken as given and only the
    /// debounce gate applies.
    pub fn request_pump(&self, on: bool) -> PumpRequestResult {
        let now = self.clock.now();
        let mut core = self.core.lock();

        self.log.push(
            now,
            format!("Manual pump request: {}", if on { "ON" } else { "OFF" }),
        );
        let decision = pump::gate(on, &self.settings, &core.pump, now);
        let outcome = self.apply(&mut core, decision, now);

        PumpRequestResult {
            on,
            outcome: outcome.unwrap_or(CommandOutcome::Duplicate),
        }
    }

    /// Store the decision, record its trace and hand any command to the
    /// transport. Returns the fate of the command if the gate was consulted.
    fn apply(
        &self,
        core: &mut Core,
        decision: PumpDecision,
        now: DateTime<Utc>,
    ) -> Option<CommandOutcome> {
        core.pump = decision.state;
        for message in decision.messages {
            self.log.push(now, message);
        }

        let outcome = match (decision.command, decision.outcome?) {
            (Some(command), _) => {
                let payload = packet::encode_pump_command(command.on);
                match self.publisher.publish_command(&payload) {
                    Ok(()) => {
                        self.log.push(now, format!("Pump → {}", command));
                        CommandOutcome::Sent
                    }
                    Err(e) => {
                        warn!("[Control] Pump command {} dropped: {}", command, e);
                        self.log
                            .push(now, format!("Pump → {} (dropped: {})", command, e));
                        CommandOutcome::Dropped
                    }
                }
            }
            (None, GateOutcome::Debounced { .. }) => CommandOutcome::Debounced,
            (None, _) => CommandOutcome::Duplicate,
        };
        Some(outcome)
    }

    /// Replace the thresholds wholesale.
    pub fn set_thresholds(&self, new: ThresholdConfig) -> Result<()> {
        new.validate()?;
        let now = self.clock.now();
        let mut core = self.core.lock();
        core.thresholds = new;
        self.log.push(now, "Thresholds updated");
        Ok(())
    }

    pub fn thresholds(&self) -> ThresholdConfig {
        self.core.lock().thresholds
    }

    pub fn device_state(&self) -> DeviceState {
        self.core.lock().device
    }

    pub fn pump_command_state(&self) -> PumpCommandState {
        self.core.lock().pump
    }

    pub fn activity(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    /// Record a transport-level event (connect, disconnect, errors).
    pub fn record_event(&self, message: impl Into<String>) {
        self.log.push(self.clock.now(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::clock::ManualClock;
    use crate::device::test_support::RecordingPublisher;
    use crate::error::BridgeError;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Harness {
        controller: Controller,
        clock: Arc<ManualClock>,
        publisher: Arc<RecordingPublisher>,
        data: String,
        status: String,
    }

    fn harness() -> Harness {
        let config = Config::default();
        let clock = Arc::new(ManualClock::new(t0()));
        let publisher = Arc::new(RecordingPublisher::default());
        Harness {
            controller: Controller::new(&config, clock.clone(), publisher.clone()),
            clock,
            publisher,
            data: config.device.data_topic(),
            status: config.device.status_topic(),
        }
    }

    fn sensor_packet(t: f32, h: f32, s: f32) -> [u8; 6] {
        packet::encode_reading(&packet::Reading {
            temperature: t,
            humidity: h,
            soil_moisture: s,
        })
    }

    fn messages(controller: &Controller) -> Vec<String> {
        controller
            .activity()
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn test_dry_cold_reading_turns_pump_on() {
        let h = harness();
        h.controller
            .handle_message(&h.data, &sensor_packet(15.0, 70.0, 25.0));

        let state = h.controller.device_state();
        assert_eq!(state.last_reading.temperature, 15.0);
        assert_eq!(state.last_reading.humidity, 70.0);
        assert_eq!(state.last_reading.soil_moisture, 25.0);
        assert_eq!(state.updated_at, Some(t0()));

        assert_eq!(h.publisher.sent(), vec![vec![2, 1]]);

        let log = messages(&h.controller);
        assert!(log.iter().any(|m| m == "ALERT: temperature 15.0 below minimum 18.0"));
        assert!(log.iter().any(|m| m.starts_with("ALERT: soil moisture 25.0 below")));
        assert!(!log.iter().any(|m| m.contains("humidity")));
        assert_eq!(log.last().unwrap(), "Pump → ON");
    }

    #[test]
    fn test_unknown_length_on_data_topic() {
        let h = harness();
        h.controller.handle_message(&h.data, &[1, 2, 3, 4]);

        assert_eq!(h.controller.device_state(), DeviceState::default());
        assert!(h.publisher.sent().is_empty());
        let log = messages(&h.controller);
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("Unknown packet"));
        assert!(log[0].contains("(4 bytes)"));
    }

    #[test]
    fn test_unknown_topic_is_ignored() {
        let h = harness();
        h.controller
            .handle_message("irrigation/other/data", &sensor_packet(20.0, 50.0, 10.0));
        assert_eq!(h.controller.device_state(), DeviceState::default());
        assert!(h.publisher.sent().is_empty());
        assert!(messages(&h.controller)[0].contains("(6 bytes)"));
    }

    #[test]
    fn test_status_packet_updates_pump_state_only() {
        let h = harness();
        h.controller.handle_message(&h.status, &[1]);
        assert!(h.controller.device_state().pump_on);
        assert_eq!(h.controller.device_state().updated_at, None);

        h.controller.handle_message(&h.status, &[7]);
        assert!(!h.controller.device_state().pump_on);
        assert_eq!(messages(&h.controller), vec!["Status: pump ON", "Status: pump OFF"]);
        assert!(h.publisher.sent().is_empty());
    }

    #[test]
    fn test_device_status_drives_target_rule() {
        let h = harness();
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 20.0));
        h.controller.handle_message(&h.status, &[1]);

        h.clock.advance(TimeDelta::seconds(30));
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 60.0));
        assert_eq!(
            messages(&h.controller).last().unwrap(),
            "Pumping: soil 60.0% until target 75.0%"
        );

        h.clock.advance(TimeDelta::seconds(30));
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 76.0));
        assert_eq!(h.publisher.sent(), vec![vec![2, 1], vec![2, 0]]);
        assert_eq!(messages(&h.controller).last().unwrap(), "Pump → OFF");
    }

    #[test]
    fn test_over_saturation_wins_before_debounce_window() {
        let h = harness();
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 20.0));

        h.clock.advance(TimeDelta::milliseconds(500));
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 85.0));

        // Second command falls inside the debounce window
        assert_eq!(h.publisher.sent(), vec![vec![2, 1]]);
        let log = messages(&h.controller);
        assert!(log.iter().any(|m| m.contains("above max 80.0%")));
        assert!(log.last().unwrap().contains("debounced (500ms"));

        h.clock.advance(TimeDelta::milliseconds(500));
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 85.0));
        assert_eq!(h.publisher.sent(), vec![vec![2, 1], vec![2, 0]]);
    }

    #[test]
    fn test_same_command_is_never_resent() {
        let h = harness();
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 20.0));
        h.clock.advance(TimeDelta::minutes(10));
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 20.0));

        assert_eq!(h.publisher.sent(), vec![vec![2, 1]]);
        assert!(messages(&h.controller).last().unwrap().contains("already commanded ON"));
    }

    #[test]
    fn test_manual_override_uses_gate_only() {
        let h = harness();
        let result = h.controller.request_pump(true);
        assert_eq!(result.outcome, CommandOutcome::Sent);

        let result = h.controller.request_pump(false);
        assert_eq!(result.outcome, CommandOutcome::Debounced);

        h.clock.advance(TimeDelta::seconds(2));
        assert_eq!(h.controller.request_pump(true).outcome, CommandOutcome::Duplicate);
        assert_eq!(h.controller.request_pump(false).outcome, CommandOutcome::Sent);

        assert_eq!(h.publisher.sent(), vec![vec![2, 1], vec![2, 0]]);
        assert_eq!(
            h.controller.pump_command_state().last_command_time,
            Some(t0() + TimeDelta::seconds(2))
        );
    }

    #[test]
    fn test_disconnected_transport_drops_command() {
        let h = harness();
        h.publisher.set_connected(false);

        let result = h.controller.request_pump(true);
        assert_eq!(result.outcome, CommandOutcome::Dropped);
        assert!(h.publisher.sent().is_empty());

        // The trace must not claim the command went out
        let log = messages(&h.controller);
        assert!(!log.iter().any(|m| m == "Pump → ON"));
        assert_eq!(
            log.last().unwrap(),
            "Pump → ON (dropped: MQTT not connected)"
        );
    }

    #[test]
    fn test_thresholds_replaced_wholesale() {
        let h = harness();
        let mut custom = ThresholdConfig::default();
        custom.soil_moisture.min = 10.0;
        tokio_test::assert_ok!(h.controller.set_thresholds(custom));
        assert_eq!(h.controller.thresholds(), custom);

        // 20% soil is now within range, so no command is sent
        h.controller
            .handle_message(&h.data, &sensor_packet(22.0, 60.0, 20.0));
        assert!(h.publisher.sent().is_empty());
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let h = harness();
        let mut bad = ThresholdConfig::default();
        bad.temperature.min = 50.0;
        let result = h.controller.set_thresholds(bad);
        assert!(matches!(result, Err(BridgeError::InvalidThresholds(_))));
        assert_eq!(h.controller.thresholds(), ThresholdConfig::default());
    }

    #[test]
    fn test_activity_log_is_bounded() {
        let mut config = Config::default();
        config.control.log_capacity = 4;
        let publisher = Arc::new(RecordingPublisher::default());
        let controller = Controller::new(&config, Arc::new(ManualClock::new(t0())), publisher);

        for _ in 0..10 {
            controller.handle_message(&config.device.status_topic(), &[0]);
        }
        assert_eq!(controller.activity().len(), 4);
    }

    #[test]
    fn test_huge_debounce_still_blocks_second_command() {
        let mut config = Config::default();
        config.control.debounce_ms = u64::MAX;
        let publisher = Arc::new(RecordingPublisher::default());
        let controller =
            Controller::new(&config, Arc::new(ManualClock::new(t0())), publisher.clone());

        assert_eq!(controller.request_pump(true).outcome, CommandOutcome::Sent);
        assert_eq!(controller.request_pump(false).outcome, CommandOutcome::Debounced);
        assert_eq!(publisher.sent(), vec![vec![2, 1]]);
    }

    #[test]
    fn test_instances_are_independent() {
        let a = harness();
        let b = harness();
        a.controller
            .handle_message(&a.data, &sensor_packet(22.0, 60.0, 20.0));
        assert_eq!(b.controller.device_state(), DeviceState::default());
        assert!(b.controller.activity().is_empty());
    }
}
