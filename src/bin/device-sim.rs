//! Simulated irrigation device for development.
//!
//! Usage:
//!   cargo run --bin device-sim
//!
//! Connects to the MQTT broker as the remote device: publishes a sensor packet
//! on the data topic every interval and answers pump commands with a status
//! packet, letting soil moisture rise while the pump runs and fall otherwise.

use clap::Parser;
use irrigation_bridge::config::{self, Config};
use irrigation_bridge::device::packet::{
    ActuatorState, Reading, decode_pump_command, encode_actuator_status, encode_reading,
};
use log::{info, warn};
use rand::Rng;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(about = "Simulated irrigation device")]
struct Args {
    /// Device identifier used to build topic names
    #[arg(long, env = "DEVICE_ID")]
    device_id: Option<String>,

    /// Seconds between sensor packets
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Initial soil moisture (%)
    #[arg(long, default_value_t = 35.0)]
    soil: f32,
}

/// Simple soil model: the pump wets the soil, evaporation dries it.
struct SoilModel {
    reading: Reading,
    pump_on: bool,
}

impl SoilModel {
    const WET_RATE: f32 = 4.0;
    const DRY_RATE: f32 = 1.5;

    fn new(soil: f32) -> Self {
        Self {
            reading: Reading {
                temperature: 22.0,
                humidity: 60.0,
                soil_moisture: soil,
            },
            pump_on: false,
        }
    }

    /// Advance one interval. `jitter` is added to temperature and humidity.
    fn step(&mut self, jitter: f32) -> Reading {
        let delta = if self.pump_on {
            Self::WET_RATE
        } else {
            -Self::DRY_RATE
        };
        self.reading.soil_moisture = (self.reading.soil_moisture + delta).clamp(0.0, 100.0);
        self.reading.temperature = (self.reading.temperature + jitter).clamp(-20.0, 50.0);
        self.reading.humidity = (self.reading.humidity + jitter * 2.0).clamp(0.0, 100.0);
        self.reading
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();

    let args = Args::parse();
    let mut config = Config::from_env().unwrap_or_else(|e| {
        warn!("Ignoring invalid configuration: {}", e);
        Config::default()
    });
    if let Some(device_id) = args.device_id {
        config.device.device_id = device_id;
    }

    info!(
        "Simulating device {} on {}:{}",
        config.device.device_id, config.mqtt.broker_host, config.mqtt.broker_port
    );

    let mut options = MqttOptions::new(
        format!("{}-sim", config.device.device_id),
        &config.mqtt.broker_host,
        config.mqtt.broker_port,
    );
    options.set_keep_alive(Duration::from_secs(30));
    if let (Some(username), Some(password)) = (&config.mqtt.username, &config.mqtt.password) {
        options.set_credentials(username, password);
    }
    let (client, mut event_loop) = AsyncClient::new(options, 20);

    let data_topic = config.device.data_topic();
    let status_topic = config.device.status_topic();
    let command_topic = config.device.command_topic();

    let mut model = SoilModel::new(args.soil);
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let jitter = rand::thread_rng().gen_range(-0.3..=0.3);
                let reading = model.step(jitter);
                info!(
                    "[Sim] T={:.1}°C H={:.1}% Soil={:.1}% pump={}",
                    reading.temperature, reading.humidity, reading.soil_moisture, model.pump_on
                );
                if let Err(e) = client
                    .publish(&data_topic, QoS::AtMostOnce, false, encode_reading(&reading).to_vec())
                    .await
                {
                    warn!("[Sim] Failed to publish reading: {}", e);
                }
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[Sim] Connected, subscribing to {}", command_topic);
                    if let Err(e) = client.subscribe(&command_topic, QoS::AtMostOnce).await {
                        warn!("[Sim] Failed to subscribe: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == command_topic => {
                    let Some(on) = decode_pump_command(&publish.payload) else {
                        warn!("[Sim] Ignoring malformed command {:?}", publish.payload);
                        continue;
                    };
                    model.pump_on = on;
                    info!("[Sim] Pump {}", if on { "ON" } else { "OFF" });
                    let status = encode_actuator_status(&ActuatorState { pump_on: on });
                    if let Err(e) = client
                        .publish(&status_topic, QoS::AtMostOnce, false, status.to_vec())
                        .await
                    {
                        warn!("[Sim] Failed to publish status: {}", e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[Sim] MQTT error: {}", e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soil_dries_while_pump_off() {
        let mut model = SoilModel::new(35.0);
        let reading = model.step(0.0);
        assert_eq!(reading.soil_moisture, 33.5);
    }

    #[test]
    fn test_soil_rises_while_pump_on() {
        let mut model = SoilModel::new(98.0);
        model.pump_on = true;
        assert_eq!(model.step(0.0).soil_moisture, 100.0);
    }
}
