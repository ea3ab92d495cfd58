use clap::Parser;
use irrigation_bridge::api;
use irrigation_bridge::config::{self, Config};
use irrigation_bridge::device::{Controller, SystemClock};
use irrigation_bridge::input::mqtt::{MqttClient, MqttIntegration};
use log::{error, info};
use std::sync::Arc;
use tokio::signal;

/// MQTT bridge and pump controller for a remote irrigation device.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Device identifier used to build topic names
    #[arg(long, env = "DEVICE_ID")]
    device_id: Option<String>,

    /// MQTT broker host
    #[arg(long, env = "MQTT_BROKER_HOST")]
    broker_host: Option<String>,

    /// MQTT broker port
    #[arg(long, env = "MQTT_BROKER_PORT")]
    broker_port: Option<u16>,

    /// HTTP API bind address
    #[arg(long, env = "API_BIND")]
    bind: Option<String>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();
    init_logger();
    info!("Starting Irrigation Bridge");

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let args = Args::parse();
    if let Some(device_id) = args.device_id {
        config.device.device_id = device_id;
    }
    if let Some(host) = args.broker_host {
        config.mqtt.broker_host = host;
    }
    if let Some(port) = args.broker_port {
        config.mqtt.broker_port = port;
    }
    if let Some(bind) = args.bind {
        config.api.bind_address = bind;
    }

    info!("Configuration loaded:");
    info!("  Device ID: {}", config.device.device_id);
    info!(
        "  MQTT broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Data topic: {}", config.device.data_topic());
    info!("  Status topic: {}", config.device.status_topic());
    info!("  Command topic: {}", config.device.command_topic());
    info!("  API: {}", config.api.bind_address);

    let mqtt_client = MqttClient::new(&config.mqtt);
    let publisher = mqtt_client.command_publisher(config.device.command_topic());
    let controller = Arc::new(Controller::new(
        &config,
        Arc::new(SystemClock),
        Arc::new(publisher),
    ));

    let mqtt_task =
        MqttIntegration::new(mqtt_client, config.device.clone(), controller.clone()).start();

    let bind_address = config.api.bind_address.clone();
    let api_controller = controller.clone();
    let mut api_task =
        tokio::spawn(async move { api::serve(&bind_address, api_controller).await });

    info!("Irrigation Bridge is running, press Ctrl+C to exit");

    let exit_code = tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            0
        }
        result = &mut api_task => {
            match result {
                Ok(Ok(())) => {
                    error!("HTTP API stopped unexpectedly");
                }
                Ok(Err(e)) => error!("HTTP API failed: {}", e),
                Err(e) => error!("HTTP API task panicked: {}", e),
            }
            1
        }
    };

    mqtt_task.abort();
    api_task.abort();

    info!("Irrigation Bridge stopped");
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
