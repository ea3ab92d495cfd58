use crate::device::thresholds::ThresholdConfig;
use crate::error::{BridgeError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split `.env` content into key/value pairs, skipping blanks and comments.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub device: DeviceConfig,
    pub api: ApiConfig,
    pub control: ControlConfig,
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Identity of the remote device; topic names derive from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub topic_prefix: String,
}

impl DeviceConfig {
    /// Topic carrying 6-byte sensor packets.
    pub fn data_topic(&self) -> String {
        format!("{}/{}/data", self.topic_prefix, self.device_id)
    }

    /// Topic carrying 1-byte actuator status packets.
    pub fn status_topic(&self) -> String {
        format!("{}/{}/status", self.topic_prefix, self.device_id)
    }

    /// Topic the bridge publishes pump commands to.
    pub fn command_topic(&self) -> String {
        format!("{}/{}/command", self.topic_prefix, self.device_id)
    }

    /// All topics the bridge subscribes to.
    pub fn subscribe_topics(&self) -> Vec<String> {
        vec![self.data_topic(), self.status_topic()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Minimum time between two accepted pump commands.
    pub debounce_ms: u64,
    /// Distance below `soil_moisture.max` at which a running pump is stopped.
    pub target_offset: f32,
    pub log_capacity: usize,
}

impl ControlConfig {
    /// Check that `debounce_ms` fits a [`TimeDelta`].
    pub fn validate(&self) -> Result<()> {
        i64::try_from(self.debounce_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .map(|_| ())
            .ok_or_else(|| BridgeError::InvalidConfig {
                key: "PUMP_DEBOUNCE_MS".to_string(),
                value: self.debounce_ms.to_string(),
            })
    }

    /// Debounce interval, saturating at [`TimeDelta::MAX`] for values that
    /// do not fit.
    pub fn debounce(&self) -> TimeDelta {
        i64::try_from(self.debounce_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "irrigation-bridge".to_string(),
                username: None,
                password: None,
            },
            device: DeviceConfig {
                device_id: "garden-01".to_string(),
                topic_prefix: "irrigation".to_string(),
            },
            api: ApiConfig {
                bind_address: "0.0.0.0:8080".to_string(),
            },
            control: ControlConfig {
                debounce_ms: 1000,
                target_offset: 5.0,
                log_capacity: 100,
            },
            thresholds: ThresholdConfig::default(),
        }
    }
}

/// Parse an optional environment variable, failing loudly on malformed values.
fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BridgeError::InvalidConfig {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // MQTT configuration
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = env_parsed("MQTT_BROKER_PORT")? {
            config.mqtt.broker_port = port;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Device identity
        if let Ok(device_id) = std::env::var("DEVICE_ID") {
            config.device.device_id = device_id;
        }
        if let Ok(prefix) = std::env::var("TOPIC_PREFIX") {
            config.device.topic_prefix = prefix;
        }

        if let Ok(bind) = std::env::var("API_BIND") {
            config.api.bind_address = bind;
        }

        // Pump control tuning
        if let Some(debounce) = env_parsed("PUMP_DEBOUNCE_MS")? {
            config.control.debounce_ms = debounce;
        }
        if let Some(offset) = env_parsed("PUMP_TARGET_OFFSET")? {
            config.control.target_offset = offset;
        }
        if let Some(capacity) = env_parsed("ACTIVITY_LOG_CAPACITY")? {
            config.control.log_capacity = capacity;
        }
        config.control.validate()?;

        Ok(config)
    }
}
