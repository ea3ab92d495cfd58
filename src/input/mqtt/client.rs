//! MQTT client wrapper for device communication.

use crate::config::MqttConfig;
use crate::device::CommandPublisher;
use crate::error::{BridgeError, Result};
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Events forwarded from the MQTT event loop.
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// Broker acknowledged a (re)connection.
    Connected,
    Message(MqttMessage),
    Disconnected,
    /// Connection-level error; the event loop reconnects on the next poll.
    Error(String),
}

/// MQTT client for the device bridge.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    connected: Arc<AtomicBool>,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self {
            client,
            event_loop,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publisher for pump commands on `topic`, sharing this client's
    /// connection flag.
    pub fn command_publisher(&self, topic: impl Into<String>) -> MqttCommandPublisher {
        MqttCommandPublisher {
            client: self.client.clone(),
            topic: topic.into(),
            connected: self.connected.clone(),
        }
    }

    /// Get a clone of the async client for subscribing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// This method runs until the receiving side of the channel is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::SeqCst);
                    Some(MqttEvent::Connected)
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(
                        "[MQTT] Received {} bytes on {}",
                        publish.payload.len(),
                        publish.topic
                    );
                    Some(MqttEvent::Message(MqttMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    }))
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    Some(MqttEvent::Disconnected)
                }
                Ok(_) => None,
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    error!("[MQTT] Connection error: {}", e);
                    if tx.send(MqttEvent::Error(e.to_string())).await.is_err() {
                        break;
                    }
                    // Wait before reconnecting
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            if let Some(event) = event
                && tx.send(event).await.is_err()
            {
                warn!("[MQTT] Event channel closed");
                break;
            }
        }
    }
}

/// Fire-and-forget pump command publisher backed by rumqttc.
#[derive(Clone)]
pub struct MqttCommandPublisher {
    client: AsyncClient,
    topic: String,
    connected: Arc<AtomicBool>,
}

impl CommandPublisher for MqttCommandPublisher {
    fn publish_command(&self, payload: &[u8]) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BridgeError::MqttDisconnected);
        }
        debug!("[MQTT] Publishing {:?} to {}", payload, self.topic);
        self.client
            .try_publish(&self.topic, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }
}
