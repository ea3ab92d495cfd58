//! MQTT integration orchestrator.
//!
//! Connects the broker to the [`Controller`]: subscribes to the device topics
//! on every (re)connect and feeds inbound packets to the controller one at a
//! time, in arrival order.

use super::client::{MqttClient, MqttEvent};
use crate::config::DeviceConfig;
use crate::device::Controller;
use log::{info, warn};
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct MqttIntegration {
    client: MqttClient,
    device: DeviceConfig,
    controller: Arc<Controller>,
}

impl MqttIntegration {
    pub fn new(client: MqttClient, device: DeviceConfig, controller: Arc<Controller>) -> Self {
        Self {
            client,
            device,
            controller,
        }
    }

    /// Start the MQTT integration.
    ///
    /// Spawns the event loop and the message processor. Returns a JoinHandle
    /// that can be used to abort both on shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let subscribe_client = self.client.client();
        let topics = self.device.subscribe_topics();

        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);
        let client = self.client;
        let mqtt_loop = tokio::spawn(async move {
            client.run(event_tx).await;
        });

        while let Some(event) = event_rx.recv().await {
            handle_event(&self.controller, &subscribe_client, &topics, event).await;
        }

        mqtt_loop.abort();
    }
}

async fn handle_event(
    controller: &Controller,
    client: &AsyncClient,
    topics: &[String],
    event: MqttEvent,
) {
    match event {
        MqttEvent::Connected => {
            info!("[MQTT] Connected, subscribing to {:?}", topics);
            controller.record_event("MQTT connected");

            // Re-subscribe on every (re)connect, the broker may have dropped the session
            for topic in topics {
                if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
                    warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
                    controller.record_event(format!("MQTT subscribe to {} failed: {}", topic, e));
                }
            }
        }
        MqttEvent::Message(msg) => {
            controller.handle_message(&msg.topic, &msg.payload);
        }
        MqttEvent::Disconnected => {
            warn!("[MQTT] Disconnected by broker");
            controller.record_event("MQTT disconnected");
        }
        MqttEvent::Error(message) => {
            controller.record_event(format!("MQTT error: {}", message));
        }
    }
}
