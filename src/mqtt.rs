use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use rumqttc::{MqttOptions, QoS};
use serde_derive::Serialize;
use tokio::sync::broadcast;

use crate::config;
use crate::dispatch::Notifier;
use crate::messages::{ArmMode, PollRequest};

#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    publisher_id: String,
    topic_path: String,
}

#[derive(Debug, Serialize)]
struct NotificationMqttMessage<'a> {
    text: &'a str,
}

impl MqttClient {
    pub fn new(config: &config::MqttConfig) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .clone()
            .unwrap_or_else(|| "presence-monitor-rs".to_string());

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        (
            MqttClient {
                client,
                publisher_id,
                topic_path: config
                    .topic_path
                    .clone()
                    .unwrap_or_else(|| "monitor".to_string()),
            },
            eventloop,
        )
    }

    fn request_topic(&self) -> String {
        format!("{}/scan/request", self.topic_path)
    }

    fn notify_topic(&self) -> String {
        format!("{}/{}/notify", self.topic_path, self.publisher_id)
    }

    fn remote_armed_topic(&self, target_ref: &str) -> String {
        format!(
            "{}/{}/remote/{}/armed",
            self.topic_path,
            self.publisher_id,
            sanitize_name(target_ref)
        )
    }

    pub async fn subscribe(&self) -> Result<(), rumqttc::ClientError> {
        self.client
            .subscribe(self.request_topic(), QoS::AtMostOnce)
            .await
    }

    /// Drives the MQTT connection, forwarding scan requests to `tx`.
    pub async fn event_loop(
        &self,
        eventloop: &mut rumqttc::EventLoop,
        tx: broadcast::Sender<PollRequest>,
    ) {
        loop {
            match eventloop.poll().await {
                Ok(notification) => match notification {
                    rumqttc::Event::Incoming(rumqttc::Packet::Publish(p)) => {
                        debug!("Received MQTT message on topic {}: {:?}", p.topic, p.payload);

                        if p.topic == self.request_topic() {
                            if let Err(err) = tx.send(PollRequest::Mqtt) {
                                error!("Error requesting device check: {:?}", err);
                            }
                        }
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::SubAck(_)) => {
                        debug!("Subscription acknowledged");
                    }
                    rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_)) => {
                        debug!("Connection acknowledged");
                        if let Err(err) = self.subscribe().await {
                            error!("Error subscribing to MQTT topics: {:?}", err);
                        }
                    }
                    _ => {}
                },
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Queues the armed mode of a target managed by another instance. Fails
    /// rather than waits when the request queue is full (broker unreachable).
    pub fn publish_armed(
        &self,
        target_ref: &str,
        mode: ArmMode,
    ) -> Result<(), rumqttc::ClientError> {
        info!("Setting remote target {} to {} over MQTT", target_ref, mode);
        self.client.try_publish(
            self.remote_armed_topic(target_ref),
            QoS::AtLeastOnce,
            true,
            mode.as_str(),
        )
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        debug!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

#[async_trait]
impl Notifier for MqttClient {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&NotificationMqttMessage { text: message })?;
        self.client
            .try_publish(self.notify_topic(), QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

fn sanitize_name(name: &str) -> String {
    // Every non-alphanumeric character becomes an underscore
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}
