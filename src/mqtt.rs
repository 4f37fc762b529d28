//! MQTT client implementation

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};

use crate::{
    config::{MqttConfig, MqttTransport},
    errors::RecorderError,
    models::{AudioLevel, DecodedPacket, ReceivedPacket},
};

/// Last topic level of packet messages, preceded by the channel number
const PACKET_TOPIC_SUFFIX: &str = "rx";

/// Payload of a packet message
#[derive(Debug, Deserialize)]
struct PacketPayload {
    packet: DecodedPacket,
    #[serde(default)]
    levels: AudioLevel,
}

/// MQTT client for receiving decoded packets
pub struct MqttClientBuilder {
    client: AsyncClient,
    event_loop: EventLoop,
    tx: mpsc::Sender<Result<ReceivedPacket, RecorderError>>,
    rx: mpsc::Receiver<Result<ReceivedPacket, RecorderError>>,
}

pub struct MqttClient {
    _client: AsyncClient,
    rx: mpsc::Receiver<Result<ReceivedPacket, RecorderError>>,
    _topics: Vec<String>,
    _handle: tokio::task::JoinHandle<Result<(), RecorderError>>,
}

impl MqttClientBuilder {
    /// Create a new MQTT client
    pub fn new(config: &MqttConfig) -> Result<Self, RecorderError> {
        let mut mqtt_options = MqttOptions::new(&config.client_id, &config.host, config.port);

        match config.transport {
            MqttTransport::Tcp => {}
            MqttTransport::Tls => {
                mqtt_options.set_transport(Transport::tls_with_default_config());
            }
            MqttTransport::Wss => {
                mqtt_options.set_transport(Transport::wss_with_default_config());
            }
        }
        mqtt_options.set_keep_alive(config.keep_alive);

        let (client, event_loop) = AsyncClient::new(mqtt_options, 100);

        // Create a channel for message passing
        let (tx, rx) = mpsc::channel(100);

        Ok(Self {
            client,
            event_loop,
            tx,
            rx,
        })
    }

    /// Connect to MQTT broker and subscribe to topics
    ///
    /// Note: Initial subscription needs not be done here, as it is done
    /// in the event loop.
    pub async fn connect(self, topics: &[String]) -> Result<MqttClient, RecorderError> {
        let topics = topics.to_vec();

        let _handle = tokio::spawn(Self::process_events(
            self.tx,
            self.event_loop,
            self.client.clone(),
            topics.clone(),
        ));

        Ok(MqttClient {
            _client: self.client,
            rx: self.rx,
            _topics: topics,
            _handle,
        })
    }

    async fn subscribe(client: AsyncClient, topics: &[String]) -> Result<(), RecorderError> {
        for topic in topics.iter() {
            info!("Subscribing to topic: {}", topic);
            client.subscribe(topic, QoS::AtLeastOnce).await?;
        }
        Ok(())
    }

    /// Process MQTT events
    ///
    /// `rumqttc` reconnects on its own after a lost connection, but the
    /// subscriptions are gone, so they are renewed on every ConnAck.
    async fn process_events(
        tx: mpsc::Sender<Result<ReceivedPacket, RecorderError>>,
        mut event_loop: EventLoop,
        client: AsyncClient,
        topics: Vec<String>,
    ) -> Result<(), RecorderError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker, subscribing to topics");
                    if let Err(e) = Self::subscribe(client.clone(), &topics).await {
                        error!("Failed to subscribe: {}", e);
                        break Err(e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match Self::parse_message(&publish.topic, &publish.payload) {
                        Ok(message) => {
                            if tx.send(Ok(message)).await.is_err() {
                                info!("Packet receiver closed, stopping MQTT event loop");
                                break Ok(());
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse message on {}: {}", publish.topic, e);
                        }
                    }
                }
                Err(e) => {
                    error!("MQTT Error: {}", e);
                    continue;
                }
                _ => continue,
            }
        }
    }

    /// Parse a packet message, channel taken from the topic
    fn parse_message(topic: &str, payload: &[u8]) -> Result<ReceivedPacket, RecorderError> {
        let parts: Vec<&str> = topic.split('/').collect();

        // Validate topic structure: <prefix...>/<channel>/rx
        if parts.len() < 2 || parts[parts.len() - 1] != PACKET_TOPIC_SUFFIX {
            return Err(RecorderError::InvalidTopic(topic.to_string()));
        }

        let channel_part = parts[parts.len() - 2];
        let channel = channel_part
            .parse::<i32>()
            .map_err(|_| RecorderError::InvalidChannel(channel_part.to_string()))?;

        let payload: PacketPayload = serde_json::from_slice(payload)?;
        Ok(ReceivedPacket {
            channel,
            packet: payload.packet,
            levels: payload.levels,
        })
    }
}

impl MqttClient {
    /// Receive next packet
    pub async fn recv(&mut self) -> Result<Option<ReceivedPacket>, RecorderError> {
        self.rx.recv().await.transpose()
    }
}
