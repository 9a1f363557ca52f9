//! MQTT transport backed by `rumqttc`.

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use tokio::sync::Mutex;

use super::{ConnectionError, SessionEvent, Transport};
use crate::config::MqttConfig;

pub struct MqttTransport {
    client: AsyncClient,
    eventloop: Mutex<EventLoop>,
}

impl MqttTransport {
    /// Client id and username are derived from the device hardware address
    /// unless configured explicitly.
    pub fn new(config: &MqttConfig, mac_address: &str) -> Self {
        let client_id = config.client_id_for(mac_address);
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(config.clean_session);
        if let Some(username) = config.username_for(mac_address) {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        Self { client, eventloop: Mutex::new(eventloop) }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn open(&self) -> Result<(), ConnectionError> {
        let mut eventloop = self.eventloop.lock().await;
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        return Ok(());
                    }
                    return Err(ConnectionError::Refused(format!("{:?}", ack.code)));
                }
                Ok(_) => continue,
                Err(e) => return Err(ConnectionError::Transport(e.to_string())),
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ConnectionError> {
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ConnectionError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn next_event(&self) -> SessionEvent {
        let mut eventloop = self.eventloop.lock().await;
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return SessionEvent::Message {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(Event::Incoming(Packet::Disconnect)) => return SessionEvent::Disconnected,
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack.return_codes.iter().any(|code| matches!(code, SubscribeReasonCode::Failure)) {
                        tracing::error!(pkid = ack.pkid, "Broker rejected subscription");
                    }
                }
                Ok(_) => {}
                // rumqttc tears the connection down on any poll error
                Err(e) => {
                    tracing::error!("MQTT connection lost: {}", e);
                    return SessionEvent::Disconnected;
                }
            }
        }
    }
}
