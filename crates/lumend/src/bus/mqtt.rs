use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::BusError;
use super::BusEvent;
use super::BusMessage;
use super::DeliveryOptions;
use super::MessageBus;
use super::QoS;
use crate::config::MqttConfig;

/// Capacity of the rumqttc request queue between the client handle and the
/// event loop. Publishes fail fast with `TrySend` once it is full.
const REQUEST_QUEUE_SIZE: usize = 64;

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// [`MessageBus`] backed by rumqttc
pub struct RumqttcBus {
    /// MQTT connection options (stored for lazy initialization)
    mqtt_options: MqttOptions,

    /// AsyncClient (created in connect())
    client: Option<AsyncClient>,

    /// Event receiver (created in connect())
    event_rx: Option<mpsc::UnboundedReceiver<BusEvent>>,

    /// Background event loop task handle
    event_loop_task: Option<JoinHandle<()>>,
}

impl RumqttcBus {
    pub fn new(config: &MqttConfig) -> Self {
        let mut mqtt_options =
            MqttOptions::new(config.client_id(), config.address.clone(), config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        Self {
            mqtt_options,
            client: None,
            event_rx: None,
            event_loop_task: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient, BusError> {
        self.client.as_ref().ok_or(BusError::NotConnected)
    }
}

#[async_trait]
impl MessageBus for RumqttcBus {
    async fn connect(&mut self) -> Result<(), BusError> {
        let (client, mut event_loop) =
            AsyncClient::new(self.mqtt_options.clone(), REQUEST_QUEUE_SIZE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = BusMessage::new(publish.topic, publish.payload.to_vec());
                        if event_tx.send(BusEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        // Losing the broker is terminal; the host decides what to do next.
                        error!("MQTT connection lost: {}", e);
                        let _ = event_tx.send(BusEvent::Offline {
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
            debug!("MQTT event loop task exiting");
        });

        self.client = Some(client);
        self.event_rx = Some(event_rx);
        self.event_loop_task = Some(task);

        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.client()?
            .subscribe(topic, rumqttc::QoS::AtMostOnce)
            .await?;
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        options: DeliveryOptions,
    ) -> Result<(), BusError> {
        self.client()?
            .try_publish(topic, options.qos.into(), options.retain, payload.to_vec())?;
        Ok(())
    }

    async fn poll(&mut self) -> Option<BusEvent> {
        match &mut self.event_rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for RumqttcBus {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}
