//! Message bus boundary.
//!
//! The rule engine never talks to a broker directly. It consumes the
//! [`MessageBus`] trait, which the MQTT adapter implements for production and
//! tests implement in memory.

#[cfg(test)]
pub(crate) mod mock;
mod mqtt;

use async_trait::async_trait;

pub use mqtt::RumqttcBus;

/// Quality of service for a single publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Delivery options attached to every outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryOptions {
    pub qos: QoS,
    pub retain: bool,
}

/// A message received from a subscription.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Something the transport reports to its consumer.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A publish arrived on one of the subscribed topics.
    Message(BusMessage),

    /// The transport went away for good. The consumer should shut down.
    Offline { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("message bus not connected, call connect() first")]
    NotConnected,

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("message bus offline: {0}")]
    Offline(String),
}

/// Transport operations the controller needs.
///
/// `publish` is deliberately synchronous: it only enqueues the message so a
/// slow broker never stalls rule evaluation.
#[async_trait]
pub trait MessageBus: Send {
    /// Connect to the broker and start receiving.
    async fn connect(&mut self) -> Result<(), BusError>;

    /// Subscribe to a topic filter.
    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError>;

    /// Enqueue one message for delivery without waiting for the broker.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        options: DeliveryOptions,
    ) -> Result<(), BusError>;

    /// Wait for the next transport event.
    ///
    /// Returns `None` once the transport has nothing more to deliver.
    async fn poll(&mut self) -> Option<BusEvent>;
}
