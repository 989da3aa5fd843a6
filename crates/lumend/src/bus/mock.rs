use std::collections::VecDeque;

use async_trait::async_trait;

use super::BusError;
use super::BusEvent;
use super::BusMessage;
use super::DeliveryOptions;
use super::MessageBus;

/// In-memory bus for tests
#[derive(Debug, Default)]
pub struct MockBus {
    pub events: VecDeque<BusEvent>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>, DeliveryOptions)>,
    pub is_connected: bool,
    /// When set, every publish is rejected.
    pub reject_publishes: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an incoming message.
    pub fn push_message(&mut self, topic: &str, payload: &[u8]) {
        self.events
            .push_back(BusEvent::Message(BusMessage::new(topic, payload)));
    }

    /// Published messages rendered as `topic payload`, one per line.
    pub fn published_lines(&self) -> String {
        self.published
            .iter()
            .map(|(topic, payload, _)| format!("{} {}", topic, String::from_utf8_lossy(payload)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl MessageBus for MockBus {
    async fn connect(&mut self) -> Result<(), BusError> {
        self.is_connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if !self.is_connected {
            return Err(BusError::NotConnected);
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        options: DeliveryOptions,
    ) -> Result<(), BusError> {
        if self.reject_publishes {
            return Err(BusError::Offline("publish rejected".to_string()));
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), options));
        Ok(())
    }

    async fn poll(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }
}
