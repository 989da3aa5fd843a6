//! The single-threaded event loop tying the bus to the rule engine.

use std::future;

use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::bus::BusError;
use crate::bus::BusEvent;
use crate::bus::BusMessage;
use crate::bus::MessageBus;
use crate::engine::BusPublisher;
use crate::engine::Classifier;
use crate::engine::RuleEngine;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to set up message bus: {0}")]
    Setup(#[from] BusError),

    #[error("Message bus went offline: {reason}")]
    TransportFatal { reason: String },
}

/// What woke the loop up.
enum Wake {
    Bus(Option<BusEvent>),
    Deadline,
}

/// Owns the bus, the classifier and the rule engine.
///
/// Bus messages and debounce expiries are handled one at a time on the same
/// task, so the engine never needs a lock.
pub struct Controller<B: MessageBus> {
    bus: B,
    classifier: Classifier,
    engine: RuleEngine,
}

impl<B: MessageBus> Controller<B> {
    pub fn new(bus: B, classifier: Classifier, engine: RuleEngine) -> Self {
        Self {
            bus,
            classifier,
            engine,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Connect and subscribe to `topics` in order.
    pub async fn start(&mut self, topics: &[String]) -> Result<(), ControllerError> {
        self.bus.connect().await?;

        if topics.is_empty() {
            warn!("No topics configured, no events will be received");
        }
        for topic in topics {
            self.bus.subscribe(topic).await?;
            info!("Subscribed to {}", topic);
        }
        Ok(())
    }

    /// Run until the bus runs dry or goes offline.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        info!("Controller starting");

        loop {
            let deadline = self.engine.next_deadline();
            let wake = tokio::select! {
                event = self.bus.poll() => Wake::Bus(event),
                () = sleep_until(deadline) => Wake::Deadline,
            };

            match wake {
                Wake::Bus(Some(BusEvent::Message(msg))) => {
                    self.handle_message(&msg, Instant::now());
                }
                Wake::Bus(Some(BusEvent::Offline { reason })) => {
                    error!("Message bus offline: {}", reason);
                    return Err(ControllerError::TransportFatal { reason });
                }
                Wake::Bus(None) => break,
                Wake::Deadline => self.engine.fire_due(Instant::now()),
            }
        }

        info!("Controller shutting down");
        Ok(())
    }

    /// Classify one message and apply every resulting event.
    pub fn handle_message(&mut self, msg: &BusMessage, now: Instant) {
        debug!(
            "[{}] message: {}",
            msg.topic,
            String::from_utf8_lossy(&msg.payload)
        );

        // Expiries that are already due come first on the timeline.
        self.engine.fire_due(now);

        let events = self.classifier.classify(&msg.topic, &msg.payload);
        let mut publisher = BusPublisher::new(&mut self.bus);
        for event in &events {
            self.engine.handle(event, now, &mut publisher);
        }

        debug!(
            "kitchen: {:?}, bathroom: {:?}",
            self.engine.kitchen(),
            self.engine.bathroom()
        );
    }

    /// Apply debounce expiries due at `now`.
    pub fn fire_due(&mut self, now: Instant) {
        self.engine.fire_due(now);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
