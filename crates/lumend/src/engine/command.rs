use serde::Serialize;

use crate::bus::BusError;
use crate::bus::DeliveryOptions;
use crate::bus::MessageBus;
use crate::bus::QoS;

/// Requested light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Switch {
    On,
    Off,
}

impl From<bool> for Switch {
    fn from(on: bool) -> Self {
        if on { Switch::On } else { Switch::Off }
    }
}

#[derive(Serialize)]
struct Payload {
    state: Switch,
}

/// An outgoing actuator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub topic: &'static str,
    pub state: Switch,
    pub options: DeliveryOptions,
}

impl Command {
    /// Every command is fire-and-forget and never retained.
    pub const OPTIONS: DeliveryOptions = DeliveryOptions {
        qos: QoS::AtMostOnce,
        retain: false,
    };

    pub fn new(topic: &'static str, state: Switch) -> Self {
        Self {
            topic,
            state,
            options: Self::OPTIONS,
        }
    }

    /// Wire payload, e.g. `{"state":"ON"}`
    pub fn payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&Payload { state: self.state })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode command payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Transport rejected command: {0}")]
    Transport(#[from] BusError),
}

/// Capability the rule engine publishes through.
pub trait CommandPublisher {
    fn publish(&mut self, command: &Command) -> Result<(), PublishError>;
}

/// Publishes commands on a [`MessageBus`].
pub struct BusPublisher<'a, B: ?Sized> {
    bus: &'a mut B,
}

impl<'a, B: MessageBus + ?Sized> BusPublisher<'a, B> {
    pub fn new(bus: &'a mut B) -> Self {
        Self { bus }
    }
}

impl<B: MessageBus + ?Sized> CommandPublisher for BusPublisher<'_, B> {
    fn publish(&mut self, command: &Command) -> Result<(), PublishError> {
        let payload = command.payload()?;
        self.bus.publish(command.topic, &payload, command.options)?;
        Ok(())
    }
}

/// Records commands instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub commands: Vec<Command>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands rendered as `topic payload`, one per line.
    pub fn rendered(&self) -> String {
        self.commands
            .iter()
            .map(|c| format!("{} {{\"state\":\"{}\"}}", c.topic, c.state))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl CommandPublisher for RecordingPublisher {
    fn publish(&mut self, command: &Command) -> Result<(), PublishError> {
        self.commands.push(command.clone());
        Ok(())
    }
}
