//! Maps raw bus messages to engine events.

use serde_json::Value;
use tracing::debug;
use tracing::trace;

use super::devices;
use super::event::Event;
use super::event::Reading;
use super::event::SourceKind;
use super::zone::Zone;

/// Payload field a rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Action,
    Occupancy,
    Contact,
    WaterLeak,
}

impl Field {
    /// JSON key as published by Zigbee2MQTT.
    pub fn key(self) -> &'static str {
        match self {
            Field::Action => "action",
            Field::Occupancy => "occupancy",
            Field::Contact => "contact",
            Field::WaterLeak => "water_leak",
        }
    }

    /// Extract the field from a decoded payload.
    ///
    /// Missing, null, and wrongly typed values all read as `None`.
    fn read(self, payload: &Value) -> Option<Reading> {
        let value = payload.as_object()?.get(self.key())?;
        match self {
            Field::Action => value.as_str().map(|s| Reading::Action(s.to_string())),
            Field::Occupancy => value.as_bool().map(Reading::Occupancy),
            Field::Contact => value.as_bool().map(Reading::Contact),
            Field::WaterLeak => value.as_bool().map(Reading::WaterLeak),
        }
    }
}

/// Binds a device topic suffix to a zone and source kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub suffix: String,
    pub field: Field,
    pub zone: Zone,
    pub source: SourceKind,
}

impl Rule {
    pub fn new(suffix: impl Into<String>, field: Field, zone: Zone, source: SourceKind) -> Self {
        Self {
            suffix: suffix.into(),
            field,
            zone,
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Undecodable payload on {topic}: {source}")]
pub struct DecodeError {
    pub topic: String,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    prefix: String,
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(prefix: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            prefix: prefix.into(),
            rules,
        }
    }

    /// Classifier for the installed device set.
    pub fn installed() -> Self {
        Self::new(devices::DEVICE_PREFIX, devices::rules())
    }

    /// Classify a message, yielding one event per matching rule.
    ///
    /// Topics outside the device prefix and undecodable payloads yield
    /// nothing.
    pub fn classify(&self, topic: &str, payload: &[u8]) -> Vec<Event> {
        if !topic.starts_with(&self.prefix) {
            return Vec::new();
        }

        match self.try_classify(topic, payload) {
            Ok(events) => events,
            Err(e) => {
                debug!("Dropping message: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`Classifier::classify`] for a topic already known to be under the
    /// device prefix, but surfaces decode failures.
    pub fn try_classify(&self, topic: &str, payload: &[u8]) -> Result<Vec<Event>, DecodeError> {
        let decoded: Value = serde_json::from_slice(payload).map_err(|source| DecodeError {
            topic: topic.to_string(),
            source,
        })?;

        let events: Vec<Event> = self
            .rules
            .iter()
            .filter(|rule| topic.ends_with(&rule.suffix))
            .filter_map(|rule| {
                rule.field
                    .read(&decoded)
                    .map(|reading| Event::new(rule.zone, rule.source, reading))
            })
            .collect();

        if events.is_empty() {
            trace!("No rule matched {}", topic);
        }
        Ok(events)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::installed()
    }
}
