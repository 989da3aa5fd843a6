use strum::Display;

use super::zone::Zone;

/// Which kind of device produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    /// Wall switch wired to the load; it drives the light itself.
    ManualSwitchPrimary,
    /// Remote switch; the engine must drive the light on its behalf.
    ManualSwitchSecondary,
    OccupancySensor,
    DoorContact,
    WaterLeakSensor,
    SceneButton,
}

/// The decoded payload field relevant to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    Action(String),
    Occupancy(bool),
    /// `true` while the contact is closed.
    Contact(bool),
    WaterLeak(bool),
}

/// A classified bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub zone: Zone,
    pub source: SourceKind,
    pub reading: Reading,
}

impl Event {
    pub fn new(zone: Zone, source: SourceKind, reading: Reading) -> Self {
        Self {
            zone,
            source,
            reading,
        }
    }
}
