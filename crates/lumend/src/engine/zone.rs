use strum::Display;

/// A named control domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Zone {
    Kitchen,
    Bathroom,
    /// Only hosts the scene buttons; it has no automaton state.
    Bedroom,
}

/// Override and suppression flags for one zone.
///
/// `manual_override_active` implies `sensor_suppressed`. Suppression may also
/// hold on its own while the debounce grace window runs after a manual
/// switch-off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneState {
    pub(crate) manual_override_active: bool,
    pub(crate) sensor_suppressed: bool,

    /// Incremented on every debounce arm; a timer only acts if its captured
    /// generation is still current.
    pub(crate) generation: u64,
}

impl ZoneState {
    pub fn manual_override_active(&self) -> bool {
        self.manual_override_active
    }

    pub fn sensor_suppressed(&self) -> bool {
        self.sensor_suppressed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `manual_override_active ⇒ sensor_suppressed`
    pub fn is_consistent(&self) -> bool {
        !self.manual_override_active || self.sensor_suppressed
    }

    /// Take manual control: the occupancy sensor is ignored.
    pub(crate) fn hold(&mut self) {
        self.manual_override_active = true;
        self.sensor_suppressed = true;
    }

    /// Hand control straight back to the occupancy sensor.
    pub(crate) fn release(&mut self) {
        self.manual_override_active = false;
        self.sensor_suppressed = false;
    }

    /// Drop the override but keep the sensor suppressed until the debounce
    /// timer of the returned generation fires.
    pub(crate) fn begin_grace(&mut self) -> u64 {
        self.manual_override_active = false;
        self.generation += 1;
        self.generation
    }

    /// Apply a debounce expiry. Returns whether the sensor was re-armed.
    pub(crate) fn end_grace(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.manual_override_active {
            return false;
        }
        self.sensor_suppressed = false;
        true
    }

    /// Set both flags to the same value.
    pub(crate) fn set_held(&mut self, held: bool) {
        if held {
            self.hold();
        } else {
            self.release();
        }
    }
}

/// The bathroom's automaton, extended with door and water-leak inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BathroomState {
    pub(crate) zone: ZoneState,

    /// Raw Zigbee `contact` value: `true` while the door is closed.
    pub(crate) door_closed: bool,

    pub(crate) water_leak_detected: bool,
}

impl BathroomState {
    pub fn zone(&self) -> &ZoneState {
        &self.zone
    }

    pub fn door_open(&self) -> bool {
        !self.door_closed
    }

    pub fn water_leak_detected(&self) -> bool {
        self.water_leak_detected
    }
}
