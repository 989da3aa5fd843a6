//! The installed device set.
//!
//! Friendly names are the ones configured in Zigbee2MQTT. Inbound devices are
//! matched by topic suffix; outbound topics are fixed command topics.

use super::classifier::Field;
use super::classifier::Rule;
use super::event::SourceKind;
use super::zone::Zone;

/// Every device event lives under this prefix.
pub const DEVICE_PREFIX: &str = "zigbee2mqtt";

/// Kitchen ceiling circuit (also the secondary switch's target).
pub const KITCHEN_LIGHT: &str = "zigbee2mqtt/kitchen/set";
/// Kitchen bulb group switched on by presence.
pub const KITCHEN_BULBS: &str = "zigbee2mqtt/hue-bulbs-c/set";
pub const BEDROOM_LIGHT: &str = "zigbee2mqtt/bedroom/set";
/// Bathroom LED strip.
pub const STRIP_LIGHT: &str = "zigbee2mqtt/ikea-led-strip-driver-3/set";

/// Targets of a scene-button press, in publish order.
pub const SCENE_TARGETS: [&str; 3] = [KITCHEN_LIGHT, BEDROOM_LIGHT, STRIP_LIGHT];

/// Classification rules for the installed devices.
pub fn rules() -> Vec<Rule> {
    use Field::*;
    use SourceKind::*;
    use Zone::*;

    vec![
        Rule::new("ikea-styrbar-white-c-1", Action, Kitchen, ManualSwitchPrimary),
        Rule::new("ikea-tradfri-1", Action, Kitchen, ManualSwitchSecondary),
        Rule::new("sensor-1", Occupancy, Kitchen, OccupancySensor),
        Rule::new("door-1", Contact, Kitchen, DoorContact),
        Rule::new("button-1", Action, Bedroom, SceneButton),
        Rule::new("button-2", Action, Bedroom, SceneButton),
        Rule::new("ikea-styrbar-white-c-3", Action, Bathroom, ManualSwitchPrimary),
        Rule::new("door-2", Contact, Bathroom, DoorContact),
        Rule::new("sensor-3", Occupancy, Bathroom, OccupancySensor),
        Rule::new("water-leak-1", WaterLeak, Bathroom, WaterLeakSensor),
    ]
}
