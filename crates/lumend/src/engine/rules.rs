use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::command::Command;
use super::command::CommandPublisher;
use super::command::Switch;
use super::devices;
use super::event::Event;
use super::event::Reading;
use super::event::SourceKind;
use super::timer::DebounceTimers;
use super::timer::Expiry;
use super::zone::BathroomState;
use super::zone::Zone;
use super::zone::ZoneState;

/// Per-zone lighting rules.
///
/// The engine owns every zone's flags and the debounce timers. It is driven
/// from a single task: [`RuleEngine::handle`] for classified bus messages and
/// [`RuleEngine::fire_due`] when the next deadline passes. Commands go out
/// through the [`CommandPublisher`] passed in; a failed publish is logged and
/// never rolls back the transition that produced it.
#[derive(Debug)]
pub struct RuleEngine {
    kitchen: ZoneState,
    bathroom: BathroomState,
    timers: DebounceTimers,
    debounce: Duration,
}

impl RuleEngine {
    pub fn new(debounce: Duration) -> Self {
        Self {
            kitchen: ZoneState::default(),
            bathroom: BathroomState::default(),
            timers: DebounceTimers::new(),
            debounce,
        }
    }

    pub fn kitchen(&self) -> &ZoneState {
        &self.kitchen
    }

    pub fn bathroom(&self) -> &BathroomState {
        &self.bathroom
    }

    /// Automaton state for `zone`, if it has one.
    pub fn zone(&self, zone: Zone) -> Option<&ZoneState> {
        match zone {
            Zone::Kitchen => Some(&self.kitchen),
            Zone::Bathroom => Some(&self.bathroom.zone),
            Zone::Bedroom => None,
        }
    }

    fn zone_mut(&mut self, zone: Zone) -> Option<&mut ZoneState> {
        match zone {
            Zone::Kitchen => Some(&mut self.kitchen),
            Zone::Bathroom => Some(&mut self.bathroom.zone),
            Zone::Bedroom => None,
        }
    }

    /// Earliest pending debounce deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Reset every zone to its startup defaults and drop pending timers.
    pub fn reset(&mut self) {
        *self = Self::new(self.debounce);
    }

    /// Apply one classified event.
    pub fn handle<P: CommandPublisher + ?Sized>(
        &mut self,
        event: &Event,
        now: Instant,
        publisher: &mut P,
    ) {
        match (event.zone, event.source, &event.reading) {
            (_, SourceKind::SceneButton, Reading::Action(action)) => {
                Self::scene(action, publisher);
            }
            (zone, SourceKind::ManualSwitchPrimary, Reading::Action(action)) => {
                self.manual_switch(zone, action, now);
            }
            (zone, SourceKind::ManualSwitchSecondary, Reading::Action(action)) => {
                // The secondary switch is not wired to the load, so drive it here.
                if let Some(on) = switch_action(action) {
                    if let Some(topic) = main_light(zone) {
                        dispatch(publisher, Command::new(topic, Switch::from(on)));
                    }
                }
                self.manual_switch(zone, action, now);
            }
            (zone, SourceKind::OccupancySensor, Reading::Occupancy(occupied)) => {
                self.occupancy(zone, *occupied, publisher);
            }
            (Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(closed)) => {
                self.bathroom_door(*closed);
            }
            (Zone::Kitchen, SourceKind::DoorContact, Reading::Contact(closed)) => {
                if !closed {
                    dispatch(publisher, Command::new(devices::KITCHEN_BULBS, Switch::On));
                }
            }
            (Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(leak)) => {
                self.water_leak(*leak, publisher);
            }
            _ => {
                debug!("No rule for {:?}", event);
            }
        }

        if let Some(state) = self.zone(event.zone) {
            debug_assert!(state.is_consistent(), "{} zone: {:?}", event.zone, state);
        }
    }

    /// Apply every debounce timer due at `now`.
    pub fn fire_due(&mut self, now: Instant) {
        for expiry in self.timers.expire(now) {
            self.apply_expiry(expiry);
        }
    }

    fn apply_expiry(&mut self, expiry: Expiry) {
        let Some(state) = self.zone_mut(expiry.zone) else {
            return;
        };
        if state.end_grace(expiry.generation) {
            info!("{}: occupancy sensor re-armed", expiry.zone);
        } else {
            debug!(
                "{}: debounce generation {} superseded or override active",
                expiry.zone, expiry.generation
            );
        }
    }

    fn manual_switch(&mut self, zone: Zone, action: &str, now: Instant) {
        let due = now + self.debounce;
        let Some(state) = self.zone_mut(zone) else {
            return;
        };

        match switch_action(action) {
            Some(true) => {
                state.hold();
                info!("{}: manual override on, sensor suppressed", zone);
            }
            Some(false) => {
                let generation = state.begin_grace();
                self.timers.arm(zone, generation, due);
                info!("{}: manual override off, sensor re-arms after debounce", zone);
            }
            None => debug!("{}: ignoring switch action {:?}", zone, action),
        }
    }

    fn occupancy<P: CommandPublisher + ?Sized>(
        &mut self,
        zone: Zone,
        occupied: bool,
        publisher: &mut P,
    ) {
        let Some(state) = self.zone(zone) else {
            return;
        };
        if state.sensor_suppressed() {
            debug!("{}: occupancy ignored while suppressed", zone);
            return;
        }

        if let Some(topic) = sensor_light(zone, occupied) {
            dispatch(publisher, Command::new(topic, Switch::from(occupied)));
        }
    }

    fn bathroom_door(&mut self, closed: bool) {
        let bathroom = &mut self.bathroom;
        bathroom.door_closed = closed;

        // Closing the door holds the light; opening it re-arms the sensor
        // unless a leak says someone is still showering. The final state
        // nevertheless mirrors the contact, so an open door always re-arms.
        let intended = closed || bathroom.water_leak_detected;
        if intended != closed {
            warn!("bathroom: door opened during water leak, sensor re-armed anyway");
        }
        bathroom.zone.set_held(closed);

        info!(
            "bathroom: door {}, sensor suppressed: {}",
            if closed { "closed" } else { "open" },
            bathroom.zone.sensor_suppressed()
        );
    }

    fn water_leak<P: CommandPublisher + ?Sized>(&mut self, leak: bool, publisher: &mut P) {
        let bathroom = &mut self.bathroom;
        bathroom.water_leak_detected = leak;

        if leak {
            bathroom.zone.hold();
            dispatch(publisher, Command::new(devices::STRIP_LIGHT, Switch::On));
        } else if bathroom.door_open() {
            bathroom.zone.release();
        }

        info!(
            "bathroom: water leak {}, sensor suppressed: {}",
            leak,
            bathroom.zone.sensor_suppressed()
        );
    }

    fn scene<P: CommandPublisher + ?Sized>(action: &str, publisher: &mut P) {
        let state = match action {
            "single" => Switch::On,
            "double" | "triple" | "quadruple" => Switch::Off,
            _ => {
                debug!("scene: ignoring action {:?}", action);
                return;
            }
        };

        for topic in devices::SCENE_TARGETS {
            dispatch(publisher, Command::new(topic, state));
        }
    }
}

/// `on`/`off` switch actions; anything else (dimming, arrows) is not a toggle.
fn switch_action(action: &str) -> Option<bool> {
    match action {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// The actuator a zone's secondary switch drives.
fn main_light(zone: Zone) -> Option<&'static str> {
    match zone {
        Zone::Kitchen => Some(devices::KITCHEN_LIGHT),
        Zone::Bathroom => Some(devices::STRIP_LIGHT),
        Zone::Bedroom => None,
    }
}

/// The actuator a zone's occupancy sensor drives.
fn sensor_light(zone: Zone, occupied: bool) -> Option<&'static str> {
    match (zone, occupied) {
        (Zone::Kitchen, true) => Some(devices::KITCHEN_BULBS),
        (Zone::Kitchen, false) => Some(devices::KITCHEN_LIGHT),
        (Zone::Bathroom, _) => Some(devices::STRIP_LIGHT),
        (Zone::Bedroom, _) => None,
    }
}

fn dispatch<P: CommandPublisher + ?Sized>(publisher: &mut P, command: Command) {
    debug!("Publishing {} to {}", command.state, command.topic);
    if let Err(e) = publisher.publish(&command) {
        warn!("Failed to publish {} to {}: {}", command.state, command.topic, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::PublishError;
    use crate::engine::command::RecordingPublisher;

    const DEBOUNCE: Duration = Duration::from_millis(3000);

    struct Harness {
        engine: RuleEngine,
        out: RecordingPublisher,
        start: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: RuleEngine::new(DEBOUNCE),
                out: RecordingPublisher::new(),
                start: Instant::now(),
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn send(&mut self, ms: u64, zone: Zone, source: SourceKind, reading: Reading) {
            let now = self.at(ms);
            self.engine.fire_due(now);
            self.engine
                .handle(&Event::new(zone, source, reading), now, &mut self.out);
            for zone in [Zone::Kitchen, Zone::Bathroom] {
                assert!(self.engine.zone(zone).unwrap().is_consistent());
            }
        }

        fn action(&mut self, ms: u64, zone: Zone, source: SourceKind, action: &str) {
            self.send(ms, zone, source, Reading::Action(action.to_string()));
        }

        fn advance(&mut self, ms: u64) {
            self.engine.fire_due(self.at(ms));
        }

        fn take(&mut self) -> String {
            let rendered = self.out.rendered();
            self.out.commands.clear();
            rendered
        }
    }

    struct FailingPublisher {
        attempts: usize,
    }

    impl CommandPublisher for FailingPublisher {
        fn publish(&mut self, _command: &Command) -> Result<(), PublishError> {
            self.attempts += 1;
            Err(PublishError::Transport(crate::bus::BusError::NotConnected))
        }
    }

    #[test]
    fn test_primary_on_suppresses_without_publishing() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");

        assert!(h.engine.kitchen().manual_override_active());
        assert!(h.engine.kitchen().sensor_suppressed());
        assert!(h.out.commands.is_empty());
    }

    #[test]
    fn test_primary_off_rearms_after_debounce() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.action(100, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");

        assert!(!h.engine.kitchen().manual_override_active());
        assert!(h.engine.kitchen().sensor_suppressed());
        assert_eq!(h.engine.next_deadline(), Some(h.at(3100)));

        h.advance(3099);
        assert!(h.engine.kitchen().sensor_suppressed());

        h.advance(3100);
        assert!(!h.engine.kitchen().sensor_suppressed());
        assert_eq!(h.engine.next_deadline(), None);
    }

    #[test]
    fn test_override_during_grace_window_keeps_suppression() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.action(100, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");
        h.action(1000, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");

        h.advance(5000);
        assert!(h.engine.kitchen().manual_override_active());
        assert!(h.engine.kitchen().sensor_suppressed());
    }

    #[test]
    fn test_second_off_supersedes_first_timer() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");
        h.action(2000, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.action(2500, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");

        // The first timer would have come due at 3000.
        h.advance(3000);
        assert!(h.engine.kitchen().sensor_suppressed());

        h.advance(5500);
        assert!(!h.engine.kitchen().sensor_suppressed());
    }

    #[test]
    fn test_stale_expiry_is_noop() {
        let mut engine = RuleEngine::new(DEBOUNCE);
        let now = Instant::now();
        engine.handle(
            &Event::new(
                Zone::Kitchen,
                SourceKind::ManualSwitchPrimary,
                Reading::Action("off".to_string()),
            ),
            now,
            &mut RecordingPublisher::new(),
        );
        engine.kitchen.sensor_suppressed = true;
        let stale = engine.kitchen.generation() - 1;

        engine.apply_expiry(Expiry {
            zone: Zone::Kitchen,
            generation: stale,
        });
        assert!(engine.kitchen().sensor_suppressed());
    }

    #[test]
    fn test_secondary_switch_publishes() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchSecondary, "on");
        assert!(h.engine.kitchen().manual_override_active());

        h.action(500, Zone::Kitchen, SourceKind::ManualSwitchSecondary, "off");
        assert!(!h.engine.kitchen().manual_override_active());
        assert!(h.engine.kitchen().sensor_suppressed());

        insta::assert_snapshot!(h.take(), @r#"
        zigbee2mqtt/kitchen/set {"state":"ON"}
        zigbee2mqtt/kitchen/set {"state":"OFF"}
        "#);
    }

    #[test]
    fn test_other_switch_actions_ignored() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchSecondary, "brightness_move_up");
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "arrow_left_click");

        assert_eq!(h.engine.kitchen(), &ZoneState::default());
        assert!(h.out.commands.is_empty());
        assert_eq!(h.engine.next_deadline(), None);
    }

    #[test]
    fn test_occupancy_drives_kitchen_lights() {
        let mut h = Harness::new();
        h.send(0, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(true));
        h.send(0, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(false));

        insta::assert_snapshot!(h.take(), @r#"
        zigbee2mqtt/hue-bulbs-c/set {"state":"ON"}
        zigbee2mqtt/kitchen/set {"state":"OFF"}
        "#);
    }

    #[test]
    fn test_occupancy_ignored_while_suppressed() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        let before = h.engine.kitchen().clone();

        h.send(10, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(true));
        h.send(20, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(false));

        assert!(h.out.commands.is_empty());
        assert_eq!(h.engine.kitchen(), &before);
    }

    #[test]
    fn test_occupancy_ignored_during_grace_window() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");
        h.send(1000, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(true));
        assert!(h.out.commands.is_empty());

        h.send(3000, Zone::Kitchen, SourceKind::OccupancySensor, Reading::Occupancy(true));
        assert_eq!(h.take(), r#"zigbee2mqtt/hue-bulbs-c/set {"state":"ON"}"#);
    }

    #[test]
    fn test_bathroom_occupancy_uses_strip() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::OccupancySensor, Reading::Occupancy(true));
        h.send(0, Zone::Bathroom, SourceKind::OccupancySensor, Reading::Occupancy(false));

        insta::assert_snapshot!(h.take(), @r#"
        zigbee2mqtt/ikea-led-strip-driver-3/set {"state":"ON"}
        zigbee2mqtt/ikea-led-strip-driver-3/set {"state":"OFF"}
        "#);
    }

    #[test]
    fn test_door_closed_holds_bathroom() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(true));

        let bathroom = h.engine.bathroom();
        assert!(!bathroom.door_open());
        assert!(bathroom.zone().manual_override_active());
        assert!(bathroom.zone().sensor_suppressed());

        h.send(10, Zone::Bathroom, SourceKind::OccupancySensor, Reading::Occupancy(false));
        assert!(h.out.commands.is_empty());
    }

    #[test]
    fn test_door_opened_rearms_bathroom() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(true));
        h.send(10, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(false));

        let bathroom = h.engine.bathroom();
        assert!(bathroom.door_open());
        assert!(!bathroom.zone().manual_override_active());
        assert!(!bathroom.zone().sensor_suppressed());
    }

    #[test]
    fn test_door_state_mirrors_contact_during_leak() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(true));
        h.send(10, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(true));
        h.send(20, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(false));

        let bathroom = h.engine.bathroom();
        assert!(bathroom.water_leak_detected());
        assert!(!bathroom.zone().manual_override_active());
        assert!(!bathroom.zone().sensor_suppressed());
    }

    #[test]
    fn test_water_leak_with_door_open() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::OccupancySensor, Reading::Occupancy(false));
        h.take();

        h.send(10, Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(true));
        assert!(h.engine.bathroom().zone().sensor_suppressed());
        assert!(h.engine.bathroom().zone().manual_override_active());
        assert_eq!(
            h.take(),
            r#"zigbee2mqtt/ikea-led-strip-driver-3/set {"state":"ON"}"#
        );

        h.send(20, Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(false));
        assert!(!h.engine.bathroom().zone().sensor_suppressed());
        assert!(h.out.commands.is_empty());
    }

    #[test]
    fn test_leak_cleared_with_door_closed_keeps_hold() {
        let mut h = Harness::new();
        h.send(0, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(true));
        h.send(10, Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(true));
        h.send(20, Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(false));

        assert!(h.engine.bathroom().zone().manual_override_active());
        assert!(h.engine.bathroom().zone().sensor_suppressed());
    }

    #[test]
    fn test_bathroom_primary_switch_debounce() {
        let mut h = Harness::new();
        h.action(0, Zone::Bathroom, SourceKind::ManualSwitchPrimary, "on");
        h.action(10, Zone::Bathroom, SourceKind::ManualSwitchPrimary, "off");

        h.advance(3010);
        assert!(!h.engine.bathroom().zone().sensor_suppressed());
        assert!(!h.engine.kitchen().sensor_suppressed());
    }

    #[test]
    fn test_kitchen_door_opening_turns_bulbs_on() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.send(10, Zone::Kitchen, SourceKind::DoorContact, Reading::Contact(true));
        assert!(h.out.commands.is_empty());

        h.send(20, Zone::Kitchen, SourceKind::DoorContact, Reading::Contact(false));
        assert_eq!(h.take(), r#"zigbee2mqtt/hue-bulbs-c/set {"state":"ON"}"#);
        assert!(h.engine.kitchen().manual_override_active());
    }

    #[test]
    fn test_scene_single() {
        let mut h = Harness::new();
        h.action(0, Zone::Bedroom, SourceKind::SceneButton, "single");

        insta::assert_snapshot!(h.take(), @r#"
        zigbee2mqtt/kitchen/set {"state":"ON"}
        zigbee2mqtt/bedroom/set {"state":"ON"}
        zigbee2mqtt/ikea-led-strip-driver-3/set {"state":"ON"}
        "#);
    }

    #[test]
    fn test_scene_multi_press_turns_off() {
        for action in ["double", "triple", "quadruple"] {
            let mut h = Harness::new();
            h.action(0, Zone::Bedroom, SourceKind::SceneButton, action);

            assert_eq!(h.out.commands.len(), 3);
            assert!(h.out.commands.iter().all(|c| c.state == Switch::Off));
            assert_eq!(
                h.out.commands.iter().map(|c| c.topic).collect::<Vec<_>>(),
                devices::SCENE_TARGETS
            );
        }
    }

    #[test]
    fn test_scene_unknown_action() {
        let mut h = Harness::new();
        h.action(0, Zone::Bedroom, SourceKind::SceneButton, "hold");
        assert!(h.out.commands.is_empty());
    }

    #[test]
    fn test_scene_leaves_zone_flags_alone() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "on");
        h.action(10, Zone::Bedroom, SourceKind::SceneButton, "double");

        assert!(h.engine.kitchen().manual_override_active());
        assert_eq!(h.engine.bathroom(), &BathroomState::default());
    }

    #[test]
    fn test_publish_failure_keeps_transition() {
        let mut engine = RuleEngine::new(DEBOUNCE);
        let mut failing = FailingPublisher { attempts: 0 };

        engine.handle(
            &Event::new(Zone::Bathroom, SourceKind::WaterLeakSensor, Reading::WaterLeak(true)),
            Instant::now(),
            &mut failing,
        );

        assert_eq!(failing.attempts, 1);
        assert!(engine.bathroom().water_leak_detected());
        assert!(engine.bathroom().zone().manual_override_active());
    }

    #[test]
    fn test_reset() {
        let mut h = Harness::new();
        h.action(0, Zone::Kitchen, SourceKind::ManualSwitchPrimary, "off");
        h.send(0, Zone::Bathroom, SourceKind::DoorContact, Reading::Contact(true));

        h.engine.reset();
        assert_eq!(h.engine.kitchen(), &ZoneState::default());
        assert_eq!(h.engine.bathroom(), &BathroomState::default());
        assert_eq!(h.engine.next_deadline(), None);
    }
}
