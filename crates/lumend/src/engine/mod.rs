mod classifier;
mod command;
pub mod devices;
mod event;
mod rules;
mod timer;
mod zone;

pub use classifier::Classifier;
pub use classifier::DecodeError;
pub use classifier::Field;
pub use classifier::Rule;
pub use command::BusPublisher;
pub use command::Command;
pub use command::CommandPublisher;
pub use command::PublishError;
pub use command::RecordingPublisher;
pub use command::Switch;
pub use event::Event;
pub use event::Reading;
pub use event::SourceKind;
pub use rules::RuleEngine;
pub use timer::DebounceTimers;
pub use timer::Expiry;
pub use zone::BathroomState;
pub use zone::Zone;
pub use zone::ZoneState;
