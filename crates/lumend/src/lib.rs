pub mod bus;
pub mod config;
pub mod controller;
pub mod engine;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use controller::Controller;
pub use controller::ControllerError;
pub use engine::Classifier;
pub use engine::RuleEngine;
