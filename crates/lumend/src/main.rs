use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use lumend::bus::RumqttcBus;
use lumend::Classifier;
use lumend::Config;
use lumend::Controller;
use lumend::LogLevel;
use lumend::RuleEngine;
use tracing_subscriber::prelude::*;

/// Zone lighting rules for a Zigbee2MQTT installation
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "lumend.toml")]
    config: PathBuf,

    /// Override the configured default log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.targets(args.log_level))
        .init();

    tracing::info!("lumend starting");
    tracing::info!("Loaded config from: {}", args.config.display());
    tracing::info!(
        "Connecting to MQTT broker at {}:{}",
        config.mqtt.address,
        config.mqtt.port
    );

    let bus = RumqttcBus::new(&config.mqtt);
    let engine = RuleEngine::new(config.rules.debounce());
    let mut controller = Controller::new(bus, Classifier::installed(), engine);

    controller
        .start(&config.mqtt.topics)
        .await
        .context("Failed to subscribe to configured topics")?;

    tokio::select! {
        result = controller.run() => {
            result.context("Controller stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    tracing::info!("lumend shutdown complete");

    Ok(())
}
