//! LED PWM Daemon
//!
//! Runs the software PWM engine for the LED bank, publishes the device node
//! and optionally relays remote commands into it.

mod config;
mod node;
mod relay;

use anyhow::{Context, Result};
use ledpwm_hw::engine::PwmEngine;
use ledpwm_hw::{ChannelStore, GpioOutput, LedDevice, LedOutput, LogOutput};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, OutputKind};
use node::DeviceNode;

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = Config::load(&config_path).context("Failed to load configuration")?;
    info!("Loaded configuration from: {}", config_path);

    let store = Arc::new(ChannelStore::new(config.initial_table()?));
    let output = build_output(&config)?;

    let engine = PwmEngine::start(
        store.clone(),
        output,
        Duration::from_millis(config.engine.idle_poll),
    );

    let device = LedDevice::new(store);
    let node = match DeviceNode::register(&config.device.path, device.clone()) {
        Ok(node) => node,
        Err(e) => {
            engine.shutdown().await;
            return Err(e);
        }
    };

    if config.relay.enable {
        let controller = config.relay.controller.clone();
        let reconnect = Duration::from_millis(config.relay.reconnect);
        let relay_device = device.clone();
        tokio::spawn(async move {
            relay::relay_loop(controller, relay_device, reconnect).await;
        });
    } else {
        info!("Command relay disabled");
    }

    // Setup Unix signal handlers
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down");
        }
    }

    node.unregister();
    engine.shutdown().await;

    Ok(())
}

fn build_output(config: &Config) -> Result<Arc<dyn LedOutput>> {
    match config.output.kind {
        OutputKind::Gpio => {
            let gpio = GpioOutput::new(&config.output.gpio_chip, config.output.base_line)
                .context("Failed to set up GPIO LED output")?;
            Ok(Arc::new(gpio))
        }
        OutputKind::Log => {
            info!("Using log-only LED output");
            Ok(Arc::new(LogOutput::new()))
        }
    }
}
