//! Configuration management.

use anyhow::{bail, Context, Result};
use ledpwm_hw::output::{DEFAULT_BASE_LINE, DEFAULT_GPIO_CHIP};
use ledpwm_hw::{ChannelState, ChannelTable, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Device node configuration
    #[serde(default)]
    pub device: DeviceConfig,

    /// Timer engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// LED output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Command relay configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// Initial channel table, one entry per channel
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelState>,
}

/// Device node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Socket path the device node is published at
    #[serde(default = "default_device_path")]
    pub path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
        }
    }
}

/// Timer engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Re-poll interval for disabled or fully on/off channels in milliseconds
    #[serde(default = "default_idle_poll")]
    pub idle_poll: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_poll: default_idle_poll(),
        }
    }
}

/// Kind of LED output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// GPIO character device lines
    #[default]
    Gpio,
    /// Log level changes only
    Log,
}

/// LED output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output backend
    #[serde(default)]
    pub kind: OutputKind,

    /// GPIO chip device
    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,

    /// GPIO line offset of channel 0; the other channels follow consecutively
    #[serde(default = "default_base_line")]
    pub base_line: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            kind: OutputKind::default(),
            gpio_chip: default_gpio_chip(),
            base_line: default_base_line(),
        }
    }
}

/// Command relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Whether to connect to a controller at all
    #[serde(default)]
    pub enable: bool,

    /// Controller address (e.g., "192.168.0.15:4323")
    #[serde(default = "default_controller")]
    pub controller: String,

    /// Delay before reconnecting after the connection drops, in milliseconds
    #[serde(default = "default_reconnect")]
    pub reconnect: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enable: false,
            controller: default_controller(),
            reconnect: default_reconnect(),
        }
    }
}

// Default value functions
fn default_device_path() -> String {
    format!("/run/{}.sock", ledpwm_hw::DEVICE_NAME)
}

fn default_idle_poll() -> u64 {
    100
}

fn default_gpio_chip() -> String {
    DEFAULT_GPIO_CHIP.to_string()
}

fn default_base_line() -> u32 {
    DEFAULT_BASE_LINE
}

fn default_controller() -> String {
    "127.0.0.1:4323".to_string()
}

fn default_reconnect() -> u64 {
    5000
}

fn default_channels() -> Vec<ChannelState> {
    [250, 500, 1000, 2000]
        .into_iter()
        .map(|period| ChannelState::new(true, 50, period))
        .collect()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.initial_table()?;
        Ok(config)
    }

    /// Builds the channel table the daemon starts with.
    pub fn initial_table(&self) -> Result<ChannelTable> {
        let channels: [ChannelState; CHANNEL_COUNT] = match self.channels.as_slice().try_into() {
            Ok(channels) => channels,
            Err(_) => bail!(
                "Expected {} [[channels]] entries, found {}",
                CHANNEL_COUNT,
                self.channels.len()
            ),
        };
        Ok(ChannelTable::new(channels))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            engine: EngineConfig::default(),
            output: OutputConfig::default(),
            relay: RelayConfig::default(),
            channels: default_channels(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.device.path, "/run/led_driver.sock");
        assert_eq!(config.engine.idle_poll, 100);
        assert_eq!(config.output.kind, OutputKind::Gpio);
        assert_eq!(config.output.gpio_chip, "/dev/gpiochip1");
        assert_eq!(config.output.base_line, 21);
        assert!(!config.relay.enable);

        let table = config.initial_table().unwrap();
        let periods: Vec<i32> = table.channels().iter().map(|c| c.period).collect();
        assert_eq!(periods, vec![250, 500, 1000, 2000]);
        assert!(table.channels().iter().all(|c| c.enabled && c.duty_cycle == 50));
    }

    #[test]
    fn test_parse_sections() {
        let config = Config::parse(
            r#"
            [device]
            path = "/tmp/leds.sock"

            [output]
            kind = "log"

            [relay]
            enable = true
            controller = "10.0.0.2:4323"

            [[channels]]
            enabled = true
            duty_cycle = 10
            period = 4000

            [[channels]]
            enabled = false
            duty_cycle = 0
            period = 0

            [[channels]]
            enabled = true
            duty_cycle = 100
            period = 100

            [[channels]]
            enabled = true
            duty_cycle = 50
            period = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.device.path, "/tmp/leds.sock");
        assert_eq!(config.output.kind, OutputKind::Log);
        assert_eq!(config.relay.controller, "10.0.0.2:4323");
        assert_eq!(config.relay.reconnect, 5000);
        assert_eq!(config.channels[0], ChannelState::new(true, 10, 4000));
        assert!(!config.channels[1].enabled);
    }

    #[test]
    fn test_wrong_channel_count_rejected() {
        let err = Config::parse(
            r#"
            [[channels]]
            enabled = true
            duty_cycle = 10
            period = 4000
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[[channels]]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledpwmd.toml");
        let mut config = Config::default();
        config.engine.idle_poll = 20;
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.engine.idle_poll, 20);
        assert_eq!(loaded.channels, config.channels);
    }
}
