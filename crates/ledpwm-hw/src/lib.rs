//! LED PWM Hardware Library
//!
//! Software PWM for a bank of four LEDs: a shared channel table, a per-channel
//! timer engine that drives the outputs from it, and a fixed-size device
//! interface through which other processes read and replace the table.

pub mod channel;
pub mod device;
pub mod engine;
pub mod error;
pub mod node;
pub mod output;
pub mod relay;
pub mod store;

pub use channel::{ChannelId, ChannelState, ChannelTable, Field, CHANNEL_COUNT, TABLE_SIZE};
pub use device::{LedDevice, OpenDevice, TableDevice};
pub use engine::PwmEngine;
pub use error::{Error, Result};
pub use output::{GpioOutput, LedOutput, LogOutput};
pub use store::ChannelStore;

/// Default name of the device node.
pub const DEVICE_NAME: &str = "led_driver";
