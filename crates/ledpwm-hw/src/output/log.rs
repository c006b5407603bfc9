//! Output that only traces level changes, for hosts without LED lines.

use super::LedOutput;
use crate::channel::{ChannelId, CHANNEL_COUNT};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// LED output that logs transitions instead of driving hardware.
#[derive(Default)]
pub struct LogOutput {
    levels: [AtomicBool; CHANNEL_COUNT],
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last level driven on a channel.
    pub fn level(&self, channel: ChannelId) -> bool {
        self.levels[channel.index()].load(Ordering::Relaxed)
    }
}

impl LedOutput for LogOutput {
    fn set(&self, channel: ChannelId, on: bool) -> Result<()> {
        let previous = self.levels[channel.index()].swap(on, Ordering::Relaxed);
        if previous != on {
            debug!("{} {}", channel, if on { "on" } else { "off" });
        }
        Ok(())
    }
}
