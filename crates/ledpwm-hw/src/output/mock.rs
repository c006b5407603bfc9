//! In-memory output for tests.

use super::LedOutput;
use crate::channel::{ChannelId, CHANNEL_COUNT};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

/// One recorded drive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drive {
    pub at: Instant,
    pub channel: ChannelId,
    pub on: bool,
}

/// Records every drive call with the (possibly paused) tokio clock.
/// `fail` lets tests make a channel's output error out.
#[derive(Default)]
pub struct MockOutput {
    pub drives: Mutex<Vec<Drive>>,
    pub fail: [AtomicBool; CHANNEL_COUNT],
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every drive of `channel` fail (or succeed again).
    pub fn set_failing(&self, channel: ChannelId, failing: bool) {
        self.fail[channel.index()].store(failing, Ordering::SeqCst);
    }

    /// Returns the recorded drives for one channel.
    pub fn drives_for(&self, channel: ChannelId) -> Vec<Drive> {
        self.drives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.channel == channel)
            .copied()
            .collect()
    }

    /// Returns the level changes of one channel, dropping repeated levels.
    pub fn transitions_for(&self, channel: ChannelId) -> Vec<Drive> {
        let mut transitions: Vec<Drive> = Vec::new();
        for drive in self.drives_for(channel) {
            if transitions.last().map_or(true, |last| last.on != drive.on) {
                transitions.push(drive);
            }
        }
        transitions
    }

    /// Forgets every recorded drive.
    pub fn clear(&self) {
        self.drives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LedOutput for MockOutput {
    fn set(&self, channel: ChannelId, on: bool) -> Result<()> {
        self.drives
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Drive {
                at: Instant::now(),
                channel,
                on,
            });

        if self.fail[channel.index()].load(Ordering::SeqCst) {
            return Err(Error::Output {
                channel: channel.index(),
                source: std::io::Error::other("mock: output failure injected"),
            });
        }
        Ok(())
    }
}
