//! Physical LED outputs.
//!
//! An output only knows on and off; the PWM waveform is produced by the
//! timer engine toggling it.

mod gpio;
mod log;
pub mod mock;

pub use self::gpio::{consecutive_lines, GpioOutput, DEFAULT_BASE_LINE, DEFAULT_GPIO_CHIP};
pub use self::log::LogOutput;

use crate::channel::ChannelId;
use crate::Result;

/// Digital on/off output for every LED channel.
///
/// Called from the engine's timer tasks, so implementations must return
/// quickly and never wait on other callers.
pub trait LedOutput: Send + Sync {
    /// Drives one channel on or off.
    fn set(&self, channel: ChannelId, on: bool) -> Result<()>;

    /// Forces every channel off, reporting the first failure.
    fn all_off(&self) -> Result<()> {
        let mut first_err = None;
        for channel in ChannelId::all() {
            if let Err(e) = self.set(channel, false) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
