//! LED output through the GPIO character device.

use super::LedOutput;
use crate::channel::{ChannelId, CHANNEL_COUNT};
use crate::{Error, Result};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use std::path::Path;
use tracing::info;

/// Default GPIO chip carrying the LED lines.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip1";

/// Line offset of channel 0 (user LED 0 on the BeagleBone).
pub const DEFAULT_BASE_LINE: u32 = 21;

/// Consumer label shown for the requested lines.
const CONSUMER: &str = "ledpwm";

/// Returns the line offset of every channel when they are consecutive.
pub fn consecutive_lines(base_line: u32) -> [u32; CHANNEL_COUNT] {
    std::array::from_fn(|i| base_line + i as u32)
}

/// GPIO-backed LED output, one requested line per channel.
pub struct GpioOutput {
    lines: [u32; CHANNEL_COUNT],
    handles: [LineHandle; CHANNEL_COUNT],
}

impl GpioOutput {
    /// Requests consecutive lines starting at `base_line` on `chip`.
    pub fn new<P: AsRef<Path>>(chip: P, base_line: u32) -> Result<Self> {
        Self::with_lines(chip, consecutive_lines(base_line))
    }

    /// Requests one explicit line per channel, all driven low initially.
    pub fn with_lines<P: AsRef<Path>>(chip: P, lines: [u32; CHANNEL_COUNT]) -> Result<Self> {
        let chip_path = chip.as_ref();
        let mut chip = Chip::new(chip_path).map_err(|source| Error::GpioChip {
            chip: chip_path.display().to_string(),
            source,
        })?;

        let mut handles = Vec::with_capacity(CHANNEL_COUNT);
        for channel in ChannelId::all() {
            let offset = lines[channel.index()];
            let handle = chip
                .get_line(offset)
                .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, CONSUMER))
                .map_err(|source| Error::Gpio {
                    channel: channel.index(),
                    source,
                })?;
            handles.push(handle);
        }
        let handles: [LineHandle; CHANNEL_COUNT] = handles
            .try_into()
            .map_err(|_| Error::Transfer("GPIO line count mismatch".to_string()))?;

        info!("GPIO lines {:?} on {:?} requested as outputs", lines, chip_path);
        Ok(Self { lines, handles })
    }

    /// Returns the line offset used for a channel.
    pub fn line(&self, channel: ChannelId) -> u32 {
        self.lines[channel.index()]
    }
}

impl LedOutput for GpioOutput {
    fn set(&self, channel: ChannelId, on: bool) -> Result<()> {
        self.handles[channel.index()]
            .set_value(u8::from(on))
            .map_err(|source| Error::Gpio {
                channel: channel.index(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_lines() {
        assert_eq!(consecutive_lines(DEFAULT_BASE_LINE), [21, 22, 23, 24]);
        assert_eq!(consecutive_lines(0), [0, 1, 2, 3]);
    }

    #[test]
    fn test_missing_chip_is_gpio_error() {
        let err = GpioOutput::new("/dev/ledpwm-no-such-gpiochip", DEFAULT_BASE_LINE)
            .err()
            .unwrap();
        assert!(matches!(err, Error::GpioChip { .. }));
        assert!(err.to_string().contains("ledpwm-no-such-gpiochip"));
    }
}
