//! Per-channel PWM phase machine.
//!
//! The machine is advanced once per timer firing with the channel's current
//! configuration and answers which level to drive and how long to wait until
//! the next firing. Duty cycle and period are taken fresh on every firing, so
//! a new configuration applies at the next phase boundary at the latest.

use crate::channel::ChannelState;
use std::time::Duration;

/// Lower bound for any reschedule delay.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Default re-poll interval for disabled or fully on/off channels.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(100);

/// Half of a channel's PWM cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Off,
    On,
}

/// Result of one firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Level to drive the output to.
    pub on: bool,
    /// Time until the next firing.
    pub delay: Duration,
}

/// Phase state of one channel.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    idle_poll: Duration,
}

impl PhaseMachine {
    /// Creates a machine in the off phase.
    pub fn new(idle_poll: Duration) -> Self {
        Self {
            phase: Phase::Off,
            idle_poll: idle_poll.max(MIN_DELAY),
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advances the machine by one timer firing.
    pub fn fire(&mut self, state: ChannelState) -> Step {
        if !state.enabled {
            // Output is forced off, so cycling resumes from the off phase.
            self.phase = Phase::Off;
            return Step {
                on: false,
                delay: self.idle_poll,
            };
        }

        let duty = state.duty_cycle.clamp(0, 100) as u64;
        let period = state.period.max(0) as u64;

        match (duty, self.phase) {
            (0, _) => {
                self.phase = Phase::Off;
                Step {
                    on: false,
                    delay: self.idle_poll,
                }
            }
            (100, _) => {
                self.phase = Phase::On;
                Step {
                    on: true,
                    delay: self.idle_poll,
                }
            }
            (_, Phase::Off) => {
                self.phase = Phase::On;
                Step {
                    on: true,
                    delay: phase_delay(period * duty / 100),
                }
            }
            (_, Phase::On) => {
                self.phase = Phase::Off;
                Step {
                    on: false,
                    delay: phase_delay(period * (100 - duty) / 100),
                }
            }
        }
    }
}

fn phase_delay(ms: u64) -> Duration {
    Duration::from_millis(ms).max(MIN_DELAY)
}
