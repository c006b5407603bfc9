//! Software PWM timer engine.
//!
//! Each channel runs as its own tokio task acting as a one-shot timer that
//! re-arms itself: on every firing it reads the channel from the store,
//! drives the output and sleeps for the phase the machine picked. The engine
//! never writes the store.

mod phase;

pub use phase::{Phase, PhaseMachine, Step, DEFAULT_IDLE_POLL, MIN_DELAY};

use crate::channel::ChannelId;
use crate::output::LedOutput;
use crate::store::ChannelStore;
use crate::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between repeated output error logs of one channel.
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Running PWM engine, one timer task per channel.
pub struct PwmEngine {
    tasks: Vec<JoinHandle<()>>,
    output: Arc<dyn LedOutput>,
}

impl PwmEngine {
    /// Starts a timer task for every channel on the current runtime.
    pub fn start(
        store: Arc<ChannelStore>,
        output: Arc<dyn LedOutput>,
        idle_poll: Duration,
    ) -> Self {
        let tasks = ChannelId::all()
            .map(|id| {
                let store = store.clone();
                let output = output.clone();
                tokio::spawn(async move { run_channel(id, store, output, idle_poll).await })
            })
            .collect();

        info!("PWM engine started (idle poll {:?})", idle_poll);
        Self { tasks, output }
    }

    /// Stops every timer and forces all outputs off.
    pub async fn shutdown(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            task.abort();
            let _ = task.await;
        }
        if let Err(e) = self.output.all_off() {
            warn!("Failed to switch LEDs off on shutdown: {}", e);
        }
        info!("PWM engine stopped");
    }
}

impl Drop for PwmEngine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_channel(
    id: ChannelId,
    store: Arc<ChannelStore>,
    output: Arc<dyn LedOutput>,
    idle_poll: Duration,
) {
    let mut machine = PhaseMachine::new(idle_poll);
    let mut errors = ErrorLog::new(id);
    let mut deadline = Instant::now();
    debug!("{} timer started", id);

    loop {
        let step = machine.fire(store.read_channel(id));
        match output.set(id, step.on) {
            Ok(()) => errors.clear(),
            Err(e) => errors.record(&e),
        }
        // Phases are scheduled from the previous deadline; a late firing
        // does not try to catch up.
        deadline = (deadline + step.delay).max(Instant::now());
        tokio::time::sleep_until(deadline).await;
    }
}

/// Rate limiter for output failures of one channel: logs the first failure
/// of every failing stretch, then at most once per interval with a repeat
/// count.
struct ErrorLog {
    id: ChannelId,
    failing: bool,
    suppressed: u32,
    last_log: Option<Instant>,
}

impl ErrorLog {
    fn new(id: ChannelId) -> Self {
        Self {
            id,
            failing: false,
            suppressed: 0,
            last_log: None,
        }
    }

    fn record(&mut self, e: &Error) {
        self.failing = true;
        let due = self
            .last_log
            .map_or(true, |at| at.elapsed() >= ERROR_LOG_INTERVAL);
        if !due {
            self.suppressed += 1;
            return;
        }

        if self.suppressed > 0 {
            warn!(
                "{} output error (repeated {} times): {}",
                self.id,
                self.suppressed + 1,
                e
            );
        } else {
            warn!("{} output error: {}", self.id, e);
        }
        self.last_log = Some(Instant::now());
        self.suppressed = 0;
    }

    fn clear(&mut self) {
        if !self.failing {
            return;
        }
        if self.suppressed > 0 {
            warn!(
                "{} output recovered after {} unlogged errors",
                self.id, self.suppressed
            );
        } else {
            debug!("{} output recovered", self.id);
        }
        self.failing = false;
        self.suppressed = 0;
        self.last_log = None;
    }
}
