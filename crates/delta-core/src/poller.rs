//! Poll-loop scheduling.
//!
//! The poller is the top-level driving loop: an optional initial full
//! pass, then one incremental pass per configured interval, forever. The
//! clock is injectable so tests can simulate elapsed cycles without real
//! waiting, and the sleep is interruptible so a future cancellation
//! signal can stop the loop cleanly.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::client::SyncWindow;
use crate::evaluate::MappingEvaluator;
use crate::reconcile::ReconciliationEngine;

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds to sleep between sync cycles.
    pub seconds_between_syncs: u64,

    /// Width of the sliding change window in seconds.
    pub seconds_since_changed: u64,

    /// Run one full (unbounded-window) pass before the first incremental
    /// cycle.
    #[serde(default)]
    pub full_sync_first: bool,

    /// Remember permanently-failed ids and skip them for the rest of the
    /// run.
    #[serde(default = "default_memoize")]
    pub memoize_failures: bool,
}

fn default_memoize() -> bool {
    true
}

/// Time source and interruptible timer for the poll loop.
pub trait Clock {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleeps for `duration`; returns `false` when shutdown was requested
    /// instead of the timeout elapsing.
    fn sleep(&self, duration: Duration) -> bool;
}

/// Wall-clock implementation whose sleep can be interrupted through a
/// [`ShutdownHandle`].
pub struct SystemClock {
    shutdown: Receiver<()>,
}

/// Requests the poll loop to stop at the next sleep.
pub struct ShutdownHandle {
    tx: Sender<()>,
}

impl ShutdownHandle {
    /// Signals shutdown. Idempotent; ignored once the loop has exited.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

impl SystemClock {
    /// Creates a clock and the handle that can interrupt its sleep.
    #[must_use]
    pub fn new() -> (Self, ShutdownHandle) {
        let (tx, rx) = mpsc::channel();
        (Self { shutdown: rx }, ShutdownHandle { tx })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> bool {
        match self.shutdown.recv_timeout(duration) {
            Ok(()) => false,
            Err(RecvTimeoutError::Timeout) => true,
            // Handle dropped without signalling: plain uninterruptible sleep.
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(duration);
                true
            }
        }
    }
}

/// Drives the poll/sync loop.
pub struct Poller<E: MappingEvaluator, C: Clock> {
    engine: ReconciliationEngine<E>,
    schedule: ScheduleConfig,
    clock: C,
}

impl<E: MappingEvaluator, C: Clock> Poller<E, C> {
    /// Creates a poller over a configured engine.
    pub fn new(engine: ReconciliationEngine<E>, schedule: ScheduleConfig, clock: C) -> Self {
        Self {
            engine,
            schedule,
            clock,
        }
    }

    /// Runs the loop until the clock reports a shutdown request.
    ///
    /// A failed pass is logged and the loop continues with the next
    /// cycle; a single bad cycle never terminates the process.
    pub fn run(&mut self) {
        info!(
            interval_secs = self.schedule.seconds_between_syncs,
            window_secs = self.schedule.seconds_since_changed,
            "poller started"
        );
        if self.schedule.full_sync_first {
            info!("running initial full sync");
            self.run_pass(&SyncWindow::full());
        }

        loop {
            let window =
                SyncWindow::changed_within(self.clock.now(), self.schedule.seconds_since_changed);
            self.run_pass(&window);
            if !self
                .clock
                .sleep(Duration::from_secs(self.schedule.seconds_between_syncs))
            {
                info!("shutdown requested; stopping poll loop");
                break;
            }
        }
    }

    fn run_pass(&mut self, window: &SyncWindow) {
        match self.engine.run_pass(window) {
            Ok(stats) => info!(summary = %stats.summary(), "sync cycle complete"),
            Err(err) => error!(error = %err, "sync cycle failed; will retry next cycle"),
        }
    }
}
