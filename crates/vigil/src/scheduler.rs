use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::executor::CycleExecutor;

/// Default pause between two cycles
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Drives the cycle executor on a fixed cadence
///
/// One cycle runs as soon as the scheduler starts, then one per interval.
/// Cycles never overlap: a tick that comes due while a cycle is still
/// running waits for it to finish.
pub struct Scheduler {
    executor: CycleExecutor,
    period: Duration,
}

impl Scheduler {
    /// `period` must be non-zero; callers are expected to validate it
    pub fn new(executor: CycleExecutor, period: Duration) -> Self {
        Self { executor, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the periodic driver
    ///
    /// # Panics
    ///
    /// Panics if the period is zero.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let Scheduler { executor, period } = self;

        let join = tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Background uptime checker started.");

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => break,

                    _ = ticker.tick() => {
                        // The cycle runs to completion even if stop is requested meanwhile
                        if let Err(e) = executor.run_cycle().await {
                            error!("Error fetching targets for checking: {}", e);
                        }
                    }
                }
            }

            info!("Background uptime checker stopped.");
        });

        SchedulerHandle { shutdown_tx, join }
    }
}

/// Handle to a running [`Scheduler`]
///
/// Dropping the handle stops the scheduler the same way [`SchedulerHandle::stop`]
/// does, without waiting for it.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling new cycles and wait for the in-flight one, if any
    pub async fn stop(self) {
        if self.shutdown_tx.send(true).is_err() {
            warn!("Scheduler already exited before stop was requested");
        }

        if let Err(e) = self.join.await {
            error!("Scheduler task failed: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }
}
