//! Cancellable readiness polling against the server port.
//!
//! The poller runs on its own task at a fixed cadence and reports elapsed
//! time through a watch channel for progress display. Two timeout policies:
//! a first-ever launch polls indefinitely (initial model/asset setup can take
//! arbitrarily long), subsequent launches are bounded by the max wait.
//! Timing out is a soft cancellation: the poller stops, but the spawned
//! server is left alone and may still bind the port later.

use crate::{env, probe};
use std::time::Duration;
use tokio::select;
use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum ReadinessOutcome {
    Ready,
    TimedOut,
    Cancelled,
}

pub struct ReadinessPoller {
    port: u16,
    interval: Duration,
    timeout: Option<Duration>,
}

impl ReadinessPoller {
    /// `first_launch` selects the unbounded policy; otherwise the poll is
    /// capped at [`env::MAX_WAIT`].
    pub fn new(port: u16, first_launch: bool) -> Self {
        Self {
            port,
            interval: *env::CHECK_INTERVAL,
            timeout: if first_launch { None } else { Some(*env::MAX_WAIT) },
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start polling on a background task.
    pub fn spawn(self) -> PollHandle {
        let (progress_tx, progress_rx) = watch::channel(Duration::ZERO);
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let outcome = loop {
                select! {
                    // fires on explicit cancel and on handle drop
                    _ = &mut cancel_rx => break ReadinessOutcome::Cancelled,
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed();
                        let _ = progress_tx.send(elapsed);
                        if probe::is_port_open(self.port) {
                            break ReadinessOutcome::Ready;
                        }
                        if let Some(timeout) = self.timeout
                            && elapsed >= timeout
                        {
                            break ReadinessOutcome::TimedOut;
                        }
                    }
                }
            };
            let _ = result_tx.send(outcome);
        });

        PollHandle {
            progress: progress_rx,
            result: result_rx,
            cancel: Some(cancel_tx),
        }
    }
}

/// Handle to an in-flight poll. Dropping it cancels the loop.
pub struct PollHandle {
    progress: watch::Receiver<Duration>,
    result: oneshot::Receiver<ReadinessOutcome>,
    cancel: Option<oneshot::Sender<()>>,
}

impl PollHandle {
    /// Elapsed time reported by the most recent poll iteration.
    pub fn elapsed(&self) -> Duration {
        *self.progress.borrow()
    }

    /// Resolves when the next poll iteration reports progress.
    pub async fn progress_changed(&mut self) -> bool {
        self.progress.changed().await.is_ok()
    }

    /// Stop the loop without touching the server process.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the poll to resolve.
    pub async fn outcome(self) -> ReadinessOutcome {
        self.result.await.unwrap_or(ReadinessOutcome::Cancelled)
    }

    /// Non-blocking check whether the poll has already resolved.
    pub fn try_outcome(&mut self) -> Option<ReadinessOutcome> {
        self.result.try_recv().ok()
    }
}
