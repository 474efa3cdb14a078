//! Periodic expiry sweeper.

use crate::queue::TwoLevelQueue;
use fairgate_core::unix_now_ms;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Background task that periodically moves expired requests to the DLQ so
/// the scheduler never dispatches them.
pub struct QueueSweeper {
    queue: Arc<TwoLevelQueue>,
    interval: Duration,
}

impl QueueSweeper {
    pub fn new(queue: Arc<TwoLevelQueue>, interval: Duration) -> Self {
        Self { queue, interval }
    }

    /// Spawns the sweep loop. The task exits when `shutdown` flips to true.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        match self.queue.sweep_expired(unix_now_ms()).await {
                            Ok(expired) => {
                                if !expired.is_empty() {
                                    tracing::info!(
                                        count = expired.len(),
                                        "sweeper moved expired requests to dlq"
                                    );
                                }
                            }
                            Err(error) => {
                                tracing::error!(error = %error, "queue sweep failed");
                            }
                        }
                    }
                }
            }
            tracing::debug!("queue sweeper stopped");
        })
    }
}
