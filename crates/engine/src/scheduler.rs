// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic promotion of due jobs onto the executor's runnable queue.

use crate::supervisor::{spawn_supervised, TaskFailure};
use ccdash_core::{Clock, Job};
use ccdash_storage::{jobs, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default tick interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(30);

/// Single cooperative ticker that claims due jobs and enqueues them.
/// It never executes jobs itself.
pub struct Scheduler {
    store: Store,
    clock: Arc<dyn Clock>,
    queue: mpsc::Sender<Job>,
    tick: Duration,
}

impl Scheduler {
    pub fn new(store: Store, clock: Arc<dyn Clock>, queue: mpsc::Sender<Job>) -> Self {
        Self {
            store,
            clock,
            queue,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Claim every due job right now and enqueue it. Returns how many were
    /// dispatched this tick.
    pub async fn tick_once(&self) -> u64 {
        let now = self.clock.now();
        let claimed = match self.store.with_tx(|tx| jobs::claim_due(tx, now)) {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(error = %e, "scheduler claim failed");
                return 0;
            }
        };

        let mut dispatched = 0;
        for job in claimed {
            let id = job.id.clone();
            if self.queue.send(job).await.is_err() {
                tracing::warn!(job_id = %id, "executor queue closed, job stays claimed");
                break;
            }
            tracing::info!(job_id = %id, "job dispatched");
            dispatched += 1;
        }
        dispatched
    }

    /// Start the tick loop.
    ///
    /// Runs once immediately so jobs whose `scheduled_at` passed while the
    /// process was down are dispatched without waiting a full tick. Claims
    /// stranded by a previous process are released first.
    pub fn start(
        self,
        shutdown: CancellationToken,
        failures: mpsc::Sender<TaskFailure>,
    ) -> JoinHandle<()> {
        if let Err(e) = self.store.with_tx(|tx| jobs::release_stale_claims(tx)) {
            tracing::warn!(error = %e, "failed to release stale claims");
        }

        let tick = self.tick;
        let loop_shutdown = shutdown.clone();
        spawn_supervised("scheduler", shutdown, Some(failures), async move {
            // NOTE: interval created outside the loop; the first tick fires
            // immediately, which doubles as the startup catch-up pass.
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.tick_once().await;
                    }
                    _ = loop_shutdown.cancelled() => {
                        tracing::debug!("scheduler stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
