// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool that runs claimed jobs as assistant child processes.
//!
//! Workers pull from a shared queue, gate each job through the safety
//! checker, launch the assistant in print mode inside the job's execution
//! directory, and stream its output into the store on a cadence. A per-job
//! cancellation token triggers SIGTERM, a grace period, then SIGKILL of the
//! whole process group.

use crate::safety::SafetyChecker;
use crate::subprocess::CANCEL_GRACE;
use crate::supervisor::{panic_message, spawn_supervised, TaskFailure};
use ccdash_core::{Clock, Job, JobId, JobStatus};
use ccdash_storage::{jobs, Store, StoreError};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Output flush cadence and buffer bound.
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const FLUSH_BYTES: usize = 64 * 1024;

/// Runnable-queue depth; the scheduler blocks once it is full.
const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Assistant binary launched for each job.
    pub assistant_binary: String,
    /// Worker pool size.
    pub workers: usize,
    /// SIGTERM-to-SIGKILL grace on cancellation.
    pub grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            assistant_binary: "claude".to_string(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            grace: CANCEL_GRACE,
        }
    }
}

struct Inner {
    store: Store,
    config: ExecutorConfig,
    safety: Arc<SafetyChecker>,
    clock: Arc<dyn Clock>,
    cancels: Mutex<HashMap<JobId, CancellationToken>>,
}

/// Handle to the worker pool: enqueue, cancel, start.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
    queue_tx: mpsc::Sender<Job>,
    queue_rx: Arc<Mutex<Option<mpsc::Receiver<Job>>>>,
}

impl Executor {
    pub fn new(
        store: Store,
        config: ExecutorConfig,
        safety: Arc<SafetyChecker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_DEPTH);
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                safety,
                clock,
                cancels: Mutex::new(HashMap::new()),
            }),
            queue_tx,
            queue_rx: Arc::new(Mutex::new(Some(queue_rx))),
        }
    }

    /// Sender side of the runnable queue (used by the scheduler).
    pub fn queue(&self) -> mpsc::Sender<Job> {
        self.queue_tx.clone()
    }

    /// Flip the cancel signal of a job currently held by a worker.
    /// Returns `false` when no worker owns the job.
    pub fn cancel(&self, id: &JobId) -> bool {
        let cancels = self.inner.cancels.lock();
        match cancels.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Spawn the worker pool. Call once.
    pub fn start(
        &self,
        shutdown: CancellationToken,
        failures: mpsc::Sender<TaskFailure>,
    ) -> Vec<JoinHandle<()>> {
        let Some(queue_rx) = self.queue_rx.lock().take() else {
            tracing::warn!("executor already started");
            return Vec::new();
        };
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));

        (0..self.inner.config.workers.max(1))
            .map(|n| {
                let inner = Arc::clone(&self.inner);
                let queue_rx = Arc::clone(&queue_rx);
                let worker_shutdown = shutdown.clone();
                spawn_supervised(
                    &format!("executor-worker-{n}"),
                    shutdown.clone(),
                    Some(failures.clone()),
                    async move {
                        worker_loop(inner, queue_rx, worker_shutdown).await;
                    },
                )
            })
            .collect()
    }
}

async fn worker_loop(
    inner: Arc<Inner>,
    queue_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = async { queue_rx.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        let id = job.id.clone();
        // Each job runs in its own task so a panic fails the job, not the
        // worker.
        let task = tokio::spawn(run_job(Arc::clone(&inner), job, shutdown.clone()));
        if let Err(e) = task.await {
            if e.is_panic() {
                let message = panic_message(e);
                tracing::error!(job_id = %id, message, "job task panicked");
                fail_with_message(&inner, &id, &format!("worker panic: {message}\n"));
            }
        }
        inner.cancels.lock().remove(&id);
    }
}

fn fail_with_message(inner: &Inner, id: &JobId, message: &str) {
    let now = inner.clock.now();
    let result: Result<(), StoreError> = (|| {
        let conn = inner.store.conn()?;
        jobs::append_output(&conn, id, "", message)?;
        jobs::finish(&conn, id, JobStatus::Failed, None, now)?;
        Ok(())
    })();
    if let Err(e) = result {
        tracing::error!(job_id = %id, error = %e, "failed to record job failure");
    }
}

async fn run_job(inner: Arc<Inner>, job: Job, shutdown: CancellationToken) {
    let id = job.id.clone();
    let token = CancellationToken::new();
    inner.cancels.lock().insert(id.clone(), token.clone());

    // Safety gate. YOLO jobs skip the checker entirely.
    if !job.yolo_mode {
        let decision = inner
            .safety
            .check(&job.command, Path::new(&job.execution_directory))
            .await;
        if !decision.verdict.permits_execution() {
            tracing::warn!(job_id = %id, verdict = ?decision.verdict, "job blocked by safety check");
            fail_with_message(
                &inner,
                &id,
                &format!(
                    "safety check refused execution (verdict: {:?})\n{}\n",
                    decision.verdict, decision.raw_response
                ),
            );
            return;
        }
    }

    // pending → running. Losing this race means the job was cancelled
    // between claim and pickup.
    let started_at = inner.clock.now();
    match inner
        .store
        .with_tx(|tx| jobs::mark_running(tx, &id, started_at, None))
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(job_id = %id, "job no longer pending, skipping");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "failed to mark job running");
            return;
        }
    }

    if !Path::new(&job.execution_directory).is_dir() {
        fail_with_message(
            &inner,
            &id,
            &format!(
                "execution directory is not readable: {}\n",
                job.execution_directory
            ),
        );
        return;
    }

    let mut cmd = Command::new(&inner.config.assistant_binary);
    cmd.arg("-p").arg(&job.command);
    if job.yolo_mode {
        cmd.arg("--dangerously-skip-permissions");
    }
    cmd.current_dir(&job.execution_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            fail_with_message(&inner, &id, &format!("failed to launch assistant: {e}\n"));
            return;
        }
    };

    if let Some(pid) = child.id() {
        if let Err(e) = store_pid(&inner.store, &id, pid) {
            tracing::warn!(job_id = %id, error = %e, "failed to record pid");
        }
    }

    let outcome = stream_child(&inner, &id, child, &token, &shutdown).await;
    let now = inner.clock.now();
    let result = match outcome {
        ChildOutcome::Exited(code) => {
            let status = if code == Some(0) {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            };
            tracing::info!(job_id = %id, ?code, %status, "job finished");
            inner
                .store
                .conn()
                .and_then(|conn| jobs::finish(&conn, &id, status, code, now))
        }
        ChildOutcome::Cancelled => {
            tracing::info!(job_id = %id, "job cancelled");
            inner
                .store
                .conn()
                .and_then(|conn| jobs::finish(&conn, &id, JobStatus::Cancelled, None, now))
        }
        ChildOutcome::WaitFailed(message) => {
            fail_with_message(&inner, &id, &format!("{message}\n"));
            Ok(())
        }
    };
    if let Err(e) = result {
        tracing::error!(job_id = %id, error = %e, "failed to record job outcome");
    }
}

fn store_pid(store: &Store, id: &JobId, pid: u32) -> Result<(), StoreError> {
    let conn = store.conn()?;
    jobs::set_pid(&conn, id, pid)
}

enum ChildOutcome {
    Exited(Option<i32>),
    Cancelled,
    WaitFailed(String),
}

/// Drain the child's stdout/stderr line-by-line, flushing to the store
/// every 2 s or 64 KB, until exit or cancellation.
async fn stream_child(
    inner: &Inner,
    id: &JobId,
    mut child: Child,
    token: &CancellationToken,
    shutdown: &CancellationToken,
) -> ChildOutcome {
    let mut out_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
    let mut err_lines = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut out_buf = String::new();
    let mut err_buf = String::new();
    let mut out_done = out_lines.is_none();
    let mut err_done = err_lines.is_none();

    let mut flush_tick = tokio::time::interval(FLUSH_INTERVAL);
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    flush_tick.tick().await;

    loop {
        tokio::select! {
            line = next_line(&mut out_lines), if !out_done => match line {
                Some(line) => {
                    out_buf.push_str(&line);
                    out_buf.push('\n');
                    if out_buf.len() + err_buf.len() >= FLUSH_BYTES {
                        flush(inner, id, &mut out_buf, &mut err_buf);
                    }
                }
                None => out_done = true,
            },
            line = next_line(&mut err_lines), if !err_done => match line {
                Some(line) => {
                    err_buf.push_str(&line);
                    err_buf.push('\n');
                    if out_buf.len() + err_buf.len() >= FLUSH_BYTES {
                        flush(inner, id, &mut out_buf, &mut err_buf);
                    }
                }
                None => err_done = true,
            },
            _ = flush_tick.tick() => {
                flush(inner, id, &mut out_buf, &mut err_buf);
            }
            _ = token.cancelled() => {
                terminate(&mut child, inner.config.grace).await;
                flush(inner, id, &mut out_buf, &mut err_buf);
                return ChildOutcome::Cancelled;
            }
            _ = shutdown.cancelled() => {
                terminate(&mut child, inner.config.grace).await;
                flush(inner, id, &mut out_buf, &mut err_buf);
                return ChildOutcome::Cancelled;
            }
            status = child.wait(), if out_done && err_done => {
                flush(inner, id, &mut out_buf, &mut err_buf);
                return match status {
                    Ok(status) => ChildOutcome::Exited(status.code()),
                    Err(e) => ChildOutcome::WaitFailed(format!("wait on assistant failed: {e}")),
                };
            }
        }
    }
}

async fn next_line(
    lines: &mut Option<tokio::io::Lines<BufReader<impl tokio::io::AsyncRead + Unpin>>>,
) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

fn flush(inner: &Inner, id: &JobId, out_buf: &mut String, err_buf: &mut String) {
    if out_buf.is_empty() && err_buf.is_empty() {
        return;
    }
    let result = inner
        .store
        .conn()
        .and_then(|conn| jobs::append_output(&conn, id, out_buf, err_buf));
    match result {
        Ok(()) => {
            out_buf.clear();
            err_buf.clear();
        }
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "output flush failed, keeping buffer");
        }
    }
}

/// Graceful termination: SIGTERM the process group, wait out the grace
/// period, then SIGKILL whatever is left.
async fn terminate(child: &mut Child, grace: Duration) {
    let Some(pid) = child.id() else {
        // Already reaped
        return;
    };
    let group = Pid::from_raw(pid as i32);
    if let Err(e) = killpg(group, Signal::SIGTERM) {
        tracing::debug!(%pid, error = %e, "SIGTERM failed, process may be gone");
    }
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        tracing::warn!(%pid, "grace period expired, killing process group");
        let _ = killpg(group, Signal::SIGKILL);
        let _ = child.wait().await;
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
