//! Cancellation specs: pending flips directly, running goes through the
//! executor's signal, and the child process is gone afterwards.

use crate::prelude::*;
use ccdash_core::{JobStatus, Schedule};
use ccdash_engine::{Executor, ExecutorConfig, SafetyChecker, SafetyConfig, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn engine(
    store: &ccdash_storage::Store,
    assistant: String,
    clock: Arc<ccdash_core::FakeClock>,
    grace: Duration,
) -> (Executor, CancellationToken) {
    let executor = Executor::new(
        store.clone(),
        ExecutorConfig {
            assistant_binary: assistant,
            workers: 1,
            grace,
        },
        Arc::new(SafetyChecker::new(SafetyConfig {
            disabled: true,
            ..SafetyConfig::default()
        })),
        clock,
    );
    let shutdown = CancellationToken::new();
    let (failures, _rx) = mpsc::channel(8);
    executor.start(shutdown.clone(), failures);
    (executor, shutdown)
}

#[tokio::test]
async fn pending_job_cancels_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();

    let job = pending_job(
        1,
        dir.path(),
        "later",
        Schedule::Delayed { delay_hours: 2 },
        now_of(&clock),
    );
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    let cancelled = store
        .with_tx(|tx| ccdash_storage::jobs::cancel_pending(tx, &job.id, now_of(&clock)))
        .unwrap();
    assert!(cancelled);

    let conn = store.conn().unwrap();
    let loaded = ccdash_storage::jobs::get(&conn, &job.id).unwrap();
    assert_eq!(loaded.status, JobStatus::Cancelled);
    assert_eq!(loaded.started_at, None);
    assert_eq!(loaded.exit_code, None);
    assert!(loaded.completed_at.is_some());
}

#[tokio::test]
async fn running_job_is_terminated_within_grace() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    // A child that would outlive any reasonable test
    let assistant = fake_assistant(dir.path(), "echo started\nsleep 60");
    let (executor, shutdown) = engine(&store, assistant, clock.clone(), Duration::from_secs(1));

    let job = pending_job(1, dir.path(), "long haul", Schedule::Immediate, now_of(&clock));
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();
    Scheduler::new(store.clone(), clock.clone(), executor.queue())
        .tick_once()
        .await;

    // Wait for the child to actually start
    let pid = {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let loaded = {
                let conn = store.conn().unwrap();
                ccdash_storage::jobs::get(&conn, &job.id).unwrap()
            };
            if loaded.status == JobStatus::Running {
                if let Some(pid) = loaded.pid {
                    break pid;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "job never started");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    assert!(executor.cancel(&job.id));
    let done = wait_terminal(&store, &job.id, Duration::from_secs(5)).await;
    assert_eq!(done.status, JobStatus::Cancelled);
    assert_eq!(done.exit_code, None);
    assert!(done.completed_at.is_some());

    // The process group must be gone (give the kernel a beat to reap)
    tokio::time::sleep(Duration::from_millis(200)).await;
    let alive = std::path::Path::new(&format!("/proc/{pid}")).exists();
    assert!(!alive, "child process {pid} survived cancellation");
}

#[tokio::test]
async fn shutdown_cancels_in_flight_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    let assistant = fake_assistant(dir.path(), "sleep 60");
    let (executor, shutdown) = engine(&store, assistant, clock.clone(), Duration::from_secs(1));

    let job = pending_job(1, dir.path(), "long haul", Schedule::Immediate, now_of(&clock));
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();
    Scheduler::new(store.clone(), clock.clone(), executor.queue())
        .tick_once()
        .await;

    // Wait until running, then tear the whole engine down
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let loaded = {
            let conn = store.conn().unwrap();
            ccdash_storage::jobs::get(&conn, &job.id).unwrap()
        };
        if loaded.status == JobStatus::Running {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "job never started");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    shutdown.cancel();
    let done = wait_terminal(&store, &job.id, Duration::from_secs(5)).await;
    assert_eq!(done.status, JobStatus::Cancelled);
}
