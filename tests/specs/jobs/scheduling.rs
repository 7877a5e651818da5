//! Scheduling specs: delayed dispatch and execution through the worker pool.

use crate::prelude::*;
use ccdash_core::{Clock, JobStatus, Schedule, SystemClock};
use ccdash_engine::{Executor, ExecutorConfig, SafetyChecker, SafetyConfig, Scheduler};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn engine(
    store: &ccdash_storage::Store,
    assistant: String,
    clock: Arc<ccdash_core::FakeClock>,
) -> (Executor, CancellationToken) {
    let executor = Executor::new(
        store.clone(),
        ExecutorConfig {
            assistant_binary: assistant,
            workers: 2,
            grace: Duration::from_secs(1),
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
async fn delayed_job_waits_for_its_hour() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    let assistant = fake_assistant(dir.path(), r#"echo "done: $2""#);
    let (executor, shutdown) = engine(&store, assistant, clock.clone());

    let job = pending_job(
        1,
        dir.path(),
        "tidy the imports",
        Schedule::Delayed { delay_hours: 1 },
        now_of(&clock),
    );
    assert_eq!(job.scheduled_at, base() + ChronoDuration::hours(1));
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    let scheduler = Scheduler::new(store.clone(), clock.clone(), executor.queue());

    // Before the hour passes, nothing is claimable
    assert_eq!(scheduler.tick_once().await, 0);
    {
        let conn = store.conn().unwrap();
        let loaded = ccdash_storage::jobs::get(&conn, &job.id).unwrap();
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    // Fast-forward the clock; the next tick dispatches
    clock.advance(ChronoDuration::hours(1) + ChronoDuration::seconds(1));
    assert_eq!(scheduler.tick_once().await, 1);

    let done = wait_terminal(&store, &job.id, Duration::from_secs(10)).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.exit_code, Some(0));
    assert!(done.output_log.contains("done: tidy the imports"));
    shutdown.cancel();
}

#[tokio::test]
async fn immediate_job_runs_on_the_first_tick() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    let assistant = fake_assistant(dir.path(), "echo ran");
    let (executor, shutdown) = engine(&store, assistant, clock.clone());

    let job = pending_job(
        1,
        dir.path(),
        "quick fix",
        Schedule::Immediate,
        now_of(&clock),
    );
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    let scheduler = Scheduler::new(store.clone(), clock, executor.queue());
    assert_eq!(scheduler.tick_once().await, 1);

    let done = wait_terminal(&store, &job.id, Duration::from_secs(10)).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    shutdown.cancel();
}

#[tokio::test]
async fn job_transitions_never_move_backward() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    let assistant = fake_assistant(dir.path(), "echo ok");
    let (executor, shutdown) = engine(&store, assistant, clock.clone());

    let job = pending_job(1, dir.path(), "task", Schedule::Immediate, now_of(&clock));
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    let scheduler = Scheduler::new(store.clone(), clock.clone(), executor.queue());
    scheduler.tick_once().await;
    let done = wait_terminal(&store, &job.id, Duration::from_secs(10)).await;
    assert_eq!(done.status, JobStatus::Completed);

    // A later cancel attempt cannot reopen or regress the job
    store
        .with_tx(|tx| ccdash_storage::jobs::cancel_pending(tx, &job.id, now_of(&clock)))
        .unwrap();
    let conn = store.conn().unwrap();
    let still = ccdash_storage::jobs::get(&conn, &job.id).unwrap();
    assert_eq!(still.status, JobStatus::Completed);
    assert_eq!(still.completed_at, done.completed_at);
    shutdown.cancel();
}

#[tokio::test]
async fn failed_assistant_surfaces_as_failed_job() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let clock = base_clock();
    let assistant = fake_assistant(dir.path(), "echo nope >&2\nexit 2");
    let (executor, shutdown) = engine(&store, assistant, clock.clone());

    let job = pending_job(1, dir.path(), "task", Schedule::Immediate, now_of(&clock));
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    Scheduler::new(store.clone(), clock, executor.queue())
        .tick_once()
        .await;

    let done = wait_terminal(&store, &job.id, Duration::from_secs(10)).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.exit_code, Some(2));
    assert!(done.error_log.contains("nope"));
    shutdown.cancel();
}

#[tokio::test]
async fn wall_clock_scheduler_loop_dispatches_due_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    // The loop path uses the real clock; the job is due immediately
    let now = SystemClock.now();
    let assistant = fake_assistant(dir.path(), "echo looped");

    let executor = Executor::new(
        store.clone(),
        ExecutorConfig {
            assistant_binary: assistant,
            workers: 1,
            grace: Duration::from_secs(1),
        },
        Arc::new(SafetyChecker::new(SafetyConfig {
            disabled: true,
            ..SafetyConfig::default()
        })),
        Arc::new(SystemClock),
    );
    let shutdown = CancellationToken::new();
    let (failures, _rx) = mpsc::channel(8);
    executor.start(shutdown.clone(), failures.clone());

    let job = pending_job(1, dir.path(), "task", Schedule::Immediate, now);
    store
        .with_tx(|tx| ccdash_storage::jobs::create(tx, &job))
        .unwrap();

    let _scheduler = Scheduler::new(store.clone(), Arc::new(SystemClock), executor.queue())
        .with_tick(Duration::from_secs(3600))
        .start(shutdown.clone(), failures);

    // The immediate startup tick must dispatch without waiting for 3600s
    let done = wait_terminal(&store, &job.id, Duration::from_secs(10)).await;
    assert_eq!(done.status, JobStatus::Completed);
    shutdown.cancel();
}
