//! Shared fixtures for the behavioral specs.

use ccdash_core::{Clock, FakeClock, Job, JobId, JobStatus, ProjectId, Schedule};
use ccdash_ingest::Ingester;
use ccdash_storage::Store;
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Fixed base instant for deterministic window math: 2026-03-10 09:00 UTC.
pub fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).single().unwrap()
}

pub fn store() -> Store {
    Store::open_in_memory().unwrap()
}

pub fn clock_at(now: DateTime<Utc>) -> Arc<FakeClock> {
    Arc::new(FakeClock::at(now))
}

/// An assistant log line with the fields ccdash extracts.
pub fn log_line(uuid: &str, session: &str, ts: DateTime<Utc>, tokens: u64) -> String {
    format!(
        r#"{{"type":"assistant","uuid":"{uuid}","sessionId":"{session}","timestamp":"{}","cwd":"/home/u/proj","costUSD":0.01,"message":{{"model":"claude-sonnet-4-5","usage":{{"input_tokens":{tokens},"output_tokens":25}},"content":"ok"}}}}"#,
        ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

/// Write a session log under `<root>/<project-dir>/<session>.jsonl`.
pub fn write_session_log(root: &Path, session: &str, lines: &[String]) -> std::path::PathBuf {
    let dir = root.join("-home-u-proj");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{session}.jsonl"));
    let mut f = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    path
}

pub fn ingester(store: &Store, root: &Path) -> Ingester {
    Ingester::new(store.clone(), root.to_path_buf())
}

/// A pending job rooted at `dir`, scheduled per `schedule` as of `now`.
pub fn pending_job(
    n: u32,
    dir: &Path,
    command: &str,
    schedule: Schedule,
    now: DateTime<Utc>,
) -> Job {
    Job {
        id: JobId::new(format!("job-{n}")),
        project_id: ProjectId::new("proj-1"),
        command: command.to_string(),
        yolo_mode: false,
        scheduled_at: schedule.resolve_scheduled_at(now, None),
        schedule,
        status: JobStatus::Pending,
        created_at: now,
        started_at: None,
        completed_at: None,
        pid: None,
        exit_code: None,
        execution_directory: dir.display().to_string(),
        output_log: String::new(),
        error_log: String::new(),
    }
}

/// Write an executable fake assistant script and return its path.
pub fn fake_assistant(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("assistant.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.display().to_string()
}

/// Poll the store until the job reaches a terminal state.
pub async fn wait_terminal(store: &Store, id: &JobId, within: std::time::Duration) -> Job {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let job = {
            let conn = store.conn().unwrap();
            ccdash_storage::jobs::get(&conn, id).unwrap()
        };
        if job.is_terminal() {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} stuck in {}",
            job.status
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

/// Shorthand used by specs that only need "a clock pinned at base()".
pub fn base_clock() -> Arc<FakeClock> {
    clock_at(base())
}

pub fn now_of(clock: &Arc<FakeClock>) -> DateTime<Utc> {
    clock.now()
}
