// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job persistence: lifecycle transitions, filtered listings, and the
//! scheduler's atomic claim.

use crate::util::{opt_ts_col, ts_col, ts_to_sql};
use crate::StoreError;
use ccdash_core::{Job, JobId, JobStatus, ProjectId, Schedule};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, project_id, command, yolo_mode, schedule, scheduled_at,
    status, created_at, started_at, completed_at, pid, exit_code,
    execution_directory, output_log, error_log";

fn from_row(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    let schedule_json: String = row.get(4)?;
    let schedule: Schedule = serde_json::from_str(&schedule_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status: String = row.get(6)?;
    Ok(Job {
        id: JobId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        command: row.get(2)?,
        yolo_mode: row.get(3)?,
        schedule,
        scheduled_at: ts_col(row, 5)?,
        status: JobStatus::parse(&status).unwrap_or(JobStatus::Failed),
        created_at: ts_col(row, 7)?,
        started_at: opt_ts_col(row, 8)?,
        completed_at: opt_ts_col(row, 9)?,
        pid: row.get::<_, Option<i64>>(10)?.map(|p| p.max(0) as u32),
        exit_code: row.get(11)?,
        execution_directory: row.get(12)?,
        output_log: row.get(13)?,
        error_log: row.get(14)?,
    })
}

/// Insert a freshly-validated job.
pub fn create(conn: &Connection, job: &Job) -> Result<(), StoreError> {
    let schedule_json = serde_json::to_string(&job.schedule)
        .map_err(|e| StoreError::Constraint(format!("encode schedule: {e}")))?;
    conn.execute(
        "INSERT INTO jobs (id, project_id, command, yolo_mode, schedule, scheduled_at,
            status, created_at, started_at, completed_at, pid, exit_code,
            execution_directory, output_log, error_log)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            job.id.as_str(),
            job.project_id.as_str(),
            job.command,
            job.yolo_mode,
            schedule_json,
            ts_to_sql(job.scheduled_at),
            job.status.as_str(),
            ts_to_sql(job.created_at),
            job.started_at.map(ts_to_sql),
            job.completed_at.map(ts_to_sql),
            job.pid.map(|p| p as i64),
            job.exit_code,
            job.execution_directory,
            job.output_log,
            job.error_log,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &JobId) -> Result<Job, StoreError> {
    let job = conn.query_row(
        &format!("SELECT {COLUMNS} FROM jobs WHERE id = ?1"),
        params![id.as_str()],
        from_row,
    )?;
    Ok(job)
}

/// Listing filters; `limit` is capped by the caller.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub project_id: Option<ProjectId>,
    pub limit: u32,
    pub offset: u32,
}

pub fn list(conn: &Connection, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
    let mut sql = format!("SELECT {COLUMNS} FROM jobs");
    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<&dyn rusqlite::ToSql> = Vec::new();

    let status = filter.status.map(|s| s.as_str());
    if let Some(ref s) = status {
        clauses.push("status = ?");
        binds.push(s);
    }
    let project = filter.project_id.as_ref().map(|p| p.as_str());
    if let Some(ref p) = project {
        clauses.push("project_id = ?");
        binds.push(p);
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
    let limit = filter.limit.max(1) as i64;
    let offset = filter.offset as i64;
    binds.push(&limit);
    binds.push(&offset);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(&binds[..], from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Delete a job, terminal states only.
///
/// Returns `Constraint` when the job exists but is still pending or running,
/// which the API maps to a conflict.
pub fn delete(conn: &Connection, id: &JobId) -> Result<(), StoreError> {
    let deleted = conn.execute(
        "DELETE FROM jobs WHERE id = ?1 AND status IN ('completed', 'failed', 'cancelled')",
        params![id.as_str()],
    )?;
    if deleted > 0 {
        return Ok(());
    }
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM jobs WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match exists {
        Some(_) => Err(StoreError::Constraint(
            "job is not in a terminal state".to_string(),
        )),
        None => Err(StoreError::NotFound),
    }
}

/// Cancel a job that has not started. Returns `true` if the transition
/// happened here; a running job must be cancelled through the executor.
pub fn cancel_pending(
    conn: &Connection,
    id: &JobId,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE jobs SET status = 'cancelled', completed_at = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![id.as_str(), ts_to_sql(now)],
    )?;
    Ok(updated > 0)
}

/// Atomically claim every due pending job.
///
/// The stamp and the due-check happen in one UPDATE, so two scheduler
/// ticks racing on separate connections cannot both collect the same job:
/// whoever writes second finds `claimed_at` already set and gets nothing.
pub fn claim_due(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "UPDATE jobs SET claimed_at = ?1
         WHERE status = 'pending' AND claimed_at IS NULL AND scheduled_at <= ?1
         RETURNING {COLUMNS}"
    ))?;
    let rows = stmt.query_map(params![ts_to_sql(now)], from_row)?;
    let mut claimed = Vec::new();
    for row in rows {
        claimed.push(row?);
    }
    // RETURNING makes no ordering promise; dispatch oldest-first
    claimed.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
    Ok(claimed)
}

/// Release claims that never reached a worker (crash recovery at startup).
pub fn release_stale_claims(conn: &Connection) -> Result<u64, StoreError> {
    let released = conn.execute(
        "UPDATE jobs SET claimed_at = NULL WHERE status = 'pending' AND claimed_at IS NOT NULL",
        [],
    )?;
    Ok(released as u64)
}

/// Transition `pending → running`. Returns `false` when the job was
/// cancelled (or deleted) between claim and pickup.
pub fn mark_running(
    conn: &Connection,
    id: &JobId,
    started_at: DateTime<Utc>,
    pid: Option<u32>,
) -> Result<bool, StoreError> {
    let updated = conn.execute(
        "UPDATE jobs SET status = 'running', started_at = ?2, pid = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![id.as_str(), ts_to_sql(started_at), pid.map(|p| p as i64)],
    )?;
    Ok(updated > 0)
}

/// Record the child's pid once known.
pub fn set_pid(conn: &Connection, id: &JobId, pid: u32) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET pid = ?2 WHERE id = ?1",
        params![id.as_str(), pid as i64],
    )?;
    Ok(())
}

/// Append drained output to the job's logs.
pub fn append_output(
    conn: &Connection,
    id: &JobId,
    stdout: &str,
    stderr: &str,
) -> Result<(), StoreError> {
    if stdout.is_empty() && stderr.is_empty() {
        return Ok(());
    }
    conn.execute(
        "UPDATE jobs SET output_log = output_log || ?2, error_log = error_log || ?3
         WHERE id = ?1",
        params![id.as_str(), stdout, stderr],
    )?;
    Ok(())
}

/// Terminal transition from `running`.
pub fn finish(
    conn: &Connection,
    id: &JobId,
    status: JobStatus,
    exit_code: Option<i32>,
    completed_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE jobs SET status = ?2, exit_code = ?3, completed_at = ?4
         WHERE id = ?1 AND status IN ('pending', 'running')",
        params![
            id.as_str(),
            status.as_str(),
            exit_code,
            ts_to_sql(completed_at)
        ],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
