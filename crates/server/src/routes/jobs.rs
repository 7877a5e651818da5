// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job CRUD: creation with boundary validation, listing, cancel, delete.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ccdash_core::{Job, JobId, JobStatus, ProjectId, Schedule};
use ccdash_storage::{jobs, projects, windows, JobFilter};
use chrono::DateTime;
use serde::Deserialize;

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub project_id: String,
    pub command: String,
    #[serde(default)]
    pub yolo_mode: bool,
    pub schedule_type: String,
    #[serde(default)]
    pub schedule_params: Option<serde_json::Value>,
}

/// Turn the wire representation (discriminator + loose params) into the
/// typed schedule. All validation happens here, none in the scheduler.
fn parse_schedule(request: &CreateJobRequest) -> Result<Schedule, ApiError> {
    let params = request.schedule_params.as_ref();
    match request.schedule_type.as_str() {
        "immediate" => Ok(Schedule::Immediate),
        "after_reset" => Ok(Schedule::AfterReset),
        "delayed" => {
            let delay_hours = params
                .and_then(|p| p.get("delay_hours"))
                .and_then(|v| v.as_i64())
                .ok_or_else(|| {
                    ApiError::Validation("delayed schedule requires delay_hours".to_string())
                })?;
            Ok(Schedule::Delayed { delay_hours })
        }
        "scheduled" => {
            let raw = params
                .and_then(|p| p.get("scheduled_time"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    ApiError::Validation("scheduled schedule requires scheduled_time".to_string())
                })?;
            let scheduled_time = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| ApiError::Validation(format!("bad scheduled_time: {e}")))?
                .to_utc();
            Ok(Schedule::Scheduled { scheduled_time })
        }
        other => Err(ApiError::Validation(format!(
            "unsupported schedule_type {other:?}"
        ))),
    }
}

pub async fn create(
    State(app): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    if request.command.trim().is_empty() {
        return Err(ApiError::Validation("command must not be empty".to_string()));
    }

    let now = app.clock.now();
    let schedule = parse_schedule(&request)?;
    schedule
        .validate(now)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let conn = app.store.conn()?;
    let project = projects::get(&conn, &ProjectId::new(request.project_id.clone()))?;
    let current_reset = windows::containing(&conn, now)?.map(|w| w.reset_time);
    drop(conn);

    let job = Job {
        id: JobId::new(app.ids.next()),
        project_id: project.id,
        command: request.command,
        yolo_mode: request.yolo_mode,
        scheduled_at: schedule.resolve_scheduled_at(now, current_reset),
        schedule,
        status: JobStatus::Pending,
        created_at: now,
        started_at: None,
        completed_at: None,
        pid: None,
        exit_code: None,
        execution_directory: project.path,
        output_log: String::new(),
        error_log: String::new(),
    };
    app.store.with_tx(|tx| jobs::create(tx, &job))?;
    tracing::info!(job_id = %job.id, schedule = job.schedule.kind(), "job created");

    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub project_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list(
    State(app): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(JobStatus::parse(raw).ok_or_else(|| {
            ApiError::Validation(format!("unknown status {raw:?}"))
        })?),
    };

    let filter = JobFilter {
        status,
        project_id: query.project_id.filter(|p| !p.is_empty()).map(ProjectId::new),
        limit: query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let conn = app.store.conn()?;
    Ok(Json(jobs::list(&conn, &filter)?))
}

pub async fn detail(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let conn = app.store.conn()?;
    Ok(Json(jobs::get(&conn, &JobId::new(id))?))
}

/// Cancel a job. Pending jobs flip directly; running jobs go through the
/// executor's cancel signal. Either way the response reports cancelled.
pub async fn cancel(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = JobId::new(id);
    let job = {
        let conn = app.store.conn()?;
        jobs::get(&conn, &id)?
    };

    match job.status {
        JobStatus::Pending => {
            let now = app.clock.now();
            app.store.with_tx(|tx| jobs::cancel_pending(tx, &id, now))?;
        }
        JobStatus::Running => {
            if !app.executor.cancel(&id) {
                // Running in the store but unknown to this executor: a
                // stale row from a crashed process. Close it out directly.
                let now = app.clock.now();
                app.store.with_tx(|tx| {
                    jobs::finish(tx, &id, JobStatus::Cancelled, None, now)
                })?;
            }
        }
        _ => {
            return Err(ApiError::Conflict(format!(
                "job is already {}",
                job.status
            )));
        }
    }

    Ok(Json(serde_json::json!({
        "id": id,
        "status": "cancelled",
    })))
}

pub async fn delete(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.store.with_tx(|tx| jobs::delete(tx, &JobId::new(id)))?;
    Ok(StatusCode::NO_CONTENT)
}
