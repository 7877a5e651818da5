// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health, initialization status, projects, and the sync trigger.

use crate::error::ApiError;
use crate::init::{self, InitStatus, PipelineReport};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use ccdash_core::Project;
use ccdash_storage::projects;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn initialization_status(State(app): State<AppState>) -> Json<InitStatus> {
    Json(app.init.snapshot())
}

pub async fn projects(State(app): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    let conn = app.store.conn()?;
    Ok(Json(projects::list(&conn)?))
}

/// Full ingestion + window + prediction pass; also the replay endpoint
/// after a failed initialization.
pub async fn sync_logs(State(app): State<AppState>) -> Result<Json<PipelineReport>, ApiError> {
    init::run_pipeline(app)
        .await
        .map(Json)
        .map_err(ApiError::InitializationFailed)
}
