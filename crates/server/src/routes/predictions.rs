// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prediction queries: latest P90 per scope and the burn-rate timeseries.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use ccdash_core::{Prediction, PredictionScope};
use ccdash_ingest::BurnRatePoint;
use ccdash_storage::projects;
use serde::{Deserialize, Serialize};

/// Latest global P90 prediction; an empty prediction (confidence 0) before
/// the first refresh.
pub async fn global(State(app): State<AppState>) -> Result<Json<Prediction>, ApiError> {
    let prediction = app
        .predictor
        .latest(&PredictionScope::Global)?
        .unwrap_or_else(|| Prediction::empty(PredictionScope::Global, app.clock.now()));
    Ok(Json(prediction))
}

/// Latest per-project prediction. Unknown project names are 404s; a known
/// project without history gets an empty prediction.
pub async fn project(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Prediction>, ApiError> {
    let scope = PredictionScope::Project(name.clone());
    if let Some(prediction) = app.predictor.latest(&scope)? {
        return Ok(Json(prediction));
    }

    let conn = app.store.conn()?;
    projects::get_by_name(&conn, &name)?;
    Ok(Json(Prediction::empty(scope, app.clock.now())))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_hours")]
    pub hours: u32,
}

fn default_hours() -> u32 {
    24
}

#[derive(Debug, Serialize)]
pub struct BurnRateHistory {
    pub hours: u32,
    pub points: Vec<BurnRatePoint>,
}

pub async fn burn_rate_history(
    State(app): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<BurnRateHistory>, ApiError> {
    let hours = query.hours.clamp(1, 168);
    let points = app.predictor.burn_rate_history(hours)?;
    Ok(Json(BurnRateHistory { hours, points }))
}
