// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage queries: current window, sessions, windows, and plan headroom.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use ccdash_core::{burn_rate_per_hour, Message, Session, SessionId, UsageWindow, WindowAggregate};
use ccdash_storage::{messages, sessions, windows};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plan presets: per-window token allowances served by
/// `/claude/available-tokens`.
const PLAN_LIMITS: &[(&str, u64)] = &[("pro", 19_000), ("max5", 88_000), ("max20", 220_000)];

#[derive(Debug, Serialize)]
pub struct TokenUsageResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<UsageWindow>,
    pub input_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub message_count: u64,
    pub burn_rate_per_hour: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

/// Aggregate of the usage window covering "now", zeros when no window
/// covers it.
pub async fn token_usage(
    State(app): State<AppState>,
) -> Result<Json<TokenUsageResponse>, ApiError> {
    let now = app.clock.now();
    let conn = app.store.conn()?;

    let Some(window) = windows::containing(&conn, now)? else {
        return Ok(Json(TokenUsageResponse {
            window: None,
            input_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            total_cost: 0.0,
            message_count: 0,
            burn_rate_per_hour: 0.0,
            reset_time: None,
        }));
    };

    let aggregate = windows::aggregate(&conn, window.id)?.unwrap_or_default();
    let total_tokens = aggregate.total_tokens();
    Ok(Json(TokenUsageResponse {
        burn_rate_per_hour: burn_rate_per_hour(total_tokens, window.window_start, now),
        input_tokens: aggregate.input_tokens,
        cache_creation_tokens: aggregate.cache_creation_tokens,
        cache_read_tokens: aggregate.cache_read_tokens,
        output_tokens: aggregate.output_tokens,
        total_tokens,
        total_cost: aggregate.total_cost,
        message_count: aggregate.message_count,
        reset_time: Some(window.reset_time),
        window: Some(window),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: u32,
}

fn default_recent_limit() -> u32 {
    20
}

impl Default for RecentQuery {
    fn default() -> Self {
        Self {
            limit: default_recent_limit(),
        }
    }
}

pub async fn recent_sessions(
    State(app): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<sessions::SessionSummary>>, ApiError> {
    let conn = app.store.conn()?;
    Ok(Json(sessions::recent(&conn, query.limit.clamp(1, 100))?))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    pub session: Session,
    pub messages: Vec<Message>,
    pub page: u32,
    pub page_size: u32,
    pub total_messages: u64,
}

pub async fn session_detail(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<SessionDetail>, ApiError> {
    let page = query.page.max(1);
    let page_size = query.page_size.clamp(1, 500);

    let conn = app.store.conn()?;
    let session_id = SessionId::new(id);
    let session = sessions::get(&conn, &session_id)?;
    let total_messages = messages::count_for_session(&conn, &session_id)?;
    let page_messages =
        messages::for_session(&conn, &session_id, page_size, (page - 1) * page_size)?;

    Ok(Json(SessionDetail {
        session,
        messages: page_messages,
        page,
        page_size,
        total_messages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(default = "default_plan")]
    pub plan: String,
}

fn default_plan() -> String {
    "pro".to_string()
}

#[derive(Debug, Serialize)]
pub struct AvailableTokens {
    pub plan: String,
    pub token_limit: u64,
    pub used_tokens: u64,
    pub remaining_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

/// Remaining headroom in the current window for a plan preset.
pub async fn available_tokens(
    State(app): State<AppState>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<AvailableTokens>, ApiError> {
    let plan = query.plan.to_lowercase();
    let Some((_, token_limit)) = PLAN_LIMITS.iter().find(|(name, _)| *name == plan) else {
        return Err(ApiError::Validation(format!(
            "unknown plan {plan:?}; expected one of pro, max5, max20"
        )));
    };

    let now = app.clock.now();
    let conn = app.store.conn()?;
    let (used_tokens, reset_time) = match windows::containing(&conn, now)? {
        Some(window) => {
            let used = windows::aggregate(&conn, window.id)?
                .map(|a| a.total_tokens())
                .unwrap_or(0);
            (used, Some(window.reset_time))
        }
        None => (0, None),
    };

    Ok(Json(AvailableTokens {
        plan,
        token_limit: *token_limit,
        used_tokens,
        remaining_tokens: token_limit.saturating_sub(used_tokens),
        reset_time,
    }))
}

#[derive(Debug, Serialize)]
pub struct WindowWithUsage {
    #[serde(flatten)]
    pub window: UsageWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<WindowAggregate>,
}

/// All usage windows, newest first, with their aggregates.
pub async fn session_windows(
    State(app): State<AppState>,
) -> Result<Json<Vec<WindowWithUsage>>, ApiError> {
    let conn = app.store.conn()?;
    let mut out = Vec::new();
    for window in windows::list(&conn)? {
        let usage = windows::aggregate(&conn, window.id)?;
        out.push(WindowWithUsage { window, usage });
    }
    Ok(Json(out))
}
