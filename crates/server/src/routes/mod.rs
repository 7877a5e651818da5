// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly: one public health route, everything else behind the
//! rate limiter and API key verifier.

pub mod jobs;
pub mod predictions;
pub mod system;
pub mod usage;

use crate::state::AppState;
use crate::{auth, rate_limit};
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub fn router(app: AppState) -> Router {
    let protected = Router::new()
        .route("/api/token-usage", get(usage::token_usage))
        .route("/api/claude/sessions/recent", get(usage::recent_sessions))
        .route("/api/sessions/{id}", get(usage::session_detail))
        .route("/api/claude/available-tokens", get(usage::available_tokens))
        .route("/api/claude/session-windows", get(usage::session_windows))
        .route("/api/sync-logs", post(system::sync_logs))
        .route("/api/predictions/p90", get(predictions::global))
        .route(
            "/api/predictions/p90/project/{name}",
            get(predictions::project),
        )
        .route(
            "/api/predictions/burn-rate-history",
            get(predictions::burn_rate_history),
        )
        .route(
            "/api/initialization-status",
            get(system::initialization_status),
        )
        .route("/api/projects", get(system::projects))
        .route("/api/jobs", post(jobs::create).get(jobs::list))
        .route("/api/jobs/{id}", get(jobs::detail).delete(jobs::delete))
        .route("/api/jobs/{id}/cancel", post(jobs::cancel))
        .route_layer(middleware::from_fn_with_state(
            app.clone(),
            auth::require_api_key,
        ))
        .route_layer(middleware::from_fn_with_state(app.clone(), rate_limit::limit));

    Router::new()
        .route("/api/v1/health", get(system::health))
        .merge(protected)
        .layer(cors_layer(&app))
        .with_state(app)
}

fn cors_layer(app: &AppState) -> CorsLayer {
    match app
        .config
        .frontend_url
        .as_deref()
        .and_then(|url| url.parse::<HeaderValue>().ok())
    {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
