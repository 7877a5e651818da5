// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-IP token-bucket rate limiting in three tiers.
//!
//! General queries get 100/min, the sync trigger 10/min, and job mutations
//! 5/min. Buckets are keyed by peer IP; requests without connection info
//! (router tests) share one bucket.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;

type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Requests per minute per tier.
const GENERAL_PER_MIN: u32 = 100;
const SYNC_PER_MIN: u32 = 10;
const JOB_MUTATION_PER_MIN: u32 = 5;

pub struct RateTiers {
    general: IpLimiter,
    sync: IpLimiter,
    jobs: IpLimiter,
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

impl RateTiers {
    pub fn new() -> Self {
        Self {
            general: RateLimiter::keyed(per_minute(GENERAL_PER_MIN)),
            sync: RateLimiter::keyed(per_minute(SYNC_PER_MIN)),
            jobs: RateLimiter::keyed(per_minute(JOB_MUTATION_PER_MIN)),
        }
    }

    fn limiter_for(&self, method: &Method, path: &str) -> &IpLimiter {
        if path.starts_with("/api/sync-logs") {
            return &self.sync;
        }
        let job_mutation = path.starts_with("/api/jobs")
            && matches!(*method, Method::POST | Method::DELETE);
        if job_mutation {
            return &self.jobs;
        }
        &self.general
    }

    pub fn check(&self, method: &Method, path: &str, ip: IpAddr) -> Result<(), ApiError> {
        self.limiter_for(method, path)
            .check_key(&ip)
            .map_err(|_| ApiError::RateLimited)
    }
}

impl Default for RateTiers {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn limit(State(app): State<AppState>, request: Request, next: Next) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if let Err(e) = app
        .rate
        .check(request.method(), request.uri().path(), ip)
    {
        return e.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
