// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! P90 limit projection and burn-rate math over historical windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How many eligible windows are needed for full confidence.
pub const FULL_CONFIDENCE_WINDOWS: usize = 20;

/// Scope of a prediction: all windows, or one project's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum PredictionScope {
    Global,
    Project(String),
}

impl PredictionScope {
    /// Stable key used to persist the latest prediction per scope.
    pub fn key(&self) -> String {
        match self {
            PredictionScope::Global => "global".to_string(),
            PredictionScope::Project(name) => format!("project:{name}"),
        }
    }

    pub fn parse(key: &str) -> Self {
        match key.strip_prefix("project:") {
            Some(name) => PredictionScope::Project(name.to_string()),
            None => PredictionScope::Global,
        }
    }
}

impl fmt::Display for PredictionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A P90 projection of per-window limits plus the current burn rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub scope: PredictionScope,
    pub predicted_at: DateTime<Utc>,
    pub token_limit: f64,
    pub message_limit: f64,
    pub cost_limit: f64,
    /// `eligible_windows / 20`, clamped to `[0, 1]`.
    pub confidence: f64,
    pub burn_rate_per_hour: f64,
    /// Minutes until the token limit at the current burn rate.
    /// 0 if already exceeded, -1 if the burn rate is 0.
    pub time_to_limit_minutes: f64,
}

impl Prediction {
    /// An empty prediction for a scope with no eligible windows.
    pub fn empty(scope: PredictionScope, predicted_at: DateTime<Utc>) -> Self {
        Self {
            scope,
            predicted_at,
            token_limit: 0.0,
            message_limit: 0.0,
            cost_limit: 0.0,
            confidence: 0.0,
            burn_rate_per_hour: 0.0,
            time_to_limit_minutes: -1.0,
        }
    }
}

/// Percentile by linear interpolation between order statistics.
///
/// `p` is in `[0, 100]`. Returns 0 for an empty sample. The input does not
/// need to be sorted.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Confidence for a sample of `eligible` windows: `eligible / 20` clamped.
pub fn confidence_for(eligible: usize) -> f64 {
    (eligible as f64 / FULL_CONFIDENCE_WINDOWS as f64).clamp(0.0, 1.0)
}

/// Tokens consumed per elapsed hour within the current window.
///
/// Returns 0 when less than 60 seconds have elapsed, so a fresh window does
/// not report an absurd rate.
pub fn burn_rate_per_hour(
    tokens_in_window: u64,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let elapsed = now.signed_duration_since(window_start);
    if elapsed.num_seconds() < 60 {
        return 0.0;
    }
    let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
    tokens_in_window as f64 / hours
}

/// Minutes until `token_limit` is reached at `burn_rate` tokens/hour.
///
/// 0 if the window's tokens already meet the limit, -1 if the burn rate is 0
/// or no limit has been established yet.
pub fn time_to_limit_minutes(tokens_in_window: u64, token_limit: f64, burn_rate: f64) -> f64 {
    if token_limit <= 0.0 {
        return -1.0;
    }
    if tokens_in_window as f64 >= token_limit {
        return 0.0;
    }
    if burn_rate <= 0.0 {
        return -1.0;
    }
    let remaining = token_limit - tokens_in_window as f64;
    (remaining / burn_rate) * 60.0
}

#[cfg(test)]
#[path = "prediction_tests.rs"]
mod tests;
