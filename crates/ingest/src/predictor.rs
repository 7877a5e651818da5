// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! P90 limit projection over historical usage windows.

use ccdash_core::{
    burn_rate_per_hour, confidence_for, percentile, time_to_limit_minutes, Clock, Prediction,
    PredictionScope, WindowAggregate,
};
use ccdash_storage::{messages, predictions, projects, windows, Store, StoreError};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::sync::Arc;

/// One sample of the burn-rate timeseries.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BurnRatePoint {
    pub timestamp: DateTime<Utc>,
    pub tokens_per_hour: f64,
}

/// Computes and persists P90 predictions per scope.
#[derive(Clone)]
pub struct Predictor {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Predictor {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Recompute and persist the global prediction plus one per project.
    pub fn refresh_all(&self) -> Result<(), StoreError> {
        self.refresh_global()?;
        let project_list = {
            let conn = self.store.conn()?;
            projects::list(&conn)?
        };
        for project in project_list {
            self.refresh_project(&project.name, project.id.as_str())?;
        }
        Ok(())
    }

    /// Recompute and persist the global prediction.
    pub fn refresh_global(&self) -> Result<Prediction, StoreError> {
        let now = self.clock.now();
        let conn = self.store.conn()?;
        let eligible = windows::eligible_aggregates(&conn, now)?;
        let prediction = self.compute(&conn, PredictionScope::Global, &eligible, now)?;
        self.store.with_tx(|tx| predictions::put(tx, &prediction))?;
        Ok(prediction)
    }

    /// Recompute and persist one project's prediction.
    pub fn refresh_project(
        &self,
        project_name: &str,
        project_id: &str,
    ) -> Result<Prediction, StoreError> {
        let now = self.clock.now();
        let conn = self.store.conn()?;
        let eligible = windows::eligible_aggregates_for_project(&conn, project_id, now)?;
        let scope = PredictionScope::Project(project_name.to_string());
        let prediction = self.compute(&conn, scope, &eligible, now)?;
        self.store.with_tx(|tx| predictions::put(tx, &prediction))?;
        Ok(prediction)
    }

    /// The latest persisted prediction for a scope, if any.
    pub fn latest(&self, scope: &PredictionScope) -> Result<Option<Prediction>, StoreError> {
        let conn = self.store.conn()?;
        predictions::get(&conn, scope)
    }

    fn compute(
        &self,
        conn: &rusqlite::Connection,
        scope: PredictionScope,
        eligible: &[WindowAggregate],
        now: DateTime<Utc>,
    ) -> Result<Prediction, StoreError> {
        // Burn rate reads the window covering "now", regardless of scope:
        // quota accrues globally.
        let (current_tokens, burn_rate) = match windows::containing(conn, now)? {
            Some(current) => {
                let tokens_now = windows::aggregate(conn, current.id)?
                    .map(|a| a.total_tokens())
                    .unwrap_or(0);
                (
                    tokens_now,
                    burn_rate_per_hour(tokens_now, current.window_start, now),
                )
            }
            None => (0, 0.0),
        };

        if eligible.is_empty() {
            let mut prediction = Prediction::empty(scope, now);
            prediction.burn_rate_per_hour = burn_rate;
            return Ok(prediction);
        }

        let tokens: Vec<f64> = eligible.iter().map(|a| a.total_tokens() as f64).collect();
        let counts: Vec<f64> = eligible.iter().map(|a| a.message_count as f64).collect();
        let costs: Vec<f64> = eligible.iter().map(|a| a.total_cost).collect();

        let token_limit = percentile(&tokens, 90.0);

        Ok(Prediction {
            scope,
            predicted_at: now,
            token_limit,
            message_limit: percentile(&counts, 90.0),
            cost_limit: percentile(&costs, 90.0),
            confidence: confidence_for(eligible.len()),
            burn_rate_per_hour: burn_rate,
            time_to_limit_minutes: time_to_limit_minutes(current_tokens, token_limit, burn_rate),
        })
    }

    /// Tokens-per-hour timeseries for the trailing `hours`, oldest first.
    pub fn burn_rate_history(&self, hours: u32) -> Result<Vec<BurnRatePoint>, StoreError> {
        let now = self.clock.now();
        let since = now - Duration::hours(hours.max(1) as i64);
        let conn = self.store.conn()?;
        let buckets = messages::hourly_token_buckets(&conn, since)?;

        let mut out = Vec::with_capacity(buckets.len());
        for (hour, tokens) in buckets {
            // Bucket keys are the first 13 chars of the stored timestamp
            let Ok(naive) = NaiveDateTime::parse_from_str(&format!("{hour}:00:00"), "%Y-%m-%dT%H:%M:%S")
            else {
                continue;
            };
            out.push(BurnRatePoint {
                timestamp: naive.and_utc(),
                tokens_per_hour: tokens as f64,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "predictor_tests.rs"]
mod tests;
