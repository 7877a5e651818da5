// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Latest-prediction-per-scope persistence.

use crate::util::{ts_col, ts_to_sql};
use crate::StoreError;
use ccdash_core::{Prediction, PredictionScope};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn from_row(row: &Row<'_>) -> Result<Prediction, rusqlite::Error> {
    let scope: String = row.get(0)?;
    Ok(Prediction {
        scope: PredictionScope::parse(&scope),
        predicted_at: ts_col(row, 1)?,
        token_limit: row.get(2)?,
        message_limit: row.get(3)?,
        cost_limit: row.get(4)?,
        confidence: row.get(5)?,
        burn_rate_per_hour: row.get(6)?,
        time_to_limit_minutes: row.get(7)?,
    })
}

/// Replace the persisted prediction for this scope.
pub fn put(conn: &Connection, prediction: &Prediction) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO predictions (scope, predicted_at, token_limit, message_limit,
            cost_limit, confidence, burn_rate_per_hour, time_to_limit_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(scope) DO UPDATE SET
            predicted_at = excluded.predicted_at,
            token_limit = excluded.token_limit,
            message_limit = excluded.message_limit,
            cost_limit = excluded.cost_limit,
            confidence = excluded.confidence,
            burn_rate_per_hour = excluded.burn_rate_per_hour,
            time_to_limit_minutes = excluded.time_to_limit_minutes",
        params![
            prediction.scope.key(),
            ts_to_sql(prediction.predicted_at),
            prediction.token_limit,
            prediction.message_limit,
            prediction.cost_limit,
            prediction.confidence,
            prediction.burn_rate_per_hour,
            prediction.time_to_limit_minutes,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, scope: &PredictionScope) -> Result<Option<Prediction>, StoreError> {
    let prediction = conn
        .query_row(
            "SELECT scope, predicted_at, token_limit, message_limit, cost_limit,
                    confidence, burn_rate_per_hour, time_to_limit_minutes
             FROM predictions WHERE scope = ?1",
            params![scope.key()],
            from_row,
        )
        .optional()?;
    Ok(prediction)
}

#[cfg(test)]
#[path = "predictions_tests.rs"]
mod tests;
