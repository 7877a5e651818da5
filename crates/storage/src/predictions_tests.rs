// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{self, ts};
use ccdash_core::Prediction;

fn prediction(scope: PredictionScope, token_limit: f64) -> Prediction {
    Prediction {
        scope,
        predicted_at: ts(0),
        token_limit,
        message_limit: 50.0,
        cost_limit: 2.5,
        confidence: 0.4,
        burn_rate_per_hour: 1200.0,
        time_to_limit_minutes: 90.0,
    }
}

#[test]
fn missing_scope_is_none() {
    let store = test_support::store();
    let conn = store.conn().unwrap();
    assert_eq!(get(&conn, &PredictionScope::Global).unwrap(), None);
}

#[test]
fn put_then_get_roundtrips() {
    let store = test_support::store();
    let expected = prediction(PredictionScope::Global, 90_000.0);

    store.with_tx(|tx| put(tx, &expected)).unwrap();

    let conn = store.conn().unwrap();
    assert_eq!(get(&conn, &PredictionScope::Global).unwrap(), Some(expected));
}

#[test]
fn put_keeps_only_latest_per_scope() {
    let store = test_support::store();
    store
        .with_tx(|tx| {
            put(tx, &prediction(PredictionScope::Global, 90_000.0))?;
            put(tx, &prediction(PredictionScope::Global, 120_000.0))
        })
        .unwrap();

    let conn = store.conn().unwrap();
    let loaded = get(&conn, &PredictionScope::Global).unwrap().unwrap();
    assert_eq!(loaded.token_limit, 120_000.0);

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM predictions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn scopes_are_independent() {
    let store = test_support::store();
    let global = prediction(PredictionScope::Global, 90_000.0);
    let project = prediction(PredictionScope::Project("ccdash".into()), 40_000.0);

    store
        .with_tx(|tx| {
            put(tx, &global)?;
            put(tx, &project)
        })
        .unwrap();

    let conn = store.conn().unwrap();
    assert_eq!(get(&conn, &global.scope).unwrap(), Some(global));
    assert_eq!(get(&conn, &project.scope).unwrap(), Some(project));
}
