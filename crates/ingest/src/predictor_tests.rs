// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ccdash_core::{FakeClock, Message, MessageId, Project, ProjectId, Role, Session, SessionId, TokenUsage};
use ccdash_storage::Store;
use chrono::TimeZone;

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).single().unwrap()
}

/// Seed one closed window per entry of `token_loads`, each holding a single
/// message with that many input tokens, then assign windows.
fn seed_windows(store: &Store, token_loads: &[u64]) {
    let project = Project {
        id: ProjectId::new("proj-1"),
        name: "proj".into(),
        path: "/home/u/proj".into(),
    };
    let session = Session {
        id: SessionId::new("s-1"),
        project_id: project.id.clone(),
        start_time: at(1, 9, 0),
        end_time: None,
        first_message_ts: at(1, 9, 0),
        last_activity: at(1, 9, 0),
    };
    store
        .with_tx(|tx| {
            ccdash_storage::projects::upsert(tx, &project)?;
            ccdash_storage::sessions::upsert(tx, &session)?;
            for (n, tokens) in token_loads.iter().enumerate() {
                // One window per day keeps the grid trivially disjoint
                ccdash_storage::messages::insert(
                    tx,
                    &Message {
                        id: MessageId::new(format!("m-{n}")),
                        session_id: session.id.clone(),
                        parent_id: None,
                        role: Role::Assistant,
                        model: None,
                        content: String::new(),
                        usage: TokenUsage {
                            input_tokens: *tokens,
                            cache_creation_tokens: 0,
                            cache_read_tokens: 0,
                            output_tokens: 0,
                        },
                        cost: Some(*tokens as f64 / 100_000.0),
                        timestamp: at(1 + n as u32, 9, 0),
                        window_id: None,
                    },
                )?;
            }
            Ok(())
        })
        .unwrap();
    crate::windows::WindowEngine::new(store.clone())
        .assign_all()
        .unwrap();
}

fn predictor_at(store: &Store, now: DateTime<Utc>) -> Predictor {
    Predictor::new(store.clone(), Arc::new(FakeClock::at(now)))
}

#[test]
fn empty_store_predicts_zero_confidence() {
    let store = Store::open_in_memory().unwrap();
    let predictor = predictor_at(&store, at(20, 9, 0));

    let prediction = predictor.refresh_global().unwrap();
    assert_eq!(prediction.confidence, 0.0);
    assert_eq!(prediction.token_limit, 0.0);
    assert_eq!(prediction.burn_rate_per_hour, 0.0);
    assert_eq!(prediction.time_to_limit_minutes, -1.0);
}

#[test]
fn p90_over_closed_windows() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1000, 2000, 3000, 4000, 5000]);

    // Well past every window's end
    let predictor = predictor_at(&store, at(20, 9, 0));
    let prediction = predictor.refresh_global().unwrap();

    // P90 over [1000..5000] interpolates to 4600
    assert!((prediction.token_limit - 4600.0).abs() < 1e-6);
    assert!((prediction.message_limit - 1.0).abs() < 1e-6);
    assert!((prediction.confidence - 0.25).abs() < 1e-9);
}

#[test]
fn open_window_is_not_eligible_history() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1000]);

    // "now" inside the only window: no closed history yet
    let predictor = predictor_at(&store, at(1, 10, 0));
    let prediction = predictor.refresh_global().unwrap();
    assert_eq!(prediction.confidence, 0.0);
}

#[test]
fn burn_rate_reads_current_window() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1000, 2000]);

    // One hour into the first window (which holds 1000 tokens)
    let predictor = predictor_at(&store, at(1, 10, 0));
    let prediction = predictor.refresh_global().unwrap();
    assert!((prediction.burn_rate_per_hour - 1000.0).abs() < 1e-6);
}

#[test]
fn prediction_is_persisted_per_scope() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1000, 2000]);

    let predictor = predictor_at(&store, at(20, 9, 0));
    predictor.refresh_all().unwrap();

    assert!(predictor.latest(&PredictionScope::Global).unwrap().is_some());
    assert!(predictor
        .latest(&PredictionScope::Project("proj".into()))
        .unwrap()
        .is_some());
    assert!(predictor
        .latest(&PredictionScope::Project("other".into()))
        .unwrap()
        .is_none());
}

#[test]
fn project_scope_sees_only_its_windows() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1000, 2000, 3000]);

    let predictor = predictor_at(&store, at(20, 9, 0));
    let scoped = predictor.refresh_project("proj", "proj-1").unwrap();
    assert!(scoped.confidence > 0.0);

    let unrelated = predictor.refresh_project("ghost", "no-such-id").unwrap();
    assert_eq!(unrelated.confidence, 0.0);
}

#[test]
fn burn_rate_history_buckets_by_hour() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1500]);

    let predictor = predictor_at(&store, at(1, 12, 0));
    let history = predictor.burn_rate_history(6).unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history[0].timestamp, at(1, 9, 0));
    assert!((history[0].tokens_per_hour - 1500.0).abs() < 1e-6);
}

#[test]
fn history_window_excludes_older_hours() {
    let store = Store::open_in_memory().unwrap();
    seed_windows(&store, &[1500]);

    // Messages on day 1 are far outside a 2-hour lookback on day 3
    let predictor = predictor_at(&store, at(3, 12, 0));
    assert!(predictor.burn_rate_history(2).unwrap().is_empty());
}
