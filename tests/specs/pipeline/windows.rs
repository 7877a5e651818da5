//! Window-grid specs: assignment invariants over the ingested log.

use crate::prelude::*;
use ccdash_core::FakeClock;
use ccdash_ingest::{Predictor, WindowEngine};
use chrono::Duration;
use std::sync::Arc;

#[tokio::test]
async fn single_session_lands_in_one_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    // t, t+1m, t+30m
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::minutes(1), 200),
            log_line("u-3", "s-1", base() + Duration::minutes(30), 300),
        ],
    );

    ingester(&store, dir.path()).sync_all().await;
    WindowEngine::new(store.clone()).assign_all().unwrap();

    let conn = store.conn().unwrap();
    let windows = ccdash_storage::windows::list(&conn).unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].window_start, base());
    assert_eq!(windows[0].window_end, base() + Duration::hours(5));
    assert_eq!(windows[0].reset_time, windows[0].window_end);

    let aggregate = ccdash_storage::windows::aggregate(&conn, windows[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(aggregate.message_count, 3);
}

#[tokio::test]
async fn messages_across_the_boundary_split_into_two_windows() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    // t and t + 5h + 1m
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::hours(5) + Duration::minutes(1), 200),
        ],
    );

    ingester(&store, dir.path()).sync_all().await;
    WindowEngine::new(store.clone()).assign_all().unwrap();

    let conn = store.conn().unwrap();
    let windows = ccdash_storage::windows::list(&conn).unwrap();
    assert_eq!(windows.len(), 2);

    // Pairwise disjoint, and the late message lives in the second window
    let (newer, older) = (&windows[0], &windows[1]);
    assert!(older.window_end <= newer.window_start);

    let messages = ccdash_storage::messages::for_session(
        &conn,
        &ccdash_core::SessionId::new("s-1"),
        10,
        0,
    )
    .unwrap();
    assert_eq!(messages[0].window_id, Some(older.id));
    assert_eq!(messages[1].window_id, Some(newer.id));

    // Every message's window contains its timestamp
    for message in &messages {
        let window =
            ccdash_storage::windows::get(&conn, message.window_id.unwrap()).unwrap();
        assert!(window.contains(message.timestamp));
    }
}

#[tokio::test]
async fn aggregates_survive_recalculation_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::hours(6), 200),
            log_line("u-3", "s-1", base() + Duration::hours(6) + Duration::minutes(5), 300),
        ],
    );

    ingester(&store, dir.path()).sync_all().await;
    let engine = WindowEngine::new(store.clone());
    engine.assign_all().unwrap();

    let snapshot = |store: &ccdash_storage::Store| {
        let conn = store.conn().unwrap();
        ccdash_storage::windows::list(&conn)
            .unwrap()
            .into_iter()
            .map(|w| {
                let agg = ccdash_storage::windows::aggregate(&conn, w.id).unwrap().unwrap();
                (
                    w.window_start,
                    w.window_end,
                    agg.message_count,
                    agg.total_tokens(),
                )
            })
            .collect::<Vec<_>>()
    };

    let before = snapshot(&store);
    engine.recalculate_all().unwrap();
    let after = snapshot(&store);
    assert_eq!(before, after);
}

#[tokio::test]
async fn prediction_follows_the_ingested_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    // Three well-separated windows
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 1_000),
            log_line("u-2", "s-1", base() + Duration::hours(10), 2_000),
            log_line("u-3", "s-1", base() + Duration::hours(20), 3_000),
        ],
    );

    ingester(&store, dir.path()).sync_all().await;
    WindowEngine::new(store.clone()).assign_all().unwrap();

    // Far enough out that all three windows are closed history
    let clock = Arc::new(FakeClock::at(base() + Duration::days(2)));
    let predictor = Predictor::new(store.clone(), clock);
    let prediction = predictor.refresh_global().unwrap();

    assert!((prediction.confidence - 0.15).abs() < 1e-9, "3 of 20 windows");
    assert!(prediction.token_limit > 2_000.0);
    assert!(prediction.message_limit >= 1.0);
}
