//! Ingestion specs: fresh installs, resumability, and idempotent resync.

use crate::prelude::*;
use ccdash_ingest::WindowEngine;
use chrono::Duration;

#[tokio::test]
async fn fresh_install_has_nothing_to_report() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let ingester = ingester(&store, &dir.path().join("logs"));

    let report = ingester.sync_all().await;
    assert_eq!(report.files, 0);
    assert_eq!(report.new_lines, 0);
    assert!(report.errors.is_empty());

    let conn = store.conn().unwrap();
    assert!(ccdash_storage::windows::list(&conn).unwrap().is_empty());
    assert!(ccdash_storage::projects::list(&conn).unwrap().is_empty());
}

#[tokio::test]
async fn ingestion_projects_sessions_and_messages() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::minutes(1), 200),
        ],
    );

    let report = ingester(&store, dir.path()).sync_all().await;
    assert_eq!(report.files, 1);
    assert_eq!(report.new_lines, 2);

    let conn = store.conn().unwrap();
    let projects = ccdash_storage::projects::list(&conn).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "proj");
    assert_eq!(projects[0].path, "/home/u/proj");

    let session =
        ccdash_storage::sessions::get(&conn, &ccdash_core::SessionId::new("s-1")).unwrap();
    assert_eq!(session.start_time, base());
    assert_eq!(session.last_activity, base() + Duration::minutes(1));
}

#[tokio::test]
async fn resync_without_new_lines_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::minutes(1), 200),
            log_line("u-3", "s-1", base() + Duration::minutes(30), 300),
        ],
    );

    let ingester = ingester(&store, dir.path());
    let engine = WindowEngine::new(store.clone());

    let first = ingester.sync_all().await;
    assert_eq!(first.new_lines, 3);
    engine.assign_all().unwrap();

    let aggregates_before = {
        let conn = store.conn().unwrap();
        let windows = ccdash_storage::windows::list(&conn).unwrap();
        windows
            .iter()
            .map(|w| ccdash_storage::windows::aggregate(&conn, w.id).unwrap())
            .collect::<Vec<_>>()
    };

    // Second pass: nothing new, aggregates untouched
    let second = ingester.sync_all().await;
    assert_eq!(second.new_lines, 0);
    engine.assign_all().unwrap();

    let aggregates_after = {
        let conn = store.conn().unwrap();
        let windows = ccdash_storage::windows::list(&conn).unwrap();
        windows
            .iter()
            .map(|w| ccdash_storage::windows::aggregate(&conn, w.id).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(aggregates_before, aggregates_after);
}

#[tokio::test]
async fn sync_offset_is_bounded_by_file_size() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let path = write_session_log(dir.path(), "s-1", &[log_line("u-1", "s-1", base(), 100)]);

    ingester(&store, dir.path()).sync_all().await;

    let conn = store.conn().unwrap();
    let state = ccdash_storage::sync_state::get(&conn, &path.display().to_string())
        .unwrap()
        .unwrap();
    assert!(state.last_offset <= std::fs::metadata(&path).unwrap().len());
}

#[tokio::test]
async fn truncation_to_zero_removes_previous_assignments() {
    let dir = tempfile::tempdir().unwrap();
    let store = store();
    let path = write_session_log(
        dir.path(),
        "s-1",
        &[
            log_line("u-1", "s-1", base(), 100),
            log_line("u-2", "s-1", base() + Duration::minutes(1), 200),
        ],
    );

    let ingester = ingester(&store, dir.path());
    ingester.sync_all().await;

    let before = {
        let conn = store.conn().unwrap();
        ccdash_storage::messages::count_unassigned(&conn).unwrap()
    };
    assert_eq!(before, 2);

    std::fs::File::create(&path).unwrap();
    ingester.sync_all().await;

    let after = {
        let conn = store.conn().unwrap();
        ccdash_storage::messages::count_unassigned(&conn).unwrap()
    };
    assert_eq!(after, 0, "truncation removed exactly the previous messages");
}
