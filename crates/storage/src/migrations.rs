// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered schema migrations with a ledger table.
//!
//! Each missing version applies inside its own transaction and is recorded
//! in `schema_migrations`; reopening an already-migrated database is a
//! no-op. A database ahead of this binary is rejected rather than guessed at.

use crate::{util::ts_to_sql, StoreError};
use chrono::Utc;
use rusqlite::Connection;

/// Ordered `(version, up)` migration scripts. Append-only.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        "CREATE TABLE projects (
            id   TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE
        );
        CREATE TABLE sessions (
            id               TEXT PRIMARY KEY,
            project_id       TEXT NOT NULL REFERENCES projects(id),
            start_time       TEXT NOT NULL,
            end_time         TEXT,
            first_message_ts TEXT NOT NULL,
            last_activity    TEXT NOT NULL
        );
        CREATE INDEX idx_sessions_project ON sessions(project_id);
        CREATE INDEX idx_sessions_last_activity ON sessions(last_activity);
        CREATE TABLE messages (
            id                    TEXT NOT NULL,
            session_id            TEXT NOT NULL REFERENCES sessions(id),
            parent_id             TEXT,
            role                  TEXT NOT NULL,
            model                 TEXT,
            content               TEXT NOT NULL,
            input_tokens          INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens     INTEGER NOT NULL DEFAULT 0,
            output_tokens         INTEGER NOT NULL DEFAULT 0,
            cost                  REAL,
            timestamp             TEXT NOT NULL,
            window_id             INTEGER,
            PRIMARY KEY (session_id, id)
        );
        CREATE INDEX idx_messages_timestamp ON messages(timestamp);
        CREATE INDEX idx_messages_window ON messages(window_id);
        CREATE TABLE file_sync_state (
            path        TEXT PRIMARY KEY,
            size        INTEGER NOT NULL,
            last_offset INTEGER NOT NULL,
            last_mtime  TEXT NOT NULL,
            head_hash   TEXT NOT NULL
        );",
    ),
    (
        2,
        "CREATE TABLE usage_windows (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            window_start TEXT NOT NULL,
            window_end   TEXT NOT NULL,
            reset_time   TEXT NOT NULL,
            UNIQUE (window_start, window_end)
        );
        CREATE TABLE window_aggregates (
            window_id              INTEGER PRIMARY KEY
                                   REFERENCES usage_windows(id) ON DELETE CASCADE,
            input_tokens           INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens  INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens      INTEGER NOT NULL DEFAULT 0,
            output_tokens          INTEGER NOT NULL DEFAULT 0,
            total_cost             REAL NOT NULL DEFAULT 0,
            message_count          INTEGER NOT NULL DEFAULT 0,
            distinct_session_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE predictions (
            scope                 TEXT PRIMARY KEY,
            predicted_at          TEXT NOT NULL,
            token_limit           REAL NOT NULL,
            message_limit         REAL NOT NULL,
            cost_limit            REAL NOT NULL,
            confidence            REAL NOT NULL,
            burn_rate_per_hour    REAL NOT NULL,
            time_to_limit_minutes REAL NOT NULL
        );",
    ),
    (
        3,
        "CREATE TABLE jobs (
            id                  TEXT PRIMARY KEY,
            project_id          TEXT NOT NULL,
            command             TEXT NOT NULL,
            yolo_mode           INTEGER NOT NULL DEFAULT 0,
            schedule            TEXT NOT NULL,
            scheduled_at        TEXT NOT NULL,
            claimed_at          TEXT,
            status              TEXT NOT NULL,
            created_at          TEXT NOT NULL,
            started_at          TEXT,
            completed_at        TEXT,
            pid                 INTEGER,
            exit_code           INTEGER,
            execution_directory TEXT NOT NULL,
            output_log          TEXT NOT NULL DEFAULT '',
            error_log           TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX idx_jobs_due ON jobs(status, scheduled_at);
        CREATE INDEX idx_jobs_project ON jobs(project_id);",
    ),
];

/// Apply every missing migration, newest last.
pub fn apply_all(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current = current_version(conn)?;
    let head = MIGRATIONS.last().map(|(v, _)| *v).unwrap_or(0);
    if current > head {
        return Err(StoreError::Migration {
            version: current,
            reason: format!("database is ahead of this binary (head {head})"),
        });
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| StoreError::Migration {
            version: *version,
            reason: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, ts_to_sql(Utc::now())],
        )?;
        tx.commit()?;
        tracing::info!(version, "applied migration");
    }
    Ok(())
}

/// Highest version recorded in the ledger (0 for a fresh database).
pub fn current_version(conn: &Connection) -> Result<i64, StoreError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(version)
}

#[cfg(test)]
#[path = "migrations_tests.rs"]
mod tests;
