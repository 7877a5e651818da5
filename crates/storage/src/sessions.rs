// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session queries: insert-if-absent projection plus rolled-up listings.

use crate::util::{opt_ts_col, ts_col, ts_to_sql};
use crate::StoreError;
use ccdash_core::{ProjectId, Session, SessionId, TokenUsage};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

fn from_row(row: &Row<'_>) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: SessionId::new(row.get::<_, String>(0)?),
        project_id: ProjectId::new(row.get::<_, String>(1)?),
        start_time: ts_col(row, 2)?,
        end_time: opt_ts_col(row, 3)?,
        first_message_ts: ts_col(row, 4)?,
        last_activity: ts_col(row, 5)?,
    })
}

/// Insert a session if absent; otherwise widen its activity bounds.
pub fn upsert(conn: &Connection, session: &Session) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO sessions (id, project_id, start_time, end_time, first_message_ts, last_activity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            start_time = MIN(start_time, excluded.start_time),
            first_message_ts = MIN(first_message_ts, excluded.first_message_ts),
            last_activity = MAX(last_activity, excluded.last_activity),
            end_time = COALESCE(excluded.end_time, end_time)",
        params![
            session.id.as_str(),
            session.project_id.as_str(),
            ts_to_sql(session.start_time),
            session.end_time.map(ts_to_sql),
            ts_to_sql(session.first_message_ts),
            ts_to_sql(session.last_activity),
        ],
    )?;
    Ok(())
}

/// Mark a session closed at `end_time`.
pub fn close(conn: &Connection, id: &SessionId, end_time: DateTime<Utc>) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE sessions SET end_time = ?2 WHERE id = ?1",
        params![id.as_str(), ts_to_sql(end_time)],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &SessionId) -> Result<Session, StoreError> {
    let session = conn.query_row(
        "SELECT id, project_id, start_time, end_time, first_message_ts, last_activity
         FROM sessions WHERE id = ?1",
        params![id.as_str()],
        from_row,
    )?;
    Ok(session)
}

/// A session with its rolled-up message totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: Session,
    pub project_name: String,
    pub message_count: u64,
    pub usage: TokenUsage,
    pub total_cost: f64,
}

/// Recent sessions ordered by last activity, newest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<SessionSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.project_id, s.start_time, s.end_time, s.first_message_ts, s.last_activity,
                p.name,
                COUNT(m.id),
                COALESCE(SUM(m.input_tokens), 0),
                COALESCE(SUM(m.cache_creation_tokens), 0),
                COALESCE(SUM(m.cache_read_tokens), 0),
                COALESCE(SUM(m.output_tokens), 0),
                COALESCE(SUM(m.cost), 0)
         FROM sessions s
         JOIN projects p ON p.id = s.project_id
         LEFT JOIN messages m ON m.session_id = s.id
         GROUP BY s.id
         ORDER BY s.last_activity DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        let session = from_row(row)?;
        let project_name: String = row.get(6)?;
        let count: i64 = row.get(7)?;
        let input: i64 = row.get(8)?;
        let cache_creation: i64 = row.get(9)?;
        let cache_read: i64 = row.get(10)?;
        let output: i64 = row.get(11)?;
        let total_cost: f64 = row.get(12)?;
        Ok(SessionSummary {
            session,
            project_name,
            message_count: count.max(0) as u64,
            usage: TokenUsage {
                input_tokens: input.max(0) as u64,
                cache_creation_tokens: cache_creation.max(0) as u64,
                cache_read_tokens: cache_read.max(0) as u64,
                output_tokens: output.max(0) as u64,
            },
            total_cost,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
