// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Usage-window and aggregate queries.
//!
//! Windows are created only by the window engine and never modified after
//! creation; the `(window_start, window_end)` unique key is what enforces
//! pairwise disjointness of the grid.

use crate::util::{ts_col, ts_to_sql};
use crate::StoreError;
use ccdash_core::{UsageWindow, WindowAggregate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn from_row(row: &Row<'_>) -> Result<UsageWindow, rusqlite::Error> {
    Ok(UsageWindow {
        id: row.get(0)?,
        window_start: ts_col(row, 1)?,
        window_end: ts_col(row, 2)?,
        reset_time: ts_col(row, 3)?,
    })
}

/// Insert a window, returning its id. The unique key on
/// `(window_start, window_end)` makes re-insertion return the existing row.
pub fn insert(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO usage_windows (window_start, window_end, reset_time)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(window_start, window_end) DO NOTHING",
        params![ts_to_sql(start), ts_to_sql(end), ts_to_sql(end)],
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM usage_windows WHERE window_start = ?1 AND window_end = ?2",
        params![ts_to_sql(start), ts_to_sql(end)],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// The window whose `[start, end)` contains `ts`, if any.
pub fn containing(conn: &Connection, ts: DateTime<Utc>) -> Result<Option<UsageWindow>, StoreError> {
    let window = conn
        .query_row(
            "SELECT id, window_start, window_end, reset_time FROM usage_windows
             WHERE window_start <= ?1 AND ?1 < window_end",
            params![ts_to_sql(ts)],
            from_row,
        )
        .optional()?;
    Ok(window)
}

pub fn get(conn: &Connection, id: i64) -> Result<UsageWindow, StoreError> {
    let window = conn.query_row(
        "SELECT id, window_start, window_end, reset_time FROM usage_windows WHERE id = ?1",
        params![id],
        from_row,
    )?;
    Ok(window)
}

/// All windows, newest first.
pub fn list(conn: &Connection) -> Result<Vec<UsageWindow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, window_start, window_end, reset_time FROM usage_windows
         ORDER BY window_start DESC",
    )?;
    let rows = stmt.query_map([], from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Delete every window and aggregate (the second half of a recalculation;
/// message assignments must already be cleared).
pub fn delete_all(conn: &Connection) -> Result<u64, StoreError> {
    let deleted = conn.execute("DELETE FROM usage_windows", [])?;
    Ok(deleted as u64)
}

fn aggregate_from_row(row: &Row<'_>) -> Result<WindowAggregate, rusqlite::Error> {
    Ok(WindowAggregate {
        window_id: row.get(0)?,
        input_tokens: row.get::<_, i64>(1)?.max(0) as u64,
        cache_creation_tokens: row.get::<_, i64>(2)?.max(0) as u64,
        cache_read_tokens: row.get::<_, i64>(3)?.max(0) as u64,
        output_tokens: row.get::<_, i64>(4)?.max(0) as u64,
        total_cost: row.get(5)?,
        message_count: row.get::<_, i64>(6)?.max(0) as u64,
        distinct_session_count: row.get::<_, i64>(7)?.max(0) as u64,
    })
}

const AGG_COLUMNS: &str = "window_id, input_tokens, cache_creation_tokens,
    cache_read_tokens, output_tokens, total_cost, message_count, distinct_session_count";

/// Recompute one window's aggregate from its member messages.
///
/// This is the authoritative path: a straight SUM over the assignment, so a
/// recomputation from scratch always matches.
pub fn recompute_aggregate(conn: &Connection, window_id: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO window_aggregates (window_id, input_tokens, cache_creation_tokens,
            cache_read_tokens, output_tokens, total_cost, message_count, distinct_session_count)
         SELECT ?1,
                COALESCE(SUM(input_tokens), 0),
                COALESCE(SUM(cache_creation_tokens), 0),
                COALESCE(SUM(cache_read_tokens), 0),
                COALESCE(SUM(output_tokens), 0),
                COALESCE(SUM(cost), 0),
                COUNT(*),
                COUNT(DISTINCT session_id)
         FROM messages WHERE window_id = ?1
         ON CONFLICT(window_id) DO UPDATE SET
            input_tokens = excluded.input_tokens,
            cache_creation_tokens = excluded.cache_creation_tokens,
            cache_read_tokens = excluded.cache_read_tokens,
            output_tokens = excluded.output_tokens,
            total_cost = excluded.total_cost,
            message_count = excluded.message_count,
            distinct_session_count = excluded.distinct_session_count",
        params![window_id],
    )?;
    Ok(())
}

pub fn aggregate(conn: &Connection, window_id: i64) -> Result<Option<WindowAggregate>, StoreError> {
    let agg = conn
        .query_row(
            &format!("SELECT {AGG_COLUMNS} FROM window_aggregates WHERE window_id = ?1"),
            params![window_id],
            aggregate_from_row,
        )
        .optional()?;
    Ok(agg)
}

/// Aggregates for historical windows: closed before `now` with at least one
/// message. These are the predictor's eligible sample.
pub fn eligible_aggregates(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<Vec<WindowAggregate>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AGG_COLUMNS} FROM window_aggregates a
         JOIN usage_windows w ON w.id = a.window_id
         WHERE a.message_count >= 1 AND w.window_end <= ?1
         ORDER BY w.window_start ASC"
    ))?;
    let rows = stmt.query_map(params![ts_to_sql(now)], aggregate_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Eligible aggregates restricted to windows containing at least one message
/// from the given project.
pub fn eligible_aggregates_for_project(
    conn: &Connection,
    project_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<WindowAggregate>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AGG_COLUMNS} FROM window_aggregates a
         JOIN usage_windows w ON w.id = a.window_id
         WHERE a.message_count >= 1 AND w.window_end <= ?1
           AND EXISTS (
             SELECT 1 FROM messages m
             JOIN sessions s ON s.id = m.session_id
             WHERE m.window_id = a.window_id AND s.project_id = ?2)
         ORDER BY w.window_start ASC"
    ))?;
    let rows = stmt.query_map(params![ts_to_sql(now), project_id], aggregate_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "windows_tests.rs"]
mod tests;
