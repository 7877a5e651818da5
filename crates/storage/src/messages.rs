// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message queries. Messages are immutable after first insert; only the
//! window assignment changes, and only via the window engine.

use crate::util::{ts_col, ts_to_sql};
use crate::StoreError;
use ccdash_core::{Message, MessageId, Role, SessionId, TokenUsage};
use rusqlite::{params, Connection, Row};

fn from_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let role: String = row.get(3)?;
    Ok(Message {
        id: MessageId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        parent_id: row.get::<_, Option<String>>(2)?.map(MessageId::new),
        role: Role::parse(&role).unwrap_or(Role::User),
        model: row.get(4)?,
        content: row.get(5)?,
        usage: TokenUsage {
            input_tokens: row.get::<_, i64>(6)?.max(0) as u64,
            cache_creation_tokens: row.get::<_, i64>(7)?.max(0) as u64,
            cache_read_tokens: row.get::<_, i64>(8)?.max(0) as u64,
            output_tokens: row.get::<_, i64>(9)?.max(0) as u64,
        },
        cost: row.get(10)?,
        timestamp: ts_col(row, 11)?,
        window_id: row.get(12)?,
    })
}

const COLUMNS: &str = "id, session_id, parent_id, role, model, content,
    input_tokens, cache_creation_tokens, cache_read_tokens, output_tokens,
    cost, timestamp, window_id";

/// Insert a message. Returns `false` when `(session_id, id)` already exists.
pub fn insert(conn: &Connection, message: &Message) -> Result<bool, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO messages (id, session_id, parent_id, role, model, content,
            input_tokens, cache_creation_tokens, cache_read_tokens, output_tokens,
            cost, timestamp, window_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(session_id, id) DO NOTHING",
        params![
            message.id.as_str(),
            message.session_id.as_str(),
            message.parent_id.as_ref().map(|p| p.as_str()),
            message.role.as_str(),
            message.model,
            message.content,
            message.usage.input_tokens as i64,
            message.usage.cache_creation_tokens as i64,
            message.usage.cache_read_tokens as i64,
            message.usage.output_tokens as i64,
            message.cost,
            ts_to_sql(message.timestamp),
            message.window_id,
        ],
    )?;
    Ok(inserted > 0)
}

/// Page of messages for one session, oldest first.
pub fn for_session(
    conn: &Connection,
    session_id: &SessionId,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM messages WHERE session_id = ?1
         ORDER BY timestamp ASC LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(params![session_id.as_str(), limit, offset], from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn count_for_session(conn: &Connection, session_id: &SessionId) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
        params![session_id.as_str()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Resolve which session a message uuid belongs to (summary records point
/// at a leaf message, not a session).
pub fn session_for_message(
    conn: &Connection,
    id: &MessageId,
) -> Result<Option<SessionId>, StoreError> {
    use rusqlite::OptionalExtension;
    let session = conn
        .query_row(
            "SELECT session_id FROM messages WHERE id = ?1 LIMIT 1",
            params![id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(session.map(SessionId::new))
}

/// Drop every message of a session (full reparse of a rewritten file).
/// Returns the number of removed rows.
pub fn delete_for_session(conn: &Connection, session_id: &SessionId) -> Result<u64, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM messages WHERE session_id = ?1",
        params![session_id.as_str()],
    )?;
    Ok(deleted as u64)
}

/// The earliest message with no window assignment, if any.
pub fn earliest_unassigned(conn: &Connection) -> Result<Option<Message>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM messages WHERE window_id IS NULL
         ORDER BY timestamp ASC LIMIT 1"
    ))?;
    let mut rows = stmt.query_map([], from_row)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

pub fn count_unassigned(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE window_id IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Assign every unassigned message in `[start, end)` to `window_id`.
/// Returns the number of messages assigned.
pub fn assign_window(
    conn: &Connection,
    window_id: i64,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> Result<u64, StoreError> {
    let updated = conn.execute(
        "UPDATE messages SET window_id = ?1
         WHERE window_id IS NULL AND timestamp >= ?2 AND timestamp < ?3",
        params![window_id, ts_to_sql(start), ts_to_sql(end)],
    )?;
    Ok(updated as u64)
}

/// Clear every window assignment (the first half of a full recalculation).
pub fn clear_window_assignments(conn: &Connection) -> Result<u64, StoreError> {
    let updated = conn.execute("UPDATE messages SET window_id = NULL", [])?;
    Ok(updated as u64)
}

/// Tokens-per-hour buckets over the trailing `hours`, oldest first.
///
/// Bucket keys exploit the fixed-width RFC 3339 encoding: the first 13
/// characters of a stored timestamp are exactly `YYYY-MM-DDTHH`.
pub fn hourly_token_buckets(
    conn: &Connection,
    since: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<(String, u64)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT substr(timestamp, 1, 13) AS hour,
                SUM(input_tokens + cache_creation_tokens + cache_read_tokens + output_tokens)
         FROM messages WHERE timestamp >= ?1
         GROUP BY hour ORDER BY hour ASC",
    )?;
    let rows = stmt.query_map(params![ts_to_sql(since)], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (hour, tokens) = row?;
        out.push((hour, tokens.max(0) as u64));
    }
    Ok(out)
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
