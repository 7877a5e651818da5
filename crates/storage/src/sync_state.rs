// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-file ingestion bookmarks.

use crate::util::{ts_col, ts_to_sql};
use crate::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Resume bookmark for one JSONL file.
///
/// A file is resumable from `last_offset` only while its first-4KB hash
/// matches and it has not shrunk; otherwise the ingester reparses from the
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSyncState {
    pub path: String,
    pub size: u64,
    pub last_offset: u64,
    pub last_mtime: DateTime<Utc>,
    /// Hex SHA-256 of the file's first 4 KB.
    pub head_hash: String,
}

fn from_row(row: &Row<'_>) -> Result<FileSyncState, rusqlite::Error> {
    Ok(FileSyncState {
        path: row.get(0)?,
        size: row.get::<_, i64>(1)?.max(0) as u64,
        last_offset: row.get::<_, i64>(2)?.max(0) as u64,
        last_mtime: ts_col(row, 3)?,
        head_hash: row.get(4)?,
    })
}

pub fn get(conn: &Connection, path: &str) -> Result<Option<FileSyncState>, StoreError> {
    let state = conn
        .query_row(
            "SELECT path, size, last_offset, last_mtime, head_hash
             FROM file_sync_state WHERE path = ?1",
            params![path],
            from_row,
        )
        .optional()?;
    Ok(state)
}

pub fn upsert(conn: &Connection, state: &FileSyncState) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO file_sync_state (path, size, last_offset, last_mtime, head_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(path) DO UPDATE SET
            size = excluded.size,
            last_offset = excluded.last_offset,
            last_mtime = excluded.last_mtime,
            head_hash = excluded.head_hash",
        params![
            state.path,
            state.size as i64,
            state.last_offset as i64,
            ts_to_sql(state.last_mtime),
            state.head_hash,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "sync_state_tests.rs"]
mod tests;
