// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timestamp encoding shared by every query module.
//!
//! Timestamps persist as fixed-width RFC 3339 UTC text (millisecond
//! precision, `Z` suffix) so lexicographic comparison in SQL matches
//! chronological order.

use crate::StoreError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Encode a timestamp for storage and SQL comparison.
pub fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp.
pub fn ts_from_sql(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Connection(format!("bad timestamp {s:?}: {e}")))
}

/// Read a timestamp column inside a row-mapping closure.
pub(crate) fn ts_col(row: &rusqlite::Row<'_>, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Read a nullable timestamp column inside a row-mapping closure.
pub(crate) fn opt_ts_col(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let s: Option<String> = row.get(idx)?;
    s.map(|v| {
        DateTime::parse_from_rfc3339(&v)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}
