// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-width usage windows matching the upstream quota reset cadence.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Width of a usage window in hours.
pub const WINDOW_HOURS: i64 = 5;

/// A contiguous interval `[window_start, window_end)` during which upstream
/// quota accrues. `reset_time` equals `window_end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub id: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub reset_time: DateTime<Utc>,
}

impl UsageWindow {
    /// Whether the half-open interval `[start, end)` contains `ts`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.window_start <= ts && ts < self.window_end
    }
}

/// The `[start, end)` bounds a window covering `ts` would have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowBounds {
    /// Compute the bounds for a window anchored at a message timestamp.
    ///
    /// The start is floored to the minute so the first window in a quiet
    /// period begins where usage begins; the end is `start + 5h` floored to
    /// the hour so the grid stays aligned with the upstream reset cadence
    /// across restarts.
    pub fn anchored_at(ts: DateTime<Utc>) -> Self {
        let start = floor_to_minute(ts);
        let end = floor_to_hour(start + Duration::hours(WINDOW_HOURS));
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

/// Truncate a timestamp to the start of its minute.
pub fn floor_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Truncate a timestamp to the start of its hour.
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Per-window totals, always equal to the sum over assigned messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowAggregate {
    pub window_id: i64,
    pub input_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub output_tokens: u64,
    pub total_cost: f64,
    pub message_count: u64,
    pub distinct_session_count: u64,
}

impl WindowAggregate {
    /// Total tokens across all four categories.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens + self.output_tokens
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
