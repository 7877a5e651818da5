// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upstream conversation session projected from the log.

use crate::id::{ProjectId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation session, projected from message ingestion.
///
/// `start_time` tracks the earliest message seen; `last_activity` the latest.
/// `end_time` is only set when the log carries a closing marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_id: ProjectId,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub first_message_ts: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Fold a message timestamp into the session bounds.
    pub fn observe(&mut self, ts: DateTime<Utc>) {
        if ts < self.start_time {
            self.start_time = ts;
        }
        if ts < self.first_message_ts {
            self.first_message_ts = ts;
        }
        if ts > self.last_activity {
            self.last_activity = ts;
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
