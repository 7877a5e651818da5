// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine and scheduling variants.

use crate::id::{JobId, ProjectId};
use crate::window::WINDOW_HOURS;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Allowed range for the `delayed` schedule, in hours.
pub const DELAY_HOURS_MIN: i64 = 1;
pub const DELAY_HOURS_MAX: i64 = 72;

/// How far in the future an absolute schedule may lie.
pub const SCHEDULE_HORIZON_DAYS: i64 = 365;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states: completed, failed, cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors rejected at the scheduling boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("delay_hours must be between {DELAY_HOURS_MIN} and {DELAY_HOURS_MAX}, got {0}")]
    DelayOutOfRange(i64),
    #[error("scheduled_time must be in the future")]
    TimeInPast,
    #[error("scheduled_time must be within one year")]
    TimeTooFar,
}

/// When a job should become runnable.
///
/// Validation happens here, at the boundary; the scheduler only ever sees a
/// resolved `scheduled_at` instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Schedule {
    /// Runnable as soon as a worker is free.
    Immediate,
    /// Runnable at the current usage window's reset time.
    AfterReset,
    /// Runnable after a fixed number of hours.
    Delayed { delay_hours: i64 },
    /// Runnable at an absolute UTC instant.
    Scheduled { scheduled_time: DateTime<Utc> },
}

impl Schedule {
    pub fn kind(&self) -> &'static str {
        match self {
            Schedule::Immediate => "immediate",
            Schedule::AfterReset => "after_reset",
            Schedule::Delayed { .. } => "delayed",
            Schedule::Scheduled { .. } => "scheduled",
        }
    }

    /// Validate parameters against `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        match self {
            Schedule::Immediate | Schedule::AfterReset => Ok(()),
            Schedule::Delayed { delay_hours } => {
                if !(DELAY_HOURS_MIN..=DELAY_HOURS_MAX).contains(delay_hours) {
                    Err(ScheduleError::DelayOutOfRange(*delay_hours))
                } else {
                    Ok(())
                }
            }
            Schedule::Scheduled { scheduled_time } => {
                if *scheduled_time <= now {
                    Err(ScheduleError::TimeInPast)
                } else if *scheduled_time > now + Duration::days(SCHEDULE_HORIZON_DAYS) {
                    Err(ScheduleError::TimeTooFar)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Resolve the instant the job becomes due.
    ///
    /// `current_reset` is the reset time of the usage window covering `now`,
    /// if one exists; `after_reset` falls back to `now + 5h` otherwise.
    pub fn resolve_scheduled_at(
        &self,
        now: DateTime<Utc>,
        current_reset: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        match self {
            Schedule::Immediate => now,
            Schedule::AfterReset => {
                current_reset.unwrap_or(now + Duration::hours(WINDOW_HOURS))
            }
            Schedule::Delayed { delay_hours } => now + Duration::hours(*delay_hours),
            Schedule::Scheduled { scheduled_time } => *scheduled_time,
        }
    }
}

/// A scheduled coding task that runs the assistant as a child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    /// Natural-language task passed to the assistant in print mode.
    pub command: String,
    /// Skip the safety checker and pass the no-confirmation flag.
    pub yolo_mode: bool,
    pub schedule: Schedule,
    pub scheduled_at: DateTime<Utc>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Working directory the child process launches in.
    pub execution_directory: String,
    #[serde(default)]
    pub output_log: String,
    #[serde(default)]
    pub error_log: String,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
