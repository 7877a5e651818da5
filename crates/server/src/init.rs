// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup pipeline tracking: ingestion → windows → prediction.
//!
//! The server starts serving before the first pass finishes; queries read
//! whatever is in the store, and this tracker tells the UI how far along
//! the pipeline is. A failed pass leaves read-only endpoints working and
//! is replayed through `POST /sync-logs`.

use crate::state::AppState;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Initializing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitStatus {
    pub state: InitState,
    pub processed_files: u64,
    pub total_files: u64,
    pub new_lines: u64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared, cheaply-cloneable view of the pipeline state.
#[derive(Clone)]
pub struct InitTracker {
    inner: Arc<RwLock<InitStatus>>,
}

impl InitTracker {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(InitStatus {
                state: InitState::Initializing,
                processed_files: 0,
                total_files: 0,
                new_lines: 0,
                start_time: now,
                end_time: None,
                error: None,
            })),
        }
    }

    pub fn snapshot(&self) -> InitStatus {
        self.inner.read().clone()
    }

    pub fn begin(&self, now: DateTime<Utc>, total_files: u64) {
        let mut status = self.inner.write();
        *status = InitStatus {
            state: InitState::Initializing,
            processed_files: 0,
            total_files,
            new_lines: 0,
            start_time: now,
            end_time: None,
            error: None,
        };
    }

    pub fn progress(&self, processed: u64, total: u64) {
        let mut status = self.inner.write();
        status.processed_files = processed;
        status.total_files = total;
    }

    pub fn complete(&self, now: DateTime<Utc>, new_lines: u64) {
        let mut status = self.inner.write();
        status.state = InitState::Completed;
        status.new_lines = new_lines;
        status.processed_files = status.total_files;
        status.end_time = Some(now);
        status.error = None;
    }

    pub fn fail(&self, now: DateTime<Utc>, error: String) {
        let mut status = self.inner.write();
        status.state = InitState::Failed;
        status.end_time = Some(now);
        status.error = Some(error);
    }
}

/// Outcome of one full pipeline pass, served by `POST /sync-logs`.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub files: u64,
    pub new_lines: u64,
    pub duration_ms: u64,
    pub errors: Vec<String>,
    pub windows_created: u64,
    pub messages_assigned: u64,
}

/// Run ingestion, window assignment, and prediction in order, updating the
/// tracker as it goes.
pub async fn run_pipeline(app: AppState) -> Result<PipelineReport, String> {
    let now = app.clock.now();
    app.init.begin(now, app.ingester.file_count());

    let tracker = app.init.clone();
    let report = app
        .ingester
        .sync_all_with_progress(move |processed, total| tracker.progress(processed, total))
        .await;

    let assign = match app.windows.assign_all() {
        Ok(assign) => assign,
        Err(e) => {
            let message = format!("window assignment failed: {e}");
            app.init.fail(app.clock.now(), message.clone());
            return Err(message);
        }
    };

    if let Err(e) = app.predictor.refresh_all() {
        let message = format!("prediction refresh failed: {e}");
        app.init.fail(app.clock.now(), message.clone());
        return Err(message);
    }

    app.init.complete(app.clock.now(), report.new_lines);
    Ok(PipelineReport {
        files: report.files,
        new_lines: report.new_lines,
        duration_ms: report.duration_ms,
        errors: report.errors,
        windows_created: assign.windows_created,
        messages_assigned: assign.messages_assigned,
    })
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
