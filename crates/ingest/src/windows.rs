// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assignment of messages to 5-hour usage windows.
//!
//! The assignment is a pure function of the message set: starting from the
//! earliest unassigned message, find or create the covering window, sweep
//! every message inside its `[start, end)` into it, repeat. Persistence is
//! a single transaction per pass, so a crash leaves either the old or the
//! new assignment, never a mix.

use ccdash_core::WindowBounds;
use ccdash_storage::{messages, windows, Store, StoreError};

/// Outcome of an assignment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AssignReport {
    pub windows_created: u64,
    pub messages_assigned: u64,
}

/// Buckets messages into usage windows and maintains the aggregates.
#[derive(Clone)]
pub struct WindowEngine {
    store: Store,
}

impl WindowEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Assign every unassigned message, creating windows on demand.
    /// Idempotent: running it again with no new messages is a no-op.
    pub fn assign_all(&self) -> Result<AssignReport, StoreError> {
        self.store.with_tx(|tx| assign_pass(tx))
    }

    /// Rebuild the entire window grid from scratch in one transaction:
    /// drop every assignment and window, then re-run the assignment.
    pub fn recalculate_all(&self) -> Result<AssignReport, StoreError> {
        let report = self.store.with_tx(|tx| {
            messages::clear_window_assignments(tx)?;
            windows::delete_all(tx)?;
            assign_pass(tx)
        })?;
        tracing::info!(
            windows = report.windows_created,
            messages = report.messages_assigned,
            "window grid recalculated"
        );
        Ok(report)
    }
}

fn assign_pass(tx: &rusqlite::Transaction<'_>) -> Result<AssignReport, StoreError> {
    let mut report = AssignReport::default();
    let mut touched = std::collections::BTreeSet::new();

    while let Some(message) = messages::earliest_unassigned(tx)? {
        let window = match windows::containing(tx, message.timestamp)? {
            Some(existing) => existing,
            None => {
                // A message outside every existing window always opens a new
                // one; overlap is ruled out by the (start, end) unique key.
                let bounds = WindowBounds::anchored_at(message.timestamp);
                let id = windows::insert(tx, bounds.start, bounds.end)?;
                report.windows_created += 1;
                windows::get(tx, id)?
            }
        };

        let assigned =
            messages::assign_window(tx, window.id, window.window_start, window.window_end)?;
        if assigned == 0 {
            // The covering window failed to claim the earliest message; bail
            // out rather than spin.
            return Err(StoreError::Constraint(format!(
                "window {} did not cover message {} at {}",
                window.id, message.id, message.timestamp
            )));
        }
        report.messages_assigned += assigned;
        touched.insert(window.id);
    }

    for window_id in touched {
        windows::recompute_aggregate(tx, window_id)?;
    }
    Ok(report)
}

#[cfg(test)]
#[path = "windows_tests.rs"]
mod tests;
