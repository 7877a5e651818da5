// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Log ingestion, window assignment, and limit prediction.
//!
//! The pipeline runs in three passes over the store: the [`Ingester`] turns
//! append-only JSONL conversation logs into rows, the [`WindowEngine`]
//! buckets every message into a 5-hour usage window, and the [`Predictor`]
//! projects per-window limits from the historical windows.

pub mod ingester;
pub mod predictor;
pub mod record;
pub mod windows;

pub use ingester::{Ingester, IngesterError, SyncReport};
pub use predictor::{BurnRatePoint, Predictor};
pub use windows::{AssignReport, WindowEngine};
