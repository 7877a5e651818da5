// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Job scheduling and supervised execution of assistant child processes.

pub mod executor;
pub mod safety;
pub mod scheduler;
pub mod subprocess;
pub mod supervisor;

pub use executor::{Executor, ExecutorConfig};
pub use safety::{SafetyChecker, SafetyConfig, SafetyDecision, Verdict};
pub use scheduler::Scheduler;
pub use subprocess::run_with_timeout;
pub use supervisor::{spawn_supervised, TaskFailure};
