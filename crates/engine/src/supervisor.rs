// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised long-lived tasks.
//!
//! Every long-lived task in the server (scheduler tick, executor workers,
//! the initial ingestion pass) goes through [`spawn_supervised`], which
//! recovers panics, honors a shutdown token, and reports failures to a
//! shared sink instead of dying silently.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A recovered failure from a supervised task.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
}

/// Spawn `fut` under supervision.
///
/// The future is expected to watch `shutdown` itself for a prompt exit; the
/// supervisor additionally aborts it when shutdown fires, so a stuck task
/// cannot block process exit. A panic is recovered, logged, and reported to
/// `failures` when a sink is given.
pub fn spawn_supervised<F>(
    name: &str,
    shutdown: CancellationToken,
    failures: Option<mpsc::Sender<TaskFailure>>,
    fut: F,
) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        let mut inner = tokio::spawn(fut);
        tokio::select! {
            _ = shutdown.cancelled() => {
                inner.abort();
                let _ = inner.await;
                tracing::debug!(task = %name, "supervised task stopped on shutdown");
            }
            result = &mut inner => {
                if let Err(e) = result {
                    if e.is_panic() {
                        let message = panic_message(e);
                        tracing::error!(task = %name, message, "supervised task panicked");
                        if let Some(sink) = failures {
                            let _ = sink
                                .send(TaskFailure {
                                    task: name.clone(),
                                    message,
                                })
                                .await;
                        }
                    }
                }
            }
        }
    })
}

/// Extract a human-readable message from a panicked task's `JoinError`.
pub fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
