// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-execution command safety gate.
//!
//! The checker asks the assistant binary, in print mode, whether a proposed
//! command is safe to run unattended. Anything other than a clear "allow"
//! maps to deny. Because a subprocess per check is slow, verdicts are
//! cached per `(command, execution_directory)` for a short TTL.

use crate::subprocess::{run_with_timeout, SAFETY_CHECK_TIMEOUT};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Classification of a proposed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    /// No clear verdict; treated as deny by the executor.
    Unknown,
}

impl Verdict {
    pub fn permits_execution(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// A verdict plus the raw response for diagnostics.
#[derive(Debug, Clone)]
pub struct SafetyDecision {
    pub verdict: Verdict,
    pub raw_response: String,
}

#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Fully disabled: every check returns allow without spawning anything.
    pub disabled: bool,
    /// Assistant binary invoked in print mode for the verdict.
    pub assistant_binary: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            assistant_binary: "claude".to_string(),
            timeout: SAFETY_CHECK_TIMEOUT,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Stateless checker with a TTL verdict cache.
pub struct SafetyChecker {
    config: SafetyConfig,
    cache: Mutex<HashMap<(String, String), (Verdict, Instant)>>,
}

impl SafetyChecker {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Classify `command` as run from `execution_directory`.
    pub async fn check(&self, command: &str, execution_directory: &Path) -> SafetyDecision {
        if self.config.disabled {
            return SafetyDecision {
                verdict: Verdict::Allow,
                raw_response: "safety check disabled".to_string(),
            };
        }

        let key = (
            command.to_string(),
            execution_directory.display().to_string(),
        );
        if let Some(verdict) = self.cached(&key) {
            return SafetyDecision {
                verdict,
                raw_response: "cached verdict".to_string(),
            };
        }

        let decision = self.consult(command, execution_directory).await;
        self.cache
            .lock()
            .insert(key, (decision.verdict, Instant::now()));
        decision
    }

    fn cached(&self, key: &(String, String)) -> Option<Verdict> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some((verdict, stored_at)) if stored_at.elapsed() < self.config.cache_ttl => {
                Some(*verdict)
            }
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    async fn consult(&self, command: &str, execution_directory: &Path) -> SafetyDecision {
        let prompt = verdict_prompt(command);
        let mut cmd = Command::new(&self.config.assistant_binary);
        cmd.arg("-p")
            .arg(&prompt)
            .current_dir(execution_directory)
            .stdin(std::process::Stdio::null());

        match run_with_timeout(cmd, self.config.timeout, "safety check").await {
            Ok(output) => {
                let raw = String::from_utf8_lossy(&output.stdout).to_string();
                let verdict = parse_verdict(&raw);
                tracing::debug!(?verdict, command, "safety check verdict");
                SafetyDecision {
                    verdict,
                    raw_response: raw,
                }
            }
            Err(message) => {
                tracing::warn!(command, message, "safety check did not produce a verdict");
                SafetyDecision {
                    verdict: Verdict::Unknown,
                    raw_response: message,
                }
            }
        }
    }
}

fn verdict_prompt(command: &str) -> String {
    format!(
        "You are a command safety reviewer. Decide whether the following task \
         is safe to run unattended in this repository. Respond with exactly one \
         word: allow, deny, or unknown.\n\nTask: {command}"
    )
}

/// Extract a verdict by case-insensitive keyword scan.
///
/// Deny wins over allow when both appear, so a response like "do not allow"
/// cannot slip through on the weaker keyword.
pub fn parse_verdict(response: &str) -> Verdict {
    let lower = response.to_lowercase();
    if lower.contains("deny") {
        Verdict::Deny
    } else if lower.contains("allow") {
        Verdict::Allow
    } else {
        Verdict::Unknown
    }
}

#[cfg(test)]
#[path = "safety_tests.rs"]
mod tests;
