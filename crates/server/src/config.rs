// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// CORS allowlist entry for the dashboard UI.
    pub frontend_url: Option<String>,
    pub db_path: PathBuf,
    /// Pre-configured API key; generated and persisted when absent.
    pub api_key: Option<String>,
    pub disable_safety_check: bool,
    /// Assistant binary used by both the safety checker and the executor.
    pub assistant_binary: String,
    /// Root of the upstream conversation logs.
    pub log_root: PathBuf,
    pub scheduler_tick: Duration,
    /// Release/production toggle (quieter logs, no permissive CORS).
    pub release_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            frontend_url: None,
            db_path: home.join(".ccdash").join("ccdash.db"),
            api_key: None,
            disable_safety_check: false,
            assistant_binary: "claude".to_string(),
            log_root: home.join(".claude").join("projects"),
            scheduler_tick: Duration::from_secs(30),
            release_mode: false,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Some(port) = env_parse::<u16>("PORT") {
            config.port = port;
        }
        if let Ok(url) = std::env::var("FRONTEND_URL") {
            if !url.is_empty() {
                config.frontend_url = Some(url);
            }
        }
        if let Ok(path) = std::env::var("CCDASH_DB_PATH") {
            if !path.is_empty() {
                config.db_path = PathBuf::from(path);
            }
        }
        if let Ok(key) = std::env::var("CCDASH_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        config.disable_safety_check = env_flag("CCDASH_DISABLE_SAFETY_CHECK");
        if let Ok(binary) = std::env::var("CCDASH_CLAUDE_CODE_PATH") {
            if !binary.is_empty() {
                config.assistant_binary = binary;
            }
        }
        if let Ok(root) = std::env::var("CCDASH_LOG_ROOT") {
            if !root.is_empty() {
                config.log_root = PathBuf::from(root);
            }
        }
        if let Some(secs) = env_parse::<u64>("CCDASH_SCHEDULER_TICK_SECS") {
            config.scheduler_tick = Duration::from_secs(secs.max(1));
        }
        config.release_mode = std::env::var("CCDASH_ENV")
            .map(|v| v.eq_ignore_ascii_case("release") || v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        config
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
