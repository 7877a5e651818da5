// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API key provisioning.
//!
//! Split per responsibility: this module owns persistence (`ensure`), the
//! verifier lives in `auth`, and the one-shot console notice happens here
//! only on first generation.

use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_VAR: &str = "CCDASH_API_KEY";

#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// Provides the API key with `ensure()` semantics: configured value wins,
/// then the persisted env file, then a freshly generated key.
pub struct ApiKeyProvider {
    env_file: PathBuf,
}

impl ApiKeyProvider {
    /// Use `./.env` when it already exists, else `$HOME/.env`, else create
    /// `./.env`.
    pub fn from_conventional_locations() -> Self {
        let local = PathBuf::from(".env");
        if local.exists() {
            return Self { env_file: local };
        }
        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".env");
            if home_env.exists() {
                return Self { env_file: home_env };
            }
        }
        Self { env_file: local }
    }

    pub fn at(env_file: PathBuf) -> Self {
        Self { env_file }
    }

    /// Return the effective API key, generating and persisting one when
    /// neither the configuration nor the env file has it.
    pub fn ensure(&self, configured: Option<&str>) -> Result<String, ApiKeyError> {
        if let Some(key) = configured.filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        if let Some(key) = self.read_persisted()? {
            return Ok(key);
        }

        let key = generate_key();
        self.persist(&key)?;
        // One-shot notice so the operator can copy the key for the UI.
        println!("Generated API key (stored in {}):", self.env_file.display());
        println!("  {ENV_VAR}={key}");
        tracing::info!(env_file = %self.env_file.display(), "generated new API key");
        Ok(key)
    }

    fn read_persisted(&self) -> Result<Option<String>, ApiKeyError> {
        let content = match std::fs::read_to_string(&self.env_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ApiKeyError::Read {
                    path: self.env_file.display().to_string(),
                    message: e.to_string(),
                })
            }
        };
        Ok(parse_env_line(&content))
    }

    fn persist(&self, key: &str) -> Result<(), ApiKeyError> {
        let write_err = |e: std::io::Error| ApiKeyError::Write {
            path: self.env_file.display().to_string(),
            message: e.to_string(),
        };

        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.env_file).map_err(write_err)?;
        writeln!(file, "{ENV_VAR}={key}").map_err(write_err)?;

        // The mode in OpenOptions only applies on creation; clamp an
        // existing file too.
        restrict_permissions(&self.env_file).map_err(write_err)?;
        Ok(())
    }
}

fn restrict_permissions(path: &Path) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
}

/// 256-bit random key, hex-encoded.
fn generate_key() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_env_line(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .find_map(|l| l.strip_prefix(&format!("{ENV_VAR}=")))
        .map(|v| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "api_key_tests.rs"]
mod tests;
