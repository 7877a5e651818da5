// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity and name derivation from working-directory paths.

use crate::id::ProjectId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path};

/// A project discovered from the working directory of an upstream message.
///
/// Projects are created implicitly the first time a message references a new
/// working directory, and are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Absolute canonical path of the project root.
    pub path: String,
}

/// Conventional subdirectory names that do not identify a project on their
/// own. When the last path segment is one of these, the parent segment names
/// the project instead.
pub const DEFAULT_SKIP_SEGMENTS: &[&str] = &["frontend", "backend", "src", "lib"];

/// Derives project names and deterministic ids from working-directory paths.
///
/// The skip set is configuration: callers may extend it beyond the observed
/// defaults without touching the derivation rule.
#[derive(Debug, Clone)]
pub struct ProjectNamer {
    skip_segments: Vec<String>,
}

impl Default for ProjectNamer {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_SEGMENTS.iter().map(|s| s.to_string()))
    }
}

impl ProjectNamer {
    pub fn new(skip_segments: impl IntoIterator<Item = String>) -> Self {
        Self {
            skip_segments: skip_segments.into_iter().collect(),
        }
    }

    /// Build a [`Project`] from a working-directory path.
    ///
    /// The id is the hex SHA-256 of the normalized path, truncated to 16
    /// characters, so the same directory always maps to the same project.
    pub fn project_for(&self, cwd: &str) -> Project {
        let path = normalize_path(cwd);
        Project {
            id: project_id(&path),
            name: self.name_for(&path),
            path,
        }
    }

    /// Derive a display name from a path: the last meaningful segment,
    /// skipping conventional subdirectory names.
    pub fn name_for(&self, path: &str) -> String {
        let mut segments: Vec<&str> = Path::new(path)
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        while let Some(last) = segments.last() {
            if segments.len() > 1 && self.skip_segments.iter().any(|s| s == last) {
                segments.pop();
            } else {
                break;
            }
        }

        segments.last().map(|s| s.to_string()).unwrap_or_else(|| "root".to_string())
    }
}

/// Deterministic project id: hex SHA-256 of the path, truncated to 16 chars.
pub fn project_id(path: &str) -> ProjectId {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    ProjectId::new(&hex[..16])
}

/// Normalize a path string without touching the filesystem: strip trailing
/// separators and collapse `.` components. Symlink resolution happens at the
/// ingestion boundary where the path is known to exist.
fn normalize_path(cwd: &str) -> String {
    let path = Path::new(cwd);
    let mut out = std::path::PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    let s = out.to_string_lossy().to_string();
    if s.is_empty() {
        "/".to_string()
    } else {
        s
    }
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
