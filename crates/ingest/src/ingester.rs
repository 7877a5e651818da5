// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental ingestion of upstream JSONL conversation logs.
//!
//! Each file is resumed from its stored byte offset when the first 4 KB
//! still hash to the same value and the file has not shrunk; anything else
//! forces a full reparse of that file. A file's updates commit in a single
//! transaction, so a crash mid-file re-ingests only the uncommitted tail.

use crate::record::{self, ParsedLine};
use ccdash_core::{ProjectNamer, Session, SessionId};
use ccdash_storage::{
    messages, projects, sessions, sync_state, FileSyncState, Store, StoreError,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// How many bytes of the file head feed the resumability fingerprint.
const HEAD_HASH_BYTES: usize = 4096;

/// Upper bound on parallel file ingestion.
const MAX_WORKERS: usize = 8;

#[derive(Debug, Error)]
pub enum IngesterError {
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a `sync_all` pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncReport {
    pub files: u64,
    pub new_lines: u64,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

/// Result of ingesting a single file.
#[derive(Debug, Default)]
pub struct FileReport {
    pub new_lines: u64,
    pub errors: Vec<String>,
}

/// Incremental JSONL log ingester.
#[derive(Clone)]
pub struct Ingester {
    store: Store,
    root: PathBuf,
    namer: ProjectNamer,
    workers: usize,
    /// Keyed mutex: the same file is never parsed by two tasks at once.
    locks: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Ingester {
    pub fn new(store: Store, root: PathBuf) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2)
            .min(MAX_WORKERS);
        Self {
            store,
            root,
            namer: ProjectNamer::default(),
            workers,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The log root this ingester scans.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Count the files a `sync_all` pass would visit.
    pub fn file_count(&self) -> u64 {
        self.discover_files().len() as u64
    }

    /// Ingest every file under the root.
    pub async fn sync_all(&self) -> SyncReport {
        self.sync_all_with_progress(|_, _| {}).await
    }

    /// Ingest every file, reporting `(processed, total)` after each one.
    pub async fn sync_all_with_progress<F>(&self, progress: F) -> SyncReport
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        let started = Instant::now();
        let files = self.discover_files();
        let total = files.len() as u64;
        let progress = Arc::new(progress);
        let processed = Arc::new(AtomicU64::new(0));
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let mut report = SyncReport {
            files: total,
            ..SyncReport::default()
        };

        let mut set = JoinSet::new();
        for path in files {
            let ingester = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);
            let processed = Arc::clone(&processed);
            set.spawn(async move {
                let _permit = semaphore.acquire().await;
                let outcome = ingester.sync_file(&path).await;
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(done, total);
                (path, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(file_report))) => {
                    report.new_lines += file_report.new_lines;
                    report.errors.extend(file_report.errors);
                }
                Ok((path, Err(e))) => {
                    tracing::warn!(path = %path.display(), error = %e, "file sync failed");
                    report.errors.push(format!("{}: {e}", path.display()));
                }
                Err(e) => {
                    tracing::error!(error = %e, "sync worker panicked");
                    report.errors.push(format!("sync worker panicked: {e}"));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            files = report.files,
            new_lines = report.new_lines,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "sync pass complete"
        );
        report
    }

    /// Ingest one file. Idempotent; concurrent calls for the same path
    /// serialize on a per-path lock.
    pub async fn sync_file(&self, path: &Path) -> Result<FileReport, IngesterError> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry(path.to_path_buf())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let _guard = lock.lock().await;
        self.sync_file_locked(path)
    }

    fn sync_file_locked(&self, path: &Path) -> Result<FileReport, IngesterError> {
        let io_err = |e: std::io::Error| IngesterError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let meta = std::fs::metadata(path).map_err(io_err)?;
        let size = meta.len();
        let mtime: DateTime<Utc> = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let head_hash = hash_head(path).map_err(io_err)?;

        let stored = {
            let conn = self.store.conn()?;
            sync_state::get(&conn, &path.display().to_string())?
        };

        let resumable = stored.as_ref().is_some_and(|s| {
            s.head_hash == head_hash && s.size <= size && s.last_offset <= size
        });
        let start_offset = if resumable {
            stored.as_ref().map(|s| s.last_offset).unwrap_or(0)
        } else {
            0
        };
        // A shrunken file was truncated or replaced wholesale: its previously
        // ingested messages are gone upstream and must go here too. A grown
        // file with a changed head just reparses; duplicate ids are skipped.
        let shrunk = stored.as_ref().is_some_and(|s| s.size > size);
        if !resumable && stored.is_some() {
            tracing::info!(path = %path.display(), shrunk, "file changed under its bookmark, reparsing from start");
        }

        let (lines, consumed) = read_complete_lines(path, start_offset).map_err(io_err)?;

        let mut report = FileReport::default();
        let fallback_session = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let fallback_project_dir = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "/".to_string());

        self.store.with_tx(|tx| {
            if shrunk {
                let removed =
                    messages::delete_for_session(tx, &SessionId::new(fallback_session.as_str()))?;
                if removed > 0 {
                    tracing::info!(path = %path.display(), removed, "dropped stale messages of truncated file");
                }
            }

            for line in &lines {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match record::parse_line(trimmed) {
                    ParsedLine::Message(rec) => {
                        let project = match rec.cwd.as_deref() {
                            Some(cwd) => self.namer.project_for(cwd),
                            None => self.namer.project_for(&fallback_project_dir),
                        };
                        projects::upsert(tx, &project)?;
                        sessions::upsert(
                            tx,
                            &Session {
                                id: rec.session_id.clone(),
                                project_id: project.id,
                                start_time: rec.timestamp,
                                end_time: None,
                                first_message_ts: rec.timestamp,
                                last_activity: rec.timestamp,
                            },
                        )?;
                        if messages::insert(tx, &rec.into_message())? {
                            report.new_lines += 1;
                        }
                    }
                    ParsedLine::SessionClose { leaf_uuid } => {
                        if let Some(session_id) = messages::session_for_message(tx, &leaf_uuid)? {
                            let session = sessions::get(tx, &session_id)?;
                            sessions::close(tx, &session_id, session.last_activity)?;
                        }
                    }
                    ParsedLine::Skipped => {}
                    ParsedLine::Malformed(reason) => {
                        tracing::debug!(path = %path.display(), reason, "skipping malformed line");
                        report.errors.push(format!("{}: {reason}", path.display()));
                    }
                }
            }

            sync_state::upsert(
                tx,
                &FileSyncState {
                    path: path.display().to_string(),
                    size,
                    last_offset: consumed,
                    last_mtime: mtime,
                    head_hash: head_hash.clone(),
                },
            )?;
            Ok(())
        })?;

        Ok(report)
    }

    /// Locate every JSONL log under the root: one directory per project,
    /// one file per session, plus any stray top-level files.
    fn discover_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return files;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if let Ok(subs) = std::fs::read_dir(&path) {
                    for sub in subs.flatten() {
                        let sub_path = sub.path();
                        if sub_path.extension().is_some_and(|e| e == "jsonl") {
                            files.push(sub_path);
                        }
                    }
                }
            } else if path.extension().is_some_and(|e| e == "jsonl") {
                files.push(path);
            }
        }
        files.sort();
        files
    }
}

/// Hex SHA-256 of the file's first 4 KB (or the whole file when shorter).
fn hash_head(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; HEAD_HASH_BYTES];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let digest = Sha256::digest(&buf[..filled]);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Read newline-terminated lines from `offset`, returning them with the new
/// offset. A trailing partial line is left unconsumed so the next sync picks
/// it up once the writer finishes it.
fn read_complete_lines(path: &Path, offset: u64) -> Result<(Vec<String>, u64), std::io::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;

    let mut lines = Vec::new();
    let mut consumed = offset;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => {
                if !line.ends_with('\n') {
                    // Incomplete line — don't advance the offset
                    break;
                }
                consumed += n as u64;
                lines.push(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => return Err(e),
        }
    }
    Ok((lines, consumed))
}

#[cfg(test)]
#[path = "ingester_tests.rs"]
mod tests;
