// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Embedded SQLite storage layer for ccdash.
//!
//! A single process-wide [`Store`] owns a bounded connection pool; every
//! query module in this crate operates on a borrowed connection so the same
//! code runs standalone or inside [`Store::with_tx`].

mod migrations;
#[cfg(test)]
pub(crate) mod test_support;
mod util;

pub mod jobs;
pub mod messages;
pub mod predictions;
pub mod projects;
pub mod sessions;
pub mod sync_state;
pub mod windows;

pub use jobs::JobFilter;
pub use sync_state::FileSyncState;
pub use util::{ts_from_sql, ts_to_sql};

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ErrorCode;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Pool bounds: 25 open, 5 idle, 5-minute connection lifetime.
const POOL_MAX_OPEN: u32 = 25;
const POOL_MIN_IDLE: u32 = 5;
const POOL_MAX_LIFETIME: Duration = Duration::from_secs(300);

/// Storage errors, classified so callers can react without string matching.
///
/// `NotFound` is an expected outcome for lookups and is not logged as an
/// error by callers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("database timeout: {0}")]
    Timeout(String),
    #[error("not found")]
    NotFound,
    #[error("migration failed at version {version}: {reason}")]
    Migration { version: i64, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                ErrorCode::ConstraintViolation => StoreError::Constraint(e.to_string()),
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    StoreError::Timeout(e.to_string())
                }
                _ => StoreError::Connection(e.to_string()),
            },
            _ => StoreError::Connection(e.to_string()),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Timeout(e.to_string())
    }
}

/// A pooled SQLite connection.
pub type Conn = PooledConnection<SqliteConnectionManager>;

/// Process-wide store handle. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and migrate to head.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Connection(format!("create db dir: {e}")))?;
        }
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        Self::from_manager(manager)
    }

    /// Open a private in-memory database for tests.
    ///
    /// Uses a uniquely-named shared-cache URI so every pooled connection sees
    /// the same database; the idle connections keep it alive.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let uri = format!(
            "file:ccdash-mem-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let manager = SqliteConnectionManager::file(uri)
            .with_flags(
                rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
            )
            .with_init(init_connection);
        Self::from_manager(manager)
    }

    fn from_manager(manager: SqliteConnectionManager) -> Result<Self, StoreError> {
        let pool = r2d2::Pool::builder()
            .max_size(POOL_MAX_OPEN)
            .min_idle(Some(POOL_MIN_IDLE))
            .max_lifetime(Some(POOL_MAX_LIFETIME))
            .build(manager)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        {
            let mut conn = store.conn()?;
            migrations::apply_all(&mut conn)?;
        }
        Ok(store)
    }

    /// Borrow a connection from the pool.
    pub fn conn(&self) -> Result<Conn, StoreError> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside a transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; an error return or
    /// a panic unwinds through the drop rollback.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        let out = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    /// Highest applied migration version, for diagnostics.
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        migrations::current_version(&conn)
    }
}

fn init_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
