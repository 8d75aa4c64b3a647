// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. The [`Database`] struct IS the single writer: query modules
//! accept `&Database` and call through `connection().call()`. Do NOT create
//! additional Connection instances for writes.

use std::future::Future;
use std::time::Duration;

use gitbay_core::{ErrorKind, GitBayError};
use tracing::{debug, warn};

use crate::migrations;

/// Handle to the single-writer SQLite connection.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, apply PRAGMAs,
    /// and run any pending migrations.
    pub async fn open(path: &str) -> Result<Self, GitBayError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(|conn| -> Result<(), tokio_rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| {
            migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(&self) -> Result<(), GitBayError> {
        self.conn
            .call(|conn| -> Result<(), tokio_rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Convert tokio-rusqlite errors to the storage error kind.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> GitBayError {
    GitBayError::storage(e)
}

/// Retry a storage operation on transient failure with exponential backoff.
///
/// Only `STORAGE`-kind errors are retried; everything else propagates on
/// the first occurrence. Exhaustion surfaces the last storage error.
pub async fn with_retries<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, GitBayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitBayError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind == ErrorKind::Storage && attempt < max_retries => {
                attempt += 1;
                let delay = Duration::from_millis(50u64.saturating_mul(1 << (attempt - 1)));
                warn!(attempt, max_retries, error = %e, "storage error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
