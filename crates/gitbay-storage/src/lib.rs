// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the gitbay service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed CRUD
//! operations for task records, workspace metadata, and the append-only
//! operation log. Transient storage errors are retried with bounded
//! exponential backoff.

pub mod database;
pub mod migrations;
pub mod queries;
mod row;
pub mod store;

pub use database::{with_retries, Database};
pub use store::{RecoveryReport, SqliteStore};
