// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the gitbay service.
//!
//! This crate provides the foundational types, error taxonomy, credential
//! value types, and the git adapter contract used throughout the gitbay
//! workspace. Execution, persistence, and the concrete git backend build
//! on the definitions here.

pub mod adapter;
pub mod credential;
pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use adapter::{GitAdapter, NoopProgress, OperationContext, ProgressSink};
pub use credential::{AuthType, Credential, CredentialHandle};
pub use error::{ErrorCategory, ErrorKind, GitBayError};
pub use types::{
    CleanupStrategy, DiskSpace, GitOperation, LogLevel, OperationClass, OperationLogEntry,
    RecoverPolicy, TaskRecord, TaskStatus, WorkspaceRecord,
};
