// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the gitbay service.
//!
//! Every failure carries an [`ErrorKind`] from a closed set, a numeric code
//! in a contiguous per-category range, an optional user-facing suggestion,
//! and optional structured context. Handlers serialize the envelope across
//! the tool boundary after redaction.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Coarse error classification, derived from the code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ParameterValidation,
    GitOperation,
    RepositoryAccess,
    Network,
    System,
    TaskExecution,
    Internal,
}

/// The closed set of failure kinds.
///
/// Code ranges:
/// - 40001-40099: parameter validation
/// - 40100-40199: git operation
/// - 40200-40299: repository access
/// - 40300-40399: network
/// - 40400-40499: system
/// - 40500-40599: task execution
/// - 40600: internal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Parameter validation
    InvalidRepoPath,
    InvalidRemoteUrl,
    InvalidBranchName,
    InvalidCommitMessage,
    InvalidTimeout,
    InvalidTargetPath,
    MissingRequiredParam,
    ParameterConflict,

    // Git operation
    GitCommandFailed,
    GitNotARepo,
    GitNoChanges,
    GitDetachedHead,
    MergeConflict,
    RebaseConflict,
    GitUpToDate,
    PushRejected,

    // Repository access
    RepoAccessDenied,
    RepoNotFound,
    RepoLocked,
    WorkspaceNotFound,
    WorkspaceQuarantined,

    // Network
    NetworkError,
    Timeout,
    AuthFailed,

    // System
    System,
    PermissionDenied,
    ResourceExhausted,
    PathEscape,
    Storage,
    StorageFull,

    // Task execution
    TaskNotFound,
    TaskCancelled,
    TaskTimeout,
    QueueFull,
    RateLimited,

    // Internal / invariant violation
    Internal,
}

impl ErrorKind {
    /// Numeric code for the tool boundary.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::InvalidRepoPath => 40001,
            ErrorKind::InvalidRemoteUrl => 40002,
            ErrorKind::InvalidBranchName => 40003,
            ErrorKind::InvalidCommitMessage => 40004,
            ErrorKind::InvalidTimeout => 40005,
            ErrorKind::InvalidTargetPath => 40006,
            ErrorKind::MissingRequiredParam => 40007,
            ErrorKind::ParameterConflict => 40008,

            ErrorKind::GitCommandFailed => 40100,
            ErrorKind::GitNotARepo => 40101,
            ErrorKind::GitNoChanges => 40102,
            ErrorKind::GitDetachedHead => 40103,
            ErrorKind::MergeConflict => 40104,
            ErrorKind::RebaseConflict => 40105,
            ErrorKind::GitUpToDate => 40106,
            ErrorKind::PushRejected => 40107,

            ErrorKind::RepoAccessDenied => 40200,
            ErrorKind::RepoNotFound => 40201,
            ErrorKind::RepoLocked => 40202,
            ErrorKind::WorkspaceNotFound => 40203,
            ErrorKind::WorkspaceQuarantined => 40204,

            ErrorKind::NetworkError => 40300,
            ErrorKind::Timeout => 40301,
            ErrorKind::AuthFailed => 40302,

            ErrorKind::System => 40400,
            ErrorKind::PermissionDenied => 40401,
            ErrorKind::ResourceExhausted => 40402,
            ErrorKind::PathEscape => 40403,
            ErrorKind::Storage => 40404,
            ErrorKind::StorageFull => 40405,

            ErrorKind::TaskNotFound => 40501,
            ErrorKind::TaskCancelled => 40502,
            ErrorKind::TaskTimeout => 40503,
            ErrorKind::QueueFull => 40504,
            ErrorKind::RateLimited => 40505,

            ErrorKind::Internal => 40600,
        }
    }

    /// Category derived from the code range.
    pub fn category(self) -> ErrorCategory {
        match self.code() {
            40001..=40099 => ErrorCategory::ParameterValidation,
            40100..=40199 => ErrorCategory::GitOperation,
            40200..=40299 => ErrorCategory::RepositoryAccess,
            40300..=40399 => ErrorCategory::Network,
            40400..=40499 => ErrorCategory::System,
            40500..=40599 => ErrorCategory::TaskExecution,
            _ => ErrorCategory::Internal,
        }
    }

    /// Whether the worker retry policy applies by default.
    ///
    /// Only transient network-class failures are retried. Everything else
    /// either reflects a caller mistake or a state the retry would repeat.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::NetworkError | ErrorKind::Timeout | ErrorKind::AuthFailed
        )
    }
}

/// The error envelope used across all gitbay crates.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GitBayError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl GitBayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            suggestion: None,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Storage-layer failure from an underlying database error.
    pub fn storage(source: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Storage, format!("storage error: {source}"))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// JSON payload for the tool boundary: code, name, message, category,
    /// suggestion and context. Callers must redact before emitting.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.kind.code(),
            "name": self.kind.to_string(),
            "category": self.kind.category().to_string(),
            "message": self.message,
            "suggestion": self.suggestion,
            "context": self.context,
        })
    }
}
