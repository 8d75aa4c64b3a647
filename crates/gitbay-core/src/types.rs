// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the gitbay service crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::GitBayError;

/// Task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::TimedOut
        )
    }
}

/// Execution class of a git operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    /// Fast, local, no network. Runs synchronously, bypassing the queue.
    Local,
    /// Long-running, network-bound. Queued, cancellable, progress-reporting.
    Remote,
    /// Long-running, conflict-reporting. Queued.
    MergeFamily,
}

/// The closed set of git operations the service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GitOperation {
    Clone,
    Init,
    Status,
    Add,
    Commit,
    Push,
    Pull,
    Fetch,
    Checkout,
    BranchList,
    BranchCreate,
    BranchDelete,
    Merge,
    Rebase,
    Log,
    Show,
    Diff,
    Blame,
    StashSave,
    StashPop,
    StashList,
    TagList,
    TagCreate,
    TagDelete,
    RemoteList,
    RemoteAdd,
    RemoteRemove,
    Reset,
    CherryPick,
    Revert,
    Clean,
    SparseCheckout,
    SubmoduleList,
    SubmoduleAdd,
    SubmoduleUpdate,
    LfsTrack,
    LfsUntrack,
    LfsStatus,
    LfsPull,
    LfsPush,
}

impl GitOperation {
    /// Scheduling class for this operation.
    pub fn class(self) -> OperationClass {
        match self {
            GitOperation::Clone
            | GitOperation::Push
            | GitOperation::Pull
            | GitOperation::Fetch
            | GitOperation::SubmoduleAdd
            | GitOperation::SubmoduleUpdate
            | GitOperation::LfsPull
            | GitOperation::LfsPush => OperationClass::Remote,
            GitOperation::Merge | GitOperation::Rebase => OperationClass::MergeFamily,
            _ => OperationClass::Local,
        }
    }

    /// Whether the operation is queued and executed by the worker pool.
    pub fn is_async(self) -> bool {
        !matches!(self.class(), OperationClass::Local)
    }

    /// Whether a crashed or interrupted run may safely be re-executed.
    ///
    /// Clone counts because it targets an empty workspace; read-only
    /// operations trivially qualify.
    pub fn is_idempotent(self) -> bool {
        matches!(
            self,
            GitOperation::Clone
                | GitOperation::Fetch
                | GitOperation::Status
                | GitOperation::Log
                | GitOperation::Show
                | GitOperation::Diff
                | GitOperation::Blame
                | GitOperation::BranchList
                | GitOperation::TagList
                | GitOperation::RemoteList
                | GitOperation::StashList
                | GitOperation::SubmoduleList
                | GitOperation::LfsStatus
        )
    }

    /// Whether the operation contacts a remote and needs credentials.
    pub fn needs_credentials(self) -> bool {
        matches!(self.class(), OperationClass::Remote)
            || matches!(self, GitOperation::Rebase)
    }
}

/// A task record: the unit of scheduling, cancellation, and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Globally unique task identifier.
    pub id: Uuid,
    /// The requested operation.
    pub operation: GitOperation,
    /// Operation parameters, stored as opaque JSON.
    pub params: serde_json::Value,
    /// Workspace the task targets, if any.
    pub workspace_id: Option<Uuid>,
    pub status: TaskStatus,
    /// Completion percentage, 0..=100, monotone while running.
    pub progress: u8,
    /// Success payload; present iff status is `Completed`.
    pub result: Option<serde_json::Value>,
    /// Error envelope; present iff the task failed, timed out, or was
    /// cancelled with partial effects.
    pub error: Option<GitBayError>,
    /// Execution attempt, starting at 1 and incremented per retry.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Hard deadline: `created_at` plus the configured timeout.
    pub deadline: DateTime<Utc>,
}

impl TaskRecord {
    /// Wall-clock duration from start to completion, if both are set.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}

/// Workspace eviction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CleanupStrategy {
    /// Evict least-recently-accessed first.
    Lru,
    /// Evict oldest-created first.
    Fifo,
}

/// What to do with tasks found in `Running` state after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecoverPolicy {
    /// Mark all crashed tasks failed.
    Fail,
    /// Re-enqueue idempotent operations, fail the rest.
    Requeue,
}

/// A workspace record: an isolated filesystem directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    /// Absolute path, strictly under the configured workspace root.
    pub path: std::path::PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Last observed on-disk size, refreshed opportunistically.
    pub size_bytes: u64,
    /// Quarantined after a missed cancel grace window; excluded from
    /// reuse and eviction until deleted by an operator.
    pub dirty: bool,
}

/// Severity for operation log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// An append-only operation log entry. Messages are redacted before insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub task_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Disk capacity report for the filesystem hosting the workspace root.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiskSpace {
    pub total_bytes: u64,
    pub free_bytes: u64,
}
