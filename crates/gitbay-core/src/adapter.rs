// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The git adapter contract.
//!
//! Workers hold an `Arc<dyn GitAdapter>` and never know which backend
//! implements it. Dispatch is uniform: an operation tag plus an opaque JSON
//! payload; backends deserialize into their own option types internally.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::credential::CredentialHandle;
use crate::error::GitBayError;
use crate::types::GitOperation;

/// Receives progress percentages from a running operation.
///
/// Implementations must tolerate repeated and out-of-order calls; the
/// task record itself only ever moves forward.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Sink for operations that report no intermediate progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// Everything an adapter needs to execute one operation.
pub struct OperationContext {
    pub operation: GitOperation,
    /// Workspace directory the operation runs in.
    pub workspace: PathBuf,
    /// Operation parameters, validated at the handler boundary.
    pub params: serde_json::Value,
    /// Present for remote operations.
    pub credential: Option<CredentialHandle>,
    pub progress: Arc<dyn ProgressSink>,
    /// Cancellation is observed at safe boundaries; on cancel the adapter
    /// returns `TASK_CANCELLED` and leaves the workspace recoverable.
    pub cancel: CancellationToken,
}

impl OperationContext {
    pub fn new(operation: GitOperation, workspace: PathBuf, params: serde_json::Value) -> Self {
        Self {
            operation,
            workspace,
            params,
            credential: None,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_credential(mut self, credential: Option<CredentialHandle>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The abstract git capability surface.
#[async_trait]
pub trait GitAdapter: Send + Sync + 'static {
    /// Backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Execute one operation to completion, cancellation, or failure.
    ///
    /// Returns the operation's success payload, or a typed error from the
    /// gitbay taxonomy. Progress, when the backend can observe it, is
    /// reported as monotone percentages; otherwise 0 on start and 100 on
    /// success.
    async fn execute(&self, ctx: OperationContext) -> Result<serde_json::Value, GitBayError>;
}
