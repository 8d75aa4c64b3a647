// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker pool.
//!
//! N identical cooperative workers pull task references off the queue,
//! claim them with an atomic queued->running transition, acquire a
//! concurrency permit, and drive the adapter with a linked cancellation
//! token and a throttled progress sink. A supervisor respawns any worker
//! that exits before shutdown; a panicking task fails alone and never
//! takes its worker down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gitbay_config::model::ExecutionConfig;
use gitbay_core::{
    ErrorKind, GitAdapter, GitBayError, OperationContext, ProgressSink, TaskRecord, TaskStatus,
};
use gitbay_credentials::CredentialManager;
use gitbay_security::SecretRegistry;
use gitbay_storage::SqliteStore;
use gitbay_workspace::WorkspaceManager;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::retry_delay;
use crate::cancel::CancelRegistry;
use crate::progress::{spawn_progress_writer, WatchProgress};
use crate::queue::TaskQueue;

/// Shared dependencies for workers and the task manager facade.
pub struct ExecContext {
    pub store: Arc<SqliteStore>,
    pub workspaces: Arc<WorkspaceManager>,
    pub credentials: Arc<CredentialManager>,
    pub adapter: Arc<dyn GitAdapter>,
    pub queue: Arc<TaskQueue>,
    pub permits: Arc<Semaphore>,
    pub cancels: Arc<CancelRegistry>,
    pub config: ExecutionConfig,
}

impl ExecContext {
    fn registry(&self) -> &SecretRegistry {
        self.credentials.registry()
    }
}

/// Supervisor over the worker tasks.
pub struct WorkerPool {
    supervisor: tokio::task::JoinHandle<()>,
}

impl WorkerPool {
    /// Spawn `config.worker_count` workers plus their supervisor. Workers
    /// exit when the queue closes and drains; crashed workers are
    /// respawned until `shutdown` fires.
    pub fn spawn(ctx: Arc<ExecContext>, shutdown: CancellationToken) -> Self {
        let worker_count = ctx.config.worker_count;
        let supervisor = tokio::spawn(async move {
            let mut workers = JoinSet::new();
            for worker_id in 0..worker_count {
                workers.spawn(worker_loop(ctx.clone(), worker_id));
            }

            while let Some(result) = workers.join_next().await {
                if shutdown.is_cancelled() {
                    continue;
                }
                // Workers only return on queue close; anything earlier is
                // a crash worth replacing.
                match result {
                    Ok(worker_id) => {
                        warn!(worker_id, "worker exited unexpectedly, respawning");
                        workers.spawn(worker_loop(ctx.clone(), worker_id));
                    }
                    Err(e) => {
                        error!(error = %e, "worker task aborted, respawning");
                        workers.spawn(worker_loop(ctx.clone(), worker_count));
                    }
                }
            }
            info!("worker pool stopped");
        });
        Self { supervisor }
    }

    /// Wait for all workers to drain and exit.
    pub async fn join(self) {
        let _ = self.supervisor.await;
    }
}

async fn worker_loop(ctx: Arc<ExecContext>, worker_id: usize) -> usize {
    debug!(worker_id, "worker started");
    while let Some(task_id) = ctx.queue.dequeue().await {
        gitbay_metrics::set_queue_depth(ctx.queue.len() as f64);

        let permit = match ctx.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        gitbay_metrics::set_active_workers(
            (ctx.config.max_concurrent_tasks - ctx.permits.available_permits()) as f64,
        );

        match ctx.store.mark_task_running(task_id, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                // Tombstoned (cancelled while queued) or claimed elsewhere.
                drop(permit);
                continue;
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "failed to claim task");
                drop(permit);
                continue;
            }
        }

        match ctx.store.get_task(task_id).await {
            Ok(Some(task)) => execute_task(&ctx, task).await,
            Ok(None) => warn!(task_id = %task_id, "claimed task vanished"),
            Err(e) => warn!(task_id = %task_id, error = %e, "failed to load claimed task"),
        }

        drop(permit);
        gitbay_metrics::set_active_workers(
            (ctx.config.max_concurrent_tasks - ctx.permits.available_permits()) as f64,
        );
    }
    debug!(worker_id, "worker exiting");
    worker_id
}

/// Drive one claimed task to a terminal state or a retry re-enqueue.
async fn execute_task(ctx: &Arc<ExecContext>, task: TaskRecord) {
    let token = ctx.cancels.token(task.id);
    let started = std::time::Instant::now();

    if token.is_cancelled() {
        if ctx
            .store
            .cancel_running_task(task.id, Utc::now())
            .await
            .unwrap_or(false)
        {
            log_task(ctx, task.id, gitbay_core::LogLevel::Info, "cancelled before start").await;
            finish_metrics(&task, "cancelled", started);
        }
        ctx.cancels.remove(task.id);
        return;
    }

    // Deadline may already be gone if the task sat queued too long.
    let now = Utc::now();
    if now >= task.deadline {
        finish_timed_out(ctx, &task, started, true).await;
        return;
    }
    let remaining = (task.deadline - now)
        .to_std()
        .unwrap_or(Duration::from_secs(0));

    let Some(workspace_id) = task.workspace_id else {
        let err = GitBayError::internal("task has no workspace");
        finish_failed(ctx, &task, err, started).await;
        return;
    };
    let workspace_path = match ctx.workspaces.acquire(workspace_id).await {
        Ok(path) => path,
        Err(e) => {
            finish_failed(ctx, &task, e, started).await;
            return;
        }
    };

    let remote_url = task
        .params
        .get("url")
        .and_then(|v| v.as_str())
        .map(String::from);
    let credential = ctx
        .credentials
        .resolve(task.operation, remote_url.as_deref());

    let (sink, progress_rx) = WatchProgress::channel();
    let progress_writer = spawn_progress_writer(ctx.store.clone(), task.id, progress_rx);

    let opctx = OperationContext::new(task.operation, workspace_path, task.params.clone())
        .with_credential(credential)
        .with_progress(sink.clone() as Arc<dyn ProgressSink>)
        .with_cancel(token.clone());

    let adapter = ctx.adapter.clone();
    let mut adapter_task = tokio::spawn(async move { adapter.execute(opctx).await });

    enum Outcome {
        Done(Result<Result<serde_json::Value, GitBayError>, tokio::task::JoinError>),
        DeadlineExceeded { adapter_returned: bool },
    }

    let outcome = tokio::select! {
        joined = &mut adapter_task => Outcome::Done(joined),
        _ = tokio::time::sleep(remaining) => {
            // Deadline crossed while running: signal cancel and give the
            // adapter the grace window to reach a safe boundary.
            token.cancel();
            let grace = Duration::from_secs(ctx.config.cancel_grace_seconds);
            match tokio::time::timeout(grace, &mut adapter_task).await {
                Ok(_) => Outcome::DeadlineExceeded { adapter_returned: true },
                Err(_) => {
                    adapter_task.abort();
                    Outcome::DeadlineExceeded { adapter_returned: false }
                }
            }
        }
    };

    drop(sink);
    let _ = progress_writer;

    match outcome {
        Outcome::Done(Ok(Ok(payload))) => {
            match ctx.store.complete_task(task.id, &payload, Utc::now()).await {
                Ok(true) => {
                    log_task(ctx, task.id, gitbay_core::LogLevel::Info, "operation completed").await;
                    finish_metrics(&task, "completed", started);
                }
                Ok(false) => {
                    debug!(task_id = %task.id, "completion lost to a concurrent terminal write");
                }
                Err(e) => warn!(task_id = %task.id, error = %e, "failed to record completion"),
            }
            ctx.cancels.remove(task.id);
            // Opportunistic size observation; may delete a runaway workspace.
            if let Err(e) = ctx.workspaces.enforce_size_limit(workspace_id).await {
                warn!(workspace_id = %workspace_id, error = %e, "size enforcement failed");
            }
        }
        Outcome::Done(Ok(Err(e))) if e.kind == ErrorKind::TaskCancelled => {
            if ctx
                .store
                .cancel_running_task(task.id, Utc::now())
                .await
                .unwrap_or(false)
            {
                log_task(ctx, task.id, gitbay_core::LogLevel::Info, "operation cancelled").await;
                finish_metrics(&task, "cancelled", started);
            }
            ctx.cancels.remove(task.id);
        }
        Outcome::Done(Ok(Err(e)))
            if e.kind.is_retryable() && task.attempt < ctx.config.max_retries =>
        {
            retry_task(ctx, &task, e).await;
            // The cancel token stays registered for the next attempt.
        }
        Outcome::Done(Ok(Err(e))) => {
            finish_failed(ctx, &task, e, started).await;
        }
        Outcome::Done(Err(join_error)) => {
            // Panic inside the adapter. The worker itself survives.
            error!(task_id = %task.id, error = %join_error, "adapter panicked");
            let err = GitBayError::internal("operation panicked; see service logs");
            finish_failed(ctx, &task, err, started).await;
        }
        Outcome::DeadlineExceeded { adapter_returned } => {
            finish_timed_out(ctx, &task, started, adapter_returned).await;
            if !adapter_returned {
                // The adapter blew through the grace window; nothing can
                // vouch for the workspace state anymore.
                if let Err(e) = ctx.workspaces.quarantine(workspace_id).await {
                    warn!(workspace_id = %workspace_id, error = %e, "quarantine failed");
                }
            }
        }
    }

    ctx.workspaces.release(workspace_id).await;
}

/// Re-enqueue a retryable failure after backoff.
async fn retry_task(ctx: &Arc<ExecContext>, task: &TaskRecord, cause: GitBayError) {
    let next_attempt = task.attempt + 1;
    match ctx.store.requeue_task_for_retry(task.id).await {
        Ok(true) => {
            let delay = retry_delay(
                Duration::from_millis(ctx.config.retry_base_delay_ms),
                Duration::from_millis(ctx.config.retry_max_backoff_ms),
                next_attempt,
            );
            log_task(
                ctx,
                task.id,
                gitbay_core::LogLevel::Warn,
                &format!(
                    "attempt {} failed ({}), retrying in {:.1}s",
                    task.attempt,
                    cause.kind,
                    delay.as_secs_f64()
                ),
            )
            .await;

            let queue = ctx.queue.clone();
            let store = ctx.store.clone();
            let task_id = task.id;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = queue.enqueue(task_id).await {
                    warn!(task_id = %task_id, error = %e, "re-enqueue failed");
                    let _ = store
                        .finish_task_with_error(task_id, TaskStatus::Failed, &e, Utc::now())
                        .await;
                }
            });
        }
        Ok(false) => {
            debug!(task_id = %task.id, "retry lost to a concurrent terminal write");
        }
        Err(e) => {
            warn!(task_id = %task.id, error = %e, "failed to requeue for retry");
            finish_failed(ctx, task, cause, std::time::Instant::now()).await;
        }
    }
}

async fn finish_failed(
    ctx: &Arc<ExecContext>,
    task: &TaskRecord,
    error: GitBayError,
    started: std::time::Instant,
) {
    let error = redact_error(ctx.registry(), error);
    match ctx
        .store
        .finish_task_with_error(task.id, TaskStatus::Failed, &error, Utc::now())
        .await
    {
        Ok(true) => {
            log_task(
                ctx,
                task.id,
                gitbay_core::LogLevel::Error,
                &format!("operation failed: {error}"),
            )
            .await;
            finish_metrics(task, "failed", started);
        }
        Ok(false) => {}
        Err(e) => warn!(task_id = %task.id, error = %e, "failed to record failure"),
    }
    ctx.cancels.remove(task.id);
}

async fn finish_timed_out(
    ctx: &Arc<ExecContext>,
    task: &TaskRecord,
    started: std::time::Instant,
    adapter_returned: bool,
) {
    let error = GitBayError::new(
        ErrorKind::Timeout,
        format!(
            "task exceeded its {}s deadline",
            ctx.config.task_timeout_seconds
        ),
    )
    .with_suggestion("raise the task timeout or narrow the operation");
    match ctx
        .store
        .finish_task_with_error(task.id, TaskStatus::TimedOut, &error, Utc::now())
        .await
    {
        Ok(true) => {
            let detail = if adapter_returned {
                "operation timed out"
            } else {
                "operation timed out; adapter missed the grace window"
            };
            log_task(ctx, task.id, gitbay_core::LogLevel::Error, detail).await;
            finish_metrics(task, "timed_out", started);
        }
        Ok(false) => {}
        Err(e) => warn!(task_id = %task.id, error = %e, "failed to record timeout"),
    }
    ctx.cancels.remove(task.id);
}

fn finish_metrics(task: &TaskRecord, status: &str, started: std::time::Instant) {
    gitbay_metrics::record_task_finished(
        status,
        &task.operation.to_string(),
        started.elapsed().as_secs_f64(),
    );
}

/// Append a redacted entry to the operation log.
async fn log_task(ctx: &Arc<ExecContext>, task_id: Uuid, level: gitbay_core::LogLevel, message: &str) {
    let entry = gitbay_core::OperationLogEntry {
        task_id,
        level,
        message: ctx.registry().redact(message),
        timestamp: Utc::now(),
    };
    if let Err(e) = ctx.store.append_log(&entry).await {
        warn!(task_id = %task_id, error = %e, "operation log append failed");
    }
}

/// Scrub credential material from an error before it is stored or shown.
fn redact_error(registry: &SecretRegistry, mut error: GitBayError) -> GitBayError {
    error.message = registry.redact(&error.message);
    if let Some(suggestion) = error.suggestion.take() {
        error.suggestion = Some(registry.redact(&suggestion));
    }
    if let Some(context) = error.context.take() {
        let serialized = context.to_string();
        let redacted = registry.redact(&serialized);
        error.context = serde_json::from_str(&redacted)
            .ok()
            .or(Some(serde_json::Value::String(redacted)));
    }
    error
}
