// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The task manager facade.
//!
//! Owns task records end to end: rate-limited submission onto the queue,
//! synchronous execution for the local operation class, status and
//! cancellation, plus the two background duties (timeout sweeping and
//! terminal-record retention GC).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gitbay_core::{
    ErrorKind, GitBayError, GitOperation, NoopProgress, OperationClass, OperationContext,
    TaskRecord, TaskStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rate_limit::RateLimiter;
use crate::worker::{ExecContext, WorkerPool};

pub struct TaskManager {
    ctx: Arc<ExecContext>,
    rate: RateLimiter,
    shutdown: CancellationToken,
    pool: Option<WorkerPool>,
    sweepers: Vec<tokio::task::JoinHandle<()>>,
}

impl TaskManager {
    /// Build the facade, spawn the worker pool, and start the background
    /// sweepers.
    pub fn start(ctx: Arc<ExecContext>, rate_config: &gitbay_config::model::RateLimitConfig) -> Self {
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::spawn(ctx.clone(), shutdown.clone());

        let sweepers = vec![
            spawn_timeout_sweeper(ctx.clone(), shutdown.clone()),
            spawn_retention_gc(ctx.clone(), shutdown.clone()),
        ];

        info!(
            workers = ctx.config.worker_count,
            permits = ctx.config.max_concurrent_tasks,
            queue_capacity = ctx.config.queue_capacity,
            "task manager started"
        );

        Self {
            ctx,
            rate: RateLimiter::new(rate_config),
            shutdown,
            pool: Some(pool),
            sweepers,
        }
    }

    pub fn context(&self) -> &Arc<ExecContext> {
        &self.ctx
    }

    /// Submit an async operation. Returns the task id immediately; the
    /// caller polls with [`status`](Self::status).
    pub async fn submit(
        &self,
        operation: GitOperation,
        params: serde_json::Value,
        workspace_id: Option<Uuid>,
    ) -> Result<Uuid, GitBayError> {
        if !self.rate.try_acquire() {
            return Err(GitBayError::new(
                ErrorKind::RateLimited,
                "submission rate limit exceeded",
            )
            .with_suggestion("slow down and retry shortly"));
        }

        let now = Utc::now();
        let task = TaskRecord {
            id: Uuid::new_v4(),
            operation,
            params,
            workspace_id,
            status: TaskStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            attempt: 1,
            created_at: now,
            started_at: None,
            completed_at: None,
            deadline: now
                + chrono::Duration::seconds(self.ctx.config.task_timeout_seconds as i64),
        };

        self.ctx.store.insert_task(&task).await?;
        // Token exists before the task can possibly start.
        let _ = self.ctx.cancels.token(task.id);

        if let Err(e) = self.ctx.queue.enqueue(task.id).await {
            // Keep the record for the audit trail, but the submission
            // itself reports the rejection.
            let _ = self
                .ctx
                .store
                .finish_task_with_error(task.id, TaskStatus::Failed, &e, Utc::now())
                .await;
            self.ctx.cancels.remove(task.id);
            return Err(e);
        }
        gitbay_metrics::set_queue_depth(self.ctx.queue.len() as f64);

        // Submission doubles as quota back-pressure: kick a non-blocking
        // eviction pass.
        let workspaces = self.ctx.workspaces.clone();
        tokio::spawn(async move {
            if let Err(e) = workspaces.evict_until_under_quota().await {
                warn!(error = %e, "eviction pass failed");
            }
            if let Ok(usage) = workspaces.usage().await {
                gitbay_metrics::set_active_workspaces(usage.workspace_count as f64);
                gitbay_metrics::set_workspace_bytes(usage.total_size_bytes as f64);
            }
        });

        debug!(task_id = %task.id, operation = %operation, "task submitted");
        Ok(task.id)
    }

    /// Execute a local-class operation synchronously, bypassing the queue.
    ///
    /// Same workspace and credential contract as the async path, but no
    /// task record: the result goes straight back to the caller.
    pub async fn run_sync(
        &self,
        operation: GitOperation,
        params: serde_json::Value,
        workspace_id: Uuid,
    ) -> Result<serde_json::Value, GitBayError> {
        if operation.class() != OperationClass::Local {
            return Err(GitBayError::new(
                ErrorKind::ParameterConflict,
                format!("{operation} is a long-running operation; submit it as a task"),
            ));
        }

        let path = self.ctx.workspaces.acquire(workspace_id).await?;
        let opctx = OperationContext::new(operation, path, params)
            .with_credential(self.ctx.credentials.resolve(operation, None))
            .with_progress(Arc::new(NoopProgress));

        let result = self.ctx.adapter.execute(opctx).await;
        self.ctx.workspaces.release(workspace_id).await;
        gitbay_metrics::record_sync_operation(&operation.to_string());

        result.map_err(|e| {
            let registry = self.ctx.credentials.registry();
            let mut e = e;
            e.message = registry.redact(&e.message);
            e
        })
    }

    /// Current record for a task.
    pub async fn status(&self, task_id: Uuid) -> Result<TaskRecord, GitBayError> {
        self.ctx.store.get_task(task_id).await?.ok_or_else(|| {
            GitBayError::new(ErrorKind::TaskNotFound, format!("task {task_id} not found"))
                .with_suggestion("the record may have aged out of retention")
        })
    }

    /// List tasks, optionally by status, newest first.
    pub async fn list(
        &self,
        status: Option<TaskStatus>,
        limit: u32,
    ) -> Result<Vec<TaskRecord>, GitBayError> {
        self.ctx.store.list_tasks(status, limit).await
    }

    /// Operation log for one task.
    pub async fn logs(
        &self,
        task_id: Uuid,
        limit: u32,
    ) -> Result<Vec<gitbay_core::OperationLogEntry>, GitBayError> {
        self.ctx.store.logs_for_task(task_id, limit).await
    }

    /// Fire a task's cancel signal.
    ///
    /// Queued tasks are tombstoned immediately; running tasks get the
    /// signal propagated into the adapter and turn terminal once it
    /// returns. Terminal and unknown tasks report `false`.
    pub async fn cancel(&self, task_id: Uuid) -> Result<bool, GitBayError> {
        let Some(task) = self.ctx.store.get_task(task_id).await? else {
            return Ok(false);
        };
        if task.status.is_terminal() {
            return Ok(false);
        }

        if task.status == TaskStatus::Queued
            && self
                .ctx
                .store
                .cancel_queued_task(task_id, Utc::now())
                .await?
        {
            // Tombstoned before any worker claimed it; the queue entry is
            // skipped at claim time.
            self.ctx.cancels.fire(task_id);
            self.ctx.cancels.remove(task_id);
            info!(task_id = %task_id, "queued task cancelled");
            return Ok(true);
        }

        // Running (or about to be): signal and let the worker finish it.
        self.ctx.cancels.fire(task_id);
        info!(task_id = %task_id, "cancellation signalled");
        Ok(true)
    }

    /// Close the queue, drain workers, and stop the sweepers.
    pub async fn shutdown(mut self) {
        info!("task manager shutting down");
        self.ctx.queue.close();
        if let Some(pool) = self.pool.take() {
            pool.join().await;
        }
        self.shutdown.cancel();
        for sweeper in self.sweepers.drain(..) {
            let _ = sweeper.await;
        }
        info!("task manager stopped");
    }
}

/// Every `timeout_check_interval`: fire cancel for running tasks past
/// their deadline, and directly time out any task whose worker has not
/// acted a full grace window past the deadline.
fn spawn_timeout_sweeper(
    ctx: Arc<ExecContext>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(ctx.config.timeout_check_interval_secs));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    let overdue = match ctx.store.running_tasks_past_deadline(now).await {
                        Ok(tasks) => tasks,
                        Err(e) => {
                            warn!(error = %e, "timeout sweep query failed");
                            continue;
                        }
                    };
                    for task in overdue {
                        ctx.cancels.fire(task.id);
                        let hard_cutoff = task.deadline
                            + chrono::Duration::seconds(ctx.config.cancel_grace_seconds as i64);
                        if now <= hard_cutoff {
                            continue;
                        }
                        // The owning worker has gone quiet; finish the
                        // record here so the client is not left polling.
                        let error = GitBayError::new(
                            ErrorKind::Timeout,
                            format!(
                                "task exceeded its {}s deadline",
                                ctx.config.task_timeout_seconds
                            ),
                        );
                        match ctx
                            .store
                            .finish_task_with_error(task.id, TaskStatus::TimedOut, &error, now)
                            .await
                        {
                            Ok(true) => {
                                warn!(task_id = %task.id, "sweeper timed out an abandoned task");
                                if let Some(ws) = task.workspace_id {
                                    let _ = ctx.workspaces.quarantine(ws).await;
                                }
                                ctx.cancels.remove(task.id);
                            }
                            Ok(false) => {}
                            Err(e) => warn!(task_id = %task.id, error = %e, "sweeper write failed"),
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("timeout sweeper shutting down");
                    break;
                }
            }
        }
    })
}

/// Every `retention_check_interval`: delete terminal tasks older than the
/// retention window.
fn spawn_retention_gc(
    ctx: Arc<ExecContext>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(ctx.config.retention_check_interval_secs));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = Utc::now()
                        - chrono::Duration::seconds(ctx.config.result_retention_seconds as i64);
                    match ctx.store.delete_terminal_tasks_older_than(cutoff).await {
                        Ok(removed) if removed > 0 => {
                            debug!(removed, "retention GC removed terminal tasks");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "retention GC failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("retention GC shutting down");
                    break;
                }
            }
        }
    })
}
