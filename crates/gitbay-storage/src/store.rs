// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persistent store facade.
//!
//! Wraps a [`Database`] handle and delegates to the typed query modules,
//! applying the configured transient-error retry policy to every call.
//! Also hosts startup crash recovery for tasks left in running state.

use chrono::{DateTime, Utc};
use gitbay_core::{
    CleanupStrategy, ErrorKind, GitBayError, OperationLogEntry, RecoverPolicy, TaskRecord,
    TaskStatus, WorkspaceRecord,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{with_retries, Database};
use crate::queries;

/// Outcome of startup crash recovery.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: usize,
    pub requeued: usize,
}

/// SQLite-backed store for tasks, workspaces, and the operation log.
pub struct SqliteStore {
    db: Database,
    max_retries: u32,
}

impl SqliteStore {
    /// Open the store at `database_path`, running migrations.
    pub async fn open(database_path: &str, max_retries: u32) -> Result<Self, GitBayError> {
        let db = Database::open(database_path).await?;
        Ok(Self { db, max_retries })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(&self) -> Result<(), GitBayError> {
        self.db.close().await
    }

    // --- Task operations ---

    pub async fn insert_task(&self, task: &TaskRecord) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || queries::tasks::insert(&self.db, task)).await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, GitBayError> {
        with_retries(self.max_retries, || queries::tasks::get(&self.db, id)).await
    }

    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        limit: u32,
    ) -> Result<Vec<TaskRecord>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::list(&self.db, status, limit)
        })
        .await
    }

    pub async fn mark_task_running(
        &self,
        id: Uuid,
        started_at: DateTime<Utc>,
    ) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::mark_running(&self.db, id, started_at)
        })
        .await
    }

    pub async fn update_task_progress(&self, id: Uuid, progress: u8) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::update_progress(&self.db, id, progress)
        })
        .await
    }

    pub async fn complete_task(
        &self,
        id: Uuid,
        result: &serde_json::Value,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::complete(&self.db, id, result, completed_at)
        })
        .await
    }

    pub async fn finish_task_with_error(
        &self,
        id: Uuid,
        status: TaskStatus,
        error: &GitBayError,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::finish_with_error(&self.db, id, status, error, completed_at)
        })
        .await
    }

    pub async fn cancel_queued_task(
        &self,
        id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::cancel_queued(&self.db, id, completed_at)
        })
        .await
    }

    pub async fn cancel_running_task(
        &self,
        id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::cancel_running(&self.db, id, completed_at)
        })
        .await
    }

    pub async fn requeue_task_for_retry(&self, id: Uuid) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::requeue_for_retry(&self.db, id)
        })
        .await
    }

    pub async fn running_tasks_past_deadline(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::running_past_deadline(&self.db, now)
        })
        .await
    }

    pub async fn delete_terminal_tasks_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::delete_terminal_older_than(&self.db, cutoff)
        })
        .await
    }

    pub async fn count_tasks(&self, status: TaskStatus) -> Result<u64, GitBayError> {
        with_retries(self.max_retries, || {
            queries::tasks::count_by_status(&self.db, status)
        })
        .await
    }

    /// Startup crash recovery: any task still marked running belonged to a
    /// previous process. Idempotent operations may be re-enqueued under the
    /// `Requeue` policy; everything else fails with a distinguishing error.
    pub async fn recover_running_tasks(
        &self,
        policy: RecoverPolicy,
    ) -> Result<RecoveryReport, GitBayError> {
        let crashed = queries::tasks::list_running(&self.db).await?;
        let mut report = RecoveryReport::default();

        for task in crashed {
            let requeue = policy == RecoverPolicy::Requeue && task.operation.is_idempotent();
            if requeue {
                if queries::tasks::requeue_interrupted(&self.db, task.id).await? {
                    info!(task_id = %task.id, operation = %task.operation, "re-enqueued interrupted task");
                    report.requeued += 1;
                }
            } else {
                let err = GitBayError::new(
                    ErrorKind::Internal,
                    "task interrupted by service restart",
                )
                .with_suggestion("resubmit the operation");
                if queries::tasks::finish_with_error(
                    &self.db,
                    task.id,
                    TaskStatus::Failed,
                    &err,
                    Utc::now(),
                )
                .await?
                {
                    warn!(task_id = %task.id, operation = %task.operation, "failed interrupted task");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    // --- Workspace operations ---

    pub async fn insert_workspace(&self, ws: &WorkspaceRecord) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::insert(&self.db, ws)
        })
        .await
    }

    pub async fn get_workspace(&self, id: Uuid) -> Result<Option<WorkspaceRecord>, GitBayError> {
        with_retries(self.max_retries, || queries::workspaces::get(&self.db, id)).await
    }

    pub async fn list_workspaces(&self, limit: u32) -> Result<Vec<WorkspaceRecord>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::list(&self.db, limit)
        })
        .await
    }

    pub async fn touch_workspace(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::touch(&self.db, id, at)
        })
        .await
    }

    pub async fn update_workspace_size(
        &self,
        id: Uuid,
        size_bytes: u64,
        at: DateTime<Utc>,
    ) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::update_size(&self.db, id, size_bytes, at)
        })
        .await
    }

    pub async fn set_workspace_dirty(&self, id: Uuid, dirty: bool) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::set_dirty(&self.db, id, dirty)
        })
        .await
    }

    pub async fn delete_workspace(&self, id: Uuid) -> Result<bool, GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::delete(&self.db, id)
        })
        .await
    }

    pub async fn workspace_total_size(&self) -> Result<u64, GitBayError> {
        with_retries(self.max_retries, || queries::workspaces::total_size(&self.db)).await
    }

    pub async fn workspace_count(&self) -> Result<u64, GitBayError> {
        with_retries(self.max_retries, || queries::workspaces::count(&self.db)).await
    }

    pub async fn workspace_eviction_candidates(
        &self,
        strategy: CleanupStrategy,
        limit: u32,
    ) -> Result<Vec<WorkspaceRecord>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::eviction_candidates(&self.db, strategy, limit)
        })
        .await
    }

    pub async fn workspaces_idle_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkspaceRecord>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::workspaces::idle_since(&self.db, cutoff)
        })
        .await
    }

    // --- Operation log ---

    pub async fn append_log(&self, entry: &OperationLogEntry) -> Result<(), GitBayError> {
        with_retries(self.max_retries, || queries::oplog::append(&self.db, entry)).await
    }

    pub async fn logs_for_task(
        &self,
        task_id: Uuid,
        limit: u32,
    ) -> Result<Vec<OperationLogEntry>, GitBayError> {
        with_retries(self.max_retries, || {
            queries::oplog::list_for_task(&self.db, task_id, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitbay_core::GitOperation;
    use tempfile::tempdir;

    async fn setup_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("store.db").to_str().unwrap(), 3)
            .await
            .unwrap();
        (store, dir)
    }

    fn make_task(op: GitOperation) -> TaskRecord {
        let now = Utc::now();
        TaskRecord {
            id: Uuid::new_v4(),
            operation: op,
            params: serde_json::json!({}),
            workspace_id: None,
            status: TaskStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            attempt: 1,
            created_at: now,
            started_at: None,
            completed_at: None,
            deadline: now + chrono::Duration::seconds(300),
        }
    }

    #[tokio::test]
    async fn recovery_fails_crashed_tasks_under_fail_policy() {
        let (store, _dir) = setup_store().await;

        let task = make_task(GitOperation::Push);
        store.insert_task(&task).await.unwrap();
        store.mark_task_running(task.id, Utc::now()).await.unwrap();

        let report = store
            .recover_running_tasks(RecoverPolicy::Fail)
            .await
            .unwrap();
        assert_eq!(report, RecoveryReport { failed: 1, requeued: 0 });

        let got = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(got.status, TaskStatus::Failed);
        assert!(got.error.unwrap().message.contains("restart"));
    }

    #[tokio::test]
    async fn recovery_requeues_only_idempotent_operations() {
        let (store, _dir) = setup_store().await;

        let fetch = make_task(GitOperation::Fetch);
        let push = make_task(GitOperation::Push);
        store.insert_task(&fetch).await.unwrap();
        store.insert_task(&push).await.unwrap();
        store.mark_task_running(fetch.id, Utc::now()).await.unwrap();
        store.mark_task_running(push.id, Utc::now()).await.unwrap();

        let report = store
            .recover_running_tasks(RecoverPolicy::Requeue)
            .await
            .unwrap();
        assert_eq!(report, RecoveryReport { failed: 1, requeued: 1 });

        let fetch_after = store.get_task(fetch.id).await.unwrap().unwrap();
        assert_eq!(fetch_after.status, TaskStatus::Queued);
        // Re-enqueue after a crash does not burn a retry attempt.
        assert_eq!(fetch_after.attempt, 1);

        let push_after = store.get_task(push.id).await.unwrap().unwrap();
        assert_eq!(push_after.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn store_round_trips_logs() {
        let (store, _dir) = setup_store().await;
        let task_id = Uuid::new_v4();
        store
            .append_log(&OperationLogEntry {
                task_id,
                level: gitbay_core::LogLevel::Info,
                message: "fetch started".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        let logs = store.logs_for_task(task_id, 10).await.unwrap();
        assert_eq!(logs.len(), 1);
    }
}
