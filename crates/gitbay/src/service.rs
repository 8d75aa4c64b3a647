// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly.
//!
//! A process-scoped context constructed once at startup and threaded
//! through the components: store (with crash recovery), credential
//! manager, workspace manager and its sweeper, the execution core, and
//! the shared secret registry feeding every log sink.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use gitbay_config::GitbayConfig;
use gitbay_core::{GitAdapter, GitBayError, RecoverPolicy};
use gitbay_credentials::CredentialManager;
use gitbay_exec::{CancelRegistry, ExecContext, TaskManager, TaskQueue};
use gitbay_git::CliGitAdapter;
use gitbay_security::SecretRegistry;
use gitbay_storage::SqliteStore;
use gitbay_workspace::{spawn_sweeper, WorkspaceManager};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Service {
    pub config: GitbayConfig,
    pub manager: TaskManager,
    pub workspaces: Arc<WorkspaceManager>,
    pub registry: SecretRegistry,
    sweeper_cancel: CancellationToken,
    sweeper: tokio::task::JoinHandle<()>,
}

impl Service {
    /// Assemble and start the service with the default CLI git adapter.
    pub async fn start(config: GitbayConfig, registry: SecretRegistry) -> Result<Self, GitBayError> {
        Self::start_with_adapter(config, registry, Arc::new(CliGitAdapter::new())).await
    }

    /// Assemble and start the service around an explicit adapter
    /// implementation (tests inject a mock here).
    pub async fn start_with_adapter(
        config: GitbayConfig,
        registry: SecretRegistry,
        adapter: Arc<dyn GitAdapter>,
    ) -> Result<Self, GitBayError> {
        let store = Arc::new(
            SqliteStore::open(
                &config.storage.database_path,
                config.storage.max_storage_retries,
            )
            .await?,
        );

        // Tasks left running by a previous process are crashed.
        let policy = RecoverPolicy::from_str(&config.execution.recover_policy)
            .unwrap_or(RecoverPolicy::Fail);
        let report = store.recover_running_tasks(policy).await?;
        if report.failed + report.requeued > 0 {
            info!(
                failed = report.failed,
                requeued = report.requeued,
                "crash recovery complete"
            );
        }

        let credentials = Arc::new(CredentialManager::from_config(
            &config.git,
            registry.clone(),
        ));
        let workspaces = Arc::new(WorkspaceManager::new(
            store.clone(),
            config.workspace.clone(),
        )?);

        let sweeper_cancel = CancellationToken::new();
        let sweeper = spawn_sweeper(
            workspaces.clone(),
            Duration::from_secs(config.workspace.cleanup_interval_seconds),
            sweeper_cancel.clone(),
        );

        let queue = Arc::new(TaskQueue::new(
            config.execution.queue_capacity,
            config.execution.enqueue_blocks,
        ));

        let ctx = Arc::new(ExecContext {
            store,
            workspaces: workspaces.clone(),
            credentials,
            adapter,
            queue,
            permits: Arc::new(Semaphore::new(config.execution.max_concurrent_tasks)),
            cancels: Arc::new(CancelRegistry::new()),
            config: config.execution.clone(),
        });

        // Recovered re-enqueueable tasks go back onto the in-memory queue.
        for task in ctx.store.list_tasks(Some(gitbay_core::TaskStatus::Queued), u32::MAX).await? {
            ctx.queue.enqueue(task.id).await?;
        }

        let manager = TaskManager::start(ctx, &config.rate_limit);

        info!(
            workspace_root = %config.workspace.root.display(),
            database = %config.storage.database_path,
            "gitbay service started"
        );

        Ok(Self {
            config,
            manager,
            workspaces,
            registry,
            sweeper_cancel,
            sweeper,
        })
    }

    /// Graceful shutdown: drain the queue, stop workers and sweepers,
    /// checkpoint the store.
    pub async fn shutdown(self) {
        self.sweeper_cancel.cancel();
        let _ = self.sweeper.await;
        let store = self.manager.context().store.clone();
        self.manager.shutdown().await;
        let _ = store.close().await;
        info!("gitbay service stopped");
    }
}
