// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the execution core against the mock adapter:
//! submission, polling, cancellation, timeout, retry, queue bounds, and
//! panic isolation.

use std::sync::Arc;
use std::time::Duration;

use gitbay_config::model::{ExecutionConfig, RateLimitConfig, WorkspaceConfig};
use gitbay_core::{ErrorKind, GitOperation, TaskStatus};
use gitbay_credentials::CredentialManager;
use gitbay_exec::{CancelRegistry, ExecContext, TaskManager, TaskQueue};
use gitbay_security::SecretRegistry;
use gitbay_storage::SqliteStore;
use gitbay_test_utils::{MockGitAdapter, ScriptedCall};
use gitbay_workspace::WorkspaceManager;
use tokio::sync::Semaphore;
use uuid::Uuid;

struct Harness {
    manager: TaskManager,
    workspaces: Arc<WorkspaceManager>,
    store: Arc<SqliteStore>,
    _dir: tempfile::TempDir,
}

async fn harness(
    adapter: Arc<MockGitAdapter>,
    tune: impl FnOnce(&mut ExecutionConfig),
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteStore::open(dir.path().join("exec.db").to_str().unwrap(), 3)
            .await
            .unwrap(),
    );
    let workspaces = Arc::new(
        WorkspaceManager::new(
            store.clone(),
            WorkspaceConfig {
                root: dir.path().join("workspaces"),
                ..WorkspaceConfig::default()
            },
        )
        .unwrap(),
    );
    let credentials = Arc::new(CredentialManager::from_config(
        &gitbay_config::model::GitConfig::default(),
        SecretRegistry::new(),
    ));

    let mut config = ExecutionConfig {
        worker_count: 2,
        max_concurrent_tasks: 4,
        queue_capacity: 16,
        task_timeout_seconds: 30,
        retry_base_delay_ms: 10,
        retry_max_backoff_ms: 50,
        cancel_grace_seconds: 1,
        timeout_check_interval_secs: 1,
        retention_check_interval_secs: 1,
        ..ExecutionConfig::default()
    };
    tune(&mut config);

    let ctx = Arc::new(ExecContext {
        store: store.clone(),
        workspaces: workspaces.clone(),
        credentials,
        adapter,
        queue: Arc::new(TaskQueue::new(config.queue_capacity, config.enqueue_blocks)),
        permits: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
        cancels: Arc::new(CancelRegistry::new()),
        config,
    });
    let manager = TaskManager::start(ctx, &RateLimitConfig::default());

    Harness {
        manager,
        workspaces,
        store,
        _dir: dir,
    }
}

async fn poll_terminal(manager: &TaskManager, id: Uuid, within: Duration) -> gitbay_core::TaskRecord {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        let task = manager.status(id).await.unwrap();
        if task.status.is_terminal() {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} did not reach a terminal state in {within:?} (status: {})",
            task.status
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn submit_completes_and_result_is_stable() {
    let adapter = MockGitAdapter::with_script(vec![ScriptedCall::Succeed(
        serde_json::json!({"cloned": true}),
    )]);
    let h = harness(adapter, |_| {}).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Clone,
            serde_json::json!({"url": "https://git.example/x.git"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(5)).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
    assert_eq!(task.result.unwrap()["cloned"], true);
    assert!(task.started_at.is_some());
    assert!(task.completed_at.is_some());

    // Terminal state is stable across further polls.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let again = h.manager.status(id).await.unwrap();
    assert_eq!(again.status, TaskStatus::Completed);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn timeout_marks_task_timed_out() {
    // Adapter hangs but observes cancellation, so the grace window is met.
    let adapter = MockGitAdapter::with_script(vec![ScriptedCall::HangUntilCancelled]);
    let h = harness(adapter, |c| c.task_timeout_seconds = 1).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Clone,
            serde_json::json!({"url": "https://slow.example/x.git"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(4)).await;
    assert_eq!(task.status, TaskStatus::TimedOut);
    let error = task.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Timeout);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn missed_grace_window_quarantines_the_workspace() {
    let adapter =
        MockGitAdapter::with_script(vec![ScriptedCall::HangIgnoringCancel(Duration::from_secs(30))]);
    let h = harness(adapter, |c| c.task_timeout_seconds = 1).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Clone,
            serde_json::json!({"url": "https://stuck.example/x.git"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(5)).await;
    assert_eq!(task.status, TaskStatus::TimedOut);

    let record = h.store.get_workspace(ws.id).await.unwrap().unwrap();
    assert!(record.dirty, "workspace should be quarantined");
    let err = h.workspaces.acquire(ws.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::WorkspaceQuarantined);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn cancel_running_task_lands_cancelled() {
    let adapter = MockGitAdapter::with_script(vec![ScriptedCall::HangUntilCancelled]);
    let h = harness(adapter, |_| {}).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Clone,
            serde_json::json!({"url": "https://git.example/big.git"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    // Let a worker pick it up, then cancel.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.manager.cancel(id).await.unwrap());

    let task = poll_terminal(&h.manager, id, Duration::from_secs(3)).await;
    assert_eq!(task.status, TaskStatus::Cancelled);
    // Clean cancellation carries no error payload.
    assert!(task.error.is_none());

    // Idempotent: a second cancel is a no-op returning false.
    assert!(!h.manager.cancel(id).await.unwrap());

    h.manager.shutdown().await;
}

#[tokio::test]
async fn cancel_queued_task_never_runs() {
    let adapter = MockGitAdapter::with_script(vec![]);
    // No workers: the task sits queued.
    let h = harness(adapter.clone(), |c| c.worker_count = 0).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Fetch,
            serde_json::json!({"remote": "origin"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    assert!(h.manager.cancel(id).await.unwrap());
    let task = h.manager.status(id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(adapter.calls().await.is_empty());

    h.manager.shutdown().await;
}

#[tokio::test]
async fn queue_full_rejects_submission() {
    let adapter = MockGitAdapter::with_script(vec![]);
    let h = harness(adapter, |c| {
        c.worker_count = 0;
        c.queue_capacity = 2;
    })
    .await;

    let ws = h.workspaces.allocate().await.unwrap();
    let params = serde_json::json!({"remote": "origin"});
    h.manager
        .submit(GitOperation::Fetch, params.clone(), Some(ws.id))
        .await
        .unwrap();
    h.manager
        .submit(GitOperation::Fetch, params.clone(), Some(ws.id))
        .await
        .unwrap();

    let err = h
        .manager
        .submit(GitOperation::Fetch, params, Some(ws.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QueueFull);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn retryable_failures_back_off_then_succeed() {
    let adapter = MockGitAdapter::with_script(vec![
        ScriptedCall::Fail(ErrorKind::NetworkError),
        ScriptedCall::Fail(ErrorKind::NetworkError),
        ScriptedCall::Succeed(serde_json::json!({"fetched": true})),
    ]);
    let h = harness(adapter.clone(), |c| c.max_retries = 3).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Fetch,
            serde_json::json!({"remote": "origin"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(5)).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.attempt, 3);
    assert_eq!(adapter.calls().await.len(), 3);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn non_retryable_failures_fail_once() {
    let adapter = MockGitAdapter::with_script(vec![ScriptedCall::Fail(ErrorKind::MergeConflict)]);
    let h = harness(adapter.clone(), |_| {}).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(GitOperation::Merge, serde_json::json!({"branch": "dev"}), Some(ws.id))
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(3)).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt, 1);
    assert_eq!(task.error.unwrap().kind, ErrorKind::MergeConflict);
    assert_eq!(adapter.calls().await.len(), 1);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn retries_exhaust_into_failure() {
    let adapter = MockGitAdapter::with_script(vec![
        ScriptedCall::Fail(ErrorKind::NetworkError),
        ScriptedCall::Fail(ErrorKind::NetworkError),
        ScriptedCall::Fail(ErrorKind::NetworkError),
    ]);
    let h = harness(adapter.clone(), |c| c.max_retries = 3).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Fetch,
            serde_json::json!({"remote": "origin"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let task = poll_terminal(&h.manager, id, Duration::from_secs(5)).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.attempt, 3);
    assert_eq!(task.error.unwrap().kind, ErrorKind::NetworkError);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn adapter_panic_fails_task_but_worker_survives() {
    let adapter = MockGitAdapter::with_script(vec![
        ScriptedCall::Panic,
        ScriptedCall::Succeed(serde_json::json!({"ok": true})),
    ]);
    let h = harness(adapter, |c| c.worker_count = 1).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let doomed = h
        .manager
        .submit(
            GitOperation::Push,
            serde_json::json!({"remote": "origin"}),
            Some(ws.id),
        )
        .await
        .unwrap();
    let task = poll_terminal(&h.manager, doomed, Duration::from_secs(3)).await;
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, ErrorKind::Internal);

    // The same (sole) worker still processes the next task.
    let ok = h
        .manager
        .submit(
            GitOperation::Push,
            serde_json::json!({"remote": "origin"}),
            Some(ws.id),
        )
        .await
        .unwrap();
    let task = poll_terminal(&h.manager, ok, Duration::from_secs(3)).await;
    assert_eq!(task.status, TaskStatus::Completed);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn progress_is_monotone_and_reaches_100() {
    let adapter = MockGitAdapter::with_script(vec![ScriptedCall::SucceedSlowly {
        step_delay: Duration::from_millis(80),
        steps: vec![10, 40, 40, 90],
        payload: serde_json::json!({"cloned": true}),
    }]);
    let h = harness(adapter, |_| {}).await;

    let ws = h.workspaces.allocate().await.unwrap();
    let id = h
        .manager
        .submit(
            GitOperation::Clone,
            serde_json::json!({"url": "https://git.example/x.git"}),
            Some(ws.id),
        )
        .await
        .unwrap();

    let mut last = 0u8;
    loop {
        let task = h.manager.status(id).await.unwrap();
        assert!(task.progress >= last, "progress went backwards");
        last = task.progress;
        if task.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert_eq!(h.manager.status(id).await.unwrap().progress, 100);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn rate_limit_rejects_excess_submissions() {
    let adapter = MockGitAdapter::with_script(vec![]);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SqliteStore::open(dir.path().join("rl.db").to_str().unwrap(), 3)
            .await
            .unwrap(),
    );
    let workspaces = Arc::new(
        WorkspaceManager::new(
            store.clone(),
            WorkspaceConfig {
                root: dir.path().join("workspaces"),
                ..WorkspaceConfig::default()
            },
        )
        .unwrap(),
    );
    let config = ExecutionConfig {
        worker_count: 0,
        ..ExecutionConfig::default()
    };
    let ctx = Arc::new(ExecContext {
        store,
        workspaces: workspaces.clone(),
        credentials: Arc::new(CredentialManager::from_config(
            &gitbay_config::model::GitConfig::default(),
            SecretRegistry::new(),
        )),
        adapter,
        queue: Arc::new(TaskQueue::new(config.queue_capacity, false)),
        permits: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
        cancels: Arc::new(CancelRegistry::new()),
        config,
    });
    let manager = TaskManager::start(
        ctx,
        &RateLimitConfig {
            requests: 2,
            window_seconds: 3600,
        },
    );

    let ws = workspaces.allocate().await.unwrap();
    let params = serde_json::json!({"remote": "origin"});
    manager
        .submit(GitOperation::Fetch, params.clone(), Some(ws.id))
        .await
        .unwrap();
    manager
        .submit(GitOperation::Fetch, params.clone(), Some(ws.id))
        .await
        .unwrap();
    let err = manager
        .submit(GitOperation::Fetch, params, Some(ws.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);

    manager.shutdown().await;
}

#[tokio::test]
async fn concurrent_running_tasks_respect_the_permit_bound() {
    // 4 workers but only 2 permits: no more than 2 tasks run at once.
    let adapter = MockGitAdapter::with_script(
        (0..6)
            .map(|_| ScriptedCall::SucceedSlowly {
                step_delay: Duration::from_millis(120),
                steps: vec![50],
                payload: serde_json::json!({}),
            })
            .collect(),
    );
    let h = harness(adapter, |c| {
        c.worker_count = 4;
        c.max_concurrent_tasks = 2;
    })
    .await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        let ws = h.workspaces.allocate().await.unwrap();
        ids.push(
            h.manager
                .submit(
                    GitOperation::Fetch,
                    serde_json::json!({"remote": "origin"}),
                    Some(ws.id),
                )
                .await
                .unwrap(),
        );
    }

    let mut max_running = 0;
    loop {
        let running = h.store.count_tasks(TaskStatus::Running).await.unwrap();
        max_running = max_running.max(running);
        let done = {
            let mut all_terminal = true;
            for id in &ids {
                if !h.manager.status(*id).await.unwrap().status.is_terminal() {
                    all_terminal = false;
                    break;
                }
            }
            all_terminal
        };
        if done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    assert!(
        max_running <= 2,
        "observed {max_running} concurrent running tasks"
    );

    h.manager.shutdown().await;
}

#[tokio::test]
async fn unknown_task_status_is_not_found() {
    let adapter = MockGitAdapter::with_script(vec![]);
    let h = harness(adapter, |_| {}).await;

    let err = h.manager.status(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::TaskNotFound);
    assert!(!h.manager.cancel(Uuid::new_v4()).await.unwrap());

    h.manager.shutdown().await;
}
