// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests driving the tool surface against the real git binary
//! and local `file://` remotes. Skipped when git is not installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use gitbay::handlers::dispatch_tool;
use gitbay::service::Service;
use gitbay_config::GitbayConfig;
use gitbay_core::ErrorKind;
use gitbay_security::SecretRegistry;
use serde_json::{json, Value};

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn run(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("git command");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

/// Create a bare origin with one seed commit; returns its file:// URL.
fn seed_origin(root: &Path) -> String {
    let origin = root.join("origin.git");
    std::fs::create_dir_all(&origin).unwrap();
    run(&origin, &["init", "--bare", "-b", "main"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    run(&seed, &["init", "-b", "main"]);
    run(&seed, &["config", "user.email", "seed@example.com"]);
    run(&seed, &["config", "user.name", "Seed"]);
    std::fs::write(seed.join("seed.txt"), "seed\n").unwrap();
    run(&seed, &["add", "."]);
    run(&seed, &["commit", "-m", "seed"]);
    run(
        &seed,
        &["push", origin.to_str().unwrap(), "main:main"],
    );

    format!("file://{}", origin.display())
}

async fn start_service(root: &Path) -> Service {
    let mut config = GitbayConfig::default();
    config.workspace.root = root.join("workspaces");
    config.storage.database_path = root
        .join("gitbay.db")
        .to_string_lossy()
        .to_string();
    config.execution.worker_count = 2;
    config.execution.task_timeout_seconds = 60;
    Service::start(config, SecretRegistry::new())
        .await
        .expect("service start")
}

async fn poll_task(service: &Service, task_id: &str) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let task = dispatch_tool(service, "git_get_task", json!({"task_id": task_id}))
            .await
            .expect("git_get_task");
        let status = task["status"].as_str().unwrap_or_default().to_string();
        if ["completed", "failed", "cancelled", "timed_out"].contains(&status.as_str()) {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {task_id} stuck in {status}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn clone_commit_push_round_trip() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let url = seed_origin(td.path());
    let service = start_service(td.path()).await;

    // Clone (async path).
    let submitted = dispatch_tool(
        &service,
        "git_clone",
        json!({"url": url, "depth": 1, "single_branch": true}),
    )
    .await
    .unwrap();
    assert_eq!(submitted["status"], "queued");
    let task = poll_task(&service, submitted["task_id"].as_str().unwrap()).await;
    assert_eq!(task["status"], "completed", "clone failed: {task}");

    let workspace_id = submitted["workspace_id"].as_str().unwrap().to_string();
    let ws = dispatch_tool(
        &service,
        "git_get_workspace",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let ws_path = PathBuf::from(ws["path"].as_str().unwrap());
    assert!(ws_path.join("seed.txt").exists());

    // Local edit + stage + commit (sync path).
    std::fs::write(ws_path.join("README.md"), "hello\n").unwrap();
    dispatch_tool(
        &service,
        "git_stage",
        json!({"workspace_id": workspace_id, "file_pattern": "README.md"}),
    )
    .await
    .unwrap();
    let commit = dispatch_tool(
        &service,
        "git_commit",
        json!({
            "workspace_id": workspace_id,
            "message": "init",
            "author": {"name": "T", "email": "t@e"}
        }),
    )
    .await
    .unwrap();
    let oid = commit["oid"].as_str().unwrap();
    assert_eq!(oid.len(), 40);
    assert!(oid.chars().all(|c| c.is_ascii_hexdigit()));

    // Status shows a clean tree ahead of origin.
    let status = dispatch_tool(
        &service,
        "git_status",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(status["branch"], "main");
    assert!(status["staged"].as_array().unwrap().is_empty());

    // Push (async path) and verify the origin advanced.
    let pushed = dispatch_tool(
        &service,
        "git_push",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let task = poll_task(&service, pushed["task_id"].as_str().unwrap()).await;
    assert_eq!(task["status"], "completed", "push failed: {task}");

    let origin_head = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(td.path().join("origin.git"))
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&origin_head.stdout).trim(), oid);

    service.shutdown().await;
}

#[tokio::test]
async fn log_branches_and_diff_on_a_real_repo() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let url = seed_origin(td.path());
    let service = start_service(td.path()).await;

    let submitted = dispatch_tool(&service, "git_clone", json!({"url": url}))
        .await
        .unwrap();
    let task = poll_task(&service, submitted["task_id"].as_str().unwrap()).await;
    assert_eq!(task["status"], "completed");
    let workspace_id = submitted["workspace_id"].as_str().unwrap().to_string();

    let log = dispatch_tool(
        &service,
        "git_log",
        json!({"workspace_id": workspace_id, "limit": 10}),
    )
    .await
    .unwrap();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["message"], "seed");

    let branches = dispatch_tool(
        &service,
        "git_list_branches",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let branches = branches.as_array().unwrap();
    assert!(branches.iter().any(|b| b["name"] == "main" && b["is_current"] == true));

    dispatch_tool(
        &service,
        "git_create_branch",
        json!({"workspace_id": workspace_id, "name": "feature/x", "checkout": true}),
    )
    .await
    .unwrap();
    let status = dispatch_tool(
        &service,
        "git_status",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(status["branch"], "feature/x");

    service.shutdown().await;
}

#[tokio::test]
async fn path_escape_is_rejected_before_any_io() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let service = start_service(td.path()).await;

    let ws = dispatch_tool(&service, "git_allocate_workspace", json!({}))
        .await
        .unwrap();
    let workspace_id = ws["workspace_id"].as_str().unwrap();

    let err = dispatch_tool(
        &service,
        "git_blame",
        json!({"workspace_id": workspace_id, "path": "../../etc/passwd"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PathEscape);

    service.shutdown().await;
}

#[tokio::test]
async fn invalid_inputs_are_rejected_at_the_boundary() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let service = start_service(td.path()).await;

    let err = dispatch_tool(&service, "git_clone", json!({"url": "ftp://host/x.git"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRemoteUrl);

    let err = dispatch_tool(
        &service,
        "git_clone",
        json!({"url": "https://user:pw@host/x.git"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidRemoteUrl);

    let err = dispatch_tool(&service, "git_nonsense", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::MissingRequiredParam);

    let ws = dispatch_tool(&service, "git_allocate_workspace", json!({}))
        .await
        .unwrap();
    let err = dispatch_tool(
        &service,
        "git_create_branch",
        json!({"workspace_id": ws["workspace_id"], "name": "bad..name"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidBranchName);

    service.shutdown().await;
}

#[tokio::test]
async fn workspace_lifecycle_through_tools() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let service = start_service(td.path()).await;

    let ws = dispatch_tool(&service, "git_allocate_workspace", json!({}))
        .await
        .unwrap();
    let workspace_id = ws["workspace_id"].as_str().unwrap().to_string();
    let path = PathBuf::from(ws["path"].as_str().unwrap());
    assert!(path.is_dir());

    let listed = dispatch_tool(&service, "git_list_workspaces", json!({}))
        .await
        .unwrap();
    assert_eq!(listed["workspaces"].as_array().unwrap().len(), 1);

    let disk = dispatch_tool(&service, "git_disk_space", json!({}))
        .await
        .unwrap();
    assert!(disk["total_bytes"].as_u64().unwrap() > 0);

    let released = dispatch_tool(
        &service,
        "git_release_workspace",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(released["released"], true);
    assert!(!path.exists());

    let err = dispatch_tool(
        &service,
        "git_get_workspace",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::WorkspaceNotFound);

    service.shutdown().await;
}

#[tokio::test]
async fn init_status_stash_tag_flow() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let service = start_service(td.path()).await;

    let init = dispatch_tool(&service, "git_init", json!({"initial_branch": "main"}))
        .await
        .unwrap();
    assert_eq!(init["initialized"], true);
    // Init without a workspace allocates one implicitly and reports it.
    let workspace_id = init["workspace_id"].as_str().unwrap().to_string();
    let ws = dispatch_tool(
        &service,
        "git_get_workspace",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let ws_path = PathBuf::from(ws["path"].as_str().unwrap());

    std::fs::write(ws_path.join("a.txt"), "a\n").unwrap();
    dispatch_tool(
        &service,
        "git_stage",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let commit = dispatch_tool(
        &service,
        "git_commit",
        json!({
            "workspace_id": workspace_id,
            "message": "a",
            "author": {"name": "T", "email": "t@e"}
        }),
    )
    .await
    .unwrap();
    assert!(commit["oid"].is_string());

    // Dirty the tree, stash it, verify clean, pop it back.
    std::fs::write(ws_path.join("a.txt"), "changed\n").unwrap();
    let stashed = dispatch_tool(
        &service,
        "git_stash",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(stashed["stashed"], true);
    let status = dispatch_tool(
        &service,
        "git_status",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert!(status["modified"].as_array().unwrap().is_empty());

    let stashes = dispatch_tool(
        &service,
        "git_list_stash",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(stashes.as_array().unwrap().len(), 1);
    dispatch_tool(
        &service,
        "git_stash_pop",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();

    // Tags.
    dispatch_tool(
        &service,
        "git_create_tag",
        json!({"workspace_id": workspace_id, "name": "v0.1.0", "message": "first"}),
    )
    .await
    .unwrap();
    let tags = dispatch_tool(
        &service,
        "git_list_tags",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert_eq!(tags.as_array().unwrap()[0], "v0.1.0");

    service.shutdown().await;
}

#[tokio::test]
async fn merge_conflict_reports_structured_conflicts() {
    if !git_available() {
        eprintln!("skipping: git not found");
        return;
    }

    let td = tempfile::tempdir().unwrap();
    let service = start_service(td.path()).await;

    let init = dispatch_tool(&service, "git_init", json!({"initial_branch": "main"}))
        .await
        .unwrap();
    let workspace_id = init["workspace_id"].as_str().unwrap().to_string();
    let ws = dispatch_tool(
        &service,
        "git_get_workspace",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    let ws_path = PathBuf::from(ws["path"].as_str().unwrap());

    let author = json!({"name": "T", "email": "t@e"});
    let commit = |file: &'static str, content: &'static str, msg: &'static str| {
        let service = &service;
        let workspace_id = workspace_id.clone();
        let ws_path = ws_path.clone();
        let author = author.clone();
        async move {
            std::fs::write(ws_path.join(file), content).unwrap();
            dispatch_tool(service, "git_stage", json!({"workspace_id": workspace_id}))
                .await
                .unwrap();
            dispatch_tool(
                service,
                "git_commit",
                json!({"workspace_id": workspace_id, "message": msg, "author": author}),
            )
            .await
            .unwrap();
        }
    };

    commit("f.txt", "base\n", "base").await;
    dispatch_tool(
        &service,
        "git_create_branch",
        json!({"workspace_id": workspace_id, "name": "other", "checkout": true}),
    )
    .await
    .unwrap();
    commit("f.txt", "other\n", "other change").await;
    dispatch_tool(
        &service,
        "git_checkout",
        json!({"workspace_id": workspace_id, "target": "main"}),
    )
    .await
    .unwrap();
    commit("f.txt", "main\n", "main change").await;

    // Merge is queued (merge-family); poll the task for the conflict.
    let submitted = dispatch_tool(
        &service,
        "git_merge",
        json!({"workspace_id": workspace_id, "branch": "other"}),
    )
    .await
    .unwrap();
    let task = poll_task(&service, submitted["task_id"].as_str().unwrap()).await;
    assert_eq!(task["status"], "failed");
    assert_eq!(task["error"]["kind"], "MERGE_CONFLICT");
    let conflicts = task["error"]["context"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts[0]["path"], "f.txt");
    assert_eq!(conflicts[0]["kind"], "both_modified");

    // The workspace rolled back to a clean state and stays usable.
    let status = dispatch_tool(
        &service,
        "git_status",
        json!({"workspace_id": workspace_id}),
    )
    .await
    .unwrap();
    assert!(status["modified"].as_array().unwrap().is_empty());

    service.shutdown().await;
}
