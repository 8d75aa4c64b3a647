// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading and layering.

use std::path::PathBuf;

use gitbay_config::{load_config_from_path, load_config_from_str, validate_config, GitbayConfig};

#[test]
fn defaults_match_documented_values() {
    let config = GitbayConfig::default();
    assert_eq!(config.workspace.retention_seconds, 3600);
    assert_eq!(config.workspace.total_quota_bytes, 10 * 1024 * 1024 * 1024);
    assert_eq!(config.workspace.cleanup_strategy, "lru");
    assert_eq!(config.execution.worker_count, 4);
    assert_eq!(config.execution.max_concurrent_tasks, 10);
    assert_eq!(config.execution.queue_capacity, 100);
    assert_eq!(config.execution.task_timeout_seconds, 300);
    assert_eq!(config.execution.result_retention_seconds, 3600);
    assert_eq!(config.execution.max_retries, 3);
    assert_eq!(config.execution.cancel_grace_seconds, 10);
    assert_eq!(config.rate_limit.requests, 100);
    assert_eq!(config.rate_limit.window_seconds, 60);
    assert_eq!(config.git.default_clone_depth, 1);
    assert_eq!(config.server.log_level, "info");
    assert!(!config.execution.enqueue_blocks);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.execution.worker_count, 4);
    assert!(validate_config(&config).is_ok());
}

#[test]
fn toml_overrides_defaults() {
    let config = load_config_from_str(
        r#"
[workspace]
root = "/srv/gitbay/workspaces"
cleanup_strategy = "fifo"
total_quota_bytes = 1073741824

[execution]
worker_count = 8
queue_capacity = 2
"#,
    )
    .unwrap();

    assert_eq!(config.workspace.root, PathBuf::from("/srv/gitbay/workspaces"));
    assert_eq!(config.workspace.cleanup_strategy, "fifo");
    assert_eq!(config.workspace.total_quota_bytes, 1_073_741_824);
    assert_eq!(config.execution.worker_count, 8);
    assert_eq!(config.execution.queue_capacity, 2);
    // Untouched sections keep their defaults.
    assert_eq!(config.execution.max_retries, 3);
}

#[test]
fn unknown_keys_are_rejected() {
    let result = load_config_from_str(
        r#"
[execution]
worker_count = 2
max_workers = 10
"#,
    );
    assert!(result.is_err(), "unknown key should be rejected");
}

#[test]
fn env_override_maps_section_keys() {
    // Env vars are process-global; figment::Jail isolates them.
    figment::Jail::expect_with(|jail| {
        jail.set_env("GITBAY_EXECUTION_MAX_CONCURRENT_TASKS", "3");
        jail.set_env("GITBAY_WORKSPACE_RETENTION_SECONDS", "120");
        let config_path = jail.directory().join("gitbay.toml");
        std::fs::write(&config_path, "[execution]\nworker_count = 2\n").unwrap();
        let config = load_config_from_path(&config_path).unwrap();
        assert_eq!(config.execution.worker_count, 2);
        assert_eq!(config.execution.max_concurrent_tasks, 3);
        assert_eq!(config.workspace.retention_seconds, 120);
        Ok(())
    });
}

#[test]
fn secrets_never_serialize_back_out() {
    let config = load_config_from_str(
        r#"
[git]
token = "ghp_abc123def456"
username = "ci-bot"
password = "p4ssw0rd"
"#,
    )
    .unwrap();
    assert_eq!(config.git.token.as_deref(), Some("ghp_abc123def456"));

    let out = toml::to_string(&config).unwrap();
    assert!(!out.contains("ghp_abc123def456"));
    assert!(!out.contains("p4ssw0rd"));
    // Non-secret fields still round-trip.
    assert!(out.contains("ci-bot"));
}

#[test]
fn per_workspace_limit_defaults_to_tenth_of_quota() {
    let config = load_config_from_str(
        r#"
[workspace]
total_quota_bytes = 107374182400
"#,
    )
    .unwrap();
    assert_eq!(config.workspace.per_workspace_limit(), 10_737_418_240);
}
