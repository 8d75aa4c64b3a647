// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the gitbay service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level gitbay configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides under the `GITBAY_` prefix. All sections are optional
/// and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitbayConfig {
    /// Workspace root, quotas, and eviction.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Queue, worker pool, timeouts, and retry settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// SQLite backing store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Submission rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Credential sources and clone defaults.
    #[serde(default)]
    pub git: GitConfig,

    /// Process-level settings: logging, metrics.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Workspace root, quotas, and eviction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Root directory under which all workspaces are allocated.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,

    /// Idle age after which an unleased workspace is reaped.
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,

    /// Aggregate on-disk ceiling across all workspaces.
    #[serde(default = "default_total_quota_bytes")]
    pub total_quota_bytes: u64,

    /// Per-workspace ceiling. `None` defaults to a tenth of the quota.
    #[serde(default)]
    pub max_per_workspace_bytes: Option<u64>,

    /// Eviction order: "lru" or "fifo".
    #[serde(default = "default_cleanup_strategy")]
    pub cleanup_strategy: String,

    /// Interval between background cleanup sweeps.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            retention_seconds: default_retention_seconds(),
            total_quota_bytes: default_total_quota_bytes(),
            max_per_workspace_bytes: None,
            cleanup_strategy: default_cleanup_strategy(),
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

impl WorkspaceConfig {
    /// Effective per-workspace ceiling: the configured value, or a tenth of
    /// the aggregate quota with a 1 GiB floor.
    pub fn per_workspace_limit(&self) -> u64 {
        self.max_per_workspace_bytes
            .unwrap_or_else(|| (self.total_quota_bytes / 10).max(1024 * 1024 * 1024))
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("gitbay-workspaces")
}

fn default_retention_seconds() -> u64 {
    3600
}

fn default_total_quota_bytes() -> u64 {
    10 * 1024 * 1024 * 1024
}

fn default_cleanup_strategy() -> String {
    "lru".to_string()
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

/// Queue, worker pool, timeout, and retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Size of the worker pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Concurrency permit count across all workers.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Maximum queued tasks before enqueue fails or blocks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Whether enqueue blocks at capacity instead of failing fast.
    #[serde(default)]
    pub enqueue_blocks: bool,

    /// Per-task deadline, measured from creation.
    #[serde(default = "default_task_timeout_seconds")]
    pub task_timeout_seconds: u64,

    /// How long terminal task records are retained.
    #[serde(default = "default_result_retention_seconds")]
    pub result_retention_seconds: u64,

    /// Attempts for retryable errors, beyond the first execution.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for retry backoff.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Window the adapter gets to return after a timeout-driven cancel.
    #[serde(default = "default_cancel_grace_seconds")]
    pub cancel_grace_seconds: u64,

    /// Timeout sweeper interval.
    #[serde(default = "default_timeout_check_interval_secs")]
    pub timeout_check_interval_secs: u64,

    /// Retention GC interval.
    #[serde(default = "default_retention_check_interval_secs")]
    pub retention_check_interval_secs: u64,

    /// Restart policy for tasks found running after a crash: "fail" or
    /// "requeue" (re-enqueues idempotent operations only).
    #[serde(default = "default_recover_policy")]
    pub recover_policy: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            queue_capacity: default_queue_capacity(),
            enqueue_blocks: false,
            task_timeout_seconds: default_task_timeout_seconds(),
            result_retention_seconds: default_result_retention_seconds(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            cancel_grace_seconds: default_cancel_grace_seconds(),
            timeout_check_interval_secs: default_timeout_check_interval_secs(),
            retention_check_interval_secs: default_retention_check_interval_secs(),
            recover_policy: default_recover_policy(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_max_concurrent_tasks() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    100
}

fn default_task_timeout_seconds() -> u64 {
    300
}

fn default_result_retention_seconds() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_backoff_ms() -> u64 {
    60_000
}

fn default_cancel_grace_seconds() -> u64 {
    10
}

fn default_timeout_check_interval_secs() -> u64 {
    5
}

fn default_retention_check_interval_secs() -> u64 {
    60
}

fn default_recover_policy() -> String {
    "fail".to_string()
}

/// SQLite backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Internal retry bound for transient storage errors.
    #[serde(default = "default_max_storage_retries")]
    pub max_storage_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            max_storage_retries: default_max_storage_retries(),
        }
    }
}

fn default_database_path() -> String {
    "gitbay.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_max_storage_retries() -> u32 {
    3
}

/// Token-bucket rate limiting for task submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Bucket capacity: submissions allowed per window.
    #[serde(default = "default_rate_limit_requests")]
    pub requests: u32,

    /// Refill window.
    #[serde(default = "default_rate_limit_window_seconds")]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_limit_requests(),
            window_seconds: default_rate_limit_window_seconds(),
        }
    }
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

/// Credential sources and clone defaults.
///
/// Secret values are accepted here for env-var injection but are excluded
/// from serialization so a config round-trip can never write them out.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitConfig {
    /// Personal access token for HTTPS remotes.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Username for basic authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Path to an SSH private key.
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,

    /// Passphrase for the SSH key.
    #[serde(default, skip_serializing)]
    pub ssh_passphrase: Option<String>,

    /// Resolution priority override, e.g. ["ssh_agent", "token"].
    #[serde(default)]
    pub auth_priority: Vec<String>,

    /// Shallow-by-default clone depth. 0 disables shallow cloning.
    #[serde(default = "default_clone_depth")]
    pub default_clone_depth: u32,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            password: None,
            ssh_key_path: None,
            ssh_passphrase: None,
            auth_priority: Vec::new(),
            default_clone_depth: default_clone_depth(),
        }
    }
}

fn default_clone_depth() -> u32 {
    1
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to install the Prometheus metrics recorder.
    #[serde(default)]
    pub prometheus_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
