// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all gitbay metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("gitbay_tasks_total", "Tasks reaching a terminal state, by status");
    describe_counter!(
        "gitbay_git_operations_total",
        "Git operations executed, by operation"
    );
    describe_gauge!("gitbay_queue_depth", "Tasks currently queued");
    describe_gauge!("gitbay_active_workers", "Workers currently executing a task");
    describe_gauge!("gitbay_active_workspaces", "Workspace directories on disk");
    describe_gauge!("gitbay_workspace_bytes", "Aggregate workspace disk usage");
    describe_histogram!(
        "gitbay_task_duration_seconds",
        "Task wall-clock duration from start to terminal state"
    );
    describe_histogram!(
        "gitbay_clone_duration_seconds",
        "Clone duration from start to terminal state"
    );
}

/// Record a task reaching a terminal state.
pub fn record_task_finished(status: &str, operation: &str, duration_secs: f64) {
    metrics::counter!("gitbay_tasks_total", "status" => status.to_string()).increment(1);
    metrics::counter!("gitbay_git_operations_total", "operation" => operation.to_string())
        .increment(1);
    metrics::histogram!("gitbay_task_duration_seconds").record(duration_secs);
    if operation == "clone" {
        metrics::histogram!("gitbay_clone_duration_seconds").record(duration_secs);
    }
}

/// Record a synchronous operation execution.
pub fn record_sync_operation(operation: &str) {
    metrics::counter!("gitbay_git_operations_total", "operation" => operation.to_string())
        .increment(1);
}

pub fn set_queue_depth(depth: f64) {
    metrics::gauge!("gitbay_queue_depth").set(depth);
}

pub fn set_active_workers(count: f64) {
    metrics::gauge!("gitbay_active_workers").set(count);
}

pub fn set_active_workspaces(count: f64) {
    metrics::gauge!("gitbay_active_workspaces").set(count);
}

pub fn set_workspace_bytes(bytes: f64) {
    metrics::gauge!("gitbay_workspace_bytes").set(bytes);
}
