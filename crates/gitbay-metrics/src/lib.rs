// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the gitbay service.
//!
//! Recording helpers are always safe to call; with no recorder installed
//! they are no-ops. The binary installs the Prometheus recorder when
//! metrics are enabled and exposes `render()` as the integration point for
//! an external scrape endpoint.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub use recording::{
    record_sync_operation, record_task_finished, register_metrics, set_active_workers,
    set_active_workspaces, set_queue_depth, set_workspace_bytes,
};

/// Prometheus recorder handle.
///
/// Only one recorder can be installed per process; construction fails if
/// another recorder is already registered.
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    pub fn install() -> Result<Self, String> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| format!("failed to install Prometheus recorder: {e}"))?;
        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");
        Ok(Self { handle })
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
