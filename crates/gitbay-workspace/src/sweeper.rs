// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background workspace sweeper.
//!
//! Runs expiry cleanup and the quota eviction pass on a fixed interval
//! until the cancellation token fires. Failures are logged and the loop
//! continues; a single bad pass never kills the sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::WorkspaceManager;

/// Spawn the sweeper loop. Returns immediately; the loop runs until
/// `cancel` fires.
pub fn spawn_sweeper(
    manager: Arc<WorkspaceManager>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the immediate first tick.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match manager.cleanup_expired().await {
                        Ok((removed, freed)) if removed > 0 => {
                            debug!(removed, freed, "sweeper removed expired workspaces");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "workspace expiry sweep failed"),
                    }
                    if let Err(e) = manager.evict_until_under_quota().await {
                        warn!(error = %e, "quota eviction sweep failed");
                    }
                }
                _ = cancel.cancelled() => {
                    info!("workspace sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitbay_config::model::WorkspaceConfig;
    use gitbay_storage::SqliteStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("sweep.db").to_str().unwrap(), 3)
                .await
                .unwrap(),
        );
        let config = WorkspaceConfig {
            root: dir.path().join("workspaces"),
            ..WorkspaceConfig::default()
        };
        let manager = Arc::new(WorkspaceManager::new(store, config).unwrap());

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(manager, Duration::from_millis(10), cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn sweeper_reaps_expired_workspaces_over_time() {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("sweep2.db").to_str().unwrap(), 3)
                .await
                .unwrap(),
        );
        let config = WorkspaceConfig {
            root: dir.path().join("workspaces"),
            retention_seconds: 0,
            ..WorkspaceConfig::default()
        };
        let manager = Arc::new(WorkspaceManager::new(store, config).unwrap());
        let ws = manager.allocate().await.unwrap();

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(manager.clone(), Duration::from_millis(20), cancel.clone());

        // Wait for at least one sweep.
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let _ = handle.await;

        assert!(!ws.path.exists(), "expired workspace should be swept");
    }
}
