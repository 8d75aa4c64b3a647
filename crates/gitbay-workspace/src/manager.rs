// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace lifecycle: allocation, leasing, quota eviction, and cleanup.
//!
//! A workspace is a UUID-named directory directly under the configured
//! root, created owner-only. Leases are an in-memory count guarding
//! against eviction of directories a worker currently operates in; the
//! durable part of a workspace (path, timestamps, size, dirty flag) lives
//! in the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use gitbay_config::model::WorkspaceConfig;
use gitbay_core::{CleanupStrategy, DiskSpace, ErrorKind, GitBayError, WorkspaceRecord};
use gitbay_storage::SqliteStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::paths;

/// Aggregate disk usage report.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceUsage {
    pub workspace_count: u64,
    pub total_size_bytes: u64,
    pub quota_bytes: u64,
    pub usage_percent: f64,
}

/// Manager for isolated git workspaces.
pub struct WorkspaceManager {
    store: Arc<SqliteStore>,
    config: WorkspaceConfig,
    strategy: CleanupStrategy,
    root: PathBuf,
    leases: Mutex<HashMap<Uuid, usize>>,
}

impl WorkspaceManager {
    /// Create the manager, ensuring the root directory exists.
    pub fn new(store: Arc<SqliteStore>, config: WorkspaceConfig) -> Result<Self, GitBayError> {
        std::fs::create_dir_all(&config.root).map_err(|e| {
            GitBayError::new(
                ErrorKind::System,
                format!("cannot create workspace root {}: {e}", config.root.display()),
            )
        })?;
        let root = config.root.canonicalize().map_err(|e| {
            GitBayError::new(
                ErrorKind::System,
                format!("cannot resolve workspace root: {e}"),
            )
        })?;
        let strategy = CleanupStrategy::from_str(&config.cleanup_strategy)
            .unwrap_or(CleanupStrategy::Lru);

        Ok(Self {
            store,
            config,
            strategy,
            root,
            leases: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn strategy(&self) -> CleanupStrategy {
        self.strategy
    }

    /// Allocate a new workspace directory, owner-only, with its record
    /// inserted before the path is handed back.
    pub async fn allocate(&self) -> Result<WorkspaceRecord, GitBayError> {
        let total = self.store.workspace_total_size().await?;
        if total >= self.config.total_quota_bytes {
            return Err(GitBayError::new(
                ErrorKind::StorageFull,
                format!(
                    "workspace quota exhausted: {total} of {} bytes in use",
                    self.config.total_quota_bytes
                ),
            )
            .with_suggestion("release unused workspaces or raise the quota"));
        }

        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());
        create_private_dir(&path)?;

        let now = Utc::now();
        let record = WorkspaceRecord {
            id,
            path: path.clone(),
            created_at: now,
            last_accessed_at: now,
            size_bytes: 0,
            dirty: false,
        };
        if let Err(e) = self.store.insert_workspace(&record).await {
            let _ = std::fs::remove_dir_all(&path);
            return Err(e);
        }

        info!(workspace_id = %id, path = %path.display(), "workspace allocated");
        Ok(record)
    }

    /// Verify the workspace is intact, take a lease, and return its path.
    pub async fn acquire(&self, id: Uuid) -> Result<PathBuf, GitBayError> {
        let record = self.get_checked(id).await?;
        if record.dirty {
            return Err(GitBayError::new(
                ErrorKind::WorkspaceQuarantined,
                format!("workspace {id} is quarantined pending review"),
            ));
        }

        let canonical = record.path.canonicalize().map_err(|e| {
            GitBayError::new(ErrorKind::System, format!("cannot resolve workspace: {e}"))
        })?;
        if !canonical.starts_with(&self.root) {
            return Err(GitBayError::new(
                ErrorKind::PathEscape,
                format!("workspace {id} resolves outside the workspace root"),
            ));
        }

        {
            let mut leases = self.leases.lock().await;
            *leases.entry(id).or_insert(0) += 1;
        }
        self.store.touch_workspace(id, Utc::now()).await?;
        Ok(canonical)
    }

    /// Drop one lease. Directories are never deleted here; cleanup is the
    /// eviction policy's job.
    pub async fn release(&self, id: Uuid) {
        let mut leases = self.leases.lock().await;
        if let Some(count) = leases.get_mut(&id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                leases.remove(&id);
            }
        }
    }

    /// Update `last_accessed_at` only.
    pub async fn touch(&self, id: Uuid) -> Result<(), GitBayError> {
        self.get_checked(id).await?;
        self.store.touch_workspace(id, Utc::now()).await
    }

    /// Resolve an externally supplied relative path inside a workspace.
    pub fn resolve_path(&self, workspace: &Path, relative: &str) -> Result<PathBuf, GitBayError> {
        paths::safe_join(workspace, relative)
    }

    /// Quarantine a workspace after a missed cancel grace window.
    pub async fn quarantine(&self, id: Uuid) -> Result<(), GitBayError> {
        warn!(workspace_id = %id, "workspace quarantined");
        self.store.set_workspace_dirty(id, true).await
    }

    /// Delete a workspace directory and its record. Refused while leased.
    pub async fn delete(&self, id: Uuid) -> Result<bool, GitBayError> {
        if self.lease_count(id).await > 0 {
            return Err(GitBayError::new(
                ErrorKind::ResourceExhausted,
                format!("workspace {id} is leased by a running task"),
            ));
        }
        let Some(record) = self.store.get_workspace(id).await? else {
            return Ok(false);
        };
        remove_dir_best_effort(&record.path);
        self.store.delete_workspace(id).await?;
        info!(workspace_id = %id, "workspace deleted");
        Ok(true)
    }

    /// Re-measure a workspace's on-disk size and record the observation.
    pub async fn refresh_size(&self, id: Uuid) -> Result<u64, GitBayError> {
        let Some(record) = self.store.get_workspace(id).await? else {
            return Ok(0);
        };
        let path = record.path.clone();
        let size = tokio::task::spawn_blocking(move || directory_size(&path))
            .await
            .map_err(|e| GitBayError::internal(format!("size walk panicked: {e}")))?;
        self.store.update_workspace_size(id, size, Utc::now()).await?;
        Ok(size)
    }

    /// Enforce the per-workspace ceiling after an operation completes.
    ///
    /// Slightly over: log and keep. Over by more than 20%: delete the
    /// workspace outright. Returns whether the workspace survived.
    pub async fn enforce_size_limit(&self, id: Uuid) -> Result<bool, GitBayError> {
        let size = self.refresh_size(id).await?;
        let limit = self.config.per_workspace_limit();
        if size <= limit {
            return Ok(true);
        }
        if size as f64 > limit as f64 * 1.2 {
            warn!(workspace_id = %id, size, limit, "workspace exceeded size limit, deleting");
            self.delete(id).await?;
            return Ok(false);
        }
        warn!(workspace_id = %id, size, limit, "workspace approaching size limit");
        Ok(true)
    }

    /// Remove workspaces idle past the retention window. Leased and dirty
    /// workspaces are skipped. Returns (removed, freed bytes).
    pub async fn cleanup_expired(&self) -> Result<(usize, u64), GitBayError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.retention_seconds as i64);
        let idle = self.store.workspaces_idle_since(cutoff).await?;

        let mut removed = 0;
        let mut freed = 0u64;
        for ws in idle {
            if self.lease_count(ws.id).await > 0 {
                continue;
            }
            remove_dir_best_effort(&ws.path);
            self.store.delete_workspace(ws.id).await?;
            removed += 1;
            freed += ws.size_bytes;
        }

        if removed > 0 {
            info!(removed, freed, "expired workspaces cleaned up");
        }
        Ok((removed, freed))
    }

    /// Evict one workspace at a time, in strategy order, until total usage
    /// drops to 90% of the quota. No-op while under quota.
    pub async fn evict_until_under_quota(&self) -> Result<(usize, u64), GitBayError> {
        let quota = self.config.total_quota_bytes;
        let target = quota - quota / 10;
        let mut total = self.store.workspace_total_size().await?;
        if total <= quota {
            return Ok((0, 0));
        }

        let mut evicted = 0;
        let mut freed = 0u64;
        let candidates = self
            .store
            .workspace_eviction_candidates(self.strategy, 100)
            .await?;
        for ws in candidates {
            if total <= target {
                break;
            }
            if self.lease_count(ws.id).await > 0 {
                continue;
            }
            remove_dir_best_effort(&ws.path);
            self.store.delete_workspace(ws.id).await?;
            debug!(workspace_id = %ws.id, size = ws.size_bytes, strategy = %self.strategy, "workspace evicted");
            evicted += 1;
            freed += ws.size_bytes;
            total = total.saturating_sub(ws.size_bytes);
        }

        if evicted > 0 {
            info!(evicted, freed, "quota eviction pass complete");
        }
        Ok((evicted, freed))
    }

    /// List workspaces, reaping any whose directory vanished externally.
    pub async fn list(&self, limit: u32) -> Result<Vec<WorkspaceRecord>, GitBayError> {
        let mut out = Vec::new();
        for ws in self.store.list_workspaces(limit).await? {
            if ws.path.is_dir() {
                out.push(ws);
            } else {
                warn!(workspace_id = %ws.id, "workspace directory missing, reaping record");
                self.store.delete_workspace(ws.id).await?;
            }
        }
        Ok(out)
    }

    /// Aggregate usage across all workspaces.
    pub async fn usage(&self) -> Result<WorkspaceUsage, GitBayError> {
        let total = self.store.workspace_total_size().await?;
        let count = self.store.workspace_count().await?;
        let quota = self.config.total_quota_bytes;
        Ok(WorkspaceUsage {
            workspace_count: count,
            total_size_bytes: total,
            quota_bytes: quota,
            usage_percent: if quota > 0 {
                total as f64 / quota as f64 * 100.0
            } else {
                0.0
            },
        })
    }

    /// Capacity of the filesystem hosting the workspace root.
    pub fn disk_space(&self) -> Result<DiskSpace, GitBayError> {
        filesystem_space(&self.root)
    }

    async fn lease_count(&self, id: Uuid) -> usize {
        self.leases.lock().await.get(&id).copied().unwrap_or(0)
    }

    /// Fetch a record, reaping it if the directory was removed externally.
    async fn get_checked(&self, id: Uuid) -> Result<WorkspaceRecord, GitBayError> {
        let Some(record) = self.store.get_workspace(id).await? else {
            return Err(not_found(id));
        };
        if !record.path.is_dir() {
            warn!(workspace_id = %id, "workspace directory missing, reaping record");
            self.store.delete_workspace(id).await?;
            return Err(not_found(id));
        }
        Ok(record)
    }
}

fn not_found(id: Uuid) -> GitBayError {
    GitBayError::new(
        ErrorKind::WorkspaceNotFound,
        format!("workspace {id} not found"),
    )
    .with_suggestion("allocate a new workspace")
}

/// Create a directory with owner-only permissions.
fn create_private_dir(path: &Path) -> Result<(), GitBayError> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|e| {
        GitBayError::new(
            ErrorKind::System,
            format!("cannot create workspace {}: {e}", path.display()),
        )
    })
}

fn remove_dir_best_effort(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove workspace directory");
        }
    }
}

/// Recursive on-disk size of a directory, ignoring unreadable entries.
fn directory_size(path: &Path) -> u64 {
    let mut total = 0;
    let Ok(entries) = std::fs::read_dir(path) else {
        return 0;
    };
    for entry in entries.flatten() {
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            total += directory_size(&entry.path());
        } else {
            total += meta.len();
        }
    }
    total
}

#[cfg(unix)]
fn filesystem_space(path: &Path) -> Result<DiskSpace, GitBayError> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|e| GitBayError::new(ErrorKind::System, format!("bad path: {e}")))?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return Err(GitBayError::new(
            ErrorKind::System,
            format!("statvfs failed: {}", std::io::Error::last_os_error()),
        ));
    }
    Ok(DiskSpace {
        total_bytes: stats.f_blocks as u64 * stats.f_frsize as u64,
        free_bytes: stats.f_bavail as u64 * stats.f_frsize as u64,
    })
}

#[cfg(not(unix))]
fn filesystem_space(_path: &Path) -> Result<DiskSpace, GitBayError> {
    Ok(DiskSpace {
        total_bytes: 0,
        free_bytes: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup(config_mut: impl FnOnce(&mut WorkspaceConfig)) -> (Arc<WorkspaceManager>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("ws.db").to_str().unwrap(), 3)
                .await
                .unwrap(),
        );
        let mut config = WorkspaceConfig {
            root: dir.path().join("workspaces"),
            ..WorkspaceConfig::default()
        };
        config_mut(&mut config);
        let manager = Arc::new(WorkspaceManager::new(store, config).unwrap());
        (manager, dir)
    }

    #[tokio::test]
    async fn allocate_creates_directory_under_root() {
        let (manager, _dir) = setup(|_| {}).await;
        let ws = manager.allocate().await.unwrap();
        assert!(ws.path.is_dir());
        assert!(ws.path.starts_with(manager.root()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&ws.path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[tokio::test]
    async fn acquire_release_round_trip() {
        let (manager, _dir) = setup(|_| {}).await;
        let ws = manager.allocate().await.unwrap();

        let path = manager.acquire(ws.id).await.unwrap();
        assert_eq!(path.parent().unwrap(), manager.root());

        manager.release(ws.id).await;
        assert_eq!(manager.lease_count(ws.id).await, 0);
    }

    #[tokio::test]
    async fn acquire_unknown_returns_not_found() {
        let (manager, _dir) = setup(|_| {}).await;
        let err = manager.acquire(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkspaceNotFound);
    }

    #[tokio::test]
    async fn externally_removed_directory_is_reaped_on_touch() {
        let (manager, _dir) = setup(|_| {}).await;
        let ws = manager.allocate().await.unwrap();
        std::fs::remove_dir_all(&ws.path).unwrap();

        let err = manager.touch(ws.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkspaceNotFound);
        // The record is gone too.
        let err = manager.acquire(ws.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkspaceNotFound);
    }

    #[tokio::test]
    async fn delete_removes_directory_and_refuses_leased() {
        let (manager, _dir) = setup(|_| {}).await;
        let ws = manager.allocate().await.unwrap();
        let path = manager.acquire(ws.id).await.unwrap();

        let err = manager.delete(ws.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ResourceExhausted);

        manager.release(ws.id).await;
        assert!(manager.delete(ws.id).await.unwrap());
        assert!(!path.exists());
        let err = manager.acquire(ws.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkspaceNotFound);
    }

    #[tokio::test]
    async fn allocate_fails_when_quota_exhausted() {
        let (manager, _dir) = setup(|c| c.total_quota_bytes = 100).await;
        let ws = manager.allocate().await.unwrap();
        std::fs::write(ws.path.join("blob"), vec![0u8; 4096]).unwrap();
        manager.refresh_size(ws.id).await.unwrap();

        let err = manager.allocate().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::StorageFull);
    }

    #[tokio::test]
    async fn eviction_skips_leased_and_stops_under_target() {
        let (manager, _dir) = setup(|c| c.total_quota_bytes = 10_000).await;

        let leased = manager.allocate().await.unwrap();
        std::fs::write(leased.path.join("blob"), vec![0u8; 8000]).unwrap();
        manager.refresh_size(leased.id).await.unwrap();
        manager.acquire(leased.id).await.unwrap();

        let old = manager.allocate().await.unwrap();
        std::fs::write(old.path.join("blob"), vec![0u8; 8000]).unwrap();
        manager.refresh_size(old.id).await.unwrap();
        // Make the unleased workspace the LRU victim.
        manager
            .store
            .touch_workspace(old.id, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        let (evicted, _freed) = manager.evict_until_under_quota().await.unwrap();
        assert_eq!(evicted, 1);
        assert!(manager.store.get_workspace(old.id).await.unwrap().is_none());
        assert!(manager.store.get_workspace(leased.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_expired_removes_idle_unleased_workspaces() {
        let (manager, _dir) = setup(|c| c.retention_seconds = 60).await;
        let ws = manager.allocate().await.unwrap();
        manager
            .store
            .touch_workspace(ws.id, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        let (removed, _) = manager.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!ws.path.exists());
    }

    #[tokio::test]
    async fn quarantined_workspace_cannot_be_acquired_or_evicted() {
        let (manager, _dir) = setup(|c| c.retention_seconds = 1).await;
        let ws = manager.allocate().await.unwrap();
        manager.quarantine(ws.id).await.unwrap();

        let err = manager.acquire(ws.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WorkspaceQuarantined);

        manager
            .store
            .touch_workspace(ws.id, Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();
        let (removed, _) = manager.cleanup_expired().await.unwrap();
        assert_eq!(removed, 0);
        assert!(ws.path.exists());
    }

    #[tokio::test]
    async fn usage_and_disk_space_report() {
        let (manager, _dir) = setup(|_| {}).await;
        manager.allocate().await.unwrap();

        let usage = manager.usage().await.unwrap();
        assert_eq!(usage.workspace_count, 1);
        assert_eq!(usage.quota_bytes, WorkspaceConfig::default().total_quota_bytes);

        #[cfg(unix)]
        {
            let disk = manager.disk_space().unwrap();
            assert!(disk.total_bytes > 0);
        }
    }
}
