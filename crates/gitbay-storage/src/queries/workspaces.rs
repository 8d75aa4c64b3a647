// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace metadata operations.

use chrono::{DateTime, Utc};
use gitbay_core::{CleanupStrategy, GitBayError, WorkspaceRecord};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::database::{map_tr_err, Database};
use crate::row;

const WS_COLUMNS: &str = "id, path, created_at, last_accessed_at, size_bytes, dirty";

fn workspace_from_row(r: &Row<'_>) -> Result<WorkspaceRecord, rusqlite::Error> {
    Ok(WorkspaceRecord {
        id: row::parse_uuid(0, r.get(0)?)?,
        path: std::path::PathBuf::from(r.get::<_, String>(1)?),
        created_at: r.get(2)?,
        last_accessed_at: r.get(3)?,
        size_bytes: r.get::<_, i64>(4)? as u64,
        dirty: r.get::<_, i64>(5)? != 0,
    })
}

/// Insert a workspace record. The UNIQUE constraint on `path` upholds the
/// no-shared-paths invariant.
pub async fn insert(db: &Database, ws: &WorkspaceRecord) -> Result<(), GitBayError> {
    let ws = ws.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO workspaces (id, path, created_at, last_accessed_at, size_bytes, dirty)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ws.id.to_string(),
                    ws.path.to_string_lossy(),
                    ws.created_at,
                    ws.last_accessed_at,
                    ws.size_bytes as i64,
                    ws.dirty as i64,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a workspace by id.
pub async fn get(db: &Database, id: Uuid) -> Result<Option<WorkspaceRecord>, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WS_COLUMNS} FROM workspaces WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], workspace_from_row) {
                Ok(ws) => Ok(Some(ws)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List workspaces, most recently accessed first.
pub async fn list(db: &Database, limit: u32) -> Result<Vec<WorkspaceRecord>, GitBayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WS_COLUMNS} FROM workspaces
                 ORDER BY last_accessed_at DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], workspace_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Update `last_accessed_at`.
pub async fn touch(db: &Database, id: Uuid, at: DateTime<Utc>) -> Result<(), GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE workspaces SET last_accessed_at = ?1 WHERE id = ?2",
                params![at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a fresh on-disk size observation, also bumping the access time.
pub async fn update_size(
    db: &Database,
    id: Uuid,
    size_bytes: u64,
    at: DateTime<Utc>,
) -> Result<(), GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE workspaces SET size_bytes = ?1, last_accessed_at = ?2 WHERE id = ?3",
                params![size_bytes as i64, at, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Quarantine or clear the dirty flag.
pub async fn set_dirty(db: &Database, id: Uuid, dirty: bool) -> Result<(), GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE workspaces SET dirty = ?1 WHERE id = ?2",
                params![dirty as i64, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a workspace record. Returns whether a record existed.
pub async fn delete(db: &Database, id: Uuid) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Sum of last observed sizes across all workspaces.
pub async fn total_size(db: &Database) -> Result<u64, GitBayError> {
    db.connection()
        .call(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM workspaces",
                [],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of active workspace records.
pub async fn count(db: &Database) -> Result<u64, GitBayError> {
    db.connection()
        .call(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM workspaces", [], |r| r.get(0))?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Eviction candidates in strategy order, dirty workspaces excluded.
///
/// LRU orders by `last_accessed_at`, FIFO by `created_at`; ties break on id
/// so repeated passes see a stable order.
pub async fn eviction_candidates(
    db: &Database,
    strategy: CleanupStrategy,
    limit: u32,
) -> Result<Vec<WorkspaceRecord>, GitBayError> {
    let order_column = match strategy {
        CleanupStrategy::Lru => "last_accessed_at",
        CleanupStrategy::Fifo => "created_at",
    };
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WS_COLUMNS} FROM workspaces WHERE dirty = 0
                 ORDER BY {order_column} ASC, id ASC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], workspace_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Workspaces idle since before `cutoff`, dirty ones excluded.
pub async fn idle_since(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<WorkspaceRecord>, GitBayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WS_COLUMNS} FROM workspaces
                 WHERE dirty = 0 AND last_accessed_at < ?1"
            ))?;
            let rows = stmt.query_map(params![cutoff], workspace_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}
