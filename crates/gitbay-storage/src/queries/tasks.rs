// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task record operations.
//!
//! State transitions are guarded in SQL: every terminal write carries a
//! `WHERE status IN (...)` clause, so a terminal record can never be
//! overwritten regardless of interleaving. Callers learn whether their
//! transition won from the returned boolean.

use chrono::{DateTime, Utc};
use gitbay_core::{GitBayError, GitOperation, TaskRecord, TaskStatus};
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::database::{map_tr_err, Database};
use crate::row;

const TASK_COLUMNS: &str = "id, operation, params, workspace_id, status, progress, result, \
                            error, attempt, created_at, started_at, completed_at, deadline";

fn task_from_row(r: &Row<'_>) -> Result<TaskRecord, rusqlite::Error> {
    let error_json = row::parse_json_opt(7, r.get(7)?)?;
    let error = error_json
        .map(serde_json::from_value::<GitBayError>)
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(TaskRecord {
        id: row::parse_uuid(0, r.get(0)?)?,
        operation: row::parse_enum::<GitOperation>(1, r.get(1)?)?,
        params: row::parse_json(2, r.get(2)?)?,
        workspace_id: r
            .get::<_, Option<String>>(3)?
            .map(|s| row::parse_uuid(3, s))
            .transpose()?,
        status: row::parse_enum::<TaskStatus>(4, r.get(4)?)?,
        progress: r.get::<_, i64>(5)? as u8,
        result: row::parse_json_opt(6, r.get(6)?)?,
        error,
        attempt: r.get::<_, i64>(8)? as u32,
        created_at: r.get(9)?,
        started_at: r.get(10)?,
        completed_at: r.get(11)?,
        deadline: r.get(12)?,
    })
}

/// Insert a freshly created task record.
pub async fn insert(db: &Database, task: &TaskRecord) -> Result<(), GitBayError> {
    let task = task.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, operation, params, workspace_id, status, progress,
                                    result, error, attempt, created_at, started_at,
                                    completed_at, deadline)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    task.id.to_string(),
                    task.operation.to_string(),
                    task.params.to_string(),
                    task.workspace_id.map(|id| id.to_string()),
                    task.status.to_string(),
                    task.progress as i64,
                    task.result.as_ref().map(|v| v.to_string()),
                    task.error
                        .as_ref()
                        .map(|e| serde_json::to_string(e).unwrap_or_default()),
                    task.attempt as i64,
                    task.created_at,
                    task.started_at,
                    task.completed_at,
                    task.deadline,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a task by id.
pub async fn get(db: &Database, id: Uuid) -> Result<Option<TaskRecord>, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"
            ))?;
            match stmt.query_row(params![id], task_from_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List tasks, optionally filtered by status, newest first.
pub async fn list(
    db: &Database,
    status: Option<TaskStatus>,
    limit: u32,
) -> Result<Vec<TaskRecord>, GitBayError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut tasks = Vec::new();
            match &status {
                Some(filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1
                         ORDER BY created_at DESC LIMIT ?2"
                    ))?;
                    let rows = stmt.query_map(params![filter, limit], task_from_row)?;
                    for r in rows {
                        tasks.push(r?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks
                         ORDER BY created_at DESC LIMIT ?1"
                    ))?;
                    let rows = stmt.query_map(params![limit], task_from_row)?;
                    for r in rows {
                        tasks.push(r?);
                    }
                }
            }
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition queued -> running, setting `started_at`.
///
/// Returns false if the task was no longer queued (already cancelled, or
/// claimed by another worker).
pub async fn mark_running(
    db: &Database,
    id: Uuid,
    started_at: DateTime<Utc>,
) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'running', started_at = ?1, progress = 0
                 WHERE id = ?2 AND status = 'queued'",
                params![started_at, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Update progress for a running task. Progress only ever moves forward.
pub async fn update_progress(db: &Database, id: Uuid, progress: u8) -> Result<(), GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE tasks SET progress = ?1
                 WHERE id = ?2 AND status = 'running' AND progress < ?1",
                params![progress as i64, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Terminal write: running -> completed, with result payload, progress 100,
/// and `completed_at`, in one statement.
pub async fn complete(
    db: &Database,
    id: Uuid,
    result: &serde_json::Value,
    completed_at: DateTime<Utc>,
) -> Result<bool, GitBayError> {
    let id = id.to_string();
    let result = result.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'completed', result = ?1, progress = 100,
                                  completed_at = ?2, error = NULL
                 WHERE id = ?3 AND status = 'running'",
                params![result, completed_at, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Terminal write for a failure, cancellation, or timeout.
///
/// Accepts the transition from either live state so crash recovery and
/// queued-task cancellation share the same path.
pub async fn finish_with_error(
    db: &Database,
    id: Uuid,
    status: TaskStatus,
    error: &GitBayError,
    completed_at: DateTime<Utc>,
) -> Result<bool, GitBayError> {
    debug_assert!(status.is_terminal());
    let id = id.to_string();
    let status = status.to_string();
    let error = serde_json::to_string(error).map_err(GitBayError::storage)?;
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = ?1, error = ?2, completed_at = ?3
                 WHERE id = ?4 AND status IN ('queued', 'running')",
                params![status, error, completed_at, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Tombstone a queued task as cancelled without an error payload.
pub async fn cancel_queued(
    db: &Database,
    id: Uuid,
    completed_at: DateTime<Utc>,
) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'cancelled', completed_at = ?1
                 WHERE id = ?2 AND status = 'queued'",
                params![completed_at, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Terminal write for a clean cancellation of a running task: no error
/// payload, because the adapter rolled the workspace back.
pub async fn cancel_running(
    db: &Database,
    id: Uuid,
    completed_at: DateTime<Utc>,
) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'cancelled', completed_at = ?1
                 WHERE id = ?2 AND status = 'running'",
                params![completed_at, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Put a failed-but-retryable task back in the queue: increments the
/// attempt counter and resets progress for the next run.
pub async fn requeue_for_retry(db: &Database, id: Uuid) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'queued', attempt = attempt + 1,
                                  progress = 0, started_at = NULL
                 WHERE id = ?1 AND status = 'running'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Running tasks whose deadline has passed.
pub async fn running_past_deadline(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<TaskRecord>, GitBayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE status = 'running' AND deadline < ?1"
            ))?;
            let rows = stmt.query_map(params![now], task_from_row)?;
            let mut tasks = Vec::new();
            for r in rows {
                tasks.push(r?);
            }
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// All tasks currently in running state (used by crash recovery).
pub async fn list_running(db: &Database) -> Result<Vec<TaskRecord>, GitBayError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'running'"
            ))?;
            let rows = stmt.query_map([], task_from_row)?;
            let mut tasks = Vec::new();
            for r in rows {
                tasks.push(r?);
            }
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// Requeue a crashed task for a fresh run without burning an attempt.
pub async fn requeue_interrupted(db: &Database, id: Uuid) -> Result<bool, GitBayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE tasks SET status = 'queued', progress = 0, started_at = NULL
                 WHERE id = ?1 AND status = 'running'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete terminal tasks whose completion is older than `cutoff`.
/// Returns how many records were removed.
pub async fn delete_terminal_older_than(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<usize, GitBayError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM tasks
                 WHERE status IN ('completed', 'failed', 'cancelled', 'timed_out')
                   AND completed_at IS NOT NULL AND completed_at < ?1",
                params![cutoff],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of tasks in the given status.
pub async fn count_by_status(db: &Database, status: TaskStatus) -> Result<u64, GitBayError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE status = ?1",
                params![status],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(map_tr_err)
}
