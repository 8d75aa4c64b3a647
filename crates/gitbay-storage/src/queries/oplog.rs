// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only operation log. Messages must be redacted before they
//! reach this module.

use gitbay_core::{GitBayError, LogLevel, OperationLogEntry};
use rusqlite::params;
use uuid::Uuid;

use crate::database::{map_tr_err, Database};
use crate::row;

/// Append one log entry.
pub async fn append(db: &Database, entry: &OperationLogEntry) -> Result<(), GitBayError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO operation_logs (task_id, level, message, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.task_id.to_string(),
                    entry.level.to_string(),
                    entry.message,
                    entry.timestamp,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Log entries for one task, oldest first.
pub async fn list_for_task(
    db: &Database,
    task_id: Uuid,
    limit: u32,
) -> Result<Vec<OperationLogEntry>, GitBayError> {
    let task_id_str = task_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, level, message, timestamp FROM operation_logs
                 WHERE task_id = ?1 ORDER BY id ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![task_id_str, limit], |r| {
                Ok(OperationLogEntry {
                    task_id: row::parse_uuid(0, r.get(0)?)?,
                    level: row::parse_enum::<LogLevel>(1, r.get(1)?)?,
                    message: r.get(2)?,
                    timestamp: r.get(3)?,
                })
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_and_list_preserve_order() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("oplog.db").to_str().unwrap())
            .await
            .unwrap();
        let task_id = Uuid::new_v4();

        for (level, msg) in [
            (LogLevel::Info, "clone started"),
            (LogLevel::Warn, "slow transfer"),
            (LogLevel::Info, "clone finished"),
        ] {
            append(
                &db,
                &OperationLogEntry {
                    task_id,
                    level,
                    message: msg.to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();
        }

        let entries = list_for_task(&db, task_id, 100).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "clone started");
        assert_eq!(entries[1].level, LogLevel::Warn);
        assert_eq!(entries[2].message, "clone finished");

        // Entries for other tasks stay invisible.
        let other = list_for_task(&db, Uuid::new_v4(), 100).await.unwrap();
        assert!(other.is_empty());

        db.close().await.unwrap();
    }
}
