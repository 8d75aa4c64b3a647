// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress plumbing between the adapter and the task record.
//!
//! The adapter reports percentages synchronously into a watch channel; a
//! writer task flushes the latest value to the store at most once per
//! throttle window. The store-side guard keeps recorded progress monotone
//! even if the adapter's raw stream is not.

use std::sync::Arc;
use std::time::Duration;

use gitbay_core::ProgressSink;
use gitbay_storage::SqliteStore;
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

/// Minimum spacing between task-record progress writes.
pub const PROGRESS_WRITE_INTERVAL: Duration = Duration::from_millis(250);

/// Watch-channel backed sink handed to the adapter.
pub struct WatchProgress {
    tx: watch::Sender<u8>,
}

impl WatchProgress {
    /// Returns the sink and the receiver the writer task consumes.
    pub fn channel() -> (Arc<Self>, watch::Receiver<u8>) {
        let (tx, rx) = watch::channel(0u8);
        (Arc::new(Self { tx }), rx)
    }
}

impl ProgressSink for WatchProgress {
    fn report(&self, percent: u8) {
        let percent = percent.min(100);
        // Keep the channel monotone; late or repeated reports are dropped.
        self.tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }
}

/// Flush progress observations to the store until the sink drops.
pub fn spawn_progress_writer(
    store: Arc<SqliteStore>,
    task_id: Uuid,
    mut rx: watch::Receiver<u8>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let percent = *rx.borrow_and_update();
            if let Err(e) = store.update_task_progress(task_id, percent).await {
                warn!(task_id = %task_id, error = %e, "progress write failed");
            }
            tokio::time::sleep(PROGRESS_WRITE_INTERVAL).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_is_monotone() {
        let (sink, rx) = WatchProgress::channel();
        sink.report(10);
        sink.report(40);
        sink.report(20);
        assert_eq!(*rx.borrow(), 40);
    }

    #[test]
    fn sink_clamps_to_100() {
        let (sink, rx) = WatchProgress::channel();
        sink.report(250);
        assert_eq!(*rx.borrow(), 100);
    }

    #[tokio::test]
    async fn writer_exits_when_sink_drops() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteStore::open(dir.path().join("p.db").to_str().unwrap(), 3)
                .await
                .unwrap(),
        );
        let (sink, rx) = WatchProgress::channel();
        let handle = spawn_progress_writer(store, Uuid::new_v4(), rx);

        drop(sink);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("writer should exit after sink drop")
            .unwrap();
    }
}
