// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded FIFO task queue.
//!
//! Strict FIFO by enqueue time, no priorities. Capacity is enforced with a
//! space semaphore: enqueue either fails fast with `QUEUE_FULL` or blocks,
//! chosen at construction. Dequeue blocks until an item or close; each item
//! wakes at most one waiting worker. After `close()` the remaining items
//! drain and workers then observe `None`.

use std::collections::VecDeque;
use std::sync::Mutex;

use gitbay_core::{ErrorKind, GitBayError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct TaskQueue {
    inner: Mutex<VecDeque<Uuid>>,
    /// One permit per queued item; acquire-one wakes exactly one worker.
    items: Semaphore,
    /// One permit per free slot.
    space: Semaphore,
    closed: CancellationToken,
    blocking: bool,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize, blocking: bool) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            items: Semaphore::new(0),
            space: Semaphore::new(capacity),
            closed: CancellationToken::new(),
            blocking,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Add a task reference at the tail.
    ///
    /// Fail-fast mode returns `QUEUE_FULL` at capacity; blocking mode waits
    /// for a slot (or for close).
    pub async fn enqueue(&self, id: Uuid) -> Result<(), GitBayError> {
        if self.is_closed() {
            return Err(queue_closed());
        }

        let permit = if self.blocking {
            tokio::select! {
                permit = self.space.acquire() => permit.map_err(|_| queue_closed())?,
                _ = self.closed.cancelled() => return Err(queue_closed()),
            }
        } else {
            self.space.try_acquire().map_err(|_| {
                GitBayError::new(
                    ErrorKind::QueueFull,
                    format!("task queue at capacity {}", self.capacity),
                )
                .with_suggestion("retry once queued tasks drain")
            })?
        };
        permit.forget();

        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(id);
        }
        self.items.add_permits(1);
        Ok(())
    }

    /// Take the oldest task reference, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained; workers use
    /// that as their exit signal.
    pub async fn dequeue(&self) -> Option<Uuid> {
        loop {
            // Drain-first: items already queued are served even after close.
            if let Ok(permit) = self.items.try_acquire() {
                permit.forget();
                if let Some(id) = self.pop_front() {
                    self.space.add_permits(1);
                    return Some(id);
                }
                continue;
            }

            if self.is_closed() {
                return None;
            }

            tokio::select! {
                permit = self.items.acquire() => {
                    if let Ok(permit) = permit {
                        permit.forget();
                        if let Some(id) = self.pop_front() {
                            self.space.add_permits(1);
                            return Some(id);
                        }
                    }
                }
                _ = self.closed.cancelled() => {}
            }
        }
    }

    /// Refuse further enqueues; queued items continue to drain.
    pub fn close(&self) {
        self.closed.cancel();
    }

    fn pop_front(&self) -> Option<Uuid> {
        self.inner.lock().ok().and_then(|mut q| q.pop_front())
    }
}

fn queue_closed() -> GitBayError {
    GitBayError::new(ErrorKind::QueueFull, "task queue is shut down")
}
