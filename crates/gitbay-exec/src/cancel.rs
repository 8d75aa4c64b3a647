// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-task cancellation tokens.
//!
//! One token per live task, created at submission, fired idempotently by
//! `cancel()` and the timeout sweeper, removed when the task reaches a
//! terminal state.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
pub struct CancelRegistry {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for a task, created on first use. Tasks recovered from a
    /// previous process get their token lazily at claim time.
    pub fn token(&self, id: Uuid) -> CancellationToken {
        let Ok(mut tokens) = self.tokens.lock() else {
            return CancellationToken::new();
        };
        tokens.entry(id).or_default().clone()
    }

    /// Fire a task's cancel signal. Idempotent; a no-op for unknown ids
    /// returns false.
    pub fn fire(&self, id: Uuid) -> bool {
        let Ok(tokens) = self.tokens.lock() else {
            return false;
        };
        match tokens.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Drop a terminal task's token.
    pub fn remove(&self, id: Uuid) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
