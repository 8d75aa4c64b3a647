// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock git adapter for deterministic testing.
//!
//! `MockGitAdapter` implements `GitAdapter` with a scripted FIFO of
//! behaviors, enabling fast, CI-runnable tests of the execution core
//! without a git binary or network: injected failures for retry tests,
//! slow operations for timeout tests, and hang-until-cancelled for
//! cancellation tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gitbay_core::{ErrorKind, GitAdapter, GitBayError, OperationContext};
use tokio::sync::Mutex;

/// One scripted adapter behavior, consumed per call.
pub enum ScriptedCall {
    /// Return this payload immediately.
    Succeed(serde_json::Value),
    /// Fail with this error kind.
    Fail(ErrorKind),
    /// Report progress steps, sleeping between them, then succeed.
    SucceedSlowly {
        step_delay: Duration,
        steps: Vec<u8>,
        payload: serde_json::Value,
    },
    /// Block until the cancellation token fires, then return cancelled.
    HangUntilCancelled,
    /// Ignore cancellation and sleep; exercises the grace-window path.
    HangIgnoringCancel(Duration),
    /// Panic; exercises worker panic isolation.
    Panic,
}

/// A mock adapter that pops scripted behaviors from a FIFO queue.
///
/// When the script is empty, calls succeed with an empty object. Every
/// invocation's operation name is recorded for assertions.
pub struct MockGitAdapter {
    script: Mutex<VecDeque<ScriptedCall>>,
    calls: Mutex<Vec<String>>,
}

impl MockGitAdapter {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(script: Vec<ScriptedCall>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from(script)),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Append a behavior to the script.
    pub async fn push(&self, call: ScriptedCall) {
        self.script.lock().await.push_back(call);
    }

    /// Operations executed so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

impl Default for MockGitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitAdapter for MockGitAdapter {
    fn name(&self) -> &str {
        "mock-git"
    }

    async fn execute(&self, ctx: OperationContext) -> Result<serde_json::Value, GitBayError> {
        self.calls.lock().await.push(ctx.operation.to_string());

        let next = self.script.lock().await.pop_front();
        match next {
            None => Ok(serde_json::json!({})),
            Some(ScriptedCall::Succeed(payload)) => {
                ctx.progress.report(100);
                Ok(payload)
            }
            Some(ScriptedCall::Fail(kind)) => {
                Err(GitBayError::new(kind, format!("scripted {kind} failure")))
            }
            Some(ScriptedCall::SucceedSlowly {
                step_delay,
                steps,
                payload,
            }) => {
                for step in steps {
                    tokio::select! {
                        _ = tokio::time::sleep(step_delay) => ctx.progress.report(step),
                        _ = ctx.cancel.cancelled() => {
                            return Err(GitBayError::new(
                                ErrorKind::TaskCancelled,
                                "operation cancelled",
                            ));
                        }
                    }
                }
                Ok(payload)
            }
            Some(ScriptedCall::HangUntilCancelled) => {
                ctx.cancel.cancelled().await;
                Err(GitBayError::new(
                    ErrorKind::TaskCancelled,
                    "operation cancelled",
                ))
            }
            Some(ScriptedCall::HangIgnoringCancel(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(serde_json::json!({}))
            }
            Some(ScriptedCall::Panic) => panic!("scripted adapter panic"),
        }
    }
}
