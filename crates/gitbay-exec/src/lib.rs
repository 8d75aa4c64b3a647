// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous execution core for the gitbay service.
//!
//! A bounded FIFO [`TaskQueue`], a supervised [`WorkerPool`] driving the
//! git adapter with cancellation and throttled progress, and the
//! [`TaskManager`] facade that ties submission, synchronous execution,
//! cancellation, timeout sweeping, and retention GC together.

pub mod backoff;
pub mod cancel;
pub mod manager;
pub mod progress;
pub mod queue;
pub mod rate_limit;
pub mod worker;

pub use cancel::CancelRegistry;
pub use manager::TaskManager;
pub use queue::TaskQueue;
pub use rate_limit::RateLimiter;
pub use worker::{ExecContext, WorkerPool};
