// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI-backed git adapter for the gitbay service.
//!
//! Implements the [`gitbay_core::GitAdapter`] contract by spawning the
//! `git` binary with a scrubbed environment, askpass-based credential
//! injection, stderr progress parsing, and cancellation-safe rollback for
//! clone and merge-family operations.

pub mod adapter;
pub mod auth;
pub mod ops;
pub mod runner;

pub use adapter::CliGitAdapter;
