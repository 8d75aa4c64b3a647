// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential management for gitbay git operations.
//!
//! Resolves the appropriate in-memory credential per operation and remote,
//! with a configurable priority order. Secret values never serialize, are
//! registered for log redaction at load time, and are zeroized when the
//! last handle drops.

pub mod manager;

pub use manager::CredentialManager;
