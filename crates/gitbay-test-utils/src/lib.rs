// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the gitbay workspace.

pub mod mock_adapter;

pub use mock_adapter::{MockGitAdapter, ScriptedCall};
