// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace management for the gitbay service.
//!
//! Allocates isolated, owner-only directories under a configured root,
//! tracks leases while workers operate in them, enforces aggregate and
//! per-workspace quotas with LRU/FIFO eviction, and defends every
//! externally supplied path against workspace escape.

pub mod manager;
pub mod paths;
pub mod sweeper;

pub use manager::{WorkspaceManager, WorkspaceUsage};
pub use paths::{is_safe_component, safe_join};
pub use sweeper::spawn_sweeper;
