// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service assembly and tool handlers for the gitbay binary.
//!
//! Exposed as a library so integration tests (and embedders that bring
//! their own wire framing) can drive [`handlers::dispatch_tool`] against
//! a [`service::Service`] directly.

pub mod doctor;
pub mod handlers;
pub mod serve;
pub mod service;
pub mod tools;
