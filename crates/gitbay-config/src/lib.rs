// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the gitbay service.
//!
//! Loads TOML files following the XDG hierarchy, applies `GITBAY_`-prefixed
//! environment overrides, and validates semantic constraints with
//! actionable diagnostics.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::ConfigError;
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::GitbayConfig;
pub use validation::validate_config;
