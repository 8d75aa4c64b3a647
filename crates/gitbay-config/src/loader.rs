// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./gitbay.toml` > `~/.config/gitbay/gitbay.toml`
//! > `/etc/gitbay/gitbay.toml` with environment variable overrides via the
//! `GITBAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::GitbayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gitbay/gitbay.toml` (system-wide)
/// 3. `~/.config/gitbay/gitbay.toml` (user XDG config)
/// 4. `./gitbay.toml` (local directory)
/// 5. `GITBAY_*` environment variables
pub fn load_config() -> Result<GitbayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GitbayConfig::default()))
        .merge(Toml::file("/etc/gitbay/gitbay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gitbay/gitbay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("gitbay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from inline TOML only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<GitbayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GitbayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GitbayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GitbayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `GITBAY_WORKSPACE_TOTAL_QUOTA_BYTES`
/// must map to `workspace.total_quota_bytes`, not `workspace.total.quota.bytes`.
fn env_provider() -> Env {
    Env::prefixed("GITBAY_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: GITBAY_WORKSPACE_ROOT -> "workspace_root"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("workspace_", "workspace.", 1)
            .replacen("execution_", "execution.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("rate_limit_", "rate_limit.", 1)
            .replacen("git_", "git.", 1)
            .replacen("server_", "server.", 1);
        mapped.into()
    })
}
