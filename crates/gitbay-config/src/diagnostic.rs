// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration error diagnostics with actionable messages.

use thiserror::Error;

/// Errors surfaced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A semantic validation failure after successful deserialization.
    #[error("invalid configuration: {message}")]
    Validation { message: String },

    /// Figment failed to merge or extract the configuration.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Render a list of validation errors as one operator-facing report.
pub fn render_errors(errors: &[ConfigError]) -> String {
    let mut out = String::from("configuration is invalid:\n");
    for err in errors {
        out.push_str("  - ");
        out.push_str(&err.to_string());
        out.push('\n');
    }
    out
}
