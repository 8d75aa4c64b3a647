// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as strategy names, non-zero pool sizes, and sane
//! timeout relationships.

use crate::diagnostic::ConfigError;
use crate::model::GitbayConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &GitbayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.workspace.root.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "workspace.root must not be empty".to_string(),
        });
    }

    match config.workspace.cleanup_strategy.as_str() {
        "lru" | "fifo" => {}
        other => errors.push(ConfigError::Validation {
            message: format!(
                "workspace.cleanup_strategy must be `lru` or `fifo`, got `{other}`"
            ),
        }),
    }

    if config.workspace.total_quota_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "workspace.total_quota_bytes must be greater than zero".to_string(),
        });
    }

    if let Some(per) = config.workspace.max_per_workspace_bytes {
        if per > config.workspace.total_quota_bytes {
            errors.push(ConfigError::Validation {
                message: format!(
                    "workspace.max_per_workspace_bytes ({per}) exceeds total_quota_bytes ({})",
                    config.workspace.total_quota_bytes
                ),
            });
        }
    }

    // Worker count of zero is allowed (drain-only mode used in tests),
    // but the permit count is not.
    if config.execution.max_concurrent_tasks == 0 {
        errors.push(ConfigError::Validation {
            message: "execution.max_concurrent_tasks must be at least 1".to_string(),
        });
    }

    if config.execution.queue_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "execution.queue_capacity must be at least 1".to_string(),
        });
    }

    if config.execution.task_timeout_seconds == 0 {
        errors.push(ConfigError::Validation {
            message: "execution.task_timeout_seconds must be at least 1".to_string(),
        });
    }

    if config.execution.retry_base_delay_ms > config.execution.retry_max_backoff_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "execution.retry_base_delay_ms ({}) exceeds retry_max_backoff_ms ({})",
                config.execution.retry_base_delay_ms, config.execution.retry_max_backoff_ms
            ),
        });
    }

    match config.execution.recover_policy.as_str() {
        "fail" | "requeue" => {}
        other => errors.push(ConfigError::Validation {
            message: format!(
                "execution.recover_policy must be `fail` or `requeue`, got `{other}`"
            ),
        }),
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.rate_limit.requests == 0 {
        errors.push(ConfigError::Validation {
            message: "rate_limit.requests must be at least 1".to_string(),
        });
    }

    if config.rate_limit.window_seconds == 0 {
        errors.push(ConfigError::Validation {
            message: "rate_limit.window_seconds must be at least 1".to_string(),
        });
    }

    for method in &config.git.auth_priority {
        match method.as_str() {
            "token" | "ssh_agent" | "ssh_key" | "username_password" => {}
            other => errors.push(ConfigError::Validation {
                message: format!(
                    "git.auth_priority entry `{other}` is not a known auth method"
                ),
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = GitbayConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn bad_cleanup_strategy_fails_validation() {
        let mut config = GitbayConfig::default();
        config.workspace.cleanup_strategy = "mru".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("cleanup_strategy"))));
    }

    #[test]
    fn zero_permits_fails_validation() {
        let mut config = GitbayConfig::default();
        config.execution.max_concurrent_tasks = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_concurrent_tasks"))));
    }

    #[test]
    fn zero_worker_count_is_allowed() {
        let mut config = GitbayConfig::default();
        config.execution.worker_count = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn per_workspace_limit_above_quota_fails() {
        let mut config = GitbayConfig::default();
        config.workspace.total_quota_bytes = 1024;
        config.workspace.max_per_workspace_bytes = Some(2048);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("max_per_workspace_bytes"))));
    }

    #[test]
    fn unknown_auth_priority_entry_fails() {
        let mut config = GitbayConfig::default();
        config.git.auth_priority = vec!["token".to_string(), "kerberos".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("kerberos"))));
    }

    #[test]
    fn inverted_backoff_bounds_fail() {
        let mut config = GitbayConfig::default();
        config.execution.retry_base_delay_ms = 120_000;
        config.execution.retry_max_backoff_ms = 60_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("retry_base_delay_ms"))));
    }
}
