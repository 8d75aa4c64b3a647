// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential resolution with priority ordering and redaction registration.
//!
//! Credentials are loaded once at startup from configuration (which itself
//! merges `GITBAY_GIT_*` environment variables). Every secret value is
//! registered with the [`SecretRegistry`] before it can be used, so the
//! redaction contract holds for anything the process later logs or stores.
//! Handles are refcounted clones; the backing memory is zeroized when the
//! last reference drops.

use std::str::FromStr;

use gitbay_config::model::GitConfig;
use gitbay_core::{AuthType, Credential, CredentialHandle, GitOperation};
use gitbay_security::SecretRegistry;
use secrecy::SecretString;
use tracing::debug;

/// Default resolution priority when the config does not override it.
const DEFAULT_PRIORITY: [AuthType; 4] = [
    AuthType::Token,
    AuthType::SshAgent,
    AuthType::SshKey,
    AuthType::UsernamePassword,
];

/// Resolves the appropriate credential for an operation and remote.
pub struct CredentialManager {
    token: Option<CredentialHandle>,
    ssh_agent: Option<CredentialHandle>,
    ssh_key: Option<CredentialHandle>,
    username_password: Option<CredentialHandle>,
    priority: Vec<AuthType>,
    registry: SecretRegistry,
}

impl CredentialManager {
    /// Build the manager from configuration, registering every secret for
    /// redaction. `SSH_AUTH_SOCK` in the environment enables agent auth.
    pub fn from_config(git: &GitConfig, registry: SecretRegistry) -> Self {
        let token = git.token.as_ref().map(|t| {
            registry.register(t);
            CredentialHandle::new(Credential::Token(SecretString::from(t.clone())))
        });

        let username_password = match (&git.username, &git.password) {
            (Some(username), Some(password)) => {
                registry.register(password);
                Some(CredentialHandle::new(Credential::UsernamePassword {
                    username: username.clone(),
                    password: SecretString::from(password.clone()),
                }))
            }
            _ => None,
        };

        let ssh_key = git.ssh_key_path.as_ref().map(|path| {
            let passphrase = git.ssh_passphrase.as_ref().map(|p| {
                registry.register(p);
                SecretString::from(p.clone())
            });
            CredentialHandle::new(Credential::SshKey {
                path: path.clone(),
                passphrase,
            })
        });

        let ssh_agent = if std::env::var_os("SSH_AUTH_SOCK").is_some() {
            Some(CredentialHandle::new(Credential::SshAgent))
        } else {
            None
        };

        let priority = if git.auth_priority.is_empty() {
            DEFAULT_PRIORITY.to_vec()
        } else {
            git.auth_priority
                .iter()
                .filter_map(|s| AuthType::from_str(s).ok())
                .collect()
        };

        debug!(
            token = token.is_some(),
            ssh_agent = ssh_agent.is_some(),
            ssh_key = ssh_key.is_some(),
            username_password = username_password.is_some(),
            "credential sources loaded"
        );

        Self {
            token,
            ssh_agent,
            ssh_key,
            username_password,
            priority,
            registry,
        }
    }

    /// The redaction registry this manager feeds.
    pub fn registry(&self) -> &SecretRegistry {
        &self.registry
    }

    /// Resolve a credential for `operation` against `remote_url`.
    ///
    /// Sources incompatible with the URL's transport are skipped, then the
    /// configured priority picks among the rest. Returns `None` when no
    /// source is available; anonymous access is still valid for public
    /// remotes.
    pub fn resolve(
        &self,
        operation: GitOperation,
        remote_url: Option<&str>,
    ) -> Option<CredentialHandle> {
        if !operation.needs_credentials() {
            return None;
        }

        let transport = remote_url.map(Transport::of);
        for auth in &self.priority {
            if let Some(t) = transport {
                if !t.supports(*auth) {
                    continue;
                }
            }
            let handle = match auth {
                AuthType::Token => self.token.as_ref(),
                AuthType::SshAgent => self.ssh_agent.as_ref(),
                AuthType::SshKey => self.ssh_key.as_ref(),
                AuthType::UsernamePassword => self.username_password.as_ref(),
            };
            if let Some(handle) = handle {
                debug!(auth = %auth, operation = %operation, "credential resolved");
                return Some(handle.clone());
            }
        }
        None
    }
}

/// Remote transport inferred from the URL shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Https,
    Ssh,
    Local,
}

impl Transport {
    fn of(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            Transport::Https
        } else if url.starts_with("ssh://") || url.contains('@') {
            Transport::Ssh
        } else {
            Transport::Local
        }
    }

    fn supports(self, auth: AuthType) -> bool {
        match self {
            Transport::Https => matches!(auth, AuthType::Token | AuthType::UsernamePassword),
            Transport::Ssh => matches!(auth, AuthType::SshAgent | AuthType::SshKey),
            Transport::Local => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token() -> GitConfig {
        GitConfig {
            token: Some("ghp_testtoken1234567890abcdef".to_string()),
            ..GitConfig::default()
        }
    }

    #[test]
    fn token_wins_for_https() {
        let manager =
            CredentialManager::from_config(&config_with_token(), SecretRegistry::new());
        let handle = manager
            .resolve(GitOperation::Clone, Some("https://git.example/x.git"))
            .unwrap();
        assert_eq!(handle.auth_type(), AuthType::Token);
    }

    #[test]
    fn token_is_skipped_for_ssh_remotes() {
        let mut config = config_with_token();
        config.ssh_key_path = Some("/home/ci/.ssh/id_ed25519".into());
        let manager = CredentialManager::from_config(&config, SecretRegistry::new());
        let handle = manager
            .resolve(GitOperation::Push, Some("git@git.example:org/x.git"))
            .unwrap();
        assert_eq!(handle.auth_type(), AuthType::SshKey);
    }

    #[test]
    fn local_operations_resolve_nothing() {
        let manager =
            CredentialManager::from_config(&config_with_token(), SecretRegistry::new());
        assert!(manager.resolve(GitOperation::Commit, None).is_none());
        assert!(manager
            .resolve(GitOperation::Clone, Some("/srv/mirror/repo.git"))
            .is_none());
    }

    #[test]
    fn no_sources_resolves_none() {
        let manager = CredentialManager::from_config(&GitConfig::default(), SecretRegistry::new());
        // SSH agent may be present in the environment; restrict to https
        // where no source exists either way.
        assert!(manager
            .resolve(GitOperation::Fetch, Some("https://git.example/x.git"))
            .is_none());
    }

    #[test]
    fn priority_override_changes_selection() {
        let mut config = config_with_token();
        config.username = Some("ci".to_string());
        config.password = Some("basic-secret".to_string());
        config.auth_priority = vec!["username_password".to_string(), "token".to_string()];
        let manager = CredentialManager::from_config(&config, SecretRegistry::new());
        let handle = manager
            .resolve(GitOperation::Pull, Some("https://git.example/x.git"))
            .unwrap();
        assert_eq!(handle.auth_type(), AuthType::UsernamePassword);
    }

    #[test]
    fn secrets_are_registered_for_redaction() {
        let registry = SecretRegistry::new();
        let mut config = config_with_token();
        config.username = Some("ci".to_string());
        config.password = Some("basic-secret".to_string());
        let _manager = CredentialManager::from_config(&config, registry.clone());

        let redacted = registry.redact("token ghp_testtoken1234567890abcdef pw basic-secret");
        assert!(!redacted.contains("ghp_testtoken"));
        assert!(!redacted.contains("basic-secret"));
    }

    #[test]
    fn transport_detection() {
        assert_eq!(Transport::of("https://host/x.git"), Transport::Https);
        assert_eq!(Transport::of("ssh://git@host/x.git"), Transport::Ssh);
        assert_eq!(Transport::of("git@host:x.git"), Transport::Ssh);
        assert_eq!(Transport::of("/var/repos/x.git"), Transport::Local);
    }
}
