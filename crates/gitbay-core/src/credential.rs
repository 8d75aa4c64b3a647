// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential value types.
//!
//! The types are defined here for use across adapter trait boundaries;
//! resolution and lifecycle live in `gitbay-credentials`. Secret fields are
//! [`SecretString`], so the backing memory is zeroized when the last handle
//! drops, and neither `Debug` nor serialization can leak the value.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Authentication method, in default resolution priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Token,
    SshAgent,
    SshKey,
    UsernamePassword,
}

/// A git credential. In-memory only; never serialized.
pub enum Credential {
    Token(SecretString),
    UsernamePassword {
        username: String,
        password: SecretString,
    },
    SshKey {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
    SshAgent,
}

impl Credential {
    pub fn auth_type(&self) -> AuthType {
        match self {
            Credential::Token(_) => AuthType::Token,
            Credential::UsernamePassword { .. } => AuthType::UsernamePassword,
            Credential::SshKey { .. } => AuthType::SshKey,
            Credential::SshAgent => AuthType::SshAgent,
        }
    }

    /// Username for basic-auth transports. Tokens use the conventional
    /// `git` placeholder accepted by the major forges.
    pub fn username(&self) -> Option<&str> {
        match self {
            Credential::Token(_) => Some("git"),
            Credential::UsernamePassword { username, .. } => Some(username),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Credential::Token(<REDACTED>)"),
            Credential::UsernamePassword { username, .. } => f
                .debug_struct("Credential::UsernamePassword")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            Credential::SshKey { path, passphrase } => f
                .debug_struct("Credential::SshKey")
                .field("path", path)
                .field(
                    "passphrase",
                    &passphrase.as_ref().map(|_| "<REDACTED>"),
                )
                .finish(),
            Credential::SshAgent => f.write_str("Credential::SshAgent"),
        }
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<REDACTED {} credential>", self.auth_type())
    }
}

/// A refcounted, scoped handle to a resolved credential.
///
/// Cloning shares the underlying value; when the last clone drops, the
/// secret memory is zeroized by the `SecretString` fields.
#[derive(Clone)]
pub struct CredentialHandle {
    inner: Arc<Credential>,
}

impl CredentialHandle {
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: Arc::new(credential),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.inner
    }

    pub fn auth_type(&self) -> AuthType {
        self.inner.auth_type()
    }
}

impl std::fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialHandle({:?})", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_secret_material() {
        let cred = Credential::Token(SecretString::from("ghp_supersecrettoken123".to_string()));
        let debug = format!("{cred:?}");
        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains("supersecret"));

        let cred = Credential::UsernamePassword {
            username: "alice".to_string(),
            password: SecretString::from("hunter2hunter2".to_string()),
        };
        let debug = format!("{cred:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn display_redacts() {
        let cred = Credential::Token(SecretString::from("tok".to_string()));
        assert_eq!(cred.to_string(), "<REDACTED token credential>");
    }

    #[test]
    fn token_username_is_git() {
        let cred = Credential::Token(SecretString::from("tok".to_string()));
        assert_eq!(cred.username(), Some("git"));
        assert_eq!(Credential::SshAgent.username(), None);
    }

    #[test]
    fn handle_clone_shares_value() {
        let handle = CredentialHandle::new(Credential::SshAgent);
        let clone = handle.clone();
        assert_eq!(clone.auth_type(), AuthType::SshAgent);
        assert_eq!(handle.auth_type(), AuthType::SshAgent);
    }
}
