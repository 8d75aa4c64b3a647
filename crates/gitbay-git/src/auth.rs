// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-invocation credential injection.
//!
//! Secrets are handed to git through the askpass protocol and the child's
//! environment, never through argv (visible in the process table) and
//! never through on-disk git config. The askpass helper is a throwaway
//! owner-only script that echoes environment variables back to git; it is
//! removed when the invocation's [`AuthEnv`] drops.

use gitbay_core::{Credential, CredentialHandle, ErrorKind, GitBayError};
use secrecy::ExposeSecret;

const ASKPASS_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  Username*) printf '%s' "$GITBAY_ASKPASS_USERNAME" ;;
  *) printf '%s' "$GITBAY_ASKPASS_SECRET" ;;
esac
"#;

const SSH_ASKPASS_SCRIPT: &str = r#"#!/bin/sh
printf '%s' "$GITBAY_SSH_PASSPHRASE"
"#;

/// Environment prepared for one authenticated git invocation.
///
/// Holding this value keeps the askpass helper file alive; the secrets in
/// `envs` live only in the child's environment.
pub struct AuthEnv {
    pub envs: Vec<(String, String)>,
    _askpass: Option<tempfile::NamedTempFile>,
}

impl AuthEnv {
    /// No credentials: anonymous access.
    pub fn anonymous() -> Self {
        Self {
            envs: Vec::new(),
            _askpass: None,
        }
    }
}

/// Build the environment for the given credential, if any.
pub fn prepare(credential: Option<&CredentialHandle>) -> Result<AuthEnv, GitBayError> {
    let Some(handle) = credential else {
        return Ok(AuthEnv::anonymous());
    };

    match handle.credential() {
        Credential::Token(token) => {
            let askpass = write_helper(ASKPASS_SCRIPT)?;
            Ok(AuthEnv {
                envs: vec![
                    ("GIT_ASKPASS".into(), askpass.path().display().to_string()),
                    ("GITBAY_ASKPASS_USERNAME".into(), "git".into()),
                    (
                        "GITBAY_ASKPASS_SECRET".into(),
                        token.expose_secret().to_string(),
                    ),
                ],
                _askpass: Some(askpass),
            })
        }
        Credential::UsernamePassword { username, password } => {
            let askpass = write_helper(ASKPASS_SCRIPT)?;
            Ok(AuthEnv {
                envs: vec![
                    ("GIT_ASKPASS".into(), askpass.path().display().to_string()),
                    ("GITBAY_ASKPASS_USERNAME".into(), username.clone()),
                    (
                        "GITBAY_ASKPASS_SECRET".into(),
                        password.expose_secret().to_string(),
                    ),
                ],
                _askpass: Some(askpass),
            })
        }
        Credential::SshKey { path, passphrase } => {
            let ssh_command = format!(
                "ssh -i {} -o IdentitiesOnly=yes -o BatchMode={} -o StrictHostKeyChecking=accept-new",
                shell_quote(&path.display().to_string()),
                if passphrase.is_some() { "no" } else { "yes" },
            );
            let mut envs = vec![("GIT_SSH_COMMAND".into(), ssh_command)];
            let askpass = match passphrase {
                Some(passphrase) => {
                    let helper = write_helper(SSH_ASKPASS_SCRIPT)?;
                    envs.push(("SSH_ASKPASS".into(), helper.path().display().to_string()));
                    envs.push(("SSH_ASKPASS_REQUIRE".into(), "force".into()));
                    envs.push((
                        "GITBAY_SSH_PASSPHRASE".into(),
                        passphrase.expose_secret().to_string(),
                    ));
                    Some(helper)
                }
                None => None,
            };
            Ok(AuthEnv {
                envs,
                _askpass: askpass,
            })
        }
        Credential::SshAgent => Ok(AuthEnv {
            envs: vec![(
                "GIT_SSH_COMMAND".into(),
                "ssh -o BatchMode=yes -o StrictHostKeyChecking=accept-new".into(),
            )],
            _askpass: None,
        }),
    }
}

/// Write an owner-only helper script to a temp file.
fn write_helper(contents: &str) -> Result<tempfile::NamedTempFile, GitBayError> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("gitbay-askpass-")
        .tempfile()
        .map_err(|e| GitBayError::new(ErrorKind::System, format!("askpass helper: {e}")))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| GitBayError::new(ErrorKind::System, format!("askpass helper: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o700))
            .map_err(|e| GitBayError::new(ErrorKind::System, format!("askpass helper: {e}")))?;
    }

    Ok(file)
}

fn shell_quote(s: &str) -> String {
    if s.chars().all(|c| c.is_alphanumeric() || "/._-".contains(c)) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
