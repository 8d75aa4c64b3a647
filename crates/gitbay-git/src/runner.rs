// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Git child-process execution.
//!
//! Spawns `git` with a scrubbed environment, streams stderr for progress
//! percentages, and kills the child the moment the cancellation token
//! fires. Failure output is mapped onto the gitbay error taxonomy by
//! substring classification of git's stderr.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};

use gitbay_core::{ErrorKind, GitBayError, ProgressSink};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Collected output of a finished git invocation.
#[derive(Debug)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `git` in `cwd` with the given args and extra environment.
///
/// Interactive prompting is disabled unconditionally; an operation that
/// would prompt fails instead of hanging a worker. On cancellation the
/// child is killed and `TASK_CANCELLED` is returned.
pub async fn run_git(
    cwd: &Path,
    args: &[&str],
    extra_env: &[(String, String)],
    cancel: &CancellationToken,
    progress: Option<Arc<dyn ProgressSink>>,
) -> Result<GitOutput, GitBayError> {
    trace!(?args, cwd = %cwd.display(), "running git");

    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .kill_on_drop(true);
    for (key, value) in extra_env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| {
        GitBayError::new(ErrorKind::System, format!("failed to spawn git: {e}"))
    })?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut out = String::new();
        if let Some(mut pipe) = stdout_pipe {
            let _ = pipe.read_to_string(&mut out).await;
        }
        out
    });

    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(pipe) = stderr_pipe {
            // Git writes progress with \r separators; treat both as line ends.
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let n = match read_until_any(&mut reader, &mut buf).await {
                    Ok(n) => n,
                    Err(_) => break,
                };
                if n == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                if let (Some(sink), Some(pct)) = (&progress, parse_progress(line)) {
                    sink.report(pct);
                }
                collected.push_str(line);
                collected.push('\n');
            }
        }
        collected
    });

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("cancellation fired, killing git child");
            let _ = child.start_kill();
            let _ = child.wait().await;
            let _ = stdout_task.await;
            let _ = stderr_task.await;
            return Err(GitBayError::new(
                ErrorKind::TaskCancelled,
                "operation cancelled",
            ));
        }
        status = child.wait() => status.map_err(|e| {
            GitBayError::new(ErrorKind::System, format!("git wait failed: {e}"))
        })?,
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(GitOutput { stdout, stderr })
    } else {
        Err(classify_failure(&stderr, &stdout))
    }
}

/// Read until `\n` or `\r`, whichever comes first.
async fn read_until_any<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize> {
    // \r shows up far more often in progress streams, so split on it and
    // let \n fall out of the same pass.
    let mut total = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(total);
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n' || b == b'\r') {
            buf.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            return Ok(total + pos + 1);
        }
        buf.extend_from_slice(available);
        let len = available.len();
        reader.consume(len);
        total += len;
    }
}

/// Extract an overall progress percentage from one git stderr line.
///
/// Transfer phases are scaled onto one monotone 0..=100 axis: object
/// receipt covers the first 70 points, delta resolution the rest. Writing
/// (push) maps directly.
pub fn parse_progress(line: &str) -> Option<u8> {
    static PERCENT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d{1,3})%").unwrap());

    let pct: u32 = PERCENT.captures(line)?.get(1)?.as_str().parse().ok()?;
    let pct = pct.min(100);

    if line.starts_with("Receiving objects") {
        Some((pct * 70 / 100) as u8)
    } else if line.starts_with("Resolving deltas") {
        Some((70 + pct * 30 / 100) as u8)
    } else if line.starts_with("Writing objects") || line.starts_with("Checking out files")
        || line.starts_with("Updating files")
    {
        Some(pct as u8)
    } else {
        None
    }
}

/// Map a failed invocation's output onto the error taxonomy.
fn classify_failure(stderr: &str, stdout: &str) -> GitBayError {
    let haystack = format!("{stderr}\n{stdout}");
    let lower = haystack.to_lowercase();

    let (kind, suggestion): (ErrorKind, Option<&str>) = if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("invalid username or password")
        || lower.contains("permission denied (publickey")
        || lower.contains("access denied")
    {
        (
            ErrorKind::AuthFailed,
            Some("check the configured git credentials"),
        )
    } else if lower.contains("could not resolve host")
        || lower.contains("connection timed out")
        || lower.contains("connection refused")
        || lower.contains("early eof")
        || lower.contains("the remote end hung up")
        || lower.contains("rpc failed")
    {
        (ErrorKind::NetworkError, Some("retry once the network recovers"))
    } else if lower.contains("repository not found")
        || lower.contains("does not appear to be a git repository")
    {
        (
            ErrorKind::RepoNotFound,
            Some("verify the remote URL and your access to it"),
        )
    } else if lower.contains("not a git repository") {
        (
            ErrorKind::GitNotARepo,
            Some("clone or init a repository in this workspace first"),
        )
    } else if lower.contains("non-fast-forward")
        || lower.contains("[rejected]")
        || lower.contains("failed to push some refs")
    {
        (
            ErrorKind::PushRejected,
            Some("fetch and integrate the remote changes, then push again"),
        )
    } else if lower.contains("nothing to commit")
        || lower.contains("no changes added to commit")
    {
        (ErrorKind::GitNoChanges, None)
    } else if lower.contains("permission denied") {
        (ErrorKind::PermissionDenied, None)
    } else {
        (ErrorKind::GitCommandFailed, None)
    };

    // Keep the tail of stderr as context; redaction happens at the
    // logging and tool boundaries.
    let detail: String = stderr
        .lines()
        .rev()
        .take(5)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");

    let mut err = GitBayError::new(kind, format!("git failed: {}", first_line(&haystack)))
        .with_context(serde_json::json!({ "stderr": detail }));
    if let Some(s) = suggestion {
        err = err.with_suggestion(s);
    }
    err
}

fn first_line(s: &str) -> &str {
    s.lines().find(|l| !l.trim().is_empty()).unwrap_or("unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_scales_receiving_and_resolving_phases() {
        assert_eq!(parse_progress("Receiving objects:   0% (0/100)"), Some(0));
        assert_eq!(parse_progress("Receiving objects: 100% (100/100)"), Some(70));
        assert_eq!(parse_progress("Resolving deltas:   0% (0/40)"), Some(70));
        assert_eq!(parse_progress("Resolving deltas: 100% (40/40), done."), Some(100));
        assert_eq!(parse_progress("Writing objects:  50% (5/10)"), Some(50));
    }

    #[test]
    fn non_progress_lines_yield_nothing() {
        assert_eq!(parse_progress("Cloning into 'x'..."), None);
        assert_eq!(parse_progress("remote: Counting objects: 42% (10/24)"), None);
        assert_eq!(parse_progress(""), None);
    }

    #[test]
    fn classify_auth_failures() {
        let err = classify_failure("fatal: Authentication failed for 'https://x'", "");
        assert_eq!(err.kind, ErrorKind::AuthFailed);
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn classify_network_failures() {
        let err = classify_failure("fatal: unable to access: Could not resolve host: x", "");
        assert_eq!(err.kind, ErrorKind::NetworkError);
    }

    #[test]
    fn classify_missing_repo() {
        let err = classify_failure("remote: Repository not found.", "");
        assert_eq!(err.kind, ErrorKind::RepoNotFound);

        let err = classify_failure(
            "fatal: not a git repository (or any of the parent directories): .git",
            "",
        );
        assert_eq!(err.kind, ErrorKind::GitNotARepo);
    }

    #[test]
    fn classify_push_rejection() {
        let err = classify_failure(
            " ! [rejected] main -> main (non-fast-forward)\nerror: failed to push some refs",
            "",
        );
        assert_eq!(err.kind, ErrorKind::PushRejected);
    }

    #[test]
    fn classify_nothing_to_commit() {
        let err = classify_failure("", "nothing to commit, working tree clean");
        assert_eq!(err.kind, ErrorKind::GitNoChanges);
    }

    #[test]
    fn unknown_failures_fall_back_to_command_failed() {
        let err = classify_failure("fatal: strange new failure mode", "");
        assert_eq!(err.kind, ErrorKind::GitCommandFailed);
        assert!(err.context.is_some());
    }

    #[tokio::test]
    async fn run_git_reports_version() {
        let dir = std::env::temp_dir();
        let out = run_git(&dir, &["--version"], &[], &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(out.stdout.contains("git version"));
    }

    #[tokio::test]
    async fn run_git_maps_failure() {
        let dir = std::env::temp_dir();
        let err = run_git(
            &dir,
            &["rev-parse", "HEAD"],
            &[],
            &CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();
        // temp dir is not a repository (GIT_CONFIG_NOSYSTEM keeps this hermetic).
        assert!(matches!(
            err.kind,
            ErrorKind::GitNotARepo | ErrorKind::GitCommandFailed
        ));
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_git(&std::env::temp_dir(), &["--version"], &[], &cancel, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TaskCancelled);
    }
}
