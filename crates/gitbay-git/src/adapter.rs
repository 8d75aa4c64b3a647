// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI-backed implementation of the [`GitAdapter`] contract.
//!
//! Dispatches an operation tag plus opaque JSON params onto `git`
//! invocations, parses porcelain output into typed payloads, and keeps the
//! workspace recoverable on cancellation: a cancelled clone clears the
//! partial checkout, and a conflicted or cancelled merge-family operation
//! is aborted back to the pre-operation state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use gitbay_core::{
    ErrorKind, GitAdapter, GitBayError, GitOperation, OperationContext, ProgressSink,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::{self, AuthEnv};
use crate::ops::*;
use crate::runner::{run_git, GitOutput};

/// Git adapter backed by the `git` binary.
pub struct CliGitAdapter;

impl CliGitAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliGitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitAdapter for CliGitAdapter {
    fn name(&self) -> &str {
        "git-cli"
    }

    async fn execute(&self, ctx: OperationContext) -> Result<serde_json::Value, GitBayError> {
        let auth = auth::prepare(ctx.credential.as_ref())?;
        let ws = ctx.workspace.as_path();
        let cancel = &ctx.cancel;
        let progress = ctx.progress.clone();
        let params = ctx.params.clone();

        debug!(operation = %ctx.operation, workspace = %ws.display(), "executing git operation");
        ctx.progress.report(0);

        let result = match ctx.operation {
            GitOperation::Clone => self.clone_repo(ws, opts(params)?, &auth, cancel, progress).await,
            GitOperation::Init => self.init(ws, opts(params)?, cancel).await,
            GitOperation::Status => self.status(ws, cancel).await,
            GitOperation::Add => self.add(ws, opts(params)?, cancel).await,
            GitOperation::Commit => self.commit(ws, opts(params)?, cancel).await,
            GitOperation::Push => self.push(ws, opts(params)?, &auth, cancel, progress).await,
            GitOperation::Pull => self.pull(ws, opts(params)?, &auth, cancel, progress).await,
            GitOperation::Fetch => self.fetch(ws, opts(params)?, &auth, cancel, progress).await,
            GitOperation::Checkout => self.checkout(ws, opts(params)?, cancel).await,
            GitOperation::BranchList => self.branch_list(ws, cancel).await,
            GitOperation::BranchCreate => self.branch_create(ws, opts(params)?, cancel).await,
            GitOperation::BranchDelete => self.branch_delete(ws, opts(params)?, cancel).await,
            GitOperation::Merge => self.merge(ws, opts(params)?, cancel).await,
            GitOperation::Rebase => self.rebase(ws, opts(params)?, &auth, cancel).await,
            GitOperation::Log => self.log(ws, opts(params)?, cancel).await,
            GitOperation::Show => self.show(ws, opts(params)?, cancel).await,
            GitOperation::Diff => self.diff(ws, opts(params)?, cancel).await,
            GitOperation::Blame => self.blame(ws, opts(params)?, cancel).await,
            GitOperation::StashSave => self.stash_save(ws, opts(params)?, cancel).await,
            GitOperation::StashPop => self.stash_pop(ws, opts(params)?, cancel).await,
            GitOperation::StashList => self.stash_list(ws, cancel).await,
            GitOperation::TagList => self.tag_list(ws, cancel).await,
            GitOperation::TagCreate => self.tag_create(ws, opts(params)?, cancel).await,
            GitOperation::TagDelete => self.tag_delete(ws, opts(params)?, cancel).await,
            GitOperation::RemoteList => self.remote_list(ws, cancel).await,
            GitOperation::RemoteAdd => self.remote_add(ws, opts(params)?, cancel).await,
            GitOperation::RemoteRemove => self.remote_remove(ws, opts(params)?, cancel).await,
            GitOperation::Reset => self.reset(ws, opts(params)?, cancel).await,
            GitOperation::CherryPick => self.cherry_pick(ws, opts(params)?, cancel).await,
            GitOperation::Revert => self.revert(ws, opts(params)?, cancel).await,
            GitOperation::Clean => self.clean(ws, opts(params)?, cancel).await,
            GitOperation::SparseCheckout => self.sparse_checkout(ws, opts(params)?, cancel).await,
            GitOperation::SubmoduleList => self.submodule_list(ws, cancel).await,
            GitOperation::SubmoduleAdd => {
                self.submodule_add(ws, opts(params)?, &auth, cancel, progress).await
            }
            GitOperation::SubmoduleUpdate => {
                self.submodule_update(ws, opts(params)?, &auth, cancel, progress).await
            }
            GitOperation::LfsTrack => self.lfs_track(ws, opts(params)?, cancel).await,
            GitOperation::LfsUntrack => self.lfs_untrack(ws, opts(params)?, cancel).await,
            GitOperation::LfsStatus => self.lfs_status(ws, cancel).await,
            GitOperation::LfsPull => self.lfs_pull(ws, &auth, cancel, progress).await,
            GitOperation::LfsPush => self.lfs_push(ws, &auth, cancel, progress).await,
        };

        if result.is_ok() {
            ctx.progress.report(100);
        }
        result
    }
}

/// Deserialize operation params, surfacing shape errors as validation
/// failures rather than internal ones.
fn opts<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, GitBayError> {
    serde_json::from_value(params).map_err(|e| {
        GitBayError::new(
            ErrorKind::MissingRequiredParam,
            format!("invalid operation parameters: {e}"),
        )
    })
}

impl CliGitAdapter {
    async fn plain(
        &self,
        ws: &Path,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<GitOutput, GitBayError> {
        run_git(ws, args, &[], cancel, None).await
    }

    async fn remote_op(
        &self,
        ws: &Path,
        args: &[&str],
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<GitOutput, GitBayError> {
        run_git(ws, args, &auth.envs, cancel, Some(progress)).await
    }

    async fn clone_repo(
        &self,
        ws: &Path,
        options: CloneOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<String> = vec!["clone".into(), "--progress".into()];
        if let Some(depth) = options.depth {
            args.push("--depth".into());
            args.push(depth.to_string());
        }
        if options.single_branch {
            args.push("--single-branch".into());
        }
        if let Some(branch) = &options.branch {
            args.push("--branch".into());
            args.push(branch.clone());
        }
        if let Some(filter) = &options.filter {
            args.push(format!("--filter={filter}"));
        }
        if !options.sparse_paths.is_empty() {
            args.push("--sparse".into());
        }
        args.push(options.url.clone());
        args.push(".".into());

        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let result = self
            .remote_op(ws, &arg_refs, auth, cancel, progress.clone())
            .await;

        if let Err(e) = result {
            if e.kind == ErrorKind::TaskCancelled {
                // Roll the workspace back to empty so it stays reusable.
                clear_directory(ws);
            }
            return Err(e);
        }

        if !options.sparse_paths.is_empty() {
            let mut sparse_args: Vec<&str> = vec!["sparse-checkout", "set"];
            sparse_args.extend(options.sparse_paths.iter().map(|s| s.as_str()));
            self.plain(ws, &sparse_args, cancel).await?;
        }

        let head = self.rev_parse_head(ws, cancel).await.ok();
        Ok(json!({
            "cloned": true,
            "branch": self.current_branch(ws, cancel).await.ok().flatten(),
            "head": head,
        }))
    }

    async fn init(
        &self,
        ws: &Path,
        options: InitOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<String> = vec!["init".into()];
        if options.bare {
            args.push("--bare".into());
        }
        if let Some(branch) = &options.initial_branch {
            args.push("-b".into());
            args.push(branch.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        self.plain(ws, &arg_refs, cancel).await?;
        Ok(json!({ "initialized": true, "bare": options.bare }))
    }

    async fn status(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self
            .plain(ws, &["status", "--porcelain=v2", "--branch"], cancel)
            .await?;
        let payload = parse_status(&out.stdout);
        Ok(serde_json::to_value(payload).map_err(GitBayError::storage)?)
    }

    async fn add(
        &self,
        ws: &Path,
        options: AddOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        self.plain(ws, &["add", "--", &options.file_pattern], cancel)
            .await?;
        Ok(json!({ "staged": options.file_pattern }))
    }

    async fn commit(
        &self,
        ws: &Path,
        options: CommitOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut envs: Vec<(String, String)> = Vec::new();
        if let Some(author) = &options.author {
            envs.push(("GIT_AUTHOR_NAME".into(), author.name.clone()));
            envs.push(("GIT_AUTHOR_EMAIL".into(), author.email.clone()));
            envs.push(("GIT_COMMITTER_NAME".into(), author.name.clone()));
            envs.push(("GIT_COMMITTER_EMAIL".into(), author.email.clone()));
        }
        let mut args: Vec<&str> = vec!["commit", "-m", &options.message];
        if options.allow_empty {
            args.push("--allow-empty");
        }
        run_git(ws, &args, &envs, cancel, None).await?;

        let oid = self.rev_parse_head(ws, cancel).await?;
        Ok(serde_json::to_value(CommitPayload { oid }).map_err(GitBayError::storage)?)
    }

    async fn push(
        &self,
        ws: &Path,
        options: PushOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<String> = vec!["push".into(), "--progress".into()];
        if options.force {
            args.push("--force-with-lease".into());
        }
        if options.set_upstream {
            args.push("--set-upstream".into());
        }
        args.push(options.remote.clone());
        if let Some(branch) = &options.branch {
            args.push(branch.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        self.remote_op(ws, &arg_refs, auth, cancel, progress).await?;
        Ok(json!({ "pushed": true, "remote": options.remote, "branch": options.branch }))
    }

    async fn pull(
        &self,
        ws: &Path,
        options: PullOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<String> = vec!["pull".into(), "--progress".into()];
        if options.rebase {
            args.push("--rebase".into());
        }
        args.push(options.remote.clone());
        if let Some(branch) = &options.branch {
            args.push(branch.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        match self.remote_op(ws, &arg_refs, auth, cancel, progress).await {
            Ok(_) => {
                let head = self.rev_parse_head(ws, cancel).await?;
                Ok(json!({ "pulled": true, "head": head }))
            }
            Err(e) => {
                Err(self
                    .surface_conflicts(
                        ws,
                        e,
                        if options.rebase { "rebase" } else { "merge" },
                        ErrorKind::MergeConflict,
                    )
                    .await)
            }
        }
    }

    async fn fetch(
        &self,
        ws: &Path,
        options: FetchOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<String> = vec!["fetch".into(), "--progress".into()];
        if options.prune {
            args.push("--prune".into());
        }
        if options.all {
            args.push("--all".into());
        } else {
            args.push(options.remote.clone());
        }
        let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        self.remote_op(ws, &arg_refs, auth, cancel, progress).await?;
        Ok(json!({ "fetched": true, "remote": options.remote }))
    }

    async fn checkout(
        &self,
        ws: &Path,
        options: CheckoutOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["checkout"];
        if options.create {
            args.push("-b");
        }
        args.push(&options.target);
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "checked_out": options.target, "created": options.create }))
    }

    async fn branch_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self
            .plain(
                ws,
                &[
                    "branch",
                    "--list",
                    "--format=%(refname:short)\u{1f}%(objectname:short)\u{1f}%(HEAD)\u{1f}%(upstream:short)",
                ],
                cancel,
            )
            .await?;
        let branches: Vec<BranchPayload> = out
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let mut parts = line.split('\u{1f}');
                Some(BranchPayload {
                    name: parts.next()?.to_string(),
                    oid: parts.next()?.to_string(),
                    is_current: parts.next()? == "*",
                    upstream: parts.next().filter(|s| !s.is_empty()).map(String::from),
                })
            })
            .collect();
        Ok(serde_json::to_value(branches).map_err(GitBayError::storage)?)
    }

    async fn branch_create(
        &self,
        ws: &Path,
        options: BranchCreateOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        if options.checkout {
            let mut args: Vec<&str> = vec!["checkout", "-b", &options.name];
            if let Some(start) = &options.start_point {
                args.push(start);
            }
            self.plain(ws, &args, cancel).await?;
        } else {
            let mut args: Vec<&str> = vec!["branch", &options.name];
            if let Some(start) = &options.start_point {
                args.push(start);
            }
            self.plain(ws, &args, cancel).await?;
        }
        Ok(json!({ "created": options.name, "checked_out": options.checkout }))
    }

    async fn branch_delete(
        &self,
        ws: &Path,
        options: BranchDeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let flag = if options.force { "-D" } else { "-d" };
        self.plain(ws, &["branch", flag, &options.name], cancel)
            .await?;
        Ok(json!({ "deleted": options.name }))
    }

    async fn merge(
        &self,
        ws: &Path,
        options: MergeOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["merge"];
        if options.no_ff {
            args.push("--no-ff");
        }
        if let Some(message) = &options.message {
            args.push("-m");
            args.push(message);
        }
        args.push(&options.branch);

        match self.plain(ws, &args, cancel).await {
            Ok(_) => {
                let head = self.rev_parse_head(ws, cancel).await?;
                Ok(json!({ "merged": true, "head": head }))
            }
            Err(e) => {
                Err(self
                    .surface_conflicts(ws, e, "merge", ErrorKind::MergeConflict)
                    .await)
            }
        }
    }

    async fn rebase(
        &self,
        ws: &Path,
        options: RebaseOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        // Upstream-bound rebases may fetch, so the auth env applies.
        match run_git(ws, &["rebase", &options.upstream], &auth.envs, cancel, None).await {
            Ok(_) => {
                let head = self.rev_parse_head(ws, cancel).await?;
                Ok(json!({ "rebased": true, "head": head }))
            }
            Err(e) => {
                Err(self
                    .surface_conflicts(ws, e, "rebase", ErrorKind::RebaseConflict)
                    .await)
            }
        }
    }

    async fn log(
        &self,
        ws: &Path,
        options: LogOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let limit = format!("-n{}", options.limit);
        let mut args: Vec<&str> = vec![
            "log",
            &limit,
            "--pretty=format:%H\u{1f}%an\u{1f}%ae\u{1f}%aI\u{1f}%s",
        ];
        if let Some(reference) = &options.reference {
            args.push(reference);
        }
        if let Some(path) = &options.path {
            args.push("--");
            args.push(path);
        }
        let out = self.plain(ws, &args, cancel).await?;
        let entries = parse_log(&out.stdout);
        Ok(serde_json::to_value(entries).map_err(GitBayError::storage)?)
    }

    async fn show(
        &self,
        ws: &Path,
        options: ShowOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let meta = self
            .plain(
                ws,
                &[
                    "log",
                    "-n1",
                    "--pretty=format:%H\u{1f}%an\u{1f}%ae\u{1f}%aI\u{1f}%s",
                    &options.reference,
                ],
                cancel,
            )
            .await?;
        let commit = parse_log(&meta.stdout).into_iter().next().ok_or_else(|| {
            GitBayError::new(
                ErrorKind::GitCommandFailed,
                format!("no commit at {}", options.reference),
            )
        })?;
        let stat = self
            .plain(ws, &["show", "--stat", "--format=", &options.reference], cancel)
            .await?;
        Ok(json!({ "commit": commit, "stat": stat.stdout }))
    }

    async fn diff(
        &self,
        ws: &Path,
        options: DiffOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["diff"];
        if options.staged {
            args.push("--cached");
        }
        if let Some(from) = &options.from {
            args.push(from);
        }
        if let Some(to) = &options.to {
            args.push(to);
        }
        if let Some(path) = &options.path {
            args.push("--");
            args.push(path);
        }
        let out = self.plain(ws, &args, cancel).await?;
        Ok(json!({ "diff": out.stdout }))
    }

    async fn blame(
        &self,
        ws: &Path,
        options: BlameOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let range;
        let mut args: Vec<&str> = vec!["blame", "--line-porcelain"];
        if let (Some(start), Some(end)) = (options.start_line, options.end_line) {
            range = format!("-L{start},{end}");
            args.push(&range);
        }
        args.push("--");
        args.push(&options.path);
        let out = self.plain(ws, &args, cancel).await?;
        let lines = parse_blame(&out.stdout);
        Ok(serde_json::to_value(lines).map_err(GitBayError::storage)?)
    }

    async fn stash_save(
        &self,
        ws: &Path,
        options: StashSaveOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["stash", "push"];
        if options.include_untracked {
            args.push("--include-untracked");
        }
        if let Some(message) = &options.message {
            args.push("-m");
            args.push(message);
        }
        let out = self.plain(ws, &args, cancel).await?;
        let stashed = !out.stdout.contains("No local changes");
        Ok(json!({ "stashed": stashed }))
    }

    async fn stash_pop(
        &self,
        ws: &Path,
        options: StashPopOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let reference;
        let mut args: Vec<&str> = vec!["stash", "pop"];
        if let Some(index) = options.index {
            reference = format!("stash@{{{index}}}");
            args.push(&reference);
        }
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "popped": true }))
    }

    async fn stash_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self
            .plain(ws, &["stash", "list", "--pretty=format:%gd\u{1f}%gs"], cancel)
            .await?;
        let stashes: Vec<serde_json::Value> = out
            .stdout
            .lines()
            .filter(|l| !l.is_empty())
            .filter_map(|line| {
                let (reference, subject) = line.split_once('\u{1f}')?;
                Some(json!({ "reference": reference, "subject": subject }))
            })
            .collect();
        Ok(json!(stashes))
    }

    async fn tag_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self.plain(ws, &["tag", "--list"], cancel).await?;
        let tags: Vec<&str> = out.stdout.lines().filter(|l| !l.is_empty()).collect();
        Ok(json!(tags))
    }

    async fn tag_create(
        &self,
        ws: &Path,
        options: TagCreateOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["tag"];
        if let Some(message) = &options.message {
            args.push("-a");
            args.push("-m");
            args.push(message);
        }
        args.push(&options.name);
        if let Some(reference) = &options.reference {
            args.push(reference);
        }
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "created": options.name, "annotated": options.message.is_some() }))
    }

    async fn tag_delete(
        &self,
        ws: &Path,
        options: TagDeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        self.plain(ws, &["tag", "-d", &options.name], cancel).await?;
        Ok(json!({ "deleted": options.name }))
    }

    async fn remote_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self.plain(ws, &["remote", "-v"], cancel).await?;
        let mut remotes: Vec<RemotePayload> = Vec::new();
        for line in out.stdout.lines() {
            if !line.ends_with("(fetch)") {
                continue;
            }
            let mut parts = line.split_whitespace();
            if let (Some(name), Some(url)) = (parts.next(), parts.next()) {
                remotes.push(RemotePayload {
                    name: name.to_string(),
                    url: gitbay_security::redact_url(url),
                });
            }
        }
        Ok(serde_json::to_value(remotes).map_err(GitBayError::storage)?)
    }

    async fn remote_add(
        &self,
        ws: &Path,
        options: RemoteAddOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        self.plain(ws, &["remote", "add", &options.name, &options.url], cancel)
            .await?;
        Ok(json!({ "added": options.name }))
    }

    async fn remote_remove(
        &self,
        ws: &Path,
        options: RemoteRemoveOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        self.plain(ws, &["remote", "remove", &options.name], cancel)
            .await?;
        Ok(json!({ "removed": options.name }))
    }

    async fn reset(
        &self,
        ws: &Path,
        options: ResetOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mode = match options.mode.as_str() {
            "soft" => "--soft",
            "mixed" => "--mixed",
            "hard" => "--hard",
            other => {
                return Err(GitBayError::new(
                    ErrorKind::ParameterConflict,
                    format!("unknown reset mode `{other}`"),
                )
                .with_suggestion("use one of: soft, mixed, hard"))
            }
        };
        self.plain(ws, &["reset", mode, &options.reference], cancel)
            .await?;
        Ok(json!({ "reset": options.reference, "mode": options.mode }))
    }

    async fn cherry_pick(
        &self,
        ws: &Path,
        options: CherryPickOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        match self
            .plain(ws, &["cherry-pick", &options.reference], cancel)
            .await
        {
            Ok(_) => {
                let head = self.rev_parse_head(ws, cancel).await?;
                Ok(json!({ "picked": options.reference, "head": head }))
            }
            Err(e) => {
                Err(self
                    .surface_conflicts(ws, e, "cherry-pick", ErrorKind::MergeConflict)
                    .await)
            }
        }
    }

    async fn revert(
        &self,
        ws: &Path,
        options: RevertOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        match self
            .plain(ws, &["revert", "--no-edit", &options.reference], cancel)
            .await
        {
            Ok(_) => {
                let head = self.rev_parse_head(ws, cancel).await?;
                Ok(json!({ "reverted": options.reference, "head": head }))
            }
            Err(e) => {
                Err(self
                    .surface_conflicts(ws, e, "revert", ErrorKind::MergeConflict)
                    .await)
            }
        }
    }

    async fn clean(
        &self,
        ws: &Path,
        options: CleanOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["clean"];
        args.push(if options.dry_run { "-n" } else { "-f" });
        if options.directories {
            args.push("-d");
        }
        let out = self.plain(ws, &args, cancel).await?;
        let removed: Vec<String> = out
            .stdout
            .lines()
            .filter_map(|l| {
                l.strip_prefix("Removing ")
                    .or_else(|| l.strip_prefix("Would remove "))
                    .map(String::from)
            })
            .collect();
        Ok(json!({ "removed": removed, "dry_run": options.dry_run }))
    }

    async fn sparse_checkout(
        &self,
        ws: &Path,
        options: SparseCheckoutOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["sparse-checkout", "set"];
        if !options.cone {
            args.push("--no-cone");
        }
        args.extend(options.paths.iter().map(|s| s.as_str()));
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "sparse_paths": options.paths }))
    }

    async fn submodule_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self.plain(ws, &["submodule", "status"], cancel).await?;
        let submodules: Vec<serde_json::Value> = out
            .stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| {
                let trimmed = line.trim_start_matches(['-', '+', 'U', ' ']);
                let mut parts = trimmed.split_whitespace();
                let oid = parts.next()?;
                let path = parts.next()?;
                Some(json!({ "oid": oid, "path": path }))
            })
            .collect();
        Ok(json!(submodules))
    }

    async fn submodule_add(
        &self,
        ws: &Path,
        options: SubmoduleAddOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        self.remote_op(
            ws,
            &["submodule", "add", &options.url, &options.path],
            auth,
            cancel,
            progress,
        )
        .await?;
        Ok(json!({ "added": options.path }))
    }

    async fn submodule_update(
        &self,
        ws: &Path,
        options: SubmoduleUpdateOptions,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["submodule", "update", "--progress"];
        if options.init {
            args.push("--init");
        }
        if options.recursive {
            args.push("--recursive");
        }
        self.remote_op(ws, &args, auth, cancel, progress).await?;
        Ok(json!({ "updated": true }))
    }

    async fn lfs_track(
        &self,
        ws: &Path,
        options: LfsTrackOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["lfs", "track"];
        args.extend(options.patterns.iter().map(|s| s.as_str()));
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "tracked": options.patterns }))
    }

    async fn lfs_untrack(
        &self,
        ws: &Path,
        options: LfsUntrackOptions,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let mut args: Vec<&str> = vec!["lfs", "untrack"];
        args.extend(options.patterns.iter().map(|s| s.as_str()));
        self.plain(ws, &args, cancel).await?;
        Ok(json!({ "untracked": options.patterns }))
    }

    async fn lfs_status(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GitBayError> {
        let out = self.plain(ws, &["lfs", "ls-files"], cancel).await?;
        let files: Vec<&str> = out.stdout.lines().filter(|l| !l.is_empty()).collect();
        Ok(json!({ "files": files }))
    }

    async fn lfs_pull(
        &self,
        ws: &Path,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        self.remote_op(ws, &["lfs", "pull"], auth, cancel, progress)
            .await?;
        Ok(json!({ "pulled": true }))
    }

    async fn lfs_push(
        &self,
        ws: &Path,
        auth: &AuthEnv,
        cancel: &CancellationToken,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<serde_json::Value, GitBayError> {
        self.remote_op(ws, &["lfs", "push", "origin", "--all"], auth, cancel, progress)
            .await?;
        Ok(json!({ "pushed": true }))
    }

    async fn rev_parse_head(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<String, GitBayError> {
        let out = self.plain(ws, &["rev-parse", "HEAD"], cancel).await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn current_branch(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, GitBayError> {
        let out = self
            .plain(ws, &["branch", "--show-current"], cancel)
            .await?;
        let name = out.stdout.trim();
        Ok(if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        })
    }

    /// After a failed or cancelled merge-family operation: collect the
    /// structured conflict list, abort back to the pre-operation state, and
    /// return either the conflict error or the original failure.
    async fn surface_conflicts(
        &self,
        ws: &Path,
        original: GitBayError,
        abort_command: &str,
        conflict_kind: ErrorKind,
    ) -> GitBayError {
        // Run the conflict scan and abort on a fresh token: the task token
        // may already be cancelled, and rollback must still happen.
        let recovery = CancellationToken::new();
        let conflicts = self.conflict_list(ws, &recovery).await.unwrap_or_default();
        if conflicts.is_empty() && original.kind != ErrorKind::TaskCancelled {
            return original;
        }

        let _ = self
            .plain(ws, &[abort_command, "--abort"], &recovery)
            .await;

        if original.kind == ErrorKind::TaskCancelled {
            return original;
        }

        GitBayError::new(
            conflict_kind,
            format!("{abort_command} stopped on {} conflicting paths", conflicts.len()),
        )
        .with_suggestion("resolve the conflicts locally or pick a different base")
        .with_context(json!({ "conflicts": conflicts }))
    }

    async fn conflict_list(
        &self,
        ws: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConflictPayload>, GitBayError> {
        let out = self
            .plain(ws, &["status", "--porcelain=v1"], cancel)
            .await?;
        Ok(parse_conflicts(&out.stdout))
    }
}

/// Clear a directory's contents without removing the directory itself.
fn clear_directory(path: &Path) {
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            let p = entry.path();
            let _ = if p.is_dir() {
                std::fs::remove_dir_all(&p)
            } else {
                std::fs::remove_file(&p)
            };
        }
    }
}

fn parse_status(stdout: &str) -> StatusPayload {
    let mut payload = StatusPayload::default();
    for line in stdout.lines() {
        if let Some(head) = line.strip_prefix("# branch.head ") {
            if head != "(detached)" {
                payload.branch = Some(head.to_string());
            }
        } else if let Some(ab) = line.strip_prefix("# branch.ab ") {
            for token in ab.split_whitespace() {
                if let Some(n) = token.strip_prefix('+') {
                    payload.ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = token.strip_prefix('-') {
                    payload.behind = n.parse().unwrap_or(0);
                }
            }
        } else if let Some(rest) = line.strip_prefix("1 ") {
            let xy = &rest[..2.min(rest.len())];
            if let Some(path) = rest.splitn(8, ' ').nth(7) {
                classify_change(xy, path, &mut payload);
            }
        } else if let Some(rest) = line.strip_prefix("2 ") {
            let xy = &rest[..2.min(rest.len())];
            if let Some(paths) = rest.splitn(9, ' ').nth(8) {
                let path = paths.split('\t').next().unwrap_or(paths);
                classify_change(xy, path, &mut payload);
            }
        } else if let Some(rest) = line.strip_prefix("u ") {
            if let Some(path) = rest.splitn(10, ' ').nth(9) {
                payload.modified.push(path.to_string());
            }
        } else if let Some(path) = line.strip_prefix("? ") {
            payload.untracked.push(path.to_string());
        }
    }
    payload
}

fn classify_change(xy: &str, path: &str, payload: &mut StatusPayload) {
    let mut chars = xy.chars();
    let staged = chars.next().unwrap_or('.');
    let unstaged = chars.next().unwrap_or('.');
    if staged != '.' {
        payload.staged.push(path.to_string());
    }
    if unstaged != '.' {
        payload.modified.push(path.to_string());
    }
}

fn parse_log(stdout: &str) -> Vec<LogEntryPayload> {
    stdout
        .lines()
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let mut parts = line.split('\u{1f}');
            Some(LogEntryPayload {
                oid: parts.next()?.to_string(),
                author: parts.next()?.to_string(),
                email: parts.next()?.to_string(),
                date: parts.next()?.to_string(),
                message: parts.next()?.to_string(),
            })
        })
        .collect()
}

fn parse_blame(stdout: &str) -> Vec<BlameLinePayload> {
    let mut lines = Vec::new();
    let mut oid = String::new();
    let mut final_line = 0u32;
    let mut author = String::new();

    for line in stdout.lines() {
        if let Some(content) = line.strip_prefix('\t') {
            lines.push(BlameLinePayload {
                line: final_line,
                oid: oid.clone(),
                author: author.clone(),
                content: content.to_string(),
            });
        } else if let Some(name) = line.strip_prefix("author ") {
            author = name.to_string();
        } else {
            let mut parts = line.split_whitespace();
            if let Some(first) = parts.next() {
                if first.len() == 40 && first.chars().all(|c| c.is_ascii_hexdigit()) {
                    oid = first.to_string();
                    // header: <oid> <orig-line> <final-line> [<group-size>]
                    final_line = parts
                        .nth(1)
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(final_line);
                }
            }
        }
    }
    lines
}

fn parse_conflicts(porcelain: &str) -> Vec<ConflictPayload> {
    porcelain
        .lines()
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            let code = &line[..2];
            let kind = match code {
                "UU" => "both_modified",
                "AA" => "both_added",
                "DD" => "both_deleted",
                "DU" => "deleted_by_us",
                "UD" => "deleted_by_them",
                "AU" | "UA" => "both_added",
                _ => return None,
            };
            Some(ConflictPayload {
                path: line[3..].to_string(),
                kind: kind.to_string(),
            })
        })
        .collect()
}
