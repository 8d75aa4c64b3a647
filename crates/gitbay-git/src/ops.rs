// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Option and payload types for git operations.
//!
//! Handlers validate tool input and forward it as opaque JSON; these are
//! the shapes the CLI adapter deserializes that JSON into, and the typed
//! payloads it serializes back out.

use serde::{Deserialize, Serialize};

fn default_remote() -> String {
    "origin".to_string()
}

fn default_add_pattern() -> String {
    ".".to_string()
}

fn default_log_limit() -> u32 {
    20
}

fn default_head() -> String {
    "HEAD".to_string()
}

fn default_reset_mode() -> String {
    "mixed".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloneOptions {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub single_branch: bool,
    /// Partial-clone filter spec, e.g. `blob:none`.
    #[serde(default)]
    pub filter: Option<String>,
    /// Initial sparse-checkout set; empty means a full checkout.
    #[serde(default)]
    pub sparse_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitOptions {
    #[serde(default)]
    pub bare: bool,
    #[serde(default)]
    pub initial_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddOptions {
    #[serde(default = "default_add_pattern")]
    pub file_pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitOptions {
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub allow_empty: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushOptions {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub set_upstream: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullOptions {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub rebase: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchOptions {
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub prune: bool,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutOptions {
    pub target: String,
    #[serde(default)]
    pub create: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchCreateOptions {
    pub name: String,
    #[serde(default)]
    pub start_point: Option<String>,
    #[serde(default)]
    pub checkout: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchDeleteOptions {
    pub name: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeOptions {
    pub branch: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub no_ff: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebaseOptions {
    /// Upstream to rebase onto, e.g. `origin/main`.
    pub upstream: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogOptions {
    #[serde(default = "default_log_limit")]
    pub limit: u32,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShowOptions {
    #[serde(default = "default_head")]
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffOptions {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub staged: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlameOptions {
    pub path: String,
    #[serde(default)]
    pub start_line: Option<u32>,
    #[serde(default)]
    pub end_line: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StashSaveOptions {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub include_untracked: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StashPopOptions {
    #[serde(default)]
    pub index: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagCreateOptions {
    pub name: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagDeleteOptions {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteAddOptions {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteRemoveOptions {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetOptions {
    /// One of `soft`, `mixed`, `hard`.
    #[serde(default = "default_reset_mode")]
    pub mode: String,
    #[serde(default = "default_head")]
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CherryPickOptions {
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevertOptions {
    pub reference: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanOptions {
    #[serde(default)]
    pub directories: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SparseCheckoutOptions {
    pub paths: Vec<String>,
    #[serde(default = "default_true")]
    pub cone: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmoduleAddOptions {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmoduleUpdateOptions {
    #[serde(default = "default_true")]
    pub init: bool,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LfsTrackOptions {
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LfsUntrackOptions {
    pub patterns: Vec<String>,
}

// --- Payloads ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    pub branch: Option<String>,
    pub ahead: i64,
    pub behind: i64,
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPayload {
    /// Full 40-hex object id of the created commit.
    pub oid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryPayload {
    pub oid: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPayload {
    pub name: String,
    pub oid: String,
    pub is_current: bool,
    pub upstream: Option<String>,
}

/// One conflicting path, with the index-state kind git reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictPayload {
    pub path: String,
    /// `both_modified`, `both_added`, `deleted_by_us`, `deleted_by_them`,
    /// or `both_deleted`.
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameLinePayload {
    pub line: u32,
    pub oid: String,
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePayload {
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_options_parse_with_defaults() {
        let opts: CloneOptions =
            serde_json::from_value(serde_json::json!({"url": "https://git.example/x.git"}))
                .unwrap();
        assert_eq!(opts.url, "https://git.example/x.git");
        assert!(opts.depth.is_none());
        assert!(!opts.single_branch);
        assert!(opts.sparse_paths.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<CloneOptions, _> = serde_json::from_value(serde_json::json!({
            "url": "https://git.example/x.git",
            "mirror": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn commit_options_require_message() {
        let result: Result<CommitOptions, _> =
            serde_json::from_value(serde_json::json!({"author": {"name": "T", "email": "t@e"}}));
        assert!(result.is_err());

        let opts: CommitOptions = serde_json::from_value(serde_json::json!({
            "message": "init",
            "author": {"name": "T", "email": "t@e"}
        }))
        .unwrap();
        assert_eq!(opts.message, "init");
        assert_eq!(opts.author.unwrap().email, "t@e");
    }

    #[test]
    fn push_defaults_to_origin() {
        let opts: PushOptions = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(opts.remote, "origin");
        assert!(!opts.force);
    }
}
