// SPDX-FileCopyrightText: 2026 Gitbay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The tool table: external tool names mapped onto core calls.
//!
//! Each tool maps to exactly one target. Input schema validation happens
//! in the handler before any core call; handlers never invoke the adapter
//! directly.

use gitbay_core::GitOperation;

/// What a tool name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolTarget {
    AllocateWorkspace,
    GetWorkspace,
    ReleaseWorkspace,
    ListWorkspaces,
    DiskSpace,
    GetTask,
    ListTasks,
    CancelTask,
    Operation(GitOperation),
}

/// Resolve a tool name. Unknown names return `None`.
pub fn lookup(name: &str) -> Option<ToolTarget> {
    use GitOperation::*;
    let target = match name {
        "git_allocate_workspace" => ToolTarget::AllocateWorkspace,
        "git_get_workspace" => ToolTarget::GetWorkspace,
        "git_release_workspace" => ToolTarget::ReleaseWorkspace,
        "git_list_workspaces" => ToolTarget::ListWorkspaces,
        "git_disk_space" => ToolTarget::DiskSpace,
        "git_get_task" => ToolTarget::GetTask,
        "git_list_tasks" => ToolTarget::ListTasks,
        "git_cancel_task" => ToolTarget::CancelTask,

        "git_clone" => ToolTarget::Operation(Clone),
        "git_init" => ToolTarget::Operation(Init),
        "git_status" => ToolTarget::Operation(Status),
        "git_stage" => ToolTarget::Operation(Add),
        "git_commit" => ToolTarget::Operation(Commit),
        "git_push" => ToolTarget::Operation(Push),
        "git_pull" => ToolTarget::Operation(Pull),
        "git_fetch" => ToolTarget::Operation(Fetch),
        "git_checkout" => ToolTarget::Operation(Checkout),
        "git_list_branches" => ToolTarget::Operation(BranchList),
        "git_create_branch" => ToolTarget::Operation(BranchCreate),
        "git_delete_branch" => ToolTarget::Operation(BranchDelete),
        "git_merge" => ToolTarget::Operation(Merge),
        "git_rebase" => ToolTarget::Operation(Rebase),
        "git_log" => ToolTarget::Operation(Log),
        "git_show" => ToolTarget::Operation(Show),
        "git_diff" => ToolTarget::Operation(Diff),
        "git_blame" => ToolTarget::Operation(Blame),
        "git_stash" => ToolTarget::Operation(StashSave),
        "git_stash_pop" => ToolTarget::Operation(StashPop),
        "git_list_stash" => ToolTarget::Operation(StashList),
        "git_list_tags" => ToolTarget::Operation(TagList),
        "git_create_tag" => ToolTarget::Operation(TagCreate),
        "git_delete_tag" => ToolTarget::Operation(TagDelete),
        "git_list_remotes" => ToolTarget::Operation(RemoteList),
        "git_add_remote" => ToolTarget::Operation(RemoteAdd),
        "git_remove_remote" => ToolTarget::Operation(RemoteRemove),
        "git_reset" => ToolTarget::Operation(Reset),
        "git_cherry_pick" => ToolTarget::Operation(CherryPick),
        "git_revert" => ToolTarget::Operation(Revert),
        "git_clean" => ToolTarget::Operation(Clean),
        "git_sparse_checkout" => ToolTarget::Operation(SparseCheckout),
        "git_submodule_list" => ToolTarget::Operation(SubmoduleList),
        "git_submodule_add" => ToolTarget::Operation(SubmoduleAdd),
        "git_submodule_update" => ToolTarget::Operation(SubmoduleUpdate),
        "git_lfs_track" => ToolTarget::Operation(LfsTrack),
        "git_lfs_untrack" => ToolTarget::Operation(LfsUntrack),
        "git_lfs_status" => ToolTarget::Operation(LfsStatus),
        "git_lfs_pull" => ToolTarget::Operation(LfsPull),
        "git_lfs_push" => ToolTarget::Operation(LfsPush),
        _ => return None,
    };
    Some(target)
}
