//! Command handlers.
//!
//! Each handler is a thin orchestration over the library: load the
//! repository and layout, validate, call into ops/traverse/status, print.

mod layout_cmds;
mod query_cmds;
mod sync_cmds;

pub(crate) use layout_cmds::{
    handle_add, handle_advance, handle_anno, handle_discover, handle_edit, handle_file,
    handle_slide_out,
};
pub(crate) use query_cmds::{
    handle_diff, handle_fork_point, handle_go, handle_is_managed, handle_list, handle_log,
    handle_show, handle_status,
};
pub(crate) use sync_cmds::{
    handle_delete_unmanaged, handle_reapply, handle_squash, handle_traverse, handle_update,
};

use trellis::git::{GitError, Repository};
use trellis::layout::{self, BranchTree};

/// Repository plus parsed layout — what nearly every command starts from.
pub(crate) struct Context {
    pub repo: Repository,
    pub tree: BranchTree,
}

/// Load the repository and the layout file, failing when the file is
/// missing.
pub(crate) fn load_context() -> anyhow::Result<Context> {
    let repo = Repository::current()?;
    let tree = layout::file::load(&repo.layout_file_path()?)?;
    Ok(Context { repo, tree })
}

/// Load the repository and the layout file, tolerating a missing file
/// (commands like `add` and `fork-point` work before any layout exists).
pub(crate) fn load_context_or_empty() -> anyhow::Result<Context> {
    let repo = Repository::current()?;
    let path = repo.layout_file_path()?;
    let tree = match layout::file::load(&path) {
        Ok(tree) => tree,
        Err(e) if is_layout_missing(&e) => BranchTree::new(),
        Err(e) => return Err(e),
    };
    Ok(Context { repo, tree })
}

fn is_layout_missing(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<GitError>(), Some(GitError::LayoutMissing { .. }))
}

/// Resolve an optional branch argument against the current branch.
pub(crate) fn branch_or_current(repo: &Repository, branch: Option<String>) -> anyhow::Result<String> {
    match branch {
        Some(b) => Ok(b),
        None => Ok(repo.require_current_branch()?),
    }
}

/// Like [`branch_or_current`], also requiring the branch to be managed.
pub(crate) fn managed_branch_or_current(
    ctx: &Context,
    branch: Option<String>,
) -> anyhow::Result<String> {
    let branch = branch_or_current(&ctx.repo, branch)?;
    if !ctx.tree.is_managed(&branch) {
        return Err(GitError::UnmanagedBranch { branch }.into());
    }
    Ok(branch)
}
