//! Git operations and repository state
//!
//! Everything trellis knows about a repository is derived from `git`
//! subprocess invocations, reached through [`Repository`] — a typed, lazily
//! populated cache. No libgit2, no direct object-store access.

use std::fmt;

mod error;
mod repository;

pub use error::{GitError, describe_exit, exit_code};
pub use repository::{Repository, set_base_path};

/// A git operation currently in flight in the working tree.
///
/// Detected from marker files in the per-worktree git directory, the same
/// way `git status` reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum OngoingGitOp {
    #[strum(serialize = "am session")]
    AmSession,
    #[strum(serialize = "cherry-pick")]
    CherryPick,
    #[strum(serialize = "merge")]
    Merge,
    #[strum(serialize = "rebase")]
    Rebase,
    #[strum(serialize = "revert")]
    Revert,
}

/// A local branch's remote tracking relationship, from
/// `branch.<name>.remote` and `branch.<name>.merge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingPair {
    pub branch: String,
    pub remote: String,
    /// Short name of the branch on the remote (the `refs/heads/` part of
    /// `branch.<name>.merge`).
    pub remote_branch: String,
}

impl TrackingPair {
    /// The full remote-tracking ref, e.g. `refs/remotes/origin/feature`.
    pub fn remote_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.remote_branch)
    }

    /// The human-readable counterpart name, e.g. `origin/feature`.
    pub fn short(&self) -> String {
        format!("{}/{}", self.remote, self.remote_branch)
    }
}

/// A branch on a remote, e.g. `origin` + `feature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    pub remote: String,
    pub branch: String,
}

impl RemoteBranch {
    pub fn full_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }
}

impl fmt::Display for RemoteBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// Full local ref for a branch name.
///
/// Branch arguments are always expanded to `refs/heads/...` before being
/// passed to git, so a tag sharing the name cannot shadow the branch.
pub fn local_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}
