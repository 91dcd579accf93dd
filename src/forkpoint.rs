//! Fork-point inference.
//!
//! The fork point of a branch is the commit where its unique history begins
//! — the boundary for diff/log ranges and the `<upstream>` argument of
//! `git rebase --onto`. It is inferred by walking the branch's first-parent
//! history and stopping at the first commit that some *other* ref's reflog
//! has ever pointed at: if another branch has been there, the history below
//! is not ours.
//!
//! Reflogs expire, so the inference can come up empty. The only permitted
//! fallback is the layout parent's tip, and only when that parent is an
//! ancestor of the branch; otherwise the fork point is unknown and commands
//! that need it fail.

use crate::git::{GitError, Repository, local_ref};
use crate::layout::BranchTree;

/// Git config key prefix for fork-point overrides.
const OVERRIDE_PREFIX: &str = "trellis.overrideForkPoint";

/// How a fork point was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkPointSource {
    /// Found in another ref's reflog.
    Inferred,
    /// Taken from `trellis.overrideForkPoint.<branch>.to`.
    Override,
    /// The layout parent's tip (parent is an ancestor of the branch).
    ParentFallback,
}

/// A resolved fork point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkPoint {
    pub commit: String,
    pub source: ForkPointSource,
}

/// The override config key for a branch.
pub fn override_key(branch: &str) -> String {
    format!("{OVERRIDE_PREFIX}.{branch}.to")
}

/// The active override for a branch, if any.
///
/// An override only applies while it resolves to a commit that is an
/// ancestor of the branch's tip; otherwise it is ignored (but left in
/// config untouched).
pub fn active_override(repo: &Repository, branch: &str) -> Result<Option<String>, GitError> {
    let Some(raw) = repo.config_get(&override_key(branch))? else {
        return Ok(None);
    };
    let Some(commit) = repo.commit_hash(&raw)? else {
        return Ok(None);
    };
    let Some(tip) = repo.branch_hash(branch)? else {
        return Ok(None);
    };
    if repo.is_ancestor(&commit, &tip)? {
        Ok(Some(commit))
    } else {
        Ok(None)
    }
}

/// Branches that have an override key set, valid or not.
pub fn overridden_branches(repo: &Repository) -> Result<Vec<String>, GitError> {
    let prefix = format!("{OVERRIDE_PREFIX}.");
    let mut branches = Vec::new();
    for key in repo.config_keys_with_prefix(&prefix)? {
        if let Some(branch) = key
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".to"))
        {
            branches.push(branch.to_string());
        }
    }
    Ok(branches)
}

/// Set the override for a branch to the given revision.
///
/// The revision must resolve and be an ancestor of the branch tip — an
/// override that would be dead on arrival is a user error.
pub fn set_override(repo: &Repository, branch: &str, revision: &str) -> Result<String, GitError> {
    let commit = repo
        .commit_hash(revision)?
        .ok_or_else(|| GitError::message(format!("Cannot resolve revision {revision}")))?;
    let tip = repo
        .branch_hash(branch)?
        .ok_or_else(|| GitError::message(format!("No local branch {branch}")))?;
    if !repo.is_ancestor(&commit, &tip)? {
        return Err(GitError::ConfigError {
            key: override_key(branch),
            message: format!("{revision} is not an ancestor of {branch}"),
        });
    }
    repo.config_set(&override_key(branch), &commit)?;
    Ok(commit)
}

/// Remove the override for a branch.
pub fn unset_override(repo: &Repository, branch: &str) -> Result<(), GitError> {
    repo.config_unset(&override_key(branch))
}

/// Infer the fork point from reflogs alone, ignoring any override.
///
/// Walks the branch's first-parent history and returns the first commit the
/// reflog index knows under a ref other than the branch itself. The
/// branch's own remote counterpart counts as another ref — pushing the
/// branch must not move its fork point, but the counterpart's pre-push
/// positions legitimately bound our unique history.
pub fn infer(
    repo: &Repository,
    tree: &BranchTree,
    branch: &str,
) -> Result<Option<ForkPoint>, GitError> {
    let own_ref = local_ref(branch);
    let index = repo.reflog_index()?;

    for commit in repo.first_parent_history(&own_ref)? {
        if let Some(refs) = index.get(&commit)
            && refs.iter().any(|r| *r != own_ref)
        {
            return Ok(Some(ForkPoint {
                commit,
                source: ForkPointSource::Inferred,
            }));
        }
    }

    // Reflogs may have expired; the parent's tip is the only fallback.
    if let Some(parent) = tree.parent(branch)
        && repo.is_ancestor(&local_ref(&parent), &own_ref)?
        && let Some(commit) = repo.branch_hash(&parent)?
    {
        return Ok(Some(ForkPoint {
            commit,
            source: ForkPointSource::ParentFallback,
        }));
    }

    Ok(None)
}

/// The fork point of a branch: override if valid, else inference.
pub fn fork_point(
    repo: &Repository,
    tree: &BranchTree,
    branch: &str,
) -> Result<Option<ForkPoint>, GitError> {
    if let Some(commit) = active_override(repo, branch)? {
        return Ok(Some(ForkPoint {
            commit,
            source: ForkPointSource::Override,
        }));
    }
    infer(repo, tree, branch)
}

/// Like [`fork_point`], failing with [`GitError::ForkPointUnknown`] when
/// nothing can be determined. For commands that cannot proceed without one.
pub fn require_fork_point(
    repo: &Repository,
    tree: &BranchTree,
    branch: &str,
) -> Result<ForkPoint, GitError> {
    fork_point(repo, tree, branch)?.ok_or_else(|| GitError::ForkPointUnknown {
        branch: branch.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_key_format() {
        assert_eq!(
            override_key("feature/x"),
            "trellis.overrideForkPoint.feature/x.to"
        );
    }
}
