//! Sync classification: every parent/child edge and every branch vs. its
//! remote counterpart maps onto a small closed set of states.
//!
//! Parent edges drive what `traverse` proposes (slide out, rebase, merge);
//! remote states drive push/pull/reset proposals. Classification is pure
//! with respect to the repository state — given a fixed repo, it is
//! deterministic.

use serde::Serialize;

use crate::forkpoint;
use crate::git::{GitError, RemoteBranch, Repository, local_ref};
use crate::layout::BranchTree;

/// Sync state of a child branch relative to its layout parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    InSync,
    InSyncButForkPointOff,
    OutOfSync,
    Merged,
}

/// Sync state of a branch relative to its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RemoteSyncState {
    NoRemotes,
    Untracked,
    InSync,
    Ahead,
    Behind,
    DivergedAndNewer,
    DivergedAndOlder,
}

/// How aggressively squash/rebase merges are detected when deciding whether
/// a child is merged into its parent.
///
/// Configured via `trellis.squashMergeDetection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SquashMergeDetection {
    /// Only ancestry counts: the child's tip must be reachable from the
    /// parent.
    None,
    /// Also merged if some commit on the parent's first-parent history since
    /// the merge base carries the child's exact tree (a squash merge).
    #[default]
    Simple,
    /// `Simple`, plus patch-id equivalence of every unique child commit
    /// (cherry-picks).
    Exact,
}

/// Config key for the squash-merge detection mode.
pub const SQUASH_MERGE_DETECTION_KEY: &str = "trellis.squashMergeDetection";

/// Read the detection mode from git config, defaulting to `simple`.
pub fn squash_merge_detection(repo: &Repository) -> Result<SquashMergeDetection, GitError> {
    match repo.config_get(SQUASH_MERGE_DETECTION_KEY)? {
        Some(raw) => raw
            .parse()
            .map_err(|_| GitError::ConfigError {
                key: SQUASH_MERGE_DETECTION_KEY.to_string(),
                message: format!("expected none, simple or exact; got {raw:?}"),
            }),
        None => Ok(SquashMergeDetection::default()),
    }
}

/// Whether `branch` counts as merged into `into` under the given mode.
pub fn is_merged_to(
    repo: &Repository,
    branch: &str,
    into: &str,
    mode: SquashMergeDetection,
) -> Result<bool, GitError> {
    let branch_ref = local_ref(branch);
    let into_ref = local_ref(into);

    if repo.is_ancestor(&branch_ref, &into_ref)? {
        return Ok(true);
    }
    if mode == SquashMergeDetection::None {
        return Ok(false);
    }

    if squashed_tree_appears_in(repo, &branch_ref, &into_ref)? {
        return Ok(true);
    }
    if mode == SquashMergeDetection::Exact {
        return all_commits_cherry_picked(repo, &branch_ref, &into_ref);
    }
    Ok(false)
}

/// Squash-merge detection: does any commit on `into`'s first-parent history
/// back to the merge base carry exactly `branch`'s tree?
fn squashed_tree_appears_in(
    repo: &Repository,
    branch_ref: &str,
    into_ref: &str,
) -> Result<bool, GitError> {
    let Some(merge_base) = repo.merge_base(branch_ref, into_ref)? else {
        return Ok(false);
    };
    let Some(branch_tree) = repo.tree_hash(branch_ref)? else {
        return Ok(false);
    };
    let range = format!("{merge_base}..{into_ref}");
    let out = repo.stdout(&["log", "--first-parent", "--format=%T", &range])?;
    Ok(out.lines().any(|tree| tree.trim() == branch_tree))
}

/// Cherry-pick detection via `git cherry`: every commit unique to `branch`
/// has a patch-id-equivalent commit in `into`.
fn all_commits_cherry_picked(
    repo: &Repository,
    branch_ref: &str,
    into_ref: &str,
) -> Result<bool, GitError> {
    let out = repo.stdout(&["cherry", into_ref, branch_ref])?;
    let mut any = false;
    for line in out.lines() {
        match line.as_bytes().first() {
            Some(b'-') => any = true,
            Some(b'+') => return Ok(false),
            _ => {}
        }
    }
    Ok(any)
}

/// Classify the edge between a managed child and its layout parent.
///
/// The fork-point invariant: when the parent is an ancestor of the child,
/// the edge is fully in sync exactly when the child's fork point is the
/// parent's tip (inferred or overridden there).
pub fn parent_edge(
    repo: &Repository,
    tree: &BranchTree,
    parent: &str,
    child: &str,
    mode: SquashMergeDetection,
) -> Result<SyncState, GitError> {
    if is_merged_to(repo, child, parent, mode)? {
        return Ok(SyncState::Merged);
    }
    if !repo.is_ancestor(&local_ref(parent), &local_ref(child))? {
        return Ok(SyncState::OutOfSync);
    }

    // Fork point equals the parent's tip — whether inferred, overridden
    // there, or via the parent fallback — iff the edge is fully in sync.
    let parent_tip = repo.branch_hash(parent)?;
    let fork_point = forkpoint::fork_point(repo, tree, child)?;
    let in_sync = matches!(
        (&fork_point, &parent_tip),
        (Some(fp), Some(tip)) if fp.commit == *tip
    );
    if in_sync {
        Ok(SyncState::InSync)
    } else {
        Ok(SyncState::InSyncButForkPointOff)
    }
}

/// Classify a branch against its remote counterpart.
pub fn remote_state(repo: &Repository, branch: &str) -> Result<RemoteSyncState, GitError> {
    if repo.remotes()?.is_empty() {
        return Ok(RemoteSyncState::NoRemotes);
    }
    let Some(tp) = repo.tracking(branch)? else {
        return Ok(RemoteSyncState::Untracked);
    };
    let counterpart = RemoteBranch {
        remote: tp.remote,
        branch: tp.remote_branch,
    };
    let remote_ref = counterpart.full_ref();
    // Tracking config pointing at a pruned ref counts as untracked
    if repo.commit_hash(&remote_ref)?.is_none() {
        return Ok(RemoteSyncState::Untracked);
    }

    let branch_ref = local_ref(branch);
    let local = repo.commit_hash(&branch_ref)?;
    let remote = repo.commit_hash(&remote_ref)?;
    if local == remote {
        return Ok(RemoteSyncState::InSync);
    }
    if repo.is_ancestor(&branch_ref, &remote_ref)? {
        return Ok(RemoteSyncState::Behind);
    }
    if repo.is_ancestor(&remote_ref, &branch_ref)? {
        return Ok(RemoteSyncState::Ahead);
    }

    // Truly diverged: committer dates break the tie. Equal dates lean
    // "newer" so traverse proposes a push rather than a reset.
    let local_date = repo.committer_date(&branch_ref)?;
    let remote_date = repo.committer_date(&remote_ref)?;
    if local_date >= remote_date {
        Ok(RemoteSyncState::DivergedAndNewer)
    } else {
        Ok(RemoteSyncState::DivergedAndOlder)
    }
}
