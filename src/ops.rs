//! Primitive side-effecting git operations.
//!
//! Each action here mutates repository state through one or more git
//! invocations and flushes the repository caches before returning, success
//! or failure — a failed rebase has still moved HEAD and written reflogs.
//!
//! Failure semantics: a non-zero git exit is fatal for the step. Nothing is
//! retried; the caller (typically the traverser) surfaces the error and
//! stops in place.

use crate::forkpoint;
use crate::git::{GitError, Repository, local_ref};
use crate::hooks;
use crate::layout::{self, BranchTree, SlideOut};
use crate::prompt::Prompter;

/// Environment variable with extra arguments for every `git rebase`.
pub const REBASE_OPTS_ENV: &str = "TRELLIS_REBASE_OPTS";

/// Check out a branch.
pub fn checkout(repo: &Repository, branch: &str) -> Result<(), GitError> {
    let result = repo.stdout(&["checkout", branch]);
    repo.flush_caches();
    result.map(|_| ())
}

/// Rebase `branch` onto `new_base`, replaying the commits since
/// `fork_point`.
///
/// Runs the pre-rebase hook first; a failing hook aborts before git is
/// touched. Interactive by default — git owns the terminal — with
/// `TRELLIS_REBASE_OPTS` appended to the command line.
pub fn rebase_onto(
    repo: &Repository,
    new_base: &str,
    fork_point: &str,
    branch: &str,
    interactive: bool,
) -> Result<(), GitError> {
    hooks::run_gate_hook(repo, hooks::PRE_REBASE, &[new_base, fork_point, branch])?;

    let extra = std::env::var(REBASE_OPTS_ENV).unwrap_or_default();
    let mut args: Vec<&str> = vec!["rebase"];
    args.extend(extra.split_whitespace());
    if interactive {
        args.push("--interactive");
    }
    args.extend(["--onto", new_base, fork_point, branch]);

    let result = repo.interactive(&args, &[]);
    repo.flush_caches();
    result
}

/// Merge the parent branch into the (checked-out) child.
pub fn merge_parent(repo: &Repository, parent: &str, no_edit: bool) -> Result<(), GitError> {
    let parent_ref = local_ref(parent);
    let mut args = vec!["merge"];
    if no_edit {
        args.push("--no-edit");
    }
    args.push(&parent_ref);
    let result = repo.interactive(&args, &[]);
    repo.flush_caches();
    result
}

/// Pick the remote to push a branch to: its tracking remote, the sole
/// remote, or whichever the user chooses.
pub fn push_remote(
    repo: &Repository,
    branch: &str,
    prompter: &mut dyn Prompter,
) -> Result<String, GitError> {
    if let Some(tp) = repo.tracking(branch)? {
        return Ok(tp.remote);
    }
    let remotes = repo.remotes()?;
    match remotes.len() {
        0 => Err(GitError::NoRemotes),
        1 => Ok(remotes.into_iter().next().expect("checked length")),
        _ => prompter
            .choose_remote(branch, &remotes)
            .map_err(|e| GitError::Internal(format!("Failed to read remote choice: {e}")))?
            .ok_or(GitError::AmbiguousRemote {
                branch: branch.to_string(),
                remotes,
            }),
    }
}

/// Push a branch, setting upstream when it has none.
///
/// Force pushes always use `--force-with-lease`, never `--force`.
pub fn push(
    repo: &Repository,
    branch: &str,
    remote: &str,
    force_with_lease: bool,
) -> Result<(), GitError> {
    let tracking = repo.tracking(branch)?;
    let remote_branch = tracking
        .as_ref()
        .map(|tp| tp.remote_branch.as_str())
        .unwrap_or(branch);
    let refspec = format!("{}:{}", local_ref(branch), local_ref(remote_branch));

    let mut args = vec!["push"];
    if tracking.is_none() {
        args.push("--set-upstream");
    }
    if force_with_lease {
        args.push("--force-with-lease");
    }
    args.push(remote);
    args.push(&refspec);

    let result = repo.stdout(&args);
    repo.flush_caches();
    result.map(|_| ())
}

/// Fast-forward the checked-out branch to its remote counterpart.
pub fn pull_ff(repo: &Repository, remote_ref: &str) -> Result<(), GitError> {
    let result = repo.stdout(&["merge", "--ff-only", remote_ref]);
    repo.flush_caches();
    result.map(|_| ())
}

/// `git reset --keep` the checked-out branch to its remote counterpart.
pub fn reset_keep(repo: &Repository, remote_ref: &str) -> Result<(), GitError> {
    let result = repo.stdout(&["reset", "--keep", remote_ref]);
    repo.flush_caches();
    result.map(|_| ())
}

/// Outcome of a squash attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashResult {
    Squashed { new_tip: String },
    /// Zero or one commit above the fork point — nothing to do.
    NothingToSquash { commits: usize },
}

/// Rebuild a branch as a single commit on top of its fork point.
///
/// The new commit carries the branch's current tree and the earliest
/// squashed commit's message. Implemented with `commit-tree` +
/// `update-ref`; `git rebase` is never involved, so there is nothing to
/// conflict.
pub fn squash(repo: &Repository, branch: &str, fork_point: &str) -> Result<SquashResult, GitError> {
    let branch_ref = local_ref(branch);
    let commits = repo.commits_between(fork_point, &branch_ref)?;
    if commits.len() <= 1 {
        return Ok(SquashResult::NothingToSquash {
            commits: commits.len(),
        });
    }

    let earliest = &commits.first().expect("len checked").0;
    let message = repo.stdout(&["log", "-1", "--format=%B", earliest])?;
    let tree = repo
        .tree_hash(&branch_ref)?
        .ok_or_else(|| GitError::message(format!("Cannot resolve tree of {branch}")))?;
    let old_tip = repo
        .branch_hash(branch)?
        .ok_or_else(|| GitError::message(format!("No local branch {branch}")))?;

    let new_tip = repo
        .stdout_cmd(
            crate::shell_exec::Cmd::git(&["commit-tree", &tree, "-p", fork_point])
                .current_dir(repo.git_common_dir().parent().unwrap_or(repo.git_common_dir()))
                .stdin(message.into_bytes()),
        )?
        .trim()
        .to_string();

    let reflog_msg = format!("trellis: squash {} commits", commits.len());
    let result = repo.stdout(&["update-ref", "-m", &reflog_msg, &branch_ref, &new_tip, &old_tip]);
    repo.flush_caches();
    result?;

    Ok(SquashResult::Squashed { new_tip })
}

/// Remove a chain from the layout: tree surgery, file write, hook.
///
/// This is the traverse-sized slide-out — no branch deletion, no follow-up
/// rebases. The layout file is written before the hook fires, so a failing
/// hook leaves the new layout in place but halts whatever was next.
pub fn slide_out_of_layout(
    repo: &Repository,
    tree: &mut BranchTree,
    sequence: &[String],
) -> anyhow::Result<SlideOut> {
    let outcome = tree.slide_out(sequence)?;
    layout::file::save(tree, &repo.layout_file_path()?)?;

    let mut hook_args: Vec<&str> = vec![&outcome.new_upstream, &outcome.lowest_slid_out];
    hook_args.extend(outcome.new_downstreams.iter().map(String::as_str));
    hooks::run_gate_hook(repo, hooks::POST_SLIDE_OUT, &hook_args)?;

    Ok(outcome)
}

/// Options for the full slide-out command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlideOutOptions {
    /// Also delete the slid-out local branches.
    pub delete: bool,
    /// Run the follow-up rebases interactively.
    pub interactive: bool,
    /// Skip rebasing the surviving children entirely.
    pub no_rebase: bool,
}

/// The full `slide-out` command: remove the chain, then rebase each
/// surviving child onto the new upstream at its fork point.
pub fn slide_out(
    repo: &Repository,
    tree: &mut BranchTree,
    sequence: &[String],
    opts: SlideOutOptions,
) -> anyhow::Result<SlideOut> {
    // Validate on a scratch copy so nothing is written on bad input, and
    // read the children's fork points before any ref surgery — deleting
    // branches drops their reflogs, which the inference feeds on.
    let mut scratch = tree.clone();
    let preview = scratch.slide_out(sequence)?;
    let mut fork_points = Vec::new();
    if !opts.no_rebase {
        for child in &preview.new_downstreams {
            if scratch.qualifiers(child).no_rebase {
                continue;
            }
            let fp = forkpoint::require_fork_point(repo, &scratch, child)?;
            fork_points.push((child.clone(), fp.commit));
        }
    }

    let outcome = slide_out_of_layout(repo, tree, sequence)?;

    for (child, fork_point) in &fork_points {
        rebase_onto(
            repo,
            &local_ref(&outcome.new_upstream),
            fork_point,
            child,
            opts.interactive,
        )?;
    }

    if opts.delete {
        // Step off a branch we are about to delete
        if let Some(current) = repo.current_branch()?
            && sequence.contains(&current)
        {
            checkout(repo, &outcome.new_upstream)?;
        }
        // Forced: the chain's commits live on in the rebased children, and
        // --delete is an explicit request
        for branch in sequence {
            delete_branch(repo, branch, true)?;
        }
    }

    Ok(outcome)
}

/// Delete a local branch (`-d`, or `-D` when forced).
pub fn delete_branch(repo: &Repository, branch: &str, force: bool) -> Result<(), GitError> {
    let flag = if force { "-D" } else { "-d" };
    let result = repo.stdout(&["branch", flag, branch]);
    repo.flush_caches();
    result.map(|_| ())
}

/// Fetch every remote.
pub fn fetch_all(repo: &Repository) -> Result<(), GitError> {
    for remote in repo.remotes()? {
        repo.fetch_remote(&remote)?;
    }
    Ok(())
}

/// Create a local branch at the given start point without switching to it.
pub fn create_branch(repo: &Repository, branch: &str, start_point: &str) -> Result<(), GitError> {
    let result = repo.stdout(&["branch", branch, start_point]);
    repo.flush_caches();
    result.map(|_| ())
}

/// Create a local branch tracking a remote one.
pub fn create_tracking_branch(
    repo: &Repository,
    branch: &str,
    remote_ref_short: &str,
) -> Result<(), GitError> {
    let result = repo.stdout(&["branch", "--track", branch, remote_ref_short]);
    repo.flush_caches();
    result.map(|_| ())
}

/// Fast-forward the checked-out branch to another local branch.
pub fn fast_forward_to(repo: &Repository, branch: &str) -> Result<(), GitError> {
    let branch_ref = local_ref(branch);
    let result = repo.stdout(&["merge", "--ff-only", &branch_ref]);
    repo.flush_caches();
    result.map(|_| ())
}
