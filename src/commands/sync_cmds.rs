//! Commands that move branches: traverse, update, reapply, squash,
//! delete-unmanaged.

use color_print::cformat;

use trellis::forkpoint;
use trellis::git::{GitError, local_ref};
use trellis::ops;
use trellis::prompt::{Answer, Prompter, TtyPrompter};
use trellis::styling::{eprintln, info_message, println, success_message};
use trellis::traverse::{self, ReturnTo, StartFrom, TraverseOptions};

use super::{Context, load_context};

#[allow(clippy::too_many_arguments)]
pub(crate) fn handle_traverse(
    fetch: bool,
    merge: bool,
    push: bool,
    no_push: bool,
    start_from: StartFrom,
    return_to: ReturnTo,
    yes: bool,
    no_interactive: bool,
) -> anyhow::Result<()> {
    let Context { repo, mut tree } = load_context()?;
    let opts = TraverseOptions {
        fetch,
        merge,
        push_override: match (push, no_push) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        start_from,
        return_to,
        interactive: !no_interactive && !yes,
    };
    let mut prompter = TtyPrompter::new(yes);
    traverse::traverse(&repo, &mut tree, &mut prompter, opts)?;
    Ok(())
}

pub(crate) fn handle_update(
    merge: bool,
    fork_point: Option<String>,
    no_interactive: bool,
) -> anyhow::Result<()> {
    let ctx = load_context()?;
    ctx.repo.ensure_no_ongoing_operation()?;
    let branch = super::managed_branch_or_current(&ctx, None)?;
    let parent = ctx
        .tree
        .parent(&branch)
        .ok_or_else(|| GitError::message(format!("{branch} is a root; nothing to update against")))?;

    if merge {
        ops::merge_parent(&ctx.repo, &parent, no_interactive)?;
        println!(
            "{}",
            success_message(cformat!("Merged <bold>{parent}</> into <bold>{branch}</>"))
        );
        return Ok(());
    }

    let fork_point = resolve_fork_point_arg(&ctx, &branch, fork_point)?;
    ops::rebase_onto(
        &ctx.repo,
        &local_ref(&parent),
        &fork_point,
        &branch,
        !no_interactive,
    )?;
    println!(
        "{}",
        success_message(cformat!("Rebased <bold>{branch}</> onto <bold>{parent}</>"))
    );
    Ok(())
}

pub(crate) fn handle_reapply(
    fork_point: Option<String>,
    no_interactive: bool,
) -> anyhow::Result<()> {
    let ctx = load_context()?;
    ctx.repo.ensure_no_ongoing_operation()?;
    let branch = ctx.repo.require_current_branch()?;
    let fork_point = resolve_fork_point_arg(&ctx, &branch, fork_point)?;

    // Rebasing onto the fork point itself: same base, rewritten history
    ops::rebase_onto(&ctx.repo, &fork_point, &fork_point, &branch, !no_interactive)?;
    println!(
        "{}",
        success_message(cformat!("Reapplied the commits of <bold>{branch}</>"))
    );
    Ok(())
}

pub(crate) fn handle_squash(fork_point: Option<String>) -> anyhow::Result<()> {
    let ctx = load_context()?;
    ctx.repo.ensure_no_ongoing_operation()?;
    let branch = ctx.repo.require_current_branch()?;
    let fork_point = resolve_fork_point_arg(&ctx, &branch, fork_point)?;

    match ops::squash(&ctx.repo, &branch, &fork_point)? {
        ops::SquashResult::Squashed { new_tip } => {
            println!(
                "{}",
                success_message(cformat!("Squashed <bold>{branch}</> into {new_tip}"))
            );
        }
        ops::SquashResult::NothingToSquash { commits } => {
            let reason = if commits == 0 {
                "no commits above the fork point"
            } else {
                "already a single commit above the fork point"
            };
            eprintln!("{}", info_message(format!("Nothing to squash: {reason}")));
        }
    }
    Ok(())
}

/// Resolve a `-f/--fork-point` argument, falling back to the engine.
///
/// An explicit revision must resolve and be an ancestor of the branch —
/// the same validity rule overrides follow.
fn resolve_fork_point_arg(
    ctx: &Context,
    branch: &str,
    arg: Option<String>,
) -> anyhow::Result<String> {
    match arg {
        Some(revision) => {
            let commit = ctx
                .repo
                .commit_hash(&revision)?
                .ok_or_else(|| GitError::message(format!("Cannot resolve revision {revision}")))?;
            if !ctx.repo.is_ancestor(&commit, &local_ref(branch))? {
                return Err(GitError::message(format!(
                    "{revision} is not an ancestor of {branch}"
                ))
                .into());
            }
            Ok(commit)
        }
        None => Ok(forkpoint::require_fork_point(&ctx.repo, &ctx.tree, branch)?.commit),
    }
}

pub(crate) fn handle_delete_unmanaged(yes: bool) -> anyhow::Result<()> {
    let Context { repo, tree } = super::load_context_or_empty()?;
    let current = repo.current_branch()?;

    let unmanaged: Vec<String> = repo
        .local_branches()?
        .into_iter()
        .filter(|b| !tree.is_managed(b) && current.as_deref() != Some(b.as_str()))
        .collect();
    if unmanaged.is_empty() {
        eprintln!("{}", info_message("No unmanaged branches to delete"));
        return Ok(());
    }

    let mut prompter = TtyPrompter::new(yes);
    let mut deleted = 0usize;
    for branch in unmanaged {
        let merged = repo.is_ancestor(&local_ref(&branch), "HEAD")?;
        let label = if merged { "merged to HEAD" } else { "unmerged" };
        match prompter.ask(&cformat!("Delete <bold>{branch}</> ({label})?"))? {
            Answer::Yes => {
                ops::delete_branch(&repo, &branch, !merged)?;
                deleted += 1;
            }
            Answer::YesQuit => {
                ops::delete_branch(&repo, &branch, !merged)?;
                deleted += 1;
                break;
            }
            Answer::No => {}
            Answer::Quit => break,
        }
    }
    println!(
        "{}",
        success_message(format!("Deleted {deleted} branch(es)"))
    );
    Ok(())
}
