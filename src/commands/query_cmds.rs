//! Read-only commands: status, list, show, go, is-managed, fork-point,
//! diff, log.
//!
//! `list`, `show`, `file`, `fork-point` and `is-managed` are plumbing:
//! their stdout is stable, uncolored, and they never prompt.

use color_print::cformat;

use trellis::forkpoint;
use trellis::git::{GitError, local_ref};
use trellis::layout::Direction;
use trellis::ops;
use trellis::status::{self, StatusFormat, StatusOptions};
use trellis::styling::{print, println, success_message};

use super::{Context, branch_or_current, load_context, load_context_or_empty};
use crate::cli::Category;

pub(crate) fn handle_status(
    list_commits: bool,
    with_hashes: bool,
    format: StatusFormat,
) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context()?;
    let opts = StatusOptions {
        list_commits: list_commits || with_hashes,
        with_hashes,
        format,
    };
    print!("{}", status::render(&repo, &tree, opts)?);
    Ok(())
}

pub(crate) fn handle_list(category: Category, branch: Option<String>) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context_or_empty()?;

    let lines: Vec<String> = match category {
        Category::Managed => tree.pre_order(),
        Category::Childless => tree.childless(),
        Category::Slidable => tree.slidable(),
        Category::SlidableAfter => {
            let branch = branch.ok_or_else(|| {
                GitError::message("list slidable-after requires a branch")
            })?;
            if !tree.is_managed(&branch) {
                return Err(GitError::UnmanagedBranch { branch }.into());
            }
            tree.slidable_after(&branch)
        }
        Category::Unmanaged => repo
            .local_branches()?
            .into_iter()
            .filter(|b| !tree.is_managed(b))
            .collect(),
        Category::Addable => {
            let local = repo.local_branches()?;
            let mut lines: Vec<String> = local
                .iter()
                .filter(|b| !tree.is_managed(b))
                .cloned()
                .collect();
            for rb in repo.remote_branches()? {
                if !local.contains(&rb.branch) {
                    lines.push(rb.to_string());
                }
            }
            lines
        }
        Category::WithOverriddenForkPoint => {
            let local = repo.local_branches()?;
            forkpoint::overridden_branches(&repo)?
                .into_iter()
                .filter(|b| local.contains(b))
                .collect()
        }
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn handle_show(direction: Direction, branch: Option<String>) -> anyhow::Result<()> {
    let ctx = load_context()?;
    let from = super::managed_branch_or_current(&ctx, branch)?;
    for target in ctx.tree.show(direction, &from)? {
        println!("{target}");
    }
    Ok(())
}

pub(crate) fn handle_go(direction: Direction) -> anyhow::Result<()> {
    let ctx = load_context()?;
    let from = super::managed_branch_or_current(&ctx, None)?;
    let targets = ctx.tree.show(direction, &from)?;
    let target = match targets.as_slice() {
        [one] => one,
        many => {
            return Err(GitError::message(format!(
                "Ambiguous: {} has several children ({})",
                from,
                many.join(", ")
            ))
            .into());
        }
    };
    if *target != from {
        ops::checkout(&ctx.repo, target)?;
    }
    Ok(())
}

pub(crate) fn handle_is_managed(branch: Option<String>) -> anyhow::Result<bool> {
    let Context { repo, tree } = load_context_or_empty()?;
    let branch = match branch {
        Some(b) => b,
        None => match repo.current_branch()? {
            Some(b) => b,
            None => return Ok(false),
        },
    };
    Ok(tree.is_managed(&branch))
}

pub(crate) fn handle_fork_point(
    branch: Option<String>,
    inferred: bool,
    override_to: Option<String>,
    unset_override: bool,
) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context_or_empty()?;
    let branch = branch_or_current(&repo, branch)?;

    if unset_override {
        forkpoint::unset_override(&repo, &branch)?;
        println!(
            "{}",
            success_message(cformat!("Removed fork-point override of <bold>{branch}</>"))
        );
        return Ok(());
    }
    if let Some(revision) = override_to {
        let commit = forkpoint::set_override(&repo, &branch, &revision)?;
        println!(
            "{}",
            success_message(cformat!(
                "Fork point of <bold>{branch}</> overridden to {commit}"
            ))
        );
        return Ok(());
    }

    let fp = if inferred {
        forkpoint::infer(&repo, &tree, &branch)?
    } else {
        forkpoint::fork_point(&repo, &tree, &branch)?
    };
    match fp {
        Some(fp) => {
            println!("{}", fp.commit);
            Ok(())
        }
        None => Err(GitError::ForkPointUnknown { branch }.into()),
    }
}

pub(crate) fn handle_diff(stat: bool, branch: Option<String>) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context_or_empty()?;
    let current = repo.current_branch()?;
    let branch = branch_or_current(&repo, branch)?;
    let fp = forkpoint::require_fork_point(&repo, &tree, &branch)?;

    let mut args = vec!["diff"];
    if stat {
        args.push("--stat");
    }
    let range;
    if current.as_deref() == Some(branch.as_str()) {
        // Current branch: diff the fork point against the working tree
        args.push(&fp.commit);
    } else {
        range = format!("{}..{}", fp.commit, local_ref(&branch));
        args.push(&range);
    }
    repo.interactive(&args, &[])?;
    Ok(())
}

pub(crate) fn handle_log(branch: Option<String>) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context_or_empty()?;
    let branch = branch_or_current(&repo, branch)?;
    let fp = forkpoint::require_fork_point(&repo, &tree, &branch)?;

    let branch_ref = local_ref(&branch);
    let exclude = format!("^{}", fp.commit);
    repo.interactive(&["log", &branch_ref, &exclude], &[])?;
    Ok(())
}
