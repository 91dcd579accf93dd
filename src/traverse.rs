//! The traverser: walk the layout in pre-order and bring every branch in
//! sync with its parent and its remote.
//!
//! Per branch the flow is strictly linear — propose a slide-out or an
//! update (rebase/merge), then a push, reset or pull, then print the tree
//! and advance. There is no re-entry and no persistent traversal state: a
//! conflict aborts the walk in place, and re-running `traverse` resumes
//! from the then-current branch.

use color_print::cformat;

use crate::git::{GitError, Repository, local_ref};
use crate::layout::BranchTree;
use crate::ops;
use crate::prompt::{Answer, Prompter};
use crate::status::{self, StatusOptions};
use crate::styling::{info_message, print, println, success_message};
use crate::forkpoint;
use crate::sync::{self, RemoteSyncState, SquashMergeDetection, SyncState};

/// Where the walk starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StartFrom {
    /// The current branch (which must be managed).
    #[default]
    Here,
    /// The root of the current branch's tree.
    Root,
    /// The first root in the layout.
    FirstRoot,
}

/// Where HEAD ends up after a completed walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReturnTo {
    /// The branch that was checked out when the walk started.
    Here,
    /// The surviving branch closest to the starting position in pre-order.
    NearestRemaining,
    /// Wherever the walk finished.
    #[default]
    Stay,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraverseOptions {
    /// Fetch all remotes first.
    pub fetch: bool,
    /// Merge the parent into out-of-sync branches instead of rebasing.
    pub merge: bool,
    /// Override the `trellis.traverse.push` config.
    pub push_override: Option<bool>,
    pub start_from: StartFrom,
    pub return_to: ReturnTo,
    /// Interactive rebases (ignored with `merge`).
    pub interactive: bool,
}

/// What happened during a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraverseOutcome {
    pub visited: usize,
    pub actions: usize,
    /// The user answered `q`/`yq` before the end.
    pub quit_early: bool,
}

enum Flow {
    Continue,
    Quit,
}

/// Walk the tree, proposing and applying sync actions per branch.
pub fn traverse(
    repo: &Repository,
    tree: &mut BranchTree,
    prompter: &mut dyn Prompter,
    opts: TraverseOptions,
) -> anyhow::Result<TraverseOutcome> {
    repo.ensure_no_ongoing_operation()?;
    if tree.is_empty() {
        return Err(GitError::LayoutMissing {
            path: repo.layout_file_path()?,
        }
        .into());
    }

    if opts.fetch {
        println!("{}", info_message("Fetching remotes..."));
        ops::fetch_all(repo)?;
    }

    let mode = sync::squash_merge_detection(repo)?;
    let push_enabled = match opts.push_override {
        Some(v) => v,
        None => repo.config_bool("trellis.traverse.push", true)?,
    };

    let initial_branch = repo.require_current_branch()?;
    let start = match opts.start_from {
        StartFrom::Here => {
            if !tree.is_managed(&initial_branch) {
                return Err(GitError::UnmanagedBranch {
                    branch: initial_branch,
                }
                .into());
            }
            initial_branch.clone()
        }
        StartFrom::Root => {
            if !tree.is_managed(&initial_branch) {
                return Err(GitError::UnmanagedBranch {
                    branch: initial_branch,
                }
                .into());
            }
            tree.root_of(&initial_branch)?
        }
        StartFrom::FirstRoot => tree.roots().first().cloned().expect("layout is non-empty"),
    };

    let original_order = tree.pre_order();
    let mut outcome = TraverseOutcome::default();
    let mut cursor = Some(start);

    while let Some(branch) = cursor.take() {
        let order_before = tree.pre_order();
        let index_before = order_before
            .iter()
            .position(|b| *b == branch)
            .expect("cursor always points at a managed branch");

        outcome.visited += 1;
        let actions_before = outcome.actions;
        let flow = visit_branch(repo, tree, prompter, &branch, mode, push_enabled, &opts, &mut outcome)?;

        if outcome.actions > actions_before {
            print!("{}", status::render(repo, tree, StatusOptions::default())?);
        }

        match flow {
            Flow::Quit => {
                outcome.quit_early = true;
                break;
            }
            Flow::Continue => {
                let order_after = tree.pre_order();
                cursor = if tree.is_managed(&branch) {
                    let idx = order_after
                        .iter()
                        .position(|b| *b == branch)
                        .expect("still managed");
                    order_after.get(idx + 1).cloned()
                } else {
                    // The branch was slid out; its subtree shifted up into
                    // its old position.
                    order_after.get(index_before).cloned()
                };
            }
        }
    }

    if outcome.quit_early {
        // `q`/`yq` and conflicts stay put; --return-to is ignored
        return Ok(outcome);
    }

    match opts.return_to {
        ReturnTo::Stay => {}
        ReturnTo::Here => {
            if repo.current_branch()?.as_deref() != Some(initial_branch.as_str()) {
                ops::checkout(repo, &initial_branch)?;
            }
        }
        ReturnTo::NearestRemaining => {
            if let Some(target) = nearest_remaining(tree, &original_order, &initial_branch)
                && repo.current_branch()?.as_deref() != Some(target.as_str())
            {
                ops::checkout(repo, &target)?;
            }
        }
    }

    println!(
        "{}",
        success_message(format!(
            "Traversal done: {} branch(es) visited, {} action(s) applied",
            outcome.visited, outcome.actions
        ))
    );
    Ok(outcome)
}

/// The surviving branch closest to `branch` in the original pre-order:
/// itself, else the nearest following survivor, else the nearest preceding
/// one.
fn nearest_remaining(tree: &BranchTree, original_order: &[String], branch: &str) -> Option<String> {
    if tree.is_managed(branch) {
        return Some(branch.to_string());
    }
    let idx = original_order.iter().position(|b| b == branch)?;
    original_order[idx + 1..]
        .iter()
        .find(|b| tree.is_managed(b))
        .or_else(|| original_order[..idx].iter().rev().find(|b| tree.is_managed(b)))
        .cloned()
}

#[allow(clippy::too_many_arguments)]
fn visit_branch(
    repo: &Repository,
    tree: &mut BranchTree,
    prompter: &mut dyn Prompter,
    branch: &str,
    mode: SquashMergeDetection,
    push_enabled: bool,
    opts: &TraverseOptions,
    outcome: &mut TraverseOutcome,
) -> anyhow::Result<Flow> {
    let qualifiers = tree.qualifiers(branch);
    let mut quit_after = false;

    // Step 1/2: the parent edge — slide out a merged branch, or update an
    // out-of-sync one.
    if let Some(parent) = tree.parent(branch) {
        let edge = sync::parent_edge(repo, tree, &parent, branch, mode)?;
        match edge {
            SyncState::Merged if !qualifiers.no_slide_out => {
                match prompter.ask(&cformat!(
                    "Branch <bold>{branch}</> is merged into <bold>{parent}</>. Slide it out of the layout?"
                ))? {
                    answer @ (Answer::Yes | Answer::YesQuit) => {
                        ops::slide_out_of_layout(repo, tree, &[branch.to_string()])?;
                        outcome.actions += 1;
                        println!(
                            "{}",
                            success_message(cformat!("Slid <bold>{branch}</> out of the layout"))
                        );
                        // No remote steps for a branch no longer in the layout
                        return Ok(if answer == Answer::YesQuit {
                            Flow::Quit
                        } else {
                            Flow::Continue
                        });
                    }
                    Answer::No => {}
                    Answer::Quit => return Ok(Flow::Quit),
                }
            }
            SyncState::OutOfSync | SyncState::InSyncButForkPointOff if !qualifiers.no_rebase => {
                if opts.merge {
                    match prompter.ask(&cformat!(
                        "Merge <bold>{parent}</> into <bold>{branch}</>?"
                    ))? {
                        answer @ (Answer::Yes | Answer::YesQuit) => {
                            if answer == Answer::YesQuit {
                                quit_after = true;
                            }
                            ensure_checked_out(repo, branch)?;
                            ops::merge_parent(repo, &parent, true)?;
                            outcome.actions += 1;
                            println!(
                                "{}",
                                success_message(cformat!(
                                    "Merged <bold>{parent}</> into <bold>{branch}</>"
                                ))
                            );
                        }
                        Answer::No => {}
                        Answer::Quit => return Ok(Flow::Quit),
                    }
                } else {
                    let fork_point = forkpoint::require_fork_point(repo, tree, branch)?;
                    match prompter.ask(&cformat!(
                        "Rebase <bold>{branch}</> onto <bold>{parent}</>?"
                    ))? {
                        answer @ (Answer::Yes | Answer::YesQuit) => {
                            if answer == Answer::YesQuit {
                                quit_after = true;
                            }
                            ops::rebase_onto(
                                repo,
                                &local_ref(&parent),
                                &fork_point.commit,
                                branch,
                                opts.interactive,
                            )?;
                            outcome.actions += 1;
                            println!(
                                "{}",
                                success_message(cformat!(
                                    "Rebased <bold>{branch}</> onto <bold>{parent}</>"
                                ))
                            );
                        }
                        Answer::No => {}
                        Answer::Quit => return Ok(Flow::Quit),
                    }
                }
            }
            _ => {}
        }
    }

    if quit_after {
        return Ok(Flow::Quit);
    }

    // Steps 3-5: the remote — push, reset or pull. State is re-read here
    // because a rebase above changed the tip.
    let remote_state = sync::remote_state(repo, branch)?;
    let pushable = matches!(
        remote_state,
        RemoteSyncState::Untracked | RemoteSyncState::Ahead | RemoteSyncState::DivergedAndNewer
    );

    if push_enabled && !qualifiers.no_push && pushable {
        let remote = ops::push_remote(repo, branch, prompter)?;
        let force = remote_state == RemoteSyncState::DivergedAndNewer;
        let question = if force {
            cformat!("Force-push (with lease) <bold>{branch}</> to <bold>{remote}</>?")
        } else {
            cformat!("Push <bold>{branch}</> to <bold>{remote}</>?")
        };
        match prompter.ask(&question)? {
            answer @ (Answer::Yes | Answer::YesQuit) => {
                ops::push(repo, branch, &remote, force)?;
                outcome.actions += 1;
                println!(
                    "{}",
                    success_message(cformat!("Pushed <bold>{branch}</> to <bold>{remote}</>"))
                );
                if answer == Answer::YesQuit {
                    return Ok(Flow::Quit);
                }
            }
            Answer::No => {}
            Answer::Quit => return Ok(Flow::Quit),
        }
    } else if remote_state == RemoteSyncState::DivergedAndOlder {
        let counterpart = repo
            .counterpart(branch)?
            .expect("diverged implies a counterpart");
        match prompter.ask(&cformat!(
            "Reset <bold>{branch}</> to <bold>{counterpart}</> (keeping local changes)?"
        ))? {
            answer @ (Answer::Yes | Answer::YesQuit) => {
                ensure_checked_out(repo, branch)?;
                ops::reset_keep(repo, &counterpart.full_ref())?;
                outcome.actions += 1;
                println!(
                    "{}",
                    success_message(cformat!("Reset <bold>{branch}</> to <bold>{counterpart}</>"))
                );
                if answer == Answer::YesQuit {
                    return Ok(Flow::Quit);
                }
            }
            Answer::No => {}
            Answer::Quit => return Ok(Flow::Quit),
        }
    } else if remote_state == RemoteSyncState::Behind {
        let counterpart = repo
            .counterpart(branch)?
            .expect("behind implies a counterpart");
        match prompter.ask(&cformat!(
            "Fast-forward <bold>{branch}</> to match <bold>{counterpart}</>?"
        ))? {
            answer @ (Answer::Yes | Answer::YesQuit) => {
                ensure_checked_out(repo, branch)?;
                ops::pull_ff(repo, &counterpart.full_ref())?;
                outcome.actions += 1;
                println!(
                    "{}",
                    success_message(cformat!(
                        "Fast-forwarded <bold>{branch}</> to <bold>{counterpart}</>"
                    ))
                );
                if answer == Answer::YesQuit {
                    return Ok(Flow::Quit);
                }
            }
            Answer::No => {}
            Answer::Quit => return Ok(Flow::Quit),
        }
    }

    Ok(Flow::Continue)
}

fn ensure_checked_out(repo: &Repository, branch: &str) -> Result<(), GitError> {
    if repo.current_branch()?.as_deref() != Some(branch) {
        ops::checkout(repo, branch)?;
    }
    Ok(())
}
