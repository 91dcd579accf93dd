//! Commands that edit the layout: add, advance, anno, discover, edit,
//! file, slide-out.

use color_print::cformat;

use trellis::discover::{self, DiscoverOptions};
use trellis::git::{GitError, Repository, local_ref};
use trellis::layout;
use trellis::ops;
use trellis::prompt::{Answer, DiscoverAnswer, Prompter, TtyPrompter};
use trellis::shell_exec;
use trellis::status::{self, StatusOptions};
use trellis::styling::{eprintln, info_message, print, println, success_message};

use super::{Context, branch_or_current, load_context, load_context_or_empty};

pub(crate) fn handle_add(
    branch: Option<String>,
    onto: Option<String>,
    as_root: bool,
    as_first_child: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let Context { repo, mut tree } = load_context_or_empty()?;
    let branch = branch_or_current(&repo, branch)?;
    let mut prompter = TtyPrompter::new(yes);

    if !repo.is_local_branch(&branch)? {
        if !create_missing_branch(&repo, &branch, &mut prompter)? {
            eprintln!("{}", info_message("Nothing added"));
            return Ok(());
        }
    }

    if as_root || tree.is_empty() {
        tree.add(&branch, None, true, as_first_child)?;
    } else {
        let parent = match onto {
            Some(p) => p,
            None => {
                let current = repo.require_current_branch()?;
                if tree.is_managed(&current) && current != branch {
                    current
                } else {
                    return Err(GitError::message(format!(
                        "Cannot infer where to attach {branch}; pass --onto <parent> or --as-root"
                    ))
                    .into());
                }
            }
        };
        tree.add(&branch, Some(&parent), false, as_first_child)?;
    }

    layout::file::save(&tree, &repo.layout_file_path()?)?;
    println!(
        "{}",
        success_message(cformat!("Added <bold>{branch}</> to the layout"))
    );
    Ok(())
}

/// A branch named on the command line that does not exist locally yet:
/// create it from its remote counterpart, or from HEAD, after confirming.
fn create_missing_branch(
    repo: &Repository,
    branch: &str,
    prompter: &mut TtyPrompter,
) -> anyhow::Result<bool> {
    if let Some(rb) = repo
        .remote_branches()?
        .into_iter()
        .find(|rb| rb.branch == branch)
    {
        let answer = prompter.ask(&cformat!(
            "Branch <bold>{branch}</> does not exist locally. Create it tracking <bold>{rb}</>?"
        ))?;
        if answer != Answer::Yes && answer != Answer::YesQuit {
            return Ok(false);
        }
        ops::create_tracking_branch(repo, branch, &rb.to_string())?;
        return Ok(true);
    }

    let answer = prompter.ask(&cformat!(
        "Branch <bold>{branch}</> does not exist. Create it at the current HEAD?"
    ))?;
    if answer != Answer::Yes && answer != Answer::YesQuit {
        return Ok(false);
    }
    ops::create_branch(repo, branch, "HEAD")?;
    Ok(true)
}

pub(crate) fn handle_advance(yes: bool) -> anyhow::Result<()> {
    let Context { repo, mut tree } = load_context()?;
    repo.ensure_no_ongoing_operation()?;
    let branch = repo.require_current_branch()?;
    if !tree.is_managed(&branch) {
        return Err(GitError::UnmanagedBranch { branch }.into());
    }

    let mut eligible = Vec::new();
    for child in tree.children(&branch) {
        if repo.is_ancestor(&local_ref(&branch), &local_ref(&child))? {
            eligible.push(child);
        }
    }
    let child = match eligible.as_slice() {
        [one] => one.clone(),
        [] => {
            return Err(GitError::message(format!(
                "No child of {branch} to advance into (none is ahead of it)"
            ))
            .into());
        }
        many => {
            return Err(GitError::message(format!(
                "Ambiguous: {} children of {branch} are ahead of it ({})",
                many.len(),
                many.join(", ")
            ))
            .into());
        }
    };

    let mut prompter = TtyPrompter::new(yes);
    let answer = prompter.ask(&cformat!(
        "Fast-forward <bold>{branch}</> to match <bold>{child}</> and slide <bold>{child}</> out?"
    ))?;
    if answer != Answer::Yes && answer != Answer::YesQuit {
        eprintln!("{}", info_message("Not advancing"));
        return Ok(());
    }

    ops::fast_forward_to(&repo, &child)?;
    ops::slide_out_of_layout(&repo, &mut tree, &[child.clone()])?;
    println!(
        "{}",
        success_message(cformat!(
            "Advanced <bold>{branch}</> to <bold>{child}</> and slid <bold>{child}</> out"
        ))
    );
    Ok(())
}

pub(crate) fn handle_anno(branch: Option<String>, text: Vec<String>) -> anyhow::Result<()> {
    let mut ctx = load_context()?;
    let branch = super::managed_branch_or_current(&ctx, branch)?;

    if text.is_empty() {
        if let Some(ann) = ctx.tree.annotation(&branch) {
            println!("{}", ann.text());
        }
        return Ok(());
    }

    let joined = text.join(" ");
    ctx.tree.set_annotation(&branch, &joined)?;
    layout::file::save(&ctx.tree, &ctx.repo.layout_file_path()?)?;
    if joined.trim().is_empty() {
        println!(
            "{}",
            success_message(cformat!("Cleared annotation of <bold>{branch}</>"))
        );
    } else {
        println!(
            "{}",
            success_message(cformat!("Annotated <bold>{branch}</>"))
        );
    }
    Ok(())
}

pub(crate) fn handle_discover(
    roots: Vec<String>,
    checked_out_since: Option<String>,
    yes: bool,
) -> anyhow::Result<()> {
    let Context { repo, tree } = load_context_or_empty()?;
    let previous = (!tree.is_empty()).then_some(&tree);

    let opts = DiscoverOptions {
        roots,
        checked_out_since,
    };
    let candidate = discover::discover(&repo, previous, &opts)?;
    if candidate.is_empty() {
        eprintln!("{}", info_message("No branches discovered"));
        return Ok(());
    }

    let path = repo.layout_file_path()?;
    println!("{}", info_message("Discovered layout:"));
    print!("{}", status::render(&repo, &candidate, StatusOptions::default())?);

    let mut prompter = TtyPrompter::new(yes);
    match prompter.ask_discover(&format!("Save the layout to {}?", path.display()))? {
        DiscoverAnswer::Yes => {
            layout::file::save_with_backup(&candidate, &path)?;
            println!("{}", success_message("Layout saved"));
        }
        DiscoverAnswer::Edit => {
            layout::file::save_with_backup(&candidate, &path)?;
            open_editor(&repo)?;
        }
        DiscoverAnswer::No => {
            eprintln!("{}", info_message("Layout discarded"));
        }
    }
    Ok(())
}

pub(crate) fn handle_edit() -> anyhow::Result<()> {
    let repo = Repository::current()?;
    open_editor(&repo)
}

fn open_editor(repo: &Repository) -> anyhow::Result<()> {
    let path = repo.layout_file_path()?;
    let editor = shell_exec::resolve_editor(repo.config_get("core.editor")?.as_deref());
    let status = shell_exec::spawn_editor(&editor, &path)?;
    if !status.success() {
        return Err(GitError::message(format!("Editor {editor} exited non-zero")).into());
    }
    // Surface syntax errors now rather than on the next command
    if path.exists() {
        layout::file::load(&path)?;
    }
    Ok(())
}

pub(crate) fn handle_file() -> anyhow::Result<()> {
    let repo = Repository::current()?;
    println!("{}", repo.layout_file_path()?.display());
    Ok(())
}

pub(crate) fn handle_slide_out(
    branches: Vec<String>,
    delete: bool,
    no_rebase: bool,
    no_interactive: bool,
) -> anyhow::Result<()> {
    let Context { repo, mut tree } = load_context()?;
    repo.ensure_no_ongoing_operation()?;
    let sequence: Vec<String> = if branches.is_empty() {
        vec![repo.require_current_branch()?]
    } else {
        branches
    };

    let opts = ops::SlideOutOptions {
        delete,
        no_rebase,
        interactive: !no_interactive,
    };
    let outcome = ops::slide_out(&repo, &mut tree, &sequence, opts)?;
    println!(
        "{}",
        success_message(cformat!(
            "Slid <bold>{}</> out; children now under <bold>{}</>",
            sequence.join(", "),
            outcome.new_upstream
        ))
    );
    Ok(())
}
