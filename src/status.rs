//! Status rendering: the annotated tree view.
//!
//! One line per managed branch, preceded by a vertical edge line; the edge
//! connector encodes the parent-edge sync state and takes its color:
//!
//! ```text
//! master
//! |
//! o-develop  PR base
//! | |
//! | x-feature (ahead of origin)
//! |
//! m-old-experiment
//! ```
//!
//! `o-` green in-sync, `?-` yellow fork-point-off, `x-` red out-of-sync,
//! `m-` grey merged. The current branch is underlined (bold blue on
//! terminals without underline support). `--list-commits` inserts the
//! commits of the fork-point..tip range above each branch line, oldest
//! first.

use std::collections::HashMap;

use anstyle::Style;
use serde::Serialize;

use crate::forkpoint::{self, ForkPoint};
use crate::git::{GitError, Repository};
use crate::hooks;
use crate::layout::{BranchTree, Qualifiers};
use crate::styling::{
    CURRENT_BRANCH, CURRENT_BRANCH_PLAIN, DIM, EDGE_FORK_POINT_OFF, EDGE_IN_SYNC, EDGE_MERGED,
    EDGE_OUT_OF_SYNC, terminal_supports_underline,
};
use crate::sync::{self, RemoteSyncState, SquashMergeDetection, SyncState};

/// Git config key: one extra space between the edge connector and the
/// branch name.
pub const EXTRA_SPACE_KEY: &str = "trellis.status.extraSpaceBeforeBranchName";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFormat {
    #[default]
    Display,
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOptions {
    /// List commits in the fork-point..tip range under each branch.
    pub list_commits: bool,
    /// Also show (shortened) commit hashes.
    pub with_hashes: bool,
    pub format: StatusFormat,
}

/// Everything the renderer (or a JSON consumer) needs to know per branch.
#[derive(Debug, Serialize)]
struct BranchStatus {
    name: String,
    depth: usize,
    parent: Option<String>,
    annotation: Option<String>,
    #[serde(serialize_with = "serialize_qualifiers")]
    qualifiers: Qualifiers,
    sync_to_parent: Option<SyncState>,
    sync_to_remote: RemoteSyncState,
    remote_counterpart: Option<String>,
    fork_point: Option<String>,
}

fn serialize_qualifiers<S: serde::Serializer>(q: &Qualifiers, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;
    let mut out = s.serialize_struct("Qualifiers", 3)?;
    out.serialize_field("rebase", &!q.no_rebase)?;
    out.serialize_field("push", &!q.no_push)?;
    out.serialize_field("slide-out", &!q.no_slide_out)?;
    out.end()
}

fn collect(
    repo: &Repository,
    tree: &BranchTree,
    mode: SquashMergeDetection,
) -> Result<Vec<BranchStatus>, GitError> {
    let mut statuses = Vec::new();
    for branch in tree.pre_order() {
        let parent = tree.parent(&branch);
        let sync_to_parent = match &parent {
            Some(p) => Some(sync::parent_edge(repo, tree, p, &branch, mode)?),
            None => None,
        };
        let fork_point = forkpoint::fork_point(repo, tree, &branch)?.map(|fp: ForkPoint| fp.commit);
        statuses.push(BranchStatus {
            depth: tree.depth(&branch).unwrap_or(0),
            annotation: tree.annotation(&branch).map(|a| a.text().to_string()),
            qualifiers: tree.qualifiers(&branch),
            sync_to_parent,
            sync_to_remote: sync::remote_state(repo, &branch)?,
            remote_counterpart: repo.counterpart(&branch)?.map(|rb| rb.to_string()),
            fork_point,
            parent,
            name: branch,
        });
    }
    Ok(statuses)
}

/// Render the status view to a string.
pub fn render(
    repo: &Repository,
    tree: &BranchTree,
    opts: StatusOptions,
) -> anyhow::Result<String> {
    let mode = sync::squash_merge_detection(repo)?;
    let statuses = collect(repo, tree, mode)?;

    if opts.format == StatusFormat::Json {
        let mut json = serde_json::to_string_pretty(&statuses)?;
        json.push('\n');
        return Ok(json);
    }

    let current = repo.current_branch()?;
    let extra_space = repo.config_bool(EXTRA_SPACE_KEY, false)?;
    let sep = if extra_space { " " } else { "" };
    let underline_ok = terminal_supports_underline();

    // Siblings-below lookup for the vertical continuation segments
    let has_later_sibling: HashMap<&str, bool> = statuses
        .iter()
        .map(|st| {
            let later = match &st.parent {
                Some(p) => {
                    let siblings = tree.children(p);
                    siblings.last().map(String::as_str) != Some(st.name.as_str())
                }
                None => false,
            };
            (st.name.as_str(), later)
        })
        .collect();

    let mut out = String::new();
    for st in &statuses {
        let prefix = edge_prefix(tree, &st.name, &has_later_sibling);

        if let Some(state) = st.sync_to_parent {
            let style = edge_style(state);
            out.push_str(&format!("{prefix}{style}|{style:#}\n"));

            if opts.list_commits
                && let Some(fp) = &st.fork_point
            {
                let tip = crate::git::local_ref(&st.name);
                for (hash, subject) in repo.commits_between(fp, &tip)? {
                    let line = if opts.with_hashes {
                        format!("{} {subject}", &hash[..hash.len().min(8)])
                    } else {
                        subject
                    };
                    out.push_str(&format!("{prefix}{style}|{style:#} {DIM}{line}{DIM:#}\n"));
                }
            }

            let connector = match state {
                SyncState::InSync => "o-",
                SyncState::InSyncButForkPointOff => "?-",
                SyncState::OutOfSync => "x-",
                SyncState::Merged => "m-",
            };
            out.push_str(&format!("{prefix}{style}{connector}{style:#}{sep}"));
        } else {
            out.push_str(&prefix);
        }

        let is_current = current.as_deref() == Some(st.name.as_str());
        let name_style = if is_current {
            if underline_ok { CURRENT_BRANCH } else { CURRENT_BRANCH_PLAIN }
        } else {
            Style::new()
        };
        out.push_str(&format!("{name_style}{}{name_style:#}", st.name));

        for decoration in decorations(repo, st) {
            out.push(' ');
            out.push_str(&decoration);
        }
        out.push('\n');
    }
    Ok(out)
}

/// Vertical continuation segments for every ancestor below the root.
fn edge_prefix(tree: &BranchTree, branch: &str, has_later_sibling: &HashMap<&str, bool>) -> String {
    let mut segments = Vec::new();
    let mut cursor = tree.parent(branch);
    while let Some(b) = cursor {
        cursor = tree.parent(&b);
        // The root contributes no segment; its children sit at column 0
        if cursor.is_some() {
            let seg = if has_later_sibling.get(b.as_str()).copied().unwrap_or(false) {
                "| "
            } else {
                "  "
            };
            segments.push(seg);
        }
    }
    segments.reverse();
    segments.concat()
}

fn edge_style(state: SyncState) -> Style {
    match state {
        SyncState::InSync => EDGE_IN_SYNC,
        SyncState::InSyncButForkPointOff => EDGE_FORK_POINT_OFF,
        SyncState::OutOfSync => EDGE_OUT_OF_SYNC,
        SyncState::Merged => EDGE_MERGED,
    }
}

fn decorations(repo: &Repository, st: &BranchStatus) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(ann) = &st.annotation {
        out.push(format!("{DIM}{ann}{DIM:#}"));
    }

    let counterpart = st.remote_counterpart.as_deref().unwrap_or("origin");
    let remote_note = match st.sync_to_remote {
        RemoteSyncState::NoRemotes | RemoteSyncState::InSync => None,
        RemoteSyncState::Untracked => Some("(untracked)".to_string()),
        RemoteSyncState::Ahead => Some(format!("(ahead of {counterpart})")),
        RemoteSyncState::Behind => Some(format!("(behind {counterpart})")),
        RemoteSyncState::DivergedAndNewer => Some(format!("(diverged from {counterpart})")),
        RemoteSyncState::DivergedAndOlder => {
            Some(format!("(diverged from & older than {counterpart})"))
        }
    };
    if let Some(note) = remote_note {
        out.push(format!("{EDGE_OUT_OF_SYNC}{note}{EDGE_OUT_OF_SYNC:#}"));
    }

    if let Some(line) = hooks::status_branch_line(repo, &st.name, true) {
        out.push(line);
    }

    out
}
