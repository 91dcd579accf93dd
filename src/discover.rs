//! Layout discovery: infer a plausible initial tree from reflogs.
//!
//! Candidates are the branches checked out recently (by HEAD reflog entry
//! time); the parent of each candidate is found by the fork-point walk
//! restricted to candidate refs. Stale roots that are already merged into a
//! real root are dropped, and annotations from an existing layout survive.

use std::collections::HashMap;

use crate::git::{GitError, Repository, local_ref};
use crate::layout::BranchTree;
use crate::sync::{self, SquashMergeDetection};

/// Root names tried when `--roots` is not given, in preference order.
const DEFAULT_ROOTS: &[&str] = &["master", "main", "develop"];

/// How many recently-checked-out branches to manage by default.
const DEFAULT_CANDIDATE_COUNT: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Explicit roots; empty means the defaults intersected with local
    /// branches.
    pub roots: Vec<String>,
    /// Only branches checked out since this date (any git-approxidate) are
    /// candidates.
    pub checked_out_since: Option<String>,
}

/// Build a candidate tree. The caller is responsible for confirmation and
/// persistence.
pub fn discover(
    repo: &Repository,
    previous: Option<&BranchTree>,
    opts: &DiscoverOptions,
) -> anyhow::Result<BranchTree> {
    let local = repo.local_branches()?;

    let roots: Vec<String> = if opts.roots.is_empty() {
        DEFAULT_ROOTS
            .iter()
            .filter(|r| local.iter().any(|b| b == *r))
            .map(|r| r.to_string())
            .collect()
    } else {
        for root in &opts.roots {
            if !local.iter().any(|b| b == root) {
                return Err(GitError::message(format!("No local branch {root}")).into());
            }
        }
        opts.roots.clone()
    };
    if roots.is_empty() {
        return Err(GitError::message(
            "None of master, main, develop exist locally; pass --roots",
        )
        .into());
    }

    // Last-checkout time per branch, from HEAD's reflog. Both sides of a
    // "checkout: moving from A to B" entry were current around that time.
    let mut last_checkout: HashMap<String, i64> = HashMap::new();
    for (ts, subject) in repo.head_reflog()? {
        if let Some((from, to)) = parse_checkout_subject(&subject) {
            for branch in [from, to] {
                if local.iter().any(|b| b == branch) {
                    let entry = last_checkout.entry(branch.to_string()).or_insert(ts);
                    *entry = (*entry).max(ts);
                }
            }
        }
    }

    let mut candidates: Vec<String> = match &opts.checked_out_since {
        Some(date) => {
            let cutoff = resolve_date(repo, date)?;
            let mut recent: Vec<String> = last_checkout
                .iter()
                .filter(|&(_, &ts)| ts >= cutoff)
                .map(|(b, _)| b.clone())
                .collect();
            recent.sort();
            recent
        }
        None => {
            let mut by_recency: Vec<(&String, &i64)> = last_checkout.iter().collect();
            by_recency.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let mut recent: Vec<String> = by_recency
                .into_iter()
                .take(DEFAULT_CANDIDATE_COUNT)
                .map(|(b, _)| b.clone())
                .collect();
            recent.sort();
            recent
        }
    };
    candidates.retain(|b| !roots.contains(b));

    // Parent inference: the fork-point walk, restricted to candidate refs.
    let managed: Vec<String> = roots.iter().chain(candidates.iter()).cloned().collect();
    let mut parent_of: HashMap<String, String> = HashMap::new();
    for branch in &candidates {
        if let Some(parent) = infer_parent(repo, branch, &managed)? {
            parent_of.insert(branch.clone(), parent);
        }
    }

    // A candidate nobody claims is a root — unless it is merged into one of
    // the real roots already, in which case it is stale and dropped.
    let mut extra_roots = Vec::new();
    let mut kept: Vec<String> = Vec::new();
    for branch in &candidates {
        if parent_of.contains_key(branch) {
            kept.push(branch.clone());
            continue;
        }
        let mut merged = false;
        for root in &roots {
            if sync::is_merged_to(repo, branch, root, SquashMergeDetection::Simple)? {
                merged = true;
                break;
            }
        }
        if !merged {
            extra_roots.push(branch.clone());
            kept.push(branch.clone());
        }
    }
    let mut tree = BranchTree::new();
    if let Some(prev) = previous {
        tree.indent = prev.indent;
    }
    for root in roots.iter().chain(extra_roots.iter()) {
        tree.add(root, None, true, false)?;
    }
    // Attach children breadth-first so parents exist before their children
    let mut remaining: Vec<String> = kept
        .iter()
        .filter(|b| parent_of.contains_key(*b))
        .cloned()
        .collect();
    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|branch| {
            let parent = &parent_of[branch];
            if tree.is_managed(parent) {
                tree.add(branch, Some(parent), false, false)
                    .expect("parent verified managed");
                false
            } else {
                true
            }
        });
        if remaining.len() == before {
            // Orphaned chain (parent was dropped as merged): make them roots
            for branch in remaining.drain(..) {
                tree.add(&branch, None, true, false)?;
            }
        }
    }

    // Keep annotations (and with them, qualifiers) from the previous layout
    if let Some(prev) = previous {
        for branch in tree.pre_order() {
            if let Some(ann) = prev.annotation(&branch) {
                tree.set_annotation(&branch, ann.text())?;
            }
        }
    }

    Ok(tree)
}

/// Walk the first-parent history of `branch`; the first commit appearing in
/// the reflog index under another *candidate* ref names the parent.
fn infer_parent(
    repo: &Repository,
    branch: &str,
    candidates: &[String],
) -> Result<Option<String>, GitError> {
    let own_ref = local_ref(branch);
    let index = repo.reflog_index()?;

    for commit in repo.first_parent_history(&own_ref)? {
        let Some(refs) = index.get(&commit) else {
            continue;
        };
        let mut best: Option<&str> = None;
        for r in refs {
            if *r == own_ref {
                continue;
            }
            let Some(name) = ref_to_branch(r) else {
                continue;
            };
            if name == branch || !candidates.iter().any(|c| c == name) {
                continue;
            }
            // Candidate order encodes preference (roots first)
            let rank = |n: &str| candidates.iter().position(|c| c == n);
            if best.is_none_or(|b| rank(name) < rank(b)) {
                best = Some(name);
            }
        }
        if let Some(parent) = best {
            return Ok(Some(parent.to_string()));
        }
    }
    Ok(None)
}

/// Map an index ref label back to a local branch name.
fn ref_to_branch(full_ref: &str) -> Option<&str> {
    if let Some(name) = full_ref.strip_prefix("refs/heads/") {
        return Some(name);
    }
    // refs/remotes/<remote>/<branch> — the counterpart of the local branch
    let rest = full_ref.strip_prefix("refs/remotes/")?;
    rest.split_once('/').map(|(_, branch)| branch)
}

fn parse_checkout_subject(subject: &str) -> Option<(&str, &str)> {
    let rest = subject.strip_prefix("checkout: moving from ")?;
    rest.split_once(" to ")
}

/// Resolve a git approxidate to a unix timestamp.
///
/// `git rev-parse --since=<date>` prints `--max-age=<timestamp>`, which is
/// the only date parser git exposes.
fn resolve_date(repo: &Repository, date: &str) -> Result<i64, GitError> {
    let arg = format!("--since={date}");
    let out = repo.stdout(&["rev-parse", &arg])?;
    out.trim()
        .strip_prefix("--max-age=")
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| GitError::ParseError(format!("Cannot parse date {date:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_subject_parsing() {
        assert_eq!(
            parse_checkout_subject("checkout: moving from master to feature"),
            Some(("master", "feature"))
        );
        assert_eq!(parse_checkout_subject("commit: add stuff"), None);
    }

    #[test]
    fn ref_to_branch_mapping() {
        assert_eq!(ref_to_branch("refs/heads/feature"), Some("feature"));
        assert_eq!(ref_to_branch("refs/remotes/origin/feature"), Some("feature"));
        assert_eq!(ref_to_branch("refs/tags/v1"), None);
    }
}
