//! Fork-point engine against real repositories.

mod common;

use common::TestRepo;
use trellis::forkpoint::{self, ForkPointSource};
use trellis::git::local_ref;
use trellis::layout::parse;

#[test]
fn fork_point_of_stacked_branch_is_parent_tip() {
    let repo = TestRepo::new();
    repo.commit("Second on master");
    let master_tip = repo.hash("master");

    repo.checkout_new("feature");
    repo.commit("Feature work");
    repo.commit("More feature work");

    let tree = parse("master\n  feature\n").unwrap();
    let fp = forkpoint::fork_point(&repo.repo(), &tree, "feature")
        .unwrap()
        .expect("fork point must be inferred");
    assert_eq!(fp.commit, master_tip);
    assert_eq!(fp.source, ForkPointSource::Inferred);
}

#[test]
fn fork_point_is_an_ancestor_of_the_tip() {
    let repo = TestRepo::new();
    repo.checkout_new("feature");
    repo.commit("Feature work");

    let tree = parse("master\n  feature\n").unwrap();
    let git = repo.repo();
    let fp = forkpoint::fork_point(&git, &tree, "feature").unwrap().unwrap();
    assert!(
        git.is_ancestor(&fp.commit, &local_ref("feature")).unwrap(),
        "fork point must be an ancestor of the branch tip"
    );
}

#[test]
fn fork_point_survives_parent_moving_on() {
    let repo = TestRepo::new();
    let old_master = repo.hash("master");
    repo.checkout_new("feature");
    repo.commit("Feature work");
    repo.checkout("master");
    repo.commit("Master moved on");

    let tree = parse("master\n  feature\n").unwrap();
    let fp = forkpoint::fork_point(&repo.repo(), &tree, "feature").unwrap().unwrap();
    // The fork point stays at the commit the branch actually forked from
    assert_eq!(fp.commit, old_master);
}

#[test]
fn override_applies_while_ancestor_and_is_ignored_after_reset() {
    let repo = TestRepo::new();
    let master_tip = repo.hash("master");
    repo.checkout_new("feat");
    let h0 = repo.commit("First");
    repo.commit("Second");

    let git = repo.repo();
    let tree = parse("master\n  feat\n").unwrap();

    forkpoint::set_override(&git, "feat", &h0).unwrap();
    let fp = forkpoint::fork_point(&git, &tree, "feat").unwrap().unwrap();
    assert_eq!(fp.commit, h0);
    assert_eq!(fp.source, ForkPointSource::Override);

    // Reset feat so h0 is no longer an ancestor
    repo.git(&["reset", "-q", "--hard", &master_tip]);
    git.flush_caches();

    let fp = forkpoint::fork_point(&git, &tree, "feat").unwrap().unwrap();
    assert_ne!(fp.commit, h0, "invalid override must fall back to inference");
    // The config entry itself is untouched
    assert_eq!(
        git.config_get(&forkpoint::override_key("feat")).unwrap(),
        Some(h0)
    );
}

#[test]
fn set_override_rejects_non_ancestors() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feature work");
    repo.checkout("master");
    let unrelated = repo.commit("Master only");

    let err = forkpoint::set_override(&repo.repo(), "feat", &unrelated).unwrap_err();
    assert!(err.to_string().contains("not an ancestor"));
}

#[test]
fn unset_override_removes_the_key() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    let h = repo.commit("Feature work");

    let git = repo.repo();
    forkpoint::set_override(&git, "feat", &h).unwrap();
    assert_eq!(forkpoint::overridden_branches(&git).unwrap(), ["feat"]);

    forkpoint::unset_override(&git, "feat").unwrap();
    assert!(forkpoint::overridden_branches(&git).unwrap().is_empty());
    // Unsetting twice is fine
    forkpoint::unset_override(&git, "feat").unwrap();
}

#[test]
fn parent_fallback_when_reflogs_expired() {
    let repo = TestRepo::new();
    repo.checkout_new("feature");
    repo.commit("Feature work");
    let master_tip = repo.hash("master");

    // Expire every reflog, the way `git reflog expire` eventually would
    repo.git(&["reflog", "expire", "--expire=all", "--all"]);
    repo.git(&["checkout", "-q", "master"]);
    repo.git(&["reflog", "expire", "--expire=all", "HEAD"]);

    let git = repo.repo();
    let tree = parse("master\n  feature\n").unwrap();
    let fp = forkpoint::fork_point(&git, &tree, "feature").unwrap().unwrap();
    assert_eq!(fp.commit, master_tip);
    assert_eq!(fp.source, ForkPointSource::ParentFallback);
}

#[test]
fn unknown_fork_point_without_parent_fallback() {
    let repo = TestRepo::new();
    // An unrelated root: orphan branch with its own history
    repo.git(&["checkout", "-q", "--orphan", "island"]);
    repo.git(&["commit", "-q", "--allow-empty", "-m", "Island root"]);
    repo.git(&["reflog", "expire", "--expire=all", "--all"]);
    repo.git(&["reflog", "expire", "--expire=all", "HEAD"]);

    let git = repo.repo();
    // master is not an ancestor of island, so the fallback does not apply
    let tree = parse("master\n  island\n").unwrap();
    assert!(forkpoint::fork_point(&git, &tree, "island").unwrap().is_none());
    assert!(forkpoint::require_fork_point(&git, &tree, "island").is_err());
}
