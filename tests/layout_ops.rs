//! Side-effecting operations: slide-out, squash, push, advance-style
//! fast-forwards — driven through the library against real repositories.

mod common;

use common::TestRepo;
use trellis::forkpoint;
use trellis::git::local_ref;
use trellis::layout::{self, parse, serialize};
use trellis::ops::{self, SlideOutOptions, SquashResult};
use trellis::prompt::{Answer, ScriptedPrompter};

/// master → A → B → C, A → D; slide A out.
#[test]
fn slide_out_reattaches_and_persists() {
    let repo = TestRepo::new();
    repo.checkout_new("A");
    repo.commit("A work");
    repo.checkout_new("B");
    repo.commit("B work");
    repo.checkout_new("C");
    repo.commit("C work");
    repo.checkout("A");
    repo.checkout_new("D");
    repo.commit("D work");

    repo.write_layout("master\n  A\n    B\n      C\n    D\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    let outcome = ops::slide_out(
        &git,
        &mut tree,
        &["A".to_string()],
        SlideOutOptions {
            delete: false,
            interactive: false,
            no_rebase: false,
        },
    )
    .unwrap();
    assert_eq!(outcome.new_upstream, "master");
    assert_eq!(outcome.new_downstreams, ["B", "D"]);

    // Persisted file reloads to the same tree, with B and D at depth 1
    let reloaded = repo.tree();
    assert_eq!(serialize(&reloaded), "master\n  B\n    C\n  D\n");
    assert_eq!(reloaded.depth("B"), Some(1));
    assert_eq!(reloaded.depth("D"), Some(1));
    assert_eq!(reloaded.children("master"), ["B", "D"]);

    // The survivors were rebased onto master: their histories no longer
    // contain A's commit
    git.flush_caches();
    assert!(git.is_ancestor(&local_ref("master"), &local_ref("B")).unwrap());
    assert!(git.is_ancestor(&local_ref("master"), &local_ref("D")).unwrap());
    let a_tip = repo.hash("A");
    assert!(!git.is_ancestor(&a_tip, &local_ref("B")).unwrap());
    assert!(!git.is_ancestor(&a_tip, &local_ref("D")).unwrap());
}

#[test]
fn slide_out_with_delete_removes_branches() {
    let repo = TestRepo::new();
    repo.checkout_new("doomed");
    repo.commit("Doomed work");
    repo.checkout_new("child");
    repo.commit("Child work");
    repo.checkout("master");

    repo.write_layout("master\n  doomed\n    child\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    ops::slide_out(
        &git,
        &mut tree,
        &["doomed".to_string()],
        SlideOutOptions {
            delete: true,
            interactive: false,
            no_rebase: false,
        },
    )
    .unwrap();

    git.flush_caches();
    assert!(!git.is_local_branch("doomed").unwrap());
    assert!(git.is_local_branch("child").unwrap());
    assert_eq!(repo.read_layout(), "master\n  child\n");
}

#[test]
fn slide_out_no_rebase_keeps_children_in_place() {
    let repo = TestRepo::new();
    repo.checkout_new("mid");
    repo.commit("Mid work");
    repo.checkout_new("leaf");
    repo.commit("Leaf work");

    repo.write_layout("master\n  mid\n    leaf\n");
    let git = repo.repo();
    let mut tree = repo.tree();
    let leaf_tip = repo.hash("leaf");

    ops::slide_out(
        &git,
        &mut tree,
        &["mid".to_string()],
        SlideOutOptions {
            delete: false,
            interactive: false,
            no_rebase: true,
        },
    )
    .unwrap();

    assert_eq!(repo.hash("leaf"), leaf_tip, "leaf must not be rebased");
    assert_eq!(repo.read_layout(), "master\n  leaf\n");
}

#[test]
fn squash_collapses_to_one_commit_with_earliest_message() {
    let repo = TestRepo::new();
    repo.checkout_new("feature");
    repo.commit_file("a.txt", "one", "Earliest message");
    repo.commit_file("b.txt", "two", "Middle message");
    repo.commit_file("c.txt", "three", "Latest message");

    let git = repo.repo();
    let tree = parse("master\n  feature\n").unwrap();
    let fp = forkpoint::require_fork_point(&git, &tree, "feature").unwrap();
    let tree_before = git.tree_hash(&local_ref("feature")).unwrap();

    let result = ops::squash(&git, "feature", &fp.commit).unwrap();
    let SquashResult::Squashed { new_tip } = result else {
        panic!("expected a squash, got {result:?}");
    };

    // Exactly one commit above the fork point now
    let commits = git.commits_between(&fp.commit, &local_ref("feature")).unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].0, new_tip);
    assert_eq!(commits[0].1, "Earliest message");
    // The tree is untouched
    assert_eq!(git.tree_hash(&local_ref("feature")).unwrap(), tree_before);
    // And the new commit sits directly on the fork point
    let parent = repo.hash(&format!("{new_tip}^"));
    assert_eq!(parent, fp.commit);
}

#[test]
fn squash_refuses_single_commit() {
    let repo = TestRepo::new();
    repo.checkout_new("feature");
    repo.commit("Only commit");

    let git = repo.repo();
    let tree = parse("master\n  feature\n").unwrap();
    let fp = forkpoint::require_fork_point(&git, &tree, "feature").unwrap();
    assert_eq!(
        ops::squash(&git, "feature", &fp.commit).unwrap(),
        SquashResult::NothingToSquash { commits: 1 }
    );
}

#[test]
fn push_sets_upstream_for_untracked_branches() {
    let repo = TestRepo::new();
    repo.setup_remote();
    repo.checkout_new("feature");
    repo.commit("Feature work");

    let git = repo.repo();
    let mut prompter = ScriptedPrompter::new([]);
    let remote = ops::push_remote(&git, "feature", &mut prompter).unwrap();
    assert_eq!(remote, "origin");

    ops::push(&git, "feature", &remote, false).unwrap();
    let tp = git.tracking("feature").unwrap().expect("push -u sets tracking");
    assert_eq!(tp.remote, "origin");
    assert_eq!(tp.remote_branch, "feature");
    assert_eq!(
        git.commit_hash("refs/remotes/origin/feature").unwrap(),
        git.branch_hash("feature").unwrap()
    );
}

#[test]
fn force_push_uses_lease_after_history_rewrite() {
    let repo = TestRepo::new();
    repo.checkout_new("feature");
    repo.commit("Feature work");
    repo.setup_remote();

    // Rewrite the branch: amend its tip
    repo.git(&["commit", "-q", "--amend", "--allow-empty", "-m", "Rewritten"]);
    let git = repo.repo();
    ops::push(&git, "feature", "origin", true).unwrap();
    assert_eq!(
        git.commit_hash("refs/remotes/origin/feature").unwrap(),
        git.branch_hash("feature").unwrap()
    );
}

#[test]
fn fast_forward_and_reset_keep() {
    let repo = TestRepo::new();
    repo.setup_remote();
    repo.advance_remote("master", "Remote commit");
    repo.git(&["fetch", "-q", "origin"]);

    let git = repo.repo();
    ops::pull_ff(&git, "refs/remotes/origin/master").unwrap();
    assert_eq!(
        git.branch_hash("master").unwrap(),
        git.commit_hash("refs/remotes/origin/master").unwrap()
    );

    // Diverge locally, then reset back to the remote
    repo.commit("Local detour");
    git.flush_caches();
    ops::reset_keep(&git, "refs/remotes/origin/master").unwrap();
    assert_eq!(
        git.branch_hash("master").unwrap(),
        git.commit_hash("refs/remotes/origin/master").unwrap()
    );
}

#[test]
fn scripted_prompter_declines_remote_choice() {
    let repo = TestRepo::new();
    let first = repo.scratch_path("first.git");
    let second = repo.scratch_path("second.git");
    repo.git(&["init", "-q", "--bare", first.to_str().unwrap()]);
    repo.git(&["init", "-q", "--bare", second.to_str().unwrap()]);
    repo.git(&["remote", "add", "alpha", first.to_str().unwrap()]);
    repo.git(&["remote", "add", "beta", second.to_str().unwrap()]);

    let git = repo.repo();
    let mut prompter = ScriptedPrompter::new([Answer::No]);
    let err = ops::push_remote(&git, "master", &mut prompter).unwrap_err();
    assert!(err.to_string().contains("several exist"));
}

/// Property: slide-out then reload keeps the tree equal to the in-memory
/// one (serialize/parse round trip of the mutated tree).
#[test]
fn slide_out_round_trips_through_the_file() {
    let repo = TestRepo::new();
    repo.checkout_new("a");
    repo.commit("A");
    repo.checkout_new("b");
    repo.commit("B");

    repo.write_layout("master\n  a\n    b\n");
    let git = repo.repo();
    let mut tree = repo.tree();
    ops::slide_out(
        &git,
        &mut tree,
        &["a".to_string()],
        SlideOutOptions {
            delete: false,
            interactive: false,
            no_rebase: true,
        },
    )
    .unwrap();

    let reparsed = layout::parse(&repo.read_layout()).unwrap();
    assert_eq!(serialize(&reparsed), serialize(&tree));
}
