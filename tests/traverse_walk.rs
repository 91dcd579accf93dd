//! Traverser scenarios with a scripted prompter.

mod common;

use common::TestRepo;
use trellis::git::local_ref;
use trellis::prompt::{Answer, ScriptedPrompter};
use trellis::sync::{RemoteSyncState, SquashMergeDetection, SyncState, parent_edge, remote_state};
use trellis::traverse::{ReturnTo, StartFrom, TraverseOptions, traverse};

fn opts() -> TraverseOptions {
    TraverseOptions {
        fetch: false,
        merge: false,
        push_override: None,
        start_from: StartFrom::FirstRoot,
        return_to: ReturnTo::Stay,
        interactive: false,
    }
}

/// Answering `q` at the first prompt changes nothing.
#[test]
fn quit_leaves_everything_untouched() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.checkout("master");
    repo.commit("Master moved on");
    repo.checkout("feat");

    repo.write_layout("master\n  feat\n");
    let layout_before = repo.read_layout();
    let feat_tip = repo.hash("feat");

    let git = repo.repo();
    let mut tree = repo.tree();
    let mut prompter = ScriptedPrompter::new([Answer::Quit]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();

    assert!(outcome.quit_early);
    assert_eq!(outcome.actions, 0);
    assert_eq!(prompter.asked.len(), 1, "quit must stop the walk immediately");
    assert!(git.ongoing_operation().unwrap().is_none());
    assert_eq!(repo.read_layout(), layout_before);
    assert_eq!(repo.hash("feat"), feat_tip);
    assert_eq!(repo.current_branch(), "feat");
}

#[test]
fn rebase_proposal_brings_branch_in_sync() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.checkout("master");
    repo.commit("Master moved on");
    repo.checkout("feat");

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    assert_eq!(
        parent_edge(&git, &tree, "master", "feat", SquashMergeDetection::Simple).unwrap(),
        SyncState::OutOfSync
    );

    let mut prompter = ScriptedPrompter::new([Answer::Yes]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();
    assert_eq!(outcome.actions, 1);
    assert!(!outcome.quit_early);

    git.flush_caches();
    assert_eq!(
        parent_edge(&git, &tree, "master", "feat", SquashMergeDetection::Simple).unwrap(),
        SyncState::InSync
    );
    assert!(git.is_ancestor(&local_ref("master"), &local_ref("feat")).unwrap());
}

#[test]
fn merged_branch_is_offered_for_slide_out() {
    let repo = TestRepo::new();
    repo.checkout_new("done");
    repo.commit("Done work");
    repo.checkout_new("next-up");
    repo.commit("Next work");
    repo.checkout("master");
    repo.git(&["merge", "-q", "--ff-only", "done"]);

    repo.write_layout("master\n  done\n    next-up\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    // Slide out `done`; decline everything else
    let mut prompter = ScriptedPrompter::new([Answer::Yes, Answer::No]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();

    assert!(outcome.actions >= 1);
    assert!(!tree.is_managed("done"));
    assert_eq!(tree.children("master"), ["next-up"]);
    assert_eq!(repo.read_layout(), "master\n  next-up\n");
    // The slid-out branch still exists in git
    assert!(git.is_local_branch("done").unwrap());
}

#[test]
fn yes_quit_applies_then_stops() {
    let repo = TestRepo::new();
    repo.checkout_new("a");
    repo.commit("A work");
    repo.checkout("master");
    repo.checkout_new("b");
    repo.commit("B work");
    repo.checkout("master");
    repo.commit("Master moved on");

    repo.write_layout("master\n  a\n  b\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    // Both a and b are out of sync; yq on a must stop before b
    let mut prompter = ScriptedPrompter::new([Answer::YesQuit]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();

    assert!(outcome.quit_early);
    assert_eq!(outcome.actions, 1);
    git.flush_caches();
    assert!(git.is_ancestor(&local_ref("master"), &local_ref("a")).unwrap());
    assert!(!git.is_ancestor(&local_ref("master"), &local_ref("b")).unwrap());
}

#[test]
fn qualifiers_suppress_proposals() {
    let repo = TestRepo::new();
    repo.checkout_new("pinned");
    repo.commit("Pinned work");
    repo.checkout("master");
    repo.commit("Master moved on");
    repo.checkout("pinned");

    repo.write_layout("master\n  pinned rebase=no push=no\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    let mut prompter = ScriptedPrompter::new([Answer::Yes, Answer::Yes, Answer::Yes]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();
    assert_eq!(outcome.actions, 0);
    assert!(
        prompter.asked.is_empty(),
        "rebase=no plus push=no must silence every prompt: {:?}",
        prompter.asked
    );
}

#[test]
fn behind_branch_is_offered_fast_forward() {
    let repo = TestRepo::new();
    repo.setup_remote();
    repo.advance_remote("master", "Remote commit");
    repo.git(&["fetch", "-q", "origin"]);

    repo.write_layout("master\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    let mut prompter = ScriptedPrompter::new([Answer::Yes]);
    let outcome = traverse(&git, &mut tree, &mut prompter, opts()).unwrap();
    assert_eq!(outcome.actions, 1);
    assert!(prompter.asked[0].contains("Fast-forward"));
    git.flush_caches();
    assert_eq!(remote_state(&git, "master").unwrap(), RemoteSyncState::InSync);
}

/// The remote moved underneath us; `traverse --fetch` must see Behind on
/// the first visit — the fetch flushes the reflog index with the rest.
#[test]
fn fetch_cascades_cache_invalidation() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.setup_remote();

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    // Prime every cache, including the reflog index, while in sync
    assert_eq!(remote_state(&git, "feat").unwrap(), RemoteSyncState::InSync);
    git.reflog_index().unwrap();

    // An external process advances the remote branch
    repo.advance_remote("feat", "Colleague's commit");

    let mut prompter = ScriptedPrompter::new([Answer::Yes]);
    let outcome = traverse(
        &git,
        &mut tree,
        &mut prompter,
        TraverseOptions {
            fetch: true,
            ..opts()
        },
    )
    .unwrap();

    assert!(
        prompter.asked.iter().any(|q| q.contains("Fast-forward")),
        "stale caches would hide the Behind state: {:?}",
        prompter.asked
    );
    assert_eq!(outcome.actions, 1);
    git.flush_caches();
    assert_eq!(remote_state(&git, "feat").unwrap(), RemoteSyncState::InSync);
}

#[test]
fn push_proposed_for_untracked_when_enabled() {
    let repo = TestRepo::new();
    repo.setup_remote();
    repo.checkout_new("feat");
    repo.commit("Feat work");

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    // start-from=here: the walk begins at feat, master is never visited
    let mut prompter = ScriptedPrompter::new([Answer::Yes]);
    let outcome = traverse(
        &git,
        &mut tree,
        &mut prompter,
        TraverseOptions {
            start_from: StartFrom::Here,
            ..opts()
        },
    )
    .unwrap();
    assert!(prompter.asked.iter().any(|q| q.contains("Push")));
    assert_eq!(outcome.actions, 1);
    git.flush_caches();
    assert_eq!(remote_state(&git, "feat").unwrap(), RemoteSyncState::InSync);
}

#[test]
fn no_push_override_silences_push_proposals() {
    let repo = TestRepo::new();
    repo.setup_remote();
    repo.checkout_new("feat");
    repo.commit("Feat work");

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    let mut prompter = ScriptedPrompter::new([Answer::Yes, Answer::Yes]);
    let outcome = traverse(
        &git,
        &mut tree,
        &mut prompter,
        TraverseOptions {
            push_override: Some(false),
            ..opts()
        },
    )
    .unwrap();
    assert_eq!(outcome.actions, 0);
    assert!(prompter.asked.is_empty());
}

#[test]
fn traverse_refuses_during_ongoing_operation() {
    let repo = TestRepo::new();
    repo.commit_file("conflict.txt", "master side", "Master side");
    repo.checkout_new("feat");
    repo.git(&["reset", "-q", "--hard", "HEAD~1"]);
    repo.commit_file("conflict.txt", "feat side", "Feat side");

    // Start a conflicting merge and leave it hanging
    let out = std::process::Command::new("git")
        .args(["merge", "master"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert!(!out.status.success());

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();
    let mut prompter = ScriptedPrompter::new([]);
    let err = traverse(&git, &mut tree, &mut prompter, opts()).unwrap_err();
    assert!(err.to_string().contains("merge"));
}

#[test]
fn return_to_here_restores_the_original_branch() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.checkout("master");
    repo.commit("Master moved on");
    repo.checkout("feat");

    repo.write_layout("master\n  feat\n");
    let git = repo.repo();
    let mut tree = repo.tree();

    // The rebase checks out other branches along the way
    let mut prompter = ScriptedPrompter::new([Answer::Yes]);
    traverse(
        &git,
        &mut tree,
        &mut prompter,
        TraverseOptions {
            return_to: ReturnTo::Here,
            ..opts()
        },
    )
    .unwrap();
    assert_eq!(repo.current_branch(), "feat");
}
