//! Plumbing commands through the real binary: stable stdout, no prompts,
//! meaningful exit codes.

mod common;

use std::path::Path;
use std::process::Command;

use common::TestRepo;

fn trellis(repo_path: &Path, args: &[&str]) -> (String, String, i32) {
    let out = Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(args)
        .current_dir(repo_path)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run trellis");
    (
        String::from_utf8_lossy(&out.stdout).into_owned(),
        String::from_utf8_lossy(&out.stderr).into_owned(),
        out.status.code().unwrap_or(-1),
    )
}

#[test]
fn file_prints_the_layout_path() {
    let repo = TestRepo::new();
    let (stdout, _, code) = trellis(repo.path(), &["file"]);
    assert_eq!(code, 0);
    let printed = Path::new(stdout.trim());
    assert!(printed.ends_with(".git/trellis"), "got {printed:?}");
}

#[test]
fn is_managed_exit_codes() {
    let repo = TestRepo::new();
    repo.write_layout("master\n");

    let (_, _, code) = trellis(repo.path(), &["is-managed", "master"]);
    assert_eq!(code, 0);
    let (_, _, code) = trellis(repo.path(), &["is-managed", "ghost"]);
    assert_eq!(code, 1);
    // Current branch (master) is managed
    let (_, _, code) = trellis(repo.path(), &["is-managed"]);
    assert_eq!(code, 0);
}

#[test]
fn list_categories_are_line_oriented() {
    let repo = TestRepo::new();
    repo.checkout_new("a");
    repo.commit("A work");
    repo.checkout_new("b");
    repo.commit("B work");
    repo.checkout("master");
    repo.checkout_new("stray");
    repo.write_layout("master\n  a\n    b\n");

    let (stdout, _, code) = trellis(repo.path(), &["list", "managed"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "master\na\nb\n");

    let (stdout, _, _) = trellis(repo.path(), &["list", "childless"]);
    assert_eq!(stdout, "b\n");

    let (stdout, _, _) = trellis(repo.path(), &["list", "slidable"]);
    assert_eq!(stdout, "a\nb\n");

    let (stdout, _, _) = trellis(repo.path(), &["list", "slidable-after", "a"]);
    assert_eq!(stdout, "b\n");

    let (stdout, _, _) = trellis(repo.path(), &["list", "unmanaged"]);
    assert_eq!(stdout, "stray\n");

    let (stdout, _, _) = trellis(repo.path(), &["list", "addable"]);
    assert_eq!(stdout, "stray\n");
}

/// Repo with the layout `master → a → b`, checked out at `a`.
#[rstest::fixture]
fn stacked_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.checkout_new("a");
    repo.commit("A work");
    repo.checkout_new("b");
    repo.commit("B work");
    repo.write_layout("master\n  a\n    b\n");
    repo.checkout("a");
    repo
}

#[rstest::rstest]
#[case::current(&["show", "current"], "a\n")]
#[case::up(&["show", "up"], "master\n")]
#[case::down(&["show", "down"], "b\n")]
#[case::root(&["show", "root"], "master\n")]
#[case::first(&["show", "first"], "a\n")]
#[case::last(&["show", "last"], "b\n")]
#[case::next(&["show", "next"], "b\n")]
#[case::prev(&["show", "prev"], "master\n")]
#[case::up_of_b(&["show", "up", "b"], "a\n")]
fn show_directions_are_stable(
    stacked_repo: TestRepo,
    #[case] args: &[&str],
    #[case] expected: &str,
) {
    let (stdout, stderr, code) = trellis(stacked_repo.path(), args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    assert_eq!(stdout, expected, "for {args:?}");
}

#[rstest::rstest]
fn show_off_the_edge_fails_without_prompting(stacked_repo: TestRepo) {
    let (_, _, code) = trellis(stacked_repo.path(), &["show", "next", "b"]);
    assert_eq!(code, 1);
}

#[test]
fn fork_point_prints_a_bare_hash() {
    let repo = TestRepo::new();
    let master_tip = repo.hash("master");
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.write_layout("master\n  feat\n");

    let (stdout, _, code) = trellis(repo.path(), &["fork-point"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), master_tip);

    let (stdout, _, code) = trellis(repo.path(), &["fork-point", "--inferred", "feat"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), master_tip);
}

#[test]
fn version_is_stable() {
    let repo = TestRepo::new();
    let (stdout, _, code) = trellis(repo.path(), &["version"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, format!("trellis version {}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn status_renders_the_tree() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.write_layout("master\n  feat\n");

    let (stdout, stderr, code) = trellis(repo.path(), &["status"]);
    assert_eq!(code, 0, "status failed: {stderr}");
    assert!(stdout.contains("master\n"), "got: {stdout}");
    assert!(stdout.contains("o-feat"), "got: {stdout}");

    let (stdout, _, code) = trellis(repo.path(), &["status", "--format", "json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed[0]["name"], "master");
    assert_eq!(parsed[1]["name"], "feat");
    assert_eq!(parsed[1]["sync_to_parent"], "in-sync");
}

#[test]
fn status_list_commits_shows_the_unique_range() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("First unique");
    repo.commit("Second unique");
    repo.write_layout("master\n  feat\n");

    let (stdout, _, code) = trellis(repo.path(), &["status", "-l"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("First unique"));
    assert!(stdout.contains("Second unique"));
    // Commits are listed oldest first
    let first = stdout.find("First unique").unwrap();
    let second = stdout.find("Second unique").unwrap();
    assert!(first < second);
}

#[test]
fn missing_layout_fails_with_a_hint() {
    let repo = TestRepo::new();
    let (_, stderr, code) = trellis(repo.path(), &["status"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("discover"), "got: {stderr}");
}

#[test]
fn anno_round_trips_through_the_file() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.write_layout("master\n  feat\n");

    let (_, _, code) = trellis(repo.path(), &["anno", "-b", "feat", "PR", "#42"]);
    assert_eq!(code, 0);
    assert_eq!(repo.read_layout(), "master\n  feat PR #42\n");

    let (stdout, _, code) = trellis(repo.path(), &["anno", "-b", "feat"]);
    assert_eq!(code, 0);
    assert_eq!(stdout, "PR #42\n");
}

#[test]
fn add_and_slide_out_edit_the_file() {
    let repo = TestRepo::new();
    repo.checkout_new("feat");
    repo.commit("Feat work");
    repo.checkout("master");
    repo.write_layout("master\n");

    let (_, stderr, code) = trellis(repo.path(), &["add", "-o", "master", "feat"]);
    assert_eq!(code, 0, "add failed: {stderr}");
    assert_eq!(repo.read_layout(), "master\n  feat\n");

    let (_, stderr, code) = trellis(
        repo.path(),
        &["slide-out", "--no-rebase", "feat"],
    );
    assert_eq!(code, 0, "slide-out failed: {stderr}");
    assert_eq!(repo.read_layout(), "master\n");
}
