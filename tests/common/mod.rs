// Helpers are shared across several test binaries; not all of them use
// every helper.
#![allow(dead_code)]

//! # Test utilities for trellis
//!
//! `TestRepo` creates isolated git repositories in temporary directories
//! with deterministic timestamps and configuration. Each test gets a fresh
//! repo that is cleaned up when the test ends.
//!
//! ## Environment isolation
//!
//! Git commands run with a pinned environment (`Command::env`) so that:
//! - no interference from system or user git config
//! - deterministic, strictly increasing commit and reflog timestamps
//! - consistent locale
//! - no cross-test contamination (thread-safe, no global state)
//!
//! Timestamps matter more here than in most git test harnesses: the
//! discover heuristic orders branches by reflog entry time, and the
//! diverged-newer/older split compares committer dates, so every git
//! invocation gets the next tick of a per-repo monotonic clock.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use trellis::git::Repository;
use trellis::layout::{self, BranchTree};

pub struct TestRepo {
    dir: TempDir,
    home: TempDir,
    tick: Cell<i64>,
}

/// Base timestamp for the deterministic clock (2023-11-14T22:13:20Z).
const EPOCH: i64 = 1_700_000_000;

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRepo {
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().unwrap(),
            home: TempDir::new().unwrap(),
            tick: Cell::new(0),
        };
        repo.git(&["init", "-q", "-b", "master"]);
        // Local config survives for git invocations made by trellis itself
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.commit("Initial commit");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Next timestamp of the monotonic clock, formatted for git date envs.
    fn next_date(&self) -> String {
        let tick = self.tick.get() + 1;
        self.tick.set(tick);
        format!("{} +0000", EPOCH + tick * 60)
    }

    /// Run git in the repo with the hermetic environment; panics on failure.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_with_date(args, &self.next_date())
    }

    /// Like [`git`](Self::git) with an explicit committer/author date.
    pub fn git_with_date(&self, args: &[&str], date: &str) -> String {
        self.git_in(self.path(), args, date)
    }

    pub fn git_in(&self, dir: &Path, args: &[&str], date: &str) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("HOME", self.home.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", self.home.path().join(".gitconfig"))
            .env("GIT_AUTHOR_NAME", "Test User")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "Test User")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .env("GIT_AUTHOR_DATE", date)
            .env("GIT_COMMITTER_DATE", date)
            .env("GIT_EDITOR", ":")
            .env("LC_ALL", "C")
            .output()
            .expect("failed to run git");
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).into_owned()
    }

    // =========================================================================
    // Repo construction
    // =========================================================================

    /// Empty commit on the current branch.
    pub fn commit(&self, message: &str) -> String {
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
        self.hash("HEAD")
    }

    /// Empty commit with an explicit date (for newer/older divergence).
    pub fn commit_with_date(&self, message: &str, date: &str) -> String {
        self.git_with_date(&["commit", "-q", "--allow-empty", "-m", message], date);
        self.hash("HEAD")
    }

    /// Write a file, stage it, commit.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        std::fs::write(self.path().join(name), content).unwrap();
        self.git(&["add", name]);
        self.git(&["commit", "-q", "-m", message]);
        self.hash("HEAD")
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "-q", branch]);
    }

    /// Create and check out a branch at HEAD.
    pub fn checkout_new(&self, branch: &str) {
        self.git(&["checkout", "-q", "-b", branch]);
    }

    pub fn hash(&self, rev: &str) -> String {
        self.git(&["rev-parse", rev]).trim().to_string()
    }

    pub fn current_branch(&self) -> String {
        self.git(&["branch", "--show-current"]).trim().to_string()
    }

    // =========================================================================
    // Layout file
    // =========================================================================

    pub fn layout_path(&self) -> PathBuf {
        self.path().join(".git").join("trellis")
    }

    pub fn write_layout(&self, text: &str) {
        std::fs::write(self.layout_path(), text).unwrap();
    }

    pub fn read_layout(&self) -> String {
        std::fs::read_to_string(self.layout_path()).unwrap()
    }

    // =========================================================================
    // Trellis API entry points
    // =========================================================================

    pub fn repo(&self) -> Repository {
        Repository::at(self.path()).unwrap()
    }

    pub fn tree(&self) -> BranchTree {
        layout::file::load(&self.layout_path()).unwrap()
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// A scratch path outside the repository (for extra bare remotes).
    pub fn scratch_path(&self, name: &str) -> PathBuf {
        self.home.path().join(name)
    }

    /// Create a bare "remote", add it as `origin`, push all current
    /// branches with tracking set up.
    pub fn setup_remote(&self) -> PathBuf {
        let remote_path = self.home.path().join("remote.git");
        let date = self.next_date();
        self.git_in(
            self.home.path(),
            &["init", "-q", "--bare", remote_path.to_str().unwrap()],
            &date,
        );
        self.git(&["remote", "add", "origin", remote_path.to_str().unwrap()]);
        self.git(&["push", "-q", "-u", "origin", "--all"]);
        remote_path
    }

    /// Advance a branch on the remote by one commit, the way another clone
    /// would — trellis in this repo never sees it until a fetch.
    pub fn advance_remote(&self, branch: &str, message: &str) {
        let remote_path = self.home.path().join("remote.git");
        let clone_path = self.home.path().join("clone");
        let date = self.next_date();
        if !clone_path.exists() {
            self.git_in(
                self.home.path(),
                &[
                    "clone",
                    "-q",
                    remote_path.to_str().unwrap(),
                    clone_path.to_str().unwrap(),
                ],
                &date,
            );
        }
        let date = self.next_date();
        self.git_in(&clone_path, &["checkout", "-q", branch], &date);
        let date = self.next_date();
        self.git_in(
            &clone_path,
            &["commit", "-q", "--allow-empty", "-m", message],
            &date,
        );
        let date = self.next_date();
        self.git_in(&clone_path, &["push", "-q", "origin", branch], &date);
    }
}
