//! Repository - cached git queries.
//!
//! [`Repository`] wraps the `git` CLI with a typed, lazily populated cache.
//! Every query that a git command run by this process could invalidate goes
//! through the cache, and every mutating operation calls
//! [`Repository::flush_caches`] (directly or via the ops layer) before the
//! next read.
//!
//! The cache is one struct with one owner. Derived data — in particular the
//! reflog index used by fork-point inference — lives inside the same
//! [`RepoCache`], so a fetch cannot flush the reflogs while leaving a stale
//! index behind.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::OnceLock;

use indexmap::{IndexMap, IndexSet};

use crate::shell_exec::Cmd;

use super::error::describe_exit;
use super::{GitError, OngoingGitOp, RemoteBranch, TrackingPair, local_ref};

/// Global base path for repository discovery, set by the -C flag.
static BASE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the base path for repository discovery.
///
/// Called once at program startup from main(). Defaults to ".".
pub fn set_base_path(path: PathBuf) {
    BASE_PATH.set(path).ok();
}

fn base_path() -> PathBuf {
    BASE_PATH.get().cloned().unwrap_or_else(|| PathBuf::from("."))
}

/// Cached query results for a single repository.
///
/// `None` / missing entries mean "not asked yet". [`Repository::flush_caches`]
/// resets the whole struct; there is deliberately no way to flush one field.
#[derive(Debug, Default)]
struct RepoCache {
    git_dir: Option<PathBuf>,
    current_branch: Option<Option<String>>,
    local_branches: Option<Vec<String>>,
    remote_branches: Option<Vec<RemoteBranch>>,
    remotes: Option<Vec<String>>,
    config: Option<HashMap<String, String>>,
    commit_hashes: HashMap<String, Option<String>>,
    tree_hashes: HashMap<String, Option<String>>,
    committer_dates: HashMap<String, i64>,
    merge_bases: HashMap<(String, String), Option<String>>,
    ancestry: HashMap<(String, String), bool>,
    /// Raw reflog entries per ref: (commit hash, entry subject), newest
    /// first, duplicates included.
    reflogs: HashMap<String, Rc<Vec<(String, String)>>>,
    /// Derived from `reflogs`: commit hash -> refs whose filtered reflog
    /// contains it.
    reflog_index: Option<Rc<IndexMap<String, IndexSet<String>>>>,
    tracking: HashMap<String, Option<TrackingPair>>,
}

/// Repository state for git operations.
///
/// Construction resolves the git common directory; everything else is
/// queried lazily and cached. The engine is one process, one thread, so
/// the cache sits behind a `RefCell` rather than locks.
#[derive(Debug)]
pub struct Repository {
    /// Path used for discovering the repository and running git commands.
    discovery_path: PathBuf,
    /// The shared .git directory, computed at construction time.
    git_common_dir: PathBuf,
    cache: RefCell<RepoCache>,
}

impl Repository {
    /// Discover the repository from the current directory (or the -C path).
    pub fn current() -> Result<Self, GitError> {
        Self::at(base_path())
    }

    /// Discover the repository from the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let discovery_path = path.into();
        let out = Cmd::git(&["rev-parse", "--git-common-dir"])
            .current_dir(&discovery_path)
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git: {e}")))?;
        if !out.status.success() {
            return Err(GitError::CommandFailed {
                command: "git rev-parse --git-common-dir".into(),
                exit_info: describe_exit(out.status),
                output: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        let raw = PathBuf::from(String::from_utf8_lossy(&out.stdout).trim());
        let absolute = if raw.is_relative() {
            discovery_path.join(&raw)
        } else {
            raw
        };
        let git_common_dir = absolute.canonicalize().map_err(|e| {
            GitError::Internal(format!("Failed to resolve git common directory: {e}"))
        })?;

        Ok(Self {
            discovery_path,
            git_common_dir,
            cache: RefCell::new(RepoCache::default()),
        })
    }

    /// The shared .git directory (main worktree's, even from a linked one).
    pub fn git_common_dir(&self) -> &Path {
        &self.git_common_dir
    }

    /// The per-worktree git directory (differs from the common dir in
    /// linked worktrees).
    pub fn git_dir(&self) -> Result<PathBuf, GitError> {
        if let Some(dir) = &self.cache.borrow().git_dir {
            return Ok(dir.clone());
        }
        let out = self.stdout(&["rev-parse", "--absolute-git-dir"])?;
        let dir = PathBuf::from(out.trim());
        self.cache.borrow_mut().git_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Path of the branch layout file.
    ///
    /// `trellis.worktree.useTopLevelTrellisFile` (default true) selects the
    /// shared `<git-common-dir>/trellis`; set it to false to keep one layout
    /// per worktree under `<git-dir>/trellis`.
    pub fn layout_file_path(&self) -> Result<PathBuf, GitError> {
        let top_level = match self.config_get("trellis.worktree.useTopLevelTrellisFile")? {
            Some(val) => parse_config_bool("trellis.worktree.useTopLevelTrellisFile", &val)?,
            None => true,
        };
        if top_level {
            Ok(self.git_common_dir.join("trellis"))
        } else {
            Ok(self.git_dir()?.join("trellis"))
        }
    }

    // =========================================================================
    // Command execution
    // =========================================================================

    fn git_cmd(&self, args: &[&str]) -> Cmd {
        Cmd::git(args).current_dir(&self.discovery_path)
    }

    /// Run a git command, requiring success, returning stdout.
    pub fn stdout(&self, args: &[&str]) -> Result<String, GitError> {
        self.stdout_cmd(self.git_cmd(args))
    }

    /// Like [`stdout`](Self::stdout) but for a pre-built command (stdin, env).
    pub fn stdout_cmd(&self, cmd: Cmd) -> Result<String, GitError> {
        let command = cmd.display();
        let out = cmd
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute {command}: {e}")))?;
        if !out.status.success() {
            // Some git commands print errors to stdout; keep both streams.
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stdout = String::from_utf8_lossy(&out.stdout);
            let output = [stderr.trim(), stdout.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            return Err(GitError::CommandFailed {
                command,
                exit_info: describe_exit(out.status),
                output,
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Run a git command whose exit code is the answer (0 = yes, 1 = no).
    ///
    /// Any other exit code is an error — `merge-base --is-ancestor` exits
    /// 128 on an unknown revision, and that must not read as "no".
    pub fn check(&self, args: &[&str]) -> Result<bool, GitError> {
        let cmd = self.git_cmd(args);
        let command = cmd.display();
        let out = cmd
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute {command}: {e}")))?;
        match out.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(GitError::CommandFailed {
                command,
                exit_info: describe_exit(out.status),
                output: String::from_utf8_lossy(&out.stderr).into_owned(),
            }),
        }
    }

    /// Run a git command with inherited stdio (pager, editor, rebase UI).
    pub fn interactive(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<(), GitError> {
        let mut cmd = self.git_cmd(args);
        for (k, v) in envs {
            cmd = cmd.env(k, v);
        }
        let command = cmd.display();
        let status = cmd
            .run_interactive()
            .map_err(|e| GitError::Internal(format!("Failed to execute {command}: {e}")))?;
        if !status.success() {
            return Err(GitError::CommandFailed {
                command,
                exit_info: describe_exit(status),
                output: String::new(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Cache control
    // =========================================================================

    /// Drop every cached value, including derived indices.
    ///
    /// Called after any mutating git operation. There is intentionally a
    /// single entry point: partial flushes are how stale-reflog-index bugs
    /// happen.
    pub fn flush_caches(&self) {
        *self.cache.borrow_mut() = RepoCache::default();
    }

    /// Fetch a remote, then flush all caches (reflogs and the reflog index
    /// may have changed).
    pub fn fetch_remote(&self, remote: &str) -> Result<(), GitError> {
        let result = self.stdout(&["fetch", remote]);
        self.flush_caches();
        result.map(|_| ())
    }

    // =========================================================================
    // Branches and refs
    // =========================================================================

    /// The current branch name, or None in detached HEAD state.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        if let Some(b) = &self.cache.borrow().current_branch {
            return Ok(b.clone());
        }
        let out = self.stdout(&["branch", "--show-current"])?;
        let branch = out.trim();
        let result = (!branch.is_empty()).then(|| branch.to_string());
        self.cache.borrow_mut().current_branch = Some(result.clone());
        Ok(result)
    }

    /// The current branch, or [`GitError::DetachedHead`].
    pub fn require_current_branch(&self) -> Result<String, GitError> {
        self.current_branch()?.ok_or(GitError::DetachedHead)
    }

    /// All local branch names, in git's ref order.
    pub fn local_branches(&self) -> Result<Vec<String>, GitError> {
        if let Some(v) = &self.cache.borrow().local_branches {
            return Ok(v.clone());
        }
        let out = self.stdout(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])?;
        let branches: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        self.cache.borrow_mut().local_branches = Some(branches.clone());
        Ok(branches)
    }

    pub fn is_local_branch(&self, branch: &str) -> Result<bool, GitError> {
        Ok(self.local_branches()?.iter().any(|b| b == branch))
    }

    /// All remote-tracking branches, excluding symbolic `<remote>/HEAD`.
    pub fn remote_branches(&self) -> Result<Vec<RemoteBranch>, GitError> {
        if let Some(v) = &self.cache.borrow().remote_branches {
            return Ok(v.clone());
        }
        let remotes = self.remotes()?;
        let out = self.stdout(&["for-each-ref", "--format=%(refname)", "refs/remotes"])?;
        let branches = parse_remote_refs(&out, &remotes);
        self.cache.borrow_mut().remote_branches = Some(branches.clone());
        Ok(branches)
    }

    /// Remote names from `git remote`.
    pub fn remotes(&self) -> Result<Vec<String>, GitError> {
        if let Some(v) = &self.cache.borrow().remotes {
            return Ok(v.clone());
        }
        let out = self.stdout(&["remote"])?;
        let remotes: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
        self.cache.borrow_mut().remotes = Some(remotes.clone());
        Ok(remotes)
    }

    /// The tracking pair for a branch, from `branch.<b>.remote` / `.merge`.
    ///
    /// A remote of `.` (local tracking) counts as untracked here — there is
    /// no remote counterpart to sync against.
    pub fn tracking(&self, branch: &str) -> Result<Option<TrackingPair>, GitError> {
        if let Some(t) = self.cache.borrow().tracking.get(branch) {
            return Ok(t.clone());
        }
        let remote = self.config_get(&format!("branch.{branch}.remote"))?;
        let merge = self.config_get(&format!("branch.{branch}.merge"))?;
        let pair = match (remote, merge) {
            (Some(remote), Some(merge)) if remote != "." => merge
                .strip_prefix("refs/heads/")
                .map(|remote_branch| TrackingPair {
                    branch: branch.to_string(),
                    remote,
                    remote_branch: remote_branch.to_string(),
                }),
            _ => None,
        };
        self.cache
            .borrow_mut()
            .tracking
            .insert(branch.to_string(), pair.clone());
        Ok(pair)
    }

    /// The remote counterpart of a branch, as a resolvable remote ref.
    ///
    /// The tracking pair wins when its ref exists; otherwise a same-named
    /// branch on any remote (first match in `git remote` order).
    pub fn counterpart(&self, branch: &str) -> Result<Option<RemoteBranch>, GitError> {
        if let Some(tp) = self.tracking(branch)? {
            let rb = RemoteBranch {
                remote: tp.remote,
                branch: tp.remote_branch,
            };
            if self.commit_hash(&rb.full_ref())?.is_some() {
                return Ok(Some(rb));
            }
        }
        for remote in self.remotes()? {
            let rb = RemoteBranch {
                remote,
                branch: branch.to_string(),
            };
            if self.commit_hash(&rb.full_ref())?.is_some() {
                return Ok(Some(rb));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Resolve a revision to a full commit hash, or None if unresolvable.
    pub fn commit_hash(&self, rev: &str) -> Result<Option<String>, GitError> {
        if let Some(h) = self.cache.borrow().commit_hashes.get(rev) {
            return Ok(h.clone());
        }
        let spec = format!("{rev}^{{commit}}");
        let out = self
            .git_cmd(&["rev-parse", "--verify", "--quiet", &spec])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git rev-parse: {e}")))?;
        let hash = out
            .status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string());
        self.cache
            .borrow_mut()
            .commit_hashes
            .insert(rev.to_string(), hash.clone());
        Ok(hash)
    }

    /// Commit hash of a local branch tip (by full ref, so tags can't shadow).
    pub fn branch_hash(&self, branch: &str) -> Result<Option<String>, GitError> {
        self.commit_hash(&local_ref(branch))
    }

    /// Tree hash of a revision.
    pub fn tree_hash(&self, rev: &str) -> Result<Option<String>, GitError> {
        if let Some(h) = self.cache.borrow().tree_hashes.get(rev) {
            return Ok(h.clone());
        }
        let spec = format!("{rev}^{{tree}}");
        let out = self
            .git_cmd(&["rev-parse", "--verify", "--quiet", &spec])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git rev-parse: {e}")))?;
        let hash = out
            .status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string());
        self.cache
            .borrow_mut()
            .tree_hashes
            .insert(rev.to_string(), hash.clone());
        Ok(hash)
    }

    /// Committer timestamp (seconds since epoch) of a revision.
    pub fn committer_date(&self, rev: &str) -> Result<i64, GitError> {
        if let Some(ts) = self.cache.borrow().committer_dates.get(rev) {
            return Ok(*ts);
        }
        let out = self.stdout(&["show", "-s", "--format=%ct", rev])?;
        let ts: i64 = out
            .trim()
            .parse()
            .map_err(|e| GitError::ParseError(format!("Failed to parse timestamp: {e}")))?;
        self.cache
            .borrow_mut()
            .committer_dates
            .insert(rev.to_string(), ts);
        Ok(ts)
    }

    /// Merge base of two revisions, or None when histories are unrelated.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, GitError> {
        let key = (a.to_string(), b.to_string());
        if let Some(mb) = self.cache.borrow().merge_bases.get(&key) {
            return Ok(mb.clone());
        }
        let out = self
            .git_cmd(&["merge-base", a, b])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git merge-base: {e}")))?;
        let mb = out
            .status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string());
        self.cache.borrow_mut().merge_bases.insert(key, mb.clone());
        Ok(mb)
    }

    /// Whether `ancestor` is an ancestor of `descendant` (a commit is an
    /// ancestor of itself).
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GitError> {
        let key = (ancestor.to_string(), descendant.to_string());
        if let Some(v) = self.cache.borrow().ancestry.get(&key) {
            return Ok(*v);
        }
        let result = self.check(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        self.cache.borrow_mut().ancestry.insert(key, result);
        Ok(result)
    }

    /// First-parent history of a revision, newest first.
    pub fn first_parent_history(&self, rev: &str) -> Result<Vec<String>, GitError> {
        let out = self.stdout(&["log", "--first-parent", "--format=%H", rev])?;
        Ok(out.lines().map(str::to_owned).collect())
    }

    /// `(hash, subject)` pairs for `base..tip`, oldest first.
    pub fn commits_between(&self, base: &str, tip: &str) -> Result<Vec<(String, String)>, GitError> {
        let range = format!("{base}..{tip}");
        let out = self.stdout(&["log", "--format=%H%x09%s", &range])?;
        let mut commits: Vec<(String, String)> = out
            .lines()
            .filter_map(|l| l.split_once('\t'))
            .map(|(h, s)| (h.to_string(), s.to_string()))
            .collect();
        commits.reverse();
        Ok(commits)
    }

    // =========================================================================
    // Reflogs and the reflog index
    // =========================================================================

    /// Raw reflog entries of a ref as `(hash, subject)`, most recent first.
    ///
    /// A ref without a reflog (or a missing ref) yields an empty list —
    /// reflogs expire, and their absence is ordinary.
    fn reflog_entries(&self, full_ref: &str) -> Result<Rc<Vec<(String, String)>>, GitError> {
        if let Some(r) = self.cache.borrow().reflogs.get(full_ref) {
            return Ok(Rc::clone(r));
        }
        let out = self
            .git_cmd(&["reflog", "show", "--format=%H%x09%gs", full_ref])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git reflog: {e}")))?;
        let mut entries = Vec::new();
        if out.status.success() {
            for line in String::from_utf8_lossy(&out.stdout).lines() {
                if let Some((hash, subject)) = line.split_once('\t') {
                    entries.push((hash.to_string(), subject.to_string()));
                } else if !line.trim().is_empty() {
                    entries.push((line.trim().to_string(), String::new()));
                }
            }
        }
        let entries = Rc::new(entries);
        self.cache
            .borrow_mut()
            .reflogs
            .insert(full_ref.to_string(), Rc::clone(&entries));
        Ok(entries)
    }

    /// Reflog of a ref as deduplicated commit hashes, most recent first.
    pub fn reflog(&self, full_ref: &str) -> Result<Vec<String>, GitError> {
        let mut seen = IndexSet::new();
        for (hash, _) in self.reflog_entries(full_ref)?.iter() {
            seen.insert(hash.clone());
        }
        Ok(seen.into_iter().collect())
    }

    /// Reflog hashes that count as fork-point evidence, deduplicated.
    ///
    /// Bookkeeping entries are dropped: branch creation points (creating a
    /// child must not move the parent's fork point), no-op resets, and
    /// push echoes on remote-tracking refs (`update by push` repeats what
    /// the local reflog already records; only fetched movements are
    /// evidence of someone else's history).
    pub fn filtered_reflog(&self, full_ref: &str) -> Result<Vec<String>, GitError> {
        let mut seen = IndexSet::new();
        for (hash, subject) in self.reflog_entries(full_ref)?.iter() {
            let excluded = subject.starts_with("branch: Created from")
                || subject == "branch: Reset to HEAD"
                || subject == "reset: moving to HEAD"
                || subject == "update by push"
                || subject.starts_with("fetch . ");
            if !excluded {
                seen.insert(hash.clone());
            }
        }
        Ok(seen.into_iter().collect())
    }

    /// HEAD's reflog as `(entry timestamp, entry subject)`, most recent first.
    ///
    /// Feeds the discover heuristic (checkout recency).
    pub fn head_reflog(&self) -> Result<Vec<(i64, String)>, GitError> {
        let out = self
            .git_cmd(&["reflog", "show", "--date=unix", "--format=%gd%x09%gs", "HEAD"])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git reflog: {e}")))?;
        if !out.status.success() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            // %gd with --date=unix renders as HEAD@{<timestamp>}
            let Some((selector, subject)) = line.split_once('\t') else {
                continue;
            };
            let Some(ts) = selector
                .strip_prefix("HEAD@{")
                .and_then(|s| s.strip_suffix('}'))
                .and_then(|s| s.parse::<i64>().ok())
            else {
                continue;
            };
            entries.push((ts, subject.to_string()));
        }
        Ok(entries)
    }

    /// The reflog index: commit hash -> full refs whose filtered reflog
    /// contains it.
    ///
    /// Covers every local branch and its remote counterpart. Derived from
    /// the reflog cache and flushed with it — `fetch_remote` invalidates
    /// both in one step.
    pub fn reflog_index(&self) -> Result<Rc<IndexMap<String, IndexSet<String>>>, GitError> {
        if let Some(idx) = &self.cache.borrow().reflog_index {
            return Ok(Rc::clone(idx));
        }
        let mut index: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for branch in self.local_branches()? {
            let branch_ref = local_ref(&branch);
            for hash in self.filtered_reflog(&branch_ref)? {
                index.entry(hash).or_default().insert(branch_ref.clone());
            }
            if let Some(rb) = self.counterpart(&branch)? {
                let remote_ref = rb.full_ref();
                for hash in self.filtered_reflog(&remote_ref)? {
                    index.entry(hash).or_default().insert(remote_ref.clone());
                }
            }
        }
        let index = Rc::new(index);
        self.cache.borrow_mut().reflog_index = Some(Rc::clone(&index));
        Ok(index)
    }

    // =========================================================================
    // Config
    // =========================================================================

    fn config_snapshot(&self) -> Result<HashMap<String, String>, GitError> {
        if let Some(c) = &self.cache.borrow().config {
            return Ok(c.clone());
        }
        let out = self.stdout(&["config", "--list", "--null"])?;
        let config = parse_config_list(&out);
        self.cache.borrow_mut().config = Some(config.clone());
        Ok(config)
    }

    /// Read a config value; None when unset.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        // git config keys are case-insensitive in their section/key parts;
        // --list lowercases them. Subsection names (e.g. branch names) keep
        // their case.
        Ok(self.config_snapshot()?.get(&normalize_key(key)).cloned())
    }

    /// Set a config value in the local repository scope.
    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        self.stdout(&["config", key, value])?;
        self.flush_caches();
        Ok(())
    }

    /// Unset a config key; absent keys are not an error.
    pub fn config_unset(&self, key: &str) -> Result<(), GitError> {
        let out = self
            .git_cmd(&["config", "--unset", key])
            .run()
            .map_err(|e| GitError::Internal(format!("Failed to execute git config: {e}")))?;
        // Exit code 5 = key did not exist
        if !out.status.success() && out.status.code() != Some(5) {
            return Err(GitError::CommandFailed {
                command: format!("git config --unset {key}"),
                exit_info: describe_exit(out.status),
                output: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }
        self.flush_caches();
        Ok(())
    }

    /// All config keys starting with the given prefix.
    pub fn config_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, GitError> {
        let prefix = normalize_key(prefix);
        let mut keys: Vec<String> = self
            .config_snapshot()?
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Read a boolean config value with a default.
    pub fn config_bool(&self, key: &str, default: bool) -> Result<bool, GitError> {
        match self.config_get(key)? {
            Some(val) => parse_config_bool(key, &val),
            None => Ok(default),
        }
    }

    // =========================================================================
    // Worktree state
    // =========================================================================

    /// The git operation currently in flight, if any.
    pub fn ongoing_operation(&self) -> Result<Option<OngoingGitOp>, GitError> {
        let git_dir = self.git_dir()?;

        if git_dir.join("rebase-merge").exists() {
            return Ok(Some(OngoingGitOp::Rebase));
        }
        if git_dir.join("rebase-apply").exists() {
            // `git am` and `git rebase --apply` share the directory; the
            // `applying` marker distinguishes an am session.
            if git_dir.join("rebase-apply").join("applying").exists() {
                return Ok(Some(OngoingGitOp::AmSession));
            }
            return Ok(Some(OngoingGitOp::Rebase));
        }
        if git_dir.join("MERGE_HEAD").exists() {
            return Ok(Some(OngoingGitOp::Merge));
        }
        if git_dir.join("CHERRY_PICK_HEAD").exists() {
            return Ok(Some(OngoingGitOp::CherryPick));
        }
        if git_dir.join("REVERT_HEAD").exists() {
            return Ok(Some(OngoingGitOp::Revert));
        }
        Ok(None)
    }

    /// Error out when a git operation is already in flight.
    pub fn ensure_no_ongoing_operation(&self) -> Result<(), GitError> {
        match self.ongoing_operation()? {
            Some(op) => Err(GitError::OngoingOperation(op)),
            None => Ok(()),
        }
    }
}

// =========================================================================
// Parsing helpers
// =========================================================================

/// Lowercase the section and key parts of a config key, preserving the
/// subsection (which is case-sensitive in git).
fn normalize_key(key: &str) -> String {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() < 2 {
        return key.to_lowercase();
    }
    let mut out = Vec::with_capacity(parts.len());
    out.push(parts[0].to_lowercase());
    out.extend(parts[1..parts.len() - 1].iter().map(|s| s.to_string()));
    out.push(parts[parts.len() - 1].to_lowercase());
    out.join(".")
}

fn parse_config_bool(key: &str, value: &str) -> Result<bool, GitError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" | "" => Ok(false),
        other => Err(GitError::ConfigError {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Parse `git config --list --null` output: NUL-separated entries of
/// `key\nvalue` (value may itself contain newlines).
fn parse_config_list(out: &str) -> HashMap<String, String> {
    let mut config = HashMap::new();
    for entry in out.split('\0') {
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('\n') {
            Some((key, value)) => config.insert(key.to_string(), value.to_string()),
            // A key without '=' lists with no value line; treat as "true"
            None => config.insert(entry.to_string(), "true".to_string()),
        };
    }
    config
}

/// Split `refs/remotes/...` refs into (remote, branch), matching against the
/// configured remote names so remotes containing `/` resolve correctly.
fn parse_remote_refs(out: &str, remotes: &[String]) -> Vec<RemoteBranch> {
    let mut branches = Vec::new();
    for line in out.lines() {
        let Some(rest) = line.trim().strip_prefix("refs/remotes/") else {
            continue;
        };
        // Longest remote name wins for remotes with '/' in them
        let mut matched: Option<(&str, &str)> = None;
        for remote in remotes {
            if let Some(branch) = rest.strip_prefix(remote.as_str()).and_then(|r| r.strip_prefix('/'))
                && matched.is_none_or(|(m, _)| remote.len() > m.len())
            {
                matched = Some((remote, branch));
            }
        }
        if let Some((remote, branch)) = matched
            && branch != "HEAD"
        {
            branches.push(RemoteBranch {
                remote: remote.to_string(),
                branch: branch.to_string(),
            });
        }
    }
    branches
}
