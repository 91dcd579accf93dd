//! Trellis hooks.
//!
//! Hooks are executables in the repository's hook directory
//! (`core.hooksPath`, defaulting to `<git-common-dir>/hooks`), looked up by
//! name like git's own hooks. An absent or non-executable hook is simply
//! skipped.
//!
//! - `trellis-pre-rebase <new-base> <fork-point> <branch>` — non-zero exit
//!   aborts the rebase.
//! - `trellis-post-slide-out <new-upstream> <lowest-slid-out>
//!   [<new-downstreams>...]` — fired after the layout file is written;
//!   non-zero halts follow-up rebases of the downstreams.
//! - `trellis-status-branch <branch>` — first stdout line decorates the
//!   status output; non-zero exit means the output is ignored. Invoked with
//!   `ASCII_ONLY=true|false`.

use std::path::PathBuf;

use crate::git::{GitError, Repository, describe_exit};
use crate::shell_exec::Cmd;

pub const PRE_REBASE: &str = "trellis-pre-rebase";
pub const POST_SLIDE_OUT: &str = "trellis-post-slide-out";
pub const STATUS_BRANCH: &str = "trellis-status-branch";

/// Resolve the hooks directory for the repository.
pub fn hooks_dir(repo: &Repository) -> Result<PathBuf, GitError> {
    match repo.config_get("core.hooksPath")? {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(repo.git_common_dir().join("hooks")),
    }
}

fn executable_hook(repo: &Repository, name: &str) -> Result<Option<PathBuf>, GitError> {
    let path = hooks_dir(repo)?.join(name);
    if !path.is_file() {
        return Ok(None);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(&path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            log::debug!("hook {name} exists but is not executable; skipping");
            return Ok(None);
        }
    }
    Ok(Some(path))
}

/// Run a hook that gates an operation: absent hook passes, non-zero exit is
/// [`GitError::HookFailed`].
pub fn run_gate_hook(repo: &Repository, name: &str, args: &[&str]) -> Result<(), GitError> {
    let Some(path) = executable_hook(repo, name)? else {
        return Ok(());
    };
    let status = Cmd::new(&path)
        .args(args.iter().copied())
        .current_dir(repo.git_common_dir().parent().unwrap_or(repo.git_common_dir()))
        .run_interactive()
        .map_err(|e| GitError::Internal(format!("Failed to execute hook {name}: {e}")))?;
    if !status.success() {
        return Err(GitError::HookFailed {
            hook: name.to_string(),
            exit_info: describe_exit(status),
        });
    }
    Ok(())
}

/// Run the status-branch hook, returning the first stdout line.
///
/// Failure to run, or a non-zero exit, yields None — status must render
/// regardless.
pub fn status_branch_line(repo: &Repository, branch: &str, ascii_only: bool) -> Option<String> {
    let path = executable_hook(repo, STATUS_BRANCH).ok().flatten()?;
    let out = Cmd::new(&path)
        .arg(branch)
        .env("ASCII_ONLY", if ascii_only { "true" } else { "false" })
        .current_dir(repo.git_common_dir().parent().unwrap_or(repo.git_common_dir()))
        .run()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&out.stdout);
    let line = stdout.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}
