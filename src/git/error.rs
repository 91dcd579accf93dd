//! Git error types and formatting

use std::fmt;
use std::path::PathBuf;

use color_print::cformat;

use crate::styling::{error_message, hint_message};

use super::OngoingGitOp;

#[derive(Debug)]
pub enum GitError {
    /// A git child process exited non-zero where success was required.
    CommandFailed {
        /// The command line, e.g. `git rebase --onto main abc123 feature`
        command: String,
        /// Exit information, e.g. "exit code 128" or "killed by signal"
        exit_info: String,
        /// Captured stderr (and stdout where git writes errors there)
        output: String,
    },
    /// A git command succeeded but printed something unparseable
    ParseError(String),
    /// A request that cannot be carried out as stated, with a ready-made
    /// user-facing message ("no local branch x", "x is a root", …)
    Message(String),
    /// Plumbing failure on our side — git missing or unexecutable, broken
    /// pipes, I/O errors. Exits 2, unlike every other variant.
    Internal(String),
    /// HEAD is not attached to any branch
    DetachedHead,
    /// A rebase/merge/am/cherry-pick/revert is already in flight
    OngoingOperation(OngoingGitOp),
    /// The fork-point inference found nothing and no parent fallback applied
    ForkPointUnknown { branch: String },
    /// The command requires the branch to appear in the layout
    UnmanagedBranch { branch: String },
    /// The layout file does not exist yet
    LayoutMissing { path: PathBuf },
    /// A push or pull needs a remote and the repository has none
    NoRemotes,
    /// Several remotes and no tracking data to pick one
    AmbiguousRemote {
        branch: String,
        remotes: Vec<String>,
    },
    /// Invalid or missing config value where one is required
    ConfigError { key: String, message: String },
    /// A trellis hook exited non-zero
    HookFailed { hook: String, exit_info: String },
    /// The user declined a confirmation the command cannot proceed without
    Aborted,
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitError::CommandFailed {
                command,
                exit_info,
                output,
            } => {
                write!(
                    f,
                    "{}",
                    error_message(cformat!("<bold>{command}</> failed ({exit_info})"))
                )?;
                let trimmed = output.trim();
                if !trimmed.is_empty() {
                    write!(f, "\n{trimmed}")?;
                }
                Ok(())
            }

            GitError::ParseError(msg)
            | GitError::Message(msg)
            | GitError::Internal(msg) => write!(f, "{}", error_message(msg)),

            GitError::DetachedHead => {
                write!(
                    f,
                    "{}\n{}",
                    error_message("Not on a branch (detached HEAD)"),
                    hint_message("Check out a managed branch and retry")
                )
            }

            GitError::OngoingOperation(op) => {
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!("A <bold>{op}</> is in progress in this worktree")),
                    hint_message("Finish or abort it first, then retry")
                )
            }

            GitError::ForkPointUnknown { branch } => {
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "Cannot determine the fork point of <bold>{branch}</>"
                    )),
                    hint_message(format!(
                        "Set it explicitly: trellis fork-point --override-to=<revision> {branch}"
                    ))
                )
            }

            GitError::UnmanagedBranch { branch } => {
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "Branch <bold>{branch}</> is not in the branch layout"
                    )),
                    hint_message(format!("Add it with: trellis add {branch}"))
                )
            }

            GitError::LayoutMissing { path } => {
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "No branch layout found at <bold>{}</>",
                        path.display()
                    )),
                    hint_message("Run trellis discover, or trellis edit to write one by hand")
                )
            }

            GitError::NoRemotes => {
                write!(
                    f,
                    "{}",
                    error_message("The repository has no remotes configured")
                )
            }

            GitError::AmbiguousRemote { branch, remotes } => {
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "Branch <bold>{branch}</> tracks no remote and several exist: {}",
                        remotes.join(", ")
                    )),
                    hint_message("Set one with: git branch --set-upstream-to=<remote>/<branch>")
                )
            }

            GitError::ConfigError { key, message } => {
                write!(
                    f,
                    "{}",
                    error_message(cformat!("Invalid value for <bold>{key}</>: {message}"))
                )
            }

            GitError::HookFailed { hook, exit_info } => {
                write!(
                    f,
                    "{}",
                    error_message(cformat!("Hook <bold>{hook}</> failed ({exit_info})"))
                )
            }

            GitError::Aborted => write!(f, "{}", error_message("Aborted")),
        }
    }
}

impl GitError {
    /// A validation failure with a ready-made user-facing message.
    pub fn message(msg: impl Into<String>) -> Self {
        GitError::Message(msg.into())
    }

    /// A plumbing failure on our side (exit code 2).
    pub fn internal(msg: impl Into<String>) -> Self {
        GitError::Internal(msg.into())
    }
}

impl std::error::Error for GitError {}

/// Map an error chain to the process exit code.
///
/// Known, user-facing error types exit 1; [`GitError::Internal`] and
/// anything unrecognized are internal errors and exit 2. (SIGINT never
/// reaches this path — the default disposition terminates the process group
/// with status 130.)
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(git) = cause.downcast_ref::<GitError>() {
            return match git {
                GitError::Internal(_) => 2,
                _ => 1,
            };
        }
        if cause.is::<crate::layout::LayoutError>() {
            return 1;
        }
    }
    2
}

/// Describe an exit status for error messages: "exit code N" or the signal.
pub fn describe_exit(status: std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}
