//! Child-process execution
//!
//! Every external command trellis runs — `git` queries, mutating git
//! operations, hooks, the editor — goes through [`Cmd`] so that invocations
//! are logged uniformly and exit statuses are never silently dropped.
//!
//! Three run modes:
//! - [`Cmd::run`]: capture stdout/stderr, return [`std::process::Output`].
//!   Non-zero exit is NOT an error here; callers inspect the status.
//! - [`Cmd::run_check`]: capture, return whether the exit status was zero.
//!   For commands whose exit code is the answer (`merge-base --is-ancestor`).
//! - [`Cmd::run_interactive`]: inherit stdin/stdout/stderr so git can drive
//!   the terminal (interactive rebase, editors). Returns the exit status.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::time::Instant;

/// Builder for an external command invocation.
#[derive(Debug)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    stdin_bytes: Option<Vec<u8>>,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
            stdin_bytes: None,
        }
    }

    /// Convenience constructor for the common case.
    pub fn git(args: &[&str]) -> Self {
        Self::new("git").args(args.iter().copied())
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self.args.push(a.as_ref().to_os_string());
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Feed the given bytes to the child's stdin.
    ///
    /// Used for commands that read their payload from stdin, like
    /// `git commit-tree` taking the commit message.
    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin_bytes = Some(bytes.into());
        self
    }

    /// Human-readable command line, shell-escaped, for logs and errors.
    pub fn display(&self) -> String {
        let mut parts = vec![escape_os(&self.program)];
        parts.extend(self.args.iter().map(|a| escape_os(a)));
        parts.join(" ")
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run with captured output. Spawn failure is an error; a non-zero exit
    /// status is not — inspect `output.status`.
    pub fn run(&self) -> std::io::Result<Output> {
        let cmd_str = self.display();
        log::debug!("$ {cmd_str}");

        let t0 = Instant::now();
        let result = match &self.stdin_bytes {
            None => self.build().output(),
            Some(bytes) => {
                let mut child = self
                    .build()
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()?;
                // Scope the handle so stdin closes before we wait
                {
                    let mut stdin = child.stdin.take().expect("stdin was piped");
                    stdin.write_all(bytes)?;
                }
                child.wait_with_output()
            }
        };
        let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(output) => log::debug!(
                "[trace] cmd=\"{}\" dur={:.1}ms ok={}",
                cmd_str,
                duration_ms,
                output.status.success()
            ),
            Err(e) => log::debug!("[trace] cmd=\"{cmd_str}\" dur={duration_ms:.1}ms err=\"{e}\""),
        }

        result
    }

    /// Run with captured output, returning whether the exit status was zero.
    pub fn run_check(&self) -> std::io::Result<bool> {
        Ok(self.run()?.status.success())
    }

    /// Run with inherited stdio, handing the terminal over to the child.
    ///
    /// Used for interactive rebases and editor launches; the child owns the
    /// TTY until it exits.
    pub fn run_interactive(&self) -> std::io::Result<ExitStatus> {
        let cmd_str = self.display();
        log::debug!("$ {cmd_str} [interactive]");
        self.build().status()
    }
}

fn escape_os(s: &OsStr) -> String {
    shell_escape::escape(Cow::Owned(s.to_string_lossy().into_owned())).into_owned()
}

/// Resolve the editor to launch, in precedence order.
///
/// `TRELLIS_EDITOR` wins, then git's own `GIT_EDITOR`, then the generic
/// `EDITOR`/`VISUAL` pair, then `core.editor` from git config (passed in by
/// the caller), then `vi`.
pub fn resolve_editor(core_editor: Option<&str>) -> String {
    for var in ["TRELLIS_EDITOR", "GIT_EDITOR", "EDITOR", "VISUAL"] {
        if let Ok(val) = std::env::var(var)
            && !val.trim().is_empty()
        {
            return val;
        }
    }
    if let Some(ed) = core_editor
        && !ed.trim().is_empty()
    {
        return ed.to_string();
    }
    "vi".to_string()
}

/// Launch the editor on a file, inheriting the TTY.
///
/// The editor value may contain arguments (`code --wait`), so it is run
/// through `sh -c` the way git itself treats `core.editor`.
pub fn spawn_editor(editor: &str, path: &Path) -> std::io::Result<ExitStatus> {
    let quoted = shell_escape::escape(Cow::Borrowed(path.to_str().unwrap_or_default()));
    Cmd::new("sh")
        .arg("-c")
        .arg(format!("{editor} {quoted}"))
        .run_interactive()
}
