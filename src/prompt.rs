//! User confirmation prompts.
//!
//! Traversal and discovery ask before acting; the answers are ordinary
//! values, not errors — `q` means "stop walking", and callers decide what
//! that implies. The [`Prompter`] trait keeps the interactive loop testable:
//! the traverser takes any implementation, and tests drive it with a
//! scripted one.

use std::io::{IsTerminal, Write};

use crate::styling::{eprint, eprintln, prompt_message};

/// Reply to a `[y/N/q/yq]` question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// Do it.
    Yes,
    /// Skip this step.
    No,
    /// Stop walking, do nothing.
    Quit,
    /// Do it, then stop walking.
    YesQuit,
}

/// Reply to discover's `[y/e/N]` question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverAnswer {
    /// Write the discovered layout.
    Yes,
    /// Write it and open the editor.
    Edit,
    /// Leave everything as is.
    No,
}

pub trait Prompter {
    /// Ask a `[y/N/q/yq]` question.
    fn ask(&mut self, question: &str) -> std::io::Result<Answer>;

    /// Ask discover's `[y/e/N]` question.
    fn ask_discover(&mut self, question: &str) -> std::io::Result<DiscoverAnswer>;

    /// Pick one of several remotes for a push. None means the user declined
    /// (or the prompter cannot ask); the caller turns that into an error.
    fn choose_remote(&mut self, branch: &str, remotes: &[String]) -> std::io::Result<Option<String>>;
}

/// Prompter reading answers from the terminal.
///
/// Questions go to stderr so they never contaminate plumbing output on
/// stdout. EOF (closed stdin, or Ctrl-D at the prompt) reads as quit.
#[derive(Debug, Default)]
pub struct TtyPrompter {
    /// Answer yes to everything without asking (--yes).
    pub assume_yes: bool,
}

impl TtyPrompter {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Returns None on EOF (closed stdin, Ctrl-D at the prompt).
    fn read_reply(question: &str, suffix: &str) -> std::io::Result<Option<String>> {
        eprint!("{} ", prompt_message(format!("{question} {suffix}")));
        std::io::stderr().flush()?;
        let mut reply = String::new();
        let read = std::io::stdin().read_line(&mut reply)?;
        if read == 0 {
            // EOF: print a newline so the next message starts clean
            eprintln!();
            return Ok(None);
        }
        Ok(Some(reply.trim().to_lowercase()))
    }
}

impl Prompter for TtyPrompter {
    fn ask(&mut self, question: &str) -> std::io::Result<Answer> {
        if self.assume_yes {
            return Ok(Answer::Yes);
        }
        if !std::io::stdin().is_terminal() {
            // Non-interactive runs must not hang; treat as quit
            return Ok(Answer::Quit);
        }
        let Some(reply) = Self::read_reply(question, "[y/N/q/yq]")? else {
            return Ok(Answer::Quit);
        };
        Ok(match reply.as_str() {
            "y" | "yes" => Answer::Yes,
            "yq" => Answer::YesQuit,
            "q" | "quit" => Answer::Quit,
            _ => Answer::No,
        })
    }

    fn ask_discover(&mut self, question: &str) -> std::io::Result<DiscoverAnswer> {
        if self.assume_yes {
            return Ok(DiscoverAnswer::Yes);
        }
        if !std::io::stdin().is_terminal() {
            return Ok(DiscoverAnswer::No);
        }
        let Some(reply) = Self::read_reply(question, "[y/e/N]")? else {
            return Ok(DiscoverAnswer::No);
        };
        Ok(match reply.as_str() {
            "y" | "yes" => DiscoverAnswer::Yes,
            "e" | "edit" => DiscoverAnswer::Edit,
            _ => DiscoverAnswer::No,
        })
    }

    fn choose_remote(&mut self, branch: &str, remotes: &[String]) -> std::io::Result<Option<String>> {
        // With --yes there is no safe silent pick among several remotes
        if self.assume_yes || !std::io::stdin().is_terminal() {
            return Ok(None);
        }
        eprintln!(
            "{}",
            prompt_message(format!("Branch {branch} tracks no remote. Push to:"))
        );
        for (i, remote) in remotes.iter().enumerate() {
            eprintln!("  [{}] {remote}", i + 1);
        }
        let Some(reply) = Self::read_reply("Remote", "(number, empty to cancel)")? else {
            return Ok(None);
        };
        Ok(reply
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| remotes.get(i))
            .cloned())
    }
}

/// Prompter answering from a fixed script. Test-only in spirit, but lives
/// here so integration tests can use it against the public API.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<Answer>,
    /// Questions asked, for assertions.
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> std::io::Result<Answer> {
        self.asked.push(question.to_string());
        // Running out of scripted answers means "stop here"
        Ok(self.answers.pop_front().unwrap_or(Answer::Quit))
    }

    fn ask_discover(&mut self, question: &str) -> std::io::Result<DiscoverAnswer> {
        self.asked.push(question.to_string());
        Ok(match self.answers.pop_front() {
            Some(Answer::Yes) => DiscoverAnswer::Yes,
            _ => DiscoverAnswer::No,
        })
    }

    fn choose_remote(&mut self, _branch: &str, remotes: &[String]) -> std::io::Result<Option<String>> {
        // Scripted runs pick the first remote when told yes, else decline
        Ok(match self.answers.pop_front() {
            Some(Answer::Yes) => remotes.first().cloned(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_prompter_replays_answers() {
        let mut p = ScriptedPrompter::new([Answer::Yes, Answer::No]);
        assert_eq!(p.ask("first?").unwrap(), Answer::Yes);
        assert_eq!(p.ask("second?").unwrap(), Answer::No);
        // Script exhausted: quit
        assert_eq!(p.ask("third?").unwrap(), Answer::Quit);
        assert_eq!(p.asked, ["first?", "second?", "third?"]);
    }

    #[test]
    fn assume_yes_never_reads_stdin() {
        let mut p = TtyPrompter::new(true);
        assert_eq!(p.ask("anything?").unwrap(), Answer::Yes);
        assert_eq!(p.ask_discover("layout?").unwrap(), DiscoverAnswer::Yes);
    }
}
