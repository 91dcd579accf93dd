//! Terminal styling for trellis output.
//!
//! Built on the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - color-print's `cformat!` for inline-styled messages
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: primary data output (the status tree, plumbing output, JSON)
//! - **stderr**: status messages (prompts, progress, errors, hints)
//!
//! This separation allows piping (`trellis list managed | xargs …`) without
//! status messages interfering. Use `println!` for primary output,
//! `eprintln!` for status messages.

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println};

use anstyle::{AnsiColor, Color, Style};
use color_print::cformat;

// ============================================================================
// Edge and branch styles for the status tree
// ============================================================================

/// Edge style for an out-of-sync child (needs rebase or merge).
pub const EDGE_OUT_OF_SYNC: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Edge style for a child in sync with its parent but with a fork point
/// pointing elsewhere.
pub const EDGE_FORK_POINT_OFF: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));

/// Edge style for a child fully in sync with its parent.
pub const EDGE_IN_SYNC: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Edge style for a child already merged into its parent.
pub const EDGE_MERGED: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));

/// The current branch is underlined where the terminal supports it.
pub const CURRENT_BRANCH: Style = Style::new().underline().bold();

/// Fallback for terminals without underline support (`TERM=dumb` etc.):
/// bold blue.
pub const CURRENT_BRANCH_PLAIN: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::Blue)));

/// Dim style for commit hashes and secondary decorations.
pub const DIM: Style = Style::new().dimmed();

/// Whether the terminal advertises underline support.
///
/// `TERM=dumb` (and unset TERM) historically lack underline; everything else
/// in practice supports it.
pub fn terminal_supports_underline() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

// ============================================================================
// Message emojis
// ============================================================================

/// Success emoji: `cformat!("{SUCCESS_EMOJI} <green>message</>")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Info emoji - use for neutral status
pub const INFO_EMOJI: &str = "⚪";

/// Prompt emoji - use for questions requiring user input
/// `eprint!("{PROMPT_EMOJI} Rebase feature onto main? [y/N] ")`
pub const PROMPT_EMOJI: &str = "❓";

// ============================================================================
// Message formatting functions
// ============================================================================
//
// These functions provide the canonical formatting for each message type.
// Used by both command handlers and Display impls (GitError, LayoutError)
// to ensure consistent styling.

/// Format an error message with emoji and red styling
///
/// Content can include inner styling like `<bold>`:
/// ```
/// use color_print::cformat;
/// use trellis::styling::error_message;
///
/// let name = "feature";
/// println!("{}", error_message(cformat!("Branch <bold>{name}</> not found")));
/// ```
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

/// Format a hint message with emoji and dim styling
pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

/// Format a warning message with emoji and yellow styling
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

/// Format a success message with emoji and green styling
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("{SUCCESS_EMOJI} <green>{}</>", content.as_ref())
}

/// Format an info message with emoji (no color - neutral status)
pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}

/// Format a prompt lead-in with the question emoji.
pub fn prompt_message(content: impl AsRef<str>) -> String {
    format!("{PROMPT_EMOJI} {}", content.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let msg = error_message("Something went wrong");
        assert!(msg.contains("❌"));
        assert!(msg.contains("Something went wrong"));
    }

    #[test]
    fn test_hint_message() {
        let msg = hint_message("Run trellis discover first");
        assert!(msg.contains("💡"));
        assert!(msg.contains("Run trellis discover first"));
    }

    #[test]
    fn test_success_message() {
        let msg = success_message("Rebased feature onto main");
        assert!(msg.contains("✅"));
        assert!(msg.contains("Rebased feature onto main"));
    }

    #[test]
    fn test_prompt_message() {
        let msg = prompt_message("Push feature to origin? [y/N/q/yq]");
        assert!(msg.starts_with("❓"));
    }

    #[test]
    fn test_edge_styles_are_distinct() {
        let rendered: Vec<String> = [
            EDGE_OUT_OF_SYNC,
            EDGE_FORK_POINT_OFF,
            EDGE_IN_SYNC,
            EDGE_MERGED,
        ]
        .iter()
        .map(|s| s.render().to_string())
        .collect();
        for (i, a) in rendered.iter().enumerate() {
            for b in rendered.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
