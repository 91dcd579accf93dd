//! Command-line interface definition.
//!
//! The command set is a closed sum: one variant per subcommand, each
//! carrying its parsed options. Handlers in `commands/` dispatch by
//! pattern match.

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand};

use trellis::layout::Direction;
use trellis::status::StatusFormat;
use trellis::traverse::{ReturnTo, StartFrom};

/// Custom styles for help output - matches trellis's color scheme
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

pub(crate) fn version_str() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Declare and maintain a tree of layered git branches", long_about = None)]
#[command(version = version_str())]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "\
Getting started

  trellis discover              # Infer the branch layout from reflogs
  trellis status -l             # Show the tree with commits per branch
  trellis traverse              # Walk the tree: rebase / push / slide out
  trellis add -o main feature   # Put a branch under main in the layout

The layout lives in <git-dir>/trellis; edit it with `trellis edit`.")]
pub(crate) struct Cli {
    /// Working directory for this command
    #[arg(short = 'C', global = true, value_name = "path")]
    pub directory: Option<std::path::PathBuf>,

    /// Show debug output, including every git invocation
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Branch categories for `trellis list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Category {
    /// Branches (local or remote) that could be added to the layout
    Addable,
    /// All branches in the layout, in file order
    Managed,
    /// Managed branches without children
    Childless,
    /// Managed branches that have a parent
    Slidable,
    /// The branch that could be slid out right after the given branch
    SlidableAfter,
    /// Local branches absent from the layout
    Unmanaged,
    /// Branches with a fork-point override configured
    WithOverriddenForkPoint,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Add a branch to the layout
    Add {
        /// Branch to add (defaults to the current branch)
        branch: Option<String>,
        /// Parent to attach the branch under
        #[arg(short = 'o', long, value_name = "branch")]
        onto: Option<String>,
        /// Add as a new root
        #[arg(short = 'R', long)]
        as_root: bool,
        /// Insert as the first child (or first root) instead of the last
        #[arg(long)]
        as_first_child: bool,
        /// Answer yes to every question
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Fast-forward the current branch to its unique child and slide the
    /// child out
    Advance {
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print or set a branch's annotation
    Anno {
        /// Branch to annotate (defaults to the current branch)
        #[arg(short = 'b', long)]
        branch: Option<String>,
        /// New annotation text; empty clears, omitted prints
        text: Vec<String>,
    },

    /// Delete local branches that are not in the layout
    DeleteUnmanaged {
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Diff of a branch against its fork point
    Diff {
        /// Show a diffstat instead of the full patch
        #[arg(short = 's', long)]
        stat: bool,
        /// Branch to diff (defaults to the current branch)
        branch: Option<String>,
    },

    /// Infer a branch layout from reflogs and offer to save it
    Discover {
        /// Root branches (default: master, main, develop — whichever exist)
        #[arg(long, value_name = "branches", value_delimiter = ',')]
        roots: Vec<String>,
        /// Only consider branches checked out since this date
        #[arg(long, value_name = "date")]
        checked_out_since: Option<String>,
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Open the layout file in an editor
    Edit,

    /// Print the layout file path
    File,

    /// Print or override a branch's fork point
    ForkPoint {
        /// Branch to inspect (defaults to the current branch)
        branch: Option<String>,
        /// Ignore any override, print the inferred fork point
        #[arg(long, conflicts_with_all = ["override_to", "unset_override"])]
        inferred: bool,
        /// Set the override to this revision
        #[arg(long, value_name = "revision")]
        override_to: Option<String>,
        /// Remove the override
        #[arg(long, conflicts_with = "override_to")]
        unset_override: bool,
    },

    /// Check out the branch in the given direction
    Go {
        #[arg(value_enum)]
        direction: Direction,
    },

    /// Exit 0 if the branch is in the layout, 1 otherwise
    IsManaged {
        /// Branch to test (defaults to the current branch)
        branch: Option<String>,
    },

    /// List branches of a category, one per line
    List {
        #[arg(value_enum)]
        category: Category,
        /// Required for slidable-after
        branch: Option<String>,
    },

    /// Log of a branch's commits since its fork point
    Log {
        /// Branch to log (defaults to the current branch)
        branch: Option<String>,
    },

    /// Rebase the current branch onto its own fork point (interactive
    /// history rewrite)
    Reapply {
        /// Use this revision as the fork point
        #[arg(short = 'f', long, value_name = "revision")]
        fork_point: Option<String>,
        /// Run the rebase non-interactively
        #[arg(short = 'n', long)]
        no_interactive: bool,
    },

    /// Print the branch in the given direction
    Show {
        #[arg(value_enum)]
        direction: Direction,
        /// Branch to start from (defaults to the current branch)
        branch: Option<String>,
    },

    /// Remove branches from the layout, reattaching their children
    SlideOut {
        /// Chain of branches to remove (defaults to the current branch)
        branches: Vec<String>,
        /// Also delete the local branches
        #[arg(short = 'd', long)]
        delete: bool,
        /// Do not rebase the reattached children
        #[arg(long)]
        no_rebase: bool,
        /// Run the follow-up rebases non-interactively
        #[arg(short = 'n', long)]
        no_interactive: bool,
    },

    /// Collapse the current branch into a single commit at its fork point
    Squash {
        /// Use this revision as the fork point
        #[arg(short = 'f', long, value_name = "revision")]
        fork_point: Option<String>,
    },

    /// Show the annotated branch tree
    Status {
        /// List commits in the fork-point..tip range per branch
        #[arg(short = 'l', long)]
        list_commits: bool,
        /// Like --list-commits, with commit hashes
        #[arg(short = 'L', long)]
        list_commits_with_hashes: bool,
        #[arg(long, value_enum, default_value = "display")]
        format: StatusFormat,
    },

    /// Walk the tree, syncing every branch with its parent and remote
    Traverse {
        /// Fetch all remotes first
        #[arg(short = 'F', long)]
        fetch: bool,
        /// Merge parents into branches instead of rebasing
        #[arg(short = 'M', long)]
        merge: bool,
        /// Propose pushes even if trellis.traverse.push is false
        #[arg(long, overrides_with = "no_push")]
        push: bool,
        /// Never propose pushes
        #[arg(long, overrides_with = "push")]
        no_push: bool,
        #[arg(long, value_enum, default_value = "here")]
        start_from: StartFrom,
        #[arg(long, value_enum, default_value = "stay")]
        return_to: ReturnTo,
        /// Answer yes to every question
        #[arg(short = 'y', long)]
        yes: bool,
        /// Run rebases non-interactively
        #[arg(short = 'n', long)]
        no_interactive: bool,
    },

    /// Rebase (or merge) the current branch onto its parent
    Update {
        /// Merge the parent instead of rebasing
        #[arg(short = 'M', long)]
        merge: bool,
        /// Use this revision as the fork point for the rebase
        #[arg(short = 'f', long, value_name = "revision")]
        fork_point: Option<String>,
        /// Non-interactive rebase / merge without editor
        #[arg(short = 'n', long)]
        no_interactive: bool,
    },

    /// Print the trellis version
    Version,
}
