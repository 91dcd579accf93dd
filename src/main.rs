use std::process;

use anstyle::Style;
use clap::Parser;

use trellis::git::{exit_code, set_base_path};
use trellis::styling::println;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{
    handle_add, handle_advance, handle_anno, handle_delete_unmanaged, handle_diff,
    handle_discover, handle_edit, handle_file, handle_fork_point, handle_go, handle_is_managed,
    handle_list, handle_log, handle_reapply, handle_show, handle_slide_out, handle_squash,
    handle_status, handle_traverse, handle_update,
};

fn main() {
    let cli = Cli::parse();

    if let Some(path) = cli.directory {
        set_base_path(path);
    }

    // Configure logging based on --verbose flag or RUST_LOG env var
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format(|buf, record| {
        use std::io::Write;

        let msg = record.args().to_string();
        let dim = Style::new().dimmed();

        // Commands start with $; make the command itself bold
        if let Some(rest) = msg.strip_prefix("$ ") {
            let bold = Style::new().bold();
            writeln!(buf, "$ {bold}{rest}{bold:#}")
        } else {
            writeln!(buf, "{dim}{msg}{dim:#}")
        }
    })
    .init();

    let result: anyhow::Result<i32> = run(cli.command);

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            // Error messages are already formatted with emoji and colors
            trellis::styling::eprintln!("{e}");
            if let Some(source) = e.source() {
                log::debug!("caused by: {source}");
            }
            process::exit(exit_code(&e));
        }
    }
}

fn run(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Add {
            branch,
            onto,
            as_root,
            as_first_child,
            yes,
        } => handle_add(branch, onto, as_root, as_first_child, yes)?,

        Commands::Advance { yes } => handle_advance(yes)?,

        Commands::Anno { branch, text } => handle_anno(branch, text)?,

        Commands::DeleteUnmanaged { yes } => handle_delete_unmanaged(yes)?,

        Commands::Diff { stat, branch } => handle_diff(stat, branch)?,

        Commands::Discover {
            roots,
            checked_out_since,
            yes,
        } => handle_discover(roots, checked_out_since, yes)?,

        Commands::Edit => handle_edit()?,

        Commands::File => handle_file()?,

        Commands::ForkPoint {
            branch,
            inferred,
            override_to,
            unset_override,
        } => handle_fork_point(branch, inferred, override_to, unset_override)?,

        Commands::Go { direction } => handle_go(direction)?,

        Commands::IsManaged { branch } => {
            // Plumbing: the exit code is the answer, no output
            return Ok(if handle_is_managed(branch)? { 0 } else { 1 });
        }

        Commands::List { category, branch } => handle_list(category, branch)?,

        Commands::Log { branch } => handle_log(branch)?,

        Commands::Reapply {
            fork_point,
            no_interactive,
        } => handle_reapply(fork_point, no_interactive)?,

        Commands::Show { direction, branch } => handle_show(direction, branch)?,

        Commands::SlideOut {
            branches,
            delete,
            no_rebase,
            no_interactive,
        } => handle_slide_out(branches, delete, no_rebase, no_interactive)?,

        Commands::Squash { fork_point } => handle_squash(fork_point)?,

        Commands::Status {
            list_commits,
            list_commits_with_hashes,
            format,
        } => handle_status(list_commits, list_commits_with_hashes, format)?,

        Commands::Traverse {
            fetch,
            merge,
            push,
            no_push,
            start_from,
            return_to,
            yes,
            no_interactive,
        } => handle_traverse(
            fetch,
            merge,
            push,
            no_push,
            start_from,
            return_to,
            yes,
            no_interactive,
        )?,

        Commands::Update {
            merge,
            fork_point,
            no_interactive,
        } => handle_update(merge, fork_point, no_interactive)?,

        Commands::Version => {
            println!("trellis version {}", cli::version_str());
        }
    }
    Ok(0)
}
