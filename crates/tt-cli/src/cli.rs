//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Project time tracker.
///
/// Tracks time against projects with a single running timer and bills it in
/// 15-minute units.
#[derive(Debug, Parser)]
#[command(name = "tt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run an interactive timer session reading commands from stdin.
    ///
    /// Timers left running by a previous session are closed at its last
    /// recorded activity before the first command is read.
    Session,

    /// List time entries, newest first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the billed total for a project.
    Total {
        /// Project name (exact match).
        project: String,
    },

    /// Show store and timer status.
    Status,

    /// Write every entry to a JSON archive.
    Export {
        /// Archive path. Defaults to `time-tracker-export-YYYY-MM-DD.json` in
        /// the configured export directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Delete all entries once the archive was written.
        #[arg(long)]
        clear: bool,
    },

    /// Delete all entries.
    Clear {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_export_flags() {
        let cli = Cli::parse_from(["tt", "export", "--output", "out.json", "--clear"]);
        match cli.command {
            Some(Commands::Export { output, clear }) => {
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(clear);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["tt", "list", "--json", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::List { json: true })));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
