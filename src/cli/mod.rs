//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Busy Bee TODO tracker - offline-first TODO store with remote sync
#[derive(Parser, Debug)]
#[command(name = "bbt", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root (default: current directory)
    #[arg(long, short = 'w', global = true, env = "BBT_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Backend base URL (default: $BUSYBEE_BACKEND_URL or http://localhost:5050)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Never contact the backend
    #[arg(long, global = true)]
    pub offline: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show workspace, storage and sync status
    Status,

    /// Scan the workspace (or one file) for TODO/FIXME/BUG markers
    Scan {
        /// Only re-scan this file
        file: Option<PathBuf>,
    },

    /// List tracked items
    List(ListArgs),

    /// Record a TODO by hand
    Add(AddArgs),

    /// Mark an item resolved
    Resolve {
        /// Item ID or unique prefix
        id: String,
    },

    /// Mark an item in progress
    Start {
        /// Item ID or unique prefix
        id: String,
    },

    /// Reopen an item
    Reopen {
        /// Item ID or unique prefix
        id: String,
    },

    /// Edit an item (the item becomes manual)
    Edit(EditArgs),

    /// Pull, merge and push with the bound remote project
    Sync(SyncArgs),

    /// List remote projects
    Projects,

    /// Show or clear this workspace's remote binding
    Binding {
        #[command(subcommand)]
        command: Option<BindingCommands>,
    },

    /// Show the next reminder for a file
    Remind(RemindArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Filter by status (open, in_progress, resolved; synonyms accepted)
    #[arg(long, short)]
    pub status: Option<String>,

    /// Only items in this file
    #[arg(long, short)]
    pub file: Option<String>,

    /// Include resolved items
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// TODO text
    pub text: String,

    /// File the TODO belongs to (workspace-relative)
    #[arg(long, short, default_value = "")]
    pub file: String,

    /// Line number in the file
    #[arg(long, short, default_value_t = 1)]
    pub line: u32,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Item ID or unique prefix
    pub id: String,

    /// New text
    #[arg(long)]
    pub text: Option<String>,

    /// New status
    #[arg(long)]
    pub status: Option<String>,

    /// New priority (low, medium, high, urgent or P0-P3)
    #[arg(long, short)]
    pub priority: Option<String>,

    /// Replace labels (repeatable)
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,

    /// Deadline (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub deadline: Option<String>,

    /// Urgency score between 0 and 1
    #[arg(long)]
    pub urgency: Option<f64>,

    /// New line number
    #[arg(long)]
    pub line: Option<u32>,
}

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Bind this workspace to a new remote project with this name
    #[arg(long, conflicts_with = "project")]
    pub create: Option<String>,

    /// Bind this workspace to an existing remote project
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum BindingCommands {
    /// Show the binding (default)
    Show,
    /// Remove the binding so the next sync can bind again
    Clear,
}

#[derive(Args, Debug)]
pub struct RemindArgs {
    /// Active file (workspace-relative)
    #[arg(long, short)]
    pub file: String,

    /// Snooze this item instead of showing a reminder
    #[arg(long)]
    pub snooze: Option<String>,

    /// Snooze length in minutes
    #[arg(long, default_value_t = crate::reminder::DEFAULT_SNOOZE_MINUTES)]
    pub minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags_conflict() {
        let err = Cli::try_parse_from(["bbt", "sync", "--create", "a", "--project", "b"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_edit_collects_labels() {
        let cli = Cli::try_parse_from(["bbt", "edit", "abc", "-l", "ui", "-l", "api"]).unwrap();
        let Commands::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.labels, vec!["ui", "api"]);
    }
}
