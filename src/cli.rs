use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;

use crate::commands::config::ConfigCommands;
use crate::commands::fetch::FetchArgs;
use crate::commands::history::HistoryArgs;
use crate::commands::pending::PendingCommands;
use crate::commands::push::PushArgs;
use crate::commands::status::StatusArgs;
use crate::commands::sync::SyncArgs;
use crate::commands::watch::WatchArgs;

#[derive(Parser)]
#[command(
    name = "partdb",
    version,
    about,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Part database repository (default: PARTDB_REPO, config, or the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show sync status and pending requests
    Status(StatusArgs),

    /// Fetch the base branch and reconcile pending requests
    Fetch(FetchArgs),

    /// Fetch and integrate the base branch
    Sync(SyncArgs),

    /// Push local commits to the base branch
    Push(PushArgs),

    /// Submit and track change requests
    #[command(subcommand)]
    Pending(PendingCommands),

    /// Show commits touching a category table
    History(HistoryArgs),

    /// Keep fetching and reconciling in the foreground
    Watch(WatchArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
