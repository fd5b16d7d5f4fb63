//! CLI argument definitions for things2reclaim.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// things2reclaim - Mirror Things to-dos into Reclaim and reconcile Toggl time.
///
/// Start with `t2r config init`, add your tokens to state.kdl, then run
/// `t2r init` once and `t2r sync` from then on.
#[derive(Parser, Debug)]
#[command(name = "t2r")]
#[command(author, version, about = "Keep Things, Reclaim and Toggl in sync", long_about = None)]
#[command(long_version = crate::cli::LONG_VERSION)]
pub struct Cli {
    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Path of the upload ledger database.
    /// Can also be set via T2R_DB_PATH environment variable.
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Version string with build metadata.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("T2R_GIT_COMMIT"),
    "\nbuilt: ",
    env!("T2R_BUILD_TIMESTAMP"),
);

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record every task already in Reclaim in the upload ledger
    Init,

    /// Create Reclaim tasks for open Things to-dos of the configured area
    Upload {
        /// Show what would be created without creating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List Reclaim tasks with their deadlines
    List {
        /// Only tasks whose name starts with this (e.g. a course)
        subject: Option<String>,
    },

    /// Start tracking time on a task
    Start {
        /// Task name (fuzzy-matched)
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,

        /// Toggl tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Stop the running time entry and log it to its task
    Stop,

    /// Count fine and overdue tasks per project
    Stats,

    /// Summarize estimated work and when it is scheduled to finish
    Time {
        /// Only tasks whose name starts with this
        subject: Option<String>,
    },

    /// Finish a task in Reclaim and Things
    Remove {
        /// Task name (fuzzy-matched)
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Complete Things to-dos whose Reclaim task is finished
    Finished {
        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Finish Reclaim tasks whose Things to-do was deleted
    #[command(name = "remove-deleted", alias = "removeDeleted")]
    RemoveDeleted {
        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Bring Reclaim work events in line with Toggl time entries
    Tracking {
        /// How many days back to look (default from config, max 90)
        since_days: Option<i64>,

        /// Show the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the running time entry
    Current,

    /// Run finished, remove-deleted and upload in order
    Sync {
        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write template config.kdl and state.kdl (existing files are kept)
    Init,

    /// Show resolved settings and where each came from
    Show,
}
