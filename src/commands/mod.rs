//! Command implementations for the `t2r` CLI.
//!
//! Each command takes its collaborators explicitly (providers, ledger,
//! prompter) and returns a result type that renders as JSON or text.
//! Commands are grouped by concern:
//! - `tasks` - ledger lifecycle: init, upload, finished, remove-deleted, remove, sync
//! - `report` - read-only views: list, stats, time
//! - `tracking` - time tracking: start, stop, current, tracking
//! - `config` - settings files: config init, config show

pub mod config;
pub mod report;
pub mod tasks;
pub mod tracking;

pub use config::{config_init, config_show};
pub use report::{list, stats, time};
pub use tasks::{finished, init, remove, remove_deleted, sync, upload};
pub use tracking::{current, start, stop, tracking};

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::Result;
use crate::models::RemoteTask;
use crate::prompt::Prompter;
use crate::reconcile::fuzzy;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult: Serialize {
    /// Serialize to JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }

    /// Format for human-readable output.
    fn to_human(&self) -> String;

    /// Whether the command should exit non-zero despite producing output.
    fn is_failure(&self) -> bool {
        false
    }
}

/// Options shared by the ledger sweeps.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Wait before re-checking that the to-do manager applied completions.
    pub completion_delay: Duration,
}

impl SyncOptions {
    pub fn new(dry_run: bool, completion_delay: Duration) -> Self {
        Self {
            dry_run,
            completion_delay,
        }
    }
}

/// Index remote tasks by name.
pub(crate) fn by_name(tasks: Vec<RemoteTask>) -> BTreeMap<String, RemoteTask> {
    tasks.into_iter().map(|t| (t.name.clone(), t)).collect()
}

/// Resolve a user-typed name against the given remote tasks.
pub fn resolve_remote_task(
    tasks: Vec<RemoteTask>,
    name: &str,
    prompter: &mut dyn Prompter,
) -> Result<RemoteTask> {
    let index = by_name(tasks);
    fuzzy::resolve(name, &index, prompter).cloned()
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}
