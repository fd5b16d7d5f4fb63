//! Life of a local task id across the upload ledger.
//!
//! ```text
//! Unknown --upload--> Uploaded --remote gone--> Completed
//!                            \--local gone---> Removed
//! ```

use serde::Serialize;
use std::collections::BTreeSet;

use crate::Result;
use crate::models::{LocalTask, RemoteTask};
use crate::providers::SchedulingProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never uploaded (no ledger row).
    Unknown,
    /// Mirrored remotely and still live on both sides.
    Uploaded,
    /// Finished remotely; the local to-do should be completed.
    Completed,
    /// Deleted locally; the remote task should be finished.
    Removed,
}

/// Where a ledger id stands given what both sides currently report.
///
/// A missing local task wins over a missing remote one: there is nothing
/// left to complete locally.
pub fn next_state(in_ledger: bool, remote_present: bool, local: Option<&LocalTask>) -> SyncState {
    if !in_ledger {
        SyncState::Unknown
    } else if local.is_none() {
        SyncState::Removed
    } else if !remote_present {
        SyncState::Completed
    } else {
        SyncState::Uploaded
    }
}

/// A remote task to finish, known either fully or only by its local id.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishTarget {
    ByRecord(RemoteTask),
    ById(String),
}

/// Find the live remote task a target refers to.
pub fn resolve_finish_target(target: &FinishTarget, live: &[RemoteTask]) -> Option<RemoteTask> {
    match target {
        FinishTarget::ByRecord(task) => live.iter().find(|t| t.id == task.id).cloned(),
        FinishTarget::ById(local_id) => live
            .iter()
            .find(|t| t.local_id() == Some(local_id.as_str()))
            .cloned(),
    }
}

/// Mark the target complete if it is still live.
///
/// Returns the task that was finished, or `None` when nothing was live.
pub fn finish_remote(
    scheduler: &mut dyn SchedulingProvider,
    live: &[RemoteTask],
    target: &FinishTarget,
) -> Result<Option<RemoteTask>> {
    let Some(task) = resolve_finish_target(target, live) else {
        tracing::debug!(?target, "finish target is not live, skipping");
        return Ok(None);
    };
    scheduler.mark_complete(&task)?;
    Ok(Some(task))
}

/// Local ids embedded in the descriptions of `tasks`.
pub fn embedded_ids(tasks: &[RemoteTask]) -> BTreeSet<String> {
    tasks
        .iter()
        .filter_map(|t| t.local_id())
        .map(str::to_string)
        .collect()
}
