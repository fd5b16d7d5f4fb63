//! Ledger lifecycle commands.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{CommandResult, SyncOptions, plural, resolve_remote_task};
use crate::models::{LocalTask, RemoteTaskDraft};
use crate::prompt::Prompter;
use crate::providers::{SchedulingProvider, TodoProvider, area_todos};
use crate::reconcile::lifecycle::{
    FinishTarget, SyncState, embedded_ids, finish_remote, next_state, resolve_finish_target,
};
use crate::reconcile::map_local_task;
use crate::storage::UploadLedger;
use crate::{Error, Result};

/// A ledger id together with a readable name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweptTask {
    pub local_id: String,
    pub name: String,
}

impl SweptTask {
    fn from_local(task: &LocalTask) -> Self {
        Self {
            local_id: task.id.clone(),
            name: task.full_name(),
        }
    }
}

// === init ===

#[derive(Debug, Serialize)]
pub struct InitResult {
    pub added: usize,
    pub already_present: usize,
}

impl CommandResult for InitResult {
    fn to_human(&self) -> String {
        if self.added == 0 {
            "Upload ledger is already initialized".to_string()
        } else {
            format!("Added {} to the upload ledger", plural(self.added, "task"))
        }
    }
}

/// Record every id embedded in live remote tasks.
pub fn init(scheduler: &dyn SchedulingProvider, ledger: &UploadLedger) -> Result<InitResult> {
    let mut result = InitResult {
        added: 0,
        already_present: 0,
    };
    for id in embedded_ids(&scheduler.tasks()?) {
        match ledger.insert(&id) {
            Ok(()) => result.added += 1,
            Err(Error::DuplicateLedgerEntry(id)) => {
                debug!(task = %id, "already in upload ledger");
                result.already_present += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}

// === upload ===

#[derive(Debug, Serialize)]
pub struct UploadedTask {
    pub local_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UploadFailure {
    pub local_id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub dry_run: bool,
    pub uploaded: Vec<UploadedTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drafts: Vec<RemoteTaskDraft>,
    pub skipped: usize,
    pub failures: Vec<UploadFailure>,
}

impl CommandResult for UploadResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        let verb = if self.dry_run { "Would create" } else { "Created" };
        for task in &self.uploaded {
            lines.push(format!("{} task {} in Reclaim", verb, task.name));
        }
        for failure in &self.failures {
            lines.push(format!("Failed to upload {}: {}", failure.name, failure.error));
        }
        if self.uploaded.is_empty() {
            lines.push("No new tasks were found".to_string());
        } else if !self.dry_run {
            lines.push(format!("Uploaded {}", plural(self.uploaded.len(), "task")));
        }
        lines.join("\n")
    }

    fn is_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Mirror every open to-do of `area` that has no remote task yet.
///
/// A to-do whose tags cannot be mapped is reported and skipped; the rest
/// of the batch still uploads.
pub fn upload(
    todo: &dyn TodoProvider,
    scheduler: &mut dyn SchedulingProvider,
    ledger: &UploadLedger,
    area: &str,
    dry_run: bool,
) -> Result<UploadResult> {
    let remote_names: BTreeSet<String> = scheduler.tasks()?.into_iter().map(|t| t.name).collect();
    let mut result = UploadResult {
        dry_run,
        uploaded: Vec::new(),
        drafts: Vec::new(),
        skipped: 0,
        failures: Vec::new(),
    };

    for task in area_todos(todo, area)? {
        let name = task.full_name();
        if remote_names.contains(&name) || ledger.contains(&task.id)? {
            debug!(task = %name, "already exists in Reclaim");
            result.skipped += 1;
            continue;
        }

        let draft = match map_local_task(&task) {
            Ok(draft) => draft,
            Err(e @ (Error::MissingField(_) | Error::InvalidFormat(_))) => {
                warn!(task = %name, error = %e, "cannot map to-do");
                result.failures.push(UploadFailure {
                    local_id: task.id.clone(),
                    name,
                    error: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if dry_run {
            result.uploaded.push(UploadedTask {
                local_id: task.id.clone(),
                name,
                remote_id: None,
            });
            result.drafts.push(draft);
            continue;
        }

        let created = scheduler.create_task(&draft)?;
        info!(task = %name, remote_id = created.id, "created remote task");
        match ledger.insert(&task.id) {
            Ok(()) => {}
            Err(Error::DuplicateLedgerEntry(id)) => debug!(task = %id, "already in upload ledger"),
            Err(e) => return Err(e),
        }
        result.uploaded.push(UploadedTask {
            local_id: task.id.clone(),
            name,
            remote_id: Some(created.id),
        });
    }

    Ok(result)
}

// === finished ===

#[derive(Debug, Default, Serialize)]
pub struct FinishedResult {
    pub dry_run: bool,
    /// Completed locally and removed from the ledger.
    pub completed: Vec<SweptTask>,
    /// Completion requested but not yet visible; kept in the ledger.
    pub unconfirmed: Vec<SweptTask>,
}

impl CommandResult for FinishedResult {
    fn to_human(&self) -> String {
        if self.completed.is_empty() && self.unconfirmed.is_empty() {
            return "Reclaim and Things are synced".to_string();
        }
        let mut lines = Vec::new();
        for task in &self.completed {
            if self.dry_run {
                lines.push(format!("Would complete task: {}", task.name));
            } else {
                lines.push(format!("Found completed task: {}", task.name));
            }
        }
        for task in &self.unconfirmed {
            lines.push(format!(
                "Completion of {} not confirmed yet; will retry on next sync",
                task.name
            ));
        }
        lines.join("\n")
    }
}

/// Complete to-dos whose remote task is gone, then drop their ledger rows.
///
/// Rows are only deleted once the to-do manager reports the completion.
pub fn finished(
    todo: &mut dyn TodoProvider,
    scheduler: &dyn SchedulingProvider,
    ledger: &UploadLedger,
    options: SyncOptions,
) -> Result<FinishedResult> {
    let live = embedded_ids(&scheduler.tasks()?);
    let mut result = FinishedResult {
        dry_run: options.dry_run,
        ..Default::default()
    };
    let mut pending = Vec::new();

    for id in ledger.all()? {
        let local = todo.get(&id)?;
        if next_state(true, live.contains(&id), local.as_ref()) != SyncState::Completed {
            continue;
        }
        let Some(local) = local else { continue };
        let swept = SweptTask::from_local(&local);

        if options.dry_run {
            result.completed.push(swept);
        } else if local.status.is_open() {
            info!(task = %swept.name, "completing to-do finished in Reclaim");
            todo.complete(&id)?;
            pending.push(swept);
        } else {
            ledger.remove(&id)?;
            result.completed.push(swept);
        }
    }

    if pending.is_empty() {
        return Ok(result);
    }

    std::thread::sleep(options.completion_delay);
    for swept in pending {
        let confirmed = todo
            .get(&swept.local_id)?
            .is_some_and(|t| !t.status.is_open());
        if confirmed {
            ledger.remove(&swept.local_id)?;
            result.completed.push(swept);
        } else {
            warn!(task = %swept.name, "completion not visible yet");
            result.unconfirmed.push(swept);
        }
    }
    Ok(result)
}

// === remove-deleted ===

#[derive(Debug, Default, Serialize)]
pub struct RemoveDeletedResult {
    pub dry_run: bool,
    /// Ledger ids whose to-do is gone.
    pub removed: Vec<String>,
    /// Remote tasks that were still live and got finished.
    pub finished_remote: Vec<String>,
}

impl CommandResult for RemoveDeletedResult {
    fn to_human(&self) -> String {
        if self.removed.is_empty() {
            return "No deleted to-dos found".to_string();
        }
        let mut lines = Vec::new();
        let verb = if self.dry_run { "Would finish" } else { "Finished" };
        for name in &self.finished_remote {
            lines.push(format!("{} deleted task {} in Reclaim", verb, name));
        }
        let verb = if self.dry_run { "Would remove" } else { "Removed" };
        lines.push(format!(
            "{} {} from the upload ledger",
            verb,
            plural(self.removed.len(), "task")
        ));
        lines.join("\n")
    }
}

/// Finish remote tasks whose to-do was deleted and drop their rows.
pub fn remove_deleted(
    todo: &dyn TodoProvider,
    scheduler: &mut dyn SchedulingProvider,
    ledger: &UploadLedger,
    dry_run: bool,
) -> Result<RemoveDeletedResult> {
    let live_tasks = scheduler.tasks()?;
    let live = embedded_ids(&live_tasks);
    let mut result = RemoveDeletedResult {
        dry_run,
        ..Default::default()
    };

    for id in ledger.all()? {
        let local = todo.get(&id)?;
        if next_state(true, live.contains(&id), local.as_ref()) != SyncState::Removed {
            continue;
        }
        let target = FinishTarget::ById(id.clone());

        if dry_run {
            if let Some(task) = resolve_finish_target(&target, &live_tasks) {
                result.finished_remote.push(task.name);
            }
        } else {
            if let Some(task) = finish_remote(scheduler, &live_tasks, &target)? {
                info!(task = %task.name, "finished remote task of deleted to-do");
                result.finished_remote.push(task.name);
            }
            ledger.remove(&id)?;
        }
        result.removed.push(id);
    }
    Ok(result)
}

// === remove ===

#[derive(Debug, Serialize)]
pub struct RemoveResult {
    pub name: String,
    pub remote_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    pub local_completed: bool,
}

impl CommandResult for RemoveResult {
    fn to_human(&self) -> String {
        if self.local_completed {
            format!("Finished {} in Reclaim and Things", self.name)
        } else {
            format!("Finished {} in Reclaim", self.name)
        }
    }
}

/// Finish a task by name on both sides.
pub fn remove(
    todo: &mut dyn TodoProvider,
    scheduler: &mut dyn SchedulingProvider,
    ledger: &UploadLedger,
    name: &str,
    prompter: &mut dyn Prompter,
) -> Result<RemoveResult> {
    let live = scheduler.tasks()?;
    let task = resolve_remote_task(live.clone(), name, prompter)?;
    finish_remote(scheduler, &live, &FinishTarget::ByRecord(task.clone()))?;

    let local_id = task.local_id().map(str::to_string);
    let mut local_completed = false;
    if let Some(ref id) = local_id {
        if todo.get(id)?.is_some_and(|t| t.status.is_open()) {
            todo.complete(id)?;
            local_completed = true;
        }
        ledger.remove(id)?;
    }

    Ok(RemoveResult {
        name: task.name,
        remote_id: task.id,
        local_id,
        local_completed,
    })
}

// === sync ===

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub finished: FinishedResult,
    pub remove_deleted: RemoveDeletedResult,
    pub upload: UploadResult,
}

impl CommandResult for SyncResult {
    fn to_human(&self) -> String {
        let rule = "-".repeat(45);
        [
            "Pulling from Reclaim".to_string(),
            self.finished.to_human(),
            self.remove_deleted.to_human(),
            rule.clone(),
            "Pushing to Reclaim".to_string(),
            self.upload.to_human(),
            rule,
        ]
        .join("\n")
    }

    fn is_failure(&self) -> bool {
        self.upload.is_failure()
    }
}

/// `finished`, then `remove-deleted`, then `upload`.
pub fn sync(
    todo: &mut dyn TodoProvider,
    scheduler: &mut dyn SchedulingProvider,
    ledger: &UploadLedger,
    area: &str,
    options: SyncOptions,
) -> Result<SyncResult> {
    let finished = finished(todo, scheduler, ledger, options)?;
    let remove_deleted = remove_deleted(todo, scheduler, ledger, options.dry_run)?;
    let upload = upload(todo, scheduler, ledger, area, options.dry_run)?;
    Ok(SyncResult {
        finished,
        remove_deleted,
        upload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocalStatus, RemoteStatus};
    use crate::test_utils::{FakeScheduler, FakeTodo, ScriptedPrompter, local_task, remote_task};
    use std::time::Duration;

    fn options() -> SyncOptions {
        SyncOptions::new(false, Duration::ZERO)
    }

    fn todo_with_two_tasks() -> FakeTodo {
        FakeTodo::new("Uni")
            .with_task(local_task("a", "Analysis", "Sheet 1", &["EstimatedTime: 2h"]))
            .with_task(local_task("b", "Physics", "Lab", &["EstimatedTime: 1h 30m"]))
    }

    #[test]
    fn test_init_counts_new_and_existing() {
        let scheduler = FakeScheduler::with_tasks(vec![
            remote_task(1, "Analysis Sheet 1", "a"),
            remote_task(2, "Physics Lab", "b"),
        ]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = init(&scheduler, &ledger).unwrap();
        assert_eq!(result.added, 1);
        assert_eq!(result.already_present, 1);
        assert_eq!(ledger.len().unwrap(), 2);

        let again = init(&scheduler, &ledger).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.to_human(), "Upload ledger is already initialized");
    }

    #[test]
    fn test_upload_is_idempotent() {
        let todo = todo_with_two_tasks();
        let mut scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();

        let first = upload(&todo, &mut scheduler, &ledger, "Uni", false).unwrap();
        assert_eq!(first.uploaded.len(), 2);
        assert_eq!(scheduler.created[0].name, "Analysis Sheet 1");
        assert_eq!(scheduler.created[1].duration, 1.5);
        assert!(ledger.contains("a").unwrap());

        let second = upload(&todo, &mut scheduler, &ledger, "Uni", false).unwrap();
        assert!(second.uploaded.is_empty());
        assert_eq!(second.skipped, 2);
        assert_eq!(second.to_human(), "No new tasks were found");
    }

    #[test]
    fn test_upload_skips_ids_in_ledger() {
        let todo = todo_with_two_tasks();
        let mut scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = upload(&todo, &mut scheduler, &ledger, "Uni", false).unwrap();
        assert_eq!(result.uploaded.len(), 1);
        assert_eq!(result.uploaded[0].local_id, "b");
    }

    #[test]
    fn test_upload_dry_run_creates_nothing() {
        let todo = todo_with_two_tasks();
        let mut scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();

        let result = upload(&todo, &mut scheduler, &ledger, "Uni", true).unwrap();
        assert_eq!(result.drafts.len(), 2);
        assert!(scheduler.created.is_empty());
        assert!(ledger.is_empty().unwrap());
        assert!(result.to_human().contains("Would create task Analysis Sheet 1"));
    }

    #[test]
    fn test_upload_reports_unmappable_tasks_and_continues() {
        let todo = FakeTodo::new("Uni")
            .with_task(local_task("a", "Analysis", "Sheet 1", &[]))
            .with_task(local_task("b", "Physics", "Lab", &["EstimatedTime: 1h"]));
        let mut scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();

        let result = upload(&todo, &mut scheduler, &ledger, "Uni", false).unwrap();
        assert_eq!(result.uploaded.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].local_id, "a");
        assert!(result.is_failure());
        assert!(!ledger.contains("a").unwrap());
    }

    #[test]
    fn test_finished_completes_local_and_drops_row() {
        let mut todo = todo_with_two_tasks();
        let scheduler = FakeScheduler::with_tasks(vec![remote_task(2, "Physics Lab", "b")]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();
        ledger.insert("b").unwrap();

        let result = finished(&mut todo, &scheduler, &ledger, options()).unwrap();
        assert_eq!(result.completed.len(), 1);
        assert_eq!(result.completed[0].name, "Analysis Sheet 1");
        assert_eq!(todo.complete_calls, vec!["a"]);
        assert_eq!(ledger.all().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_finished_keeps_row_until_confirmed() {
        let mut todo = todo_with_two_tasks();
        todo.lagging = true;
        let scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = finished(&mut todo, &scheduler, &ledger, options()).unwrap();
        assert!(result.completed.is_empty());
        assert_eq!(result.unconfirmed.len(), 1);
        assert!(ledger.contains("a").unwrap());
    }

    #[test]
    fn test_finished_already_completed_locally() {
        let mut done = local_task("a", "Analysis", "Sheet 1", &[]);
        done.status = LocalStatus::Completed;
        let mut todo = FakeTodo::new("Uni").with_task(done);
        let scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = finished(&mut todo, &scheduler, &ledger, options()).unwrap();
        assert_eq!(result.completed.len(), 1);
        assert!(todo.complete_calls.is_empty());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_finished_nothing_to_do() {
        let mut todo = todo_with_two_tasks();
        let scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 1", "a")]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = finished(&mut todo, &scheduler, &ledger, options()).unwrap();
        assert_eq!(result.to_human(), "Reclaim and Things are synced");
    }

    #[test]
    fn test_remove_deleted_finishes_remote() {
        let mut todo = todo_with_two_tasks();
        todo.delete("a");
        let mut scheduler = FakeScheduler::with_tasks(vec![
            remote_task(1, "Analysis Sheet 1", "a"),
            remote_task(2, "Physics Lab", "b"),
        ]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();
        ledger.insert("b").unwrap();

        let result = remove_deleted(&todo, &mut scheduler, &ledger, false).unwrap();
        assert_eq!(result.removed, vec!["a"]);
        assert_eq!(result.finished_remote, vec!["Analysis Sheet 1"]);
        assert_eq!(scheduler.completed, vec![1]);
        assert_eq!(ledger.all().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_remove_deleted_when_remote_already_gone() {
        let todo = FakeTodo::new("Uni");
        let mut scheduler = FakeScheduler::default();
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = remove_deleted(&todo, &mut scheduler, &ledger, false).unwrap();
        assert_eq!(result.removed, vec!["a"]);
        assert!(result.finished_remote.is_empty());
        assert!(scheduler.completed.is_empty());
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_remove_deleted_dry_run_keeps_rows() {
        let todo = FakeTodo::new("Uni");
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 1", "a")]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();

        let result = remove_deleted(&todo, &mut scheduler, &ledger, true).unwrap();
        assert_eq!(result.finished_remote, vec!["Analysis Sheet 1"]);
        assert!(scheduler.completed.is_empty());
        assert!(ledger.contains("a").unwrap());
    }

    #[test]
    fn test_remove_by_fuzzy_name() {
        let mut todo = todo_with_two_tasks();
        let mut scheduler = FakeScheduler::with_tasks(vec![
            remote_task(1, "Analysis Sheet 1", "a"),
            remote_task(2, "Physics Lab", "b"),
        ]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();
        let mut prompter = ScriptedPrompter::default();

        let result = remove(&mut todo, &mut scheduler, &ledger, "Analysis Sheet1", &mut prompter)
            .unwrap();
        assert_eq!(result.remote_id, 1);
        assert!(result.local_completed);
        assert_eq!(scheduler.completed, vec![1]);
        assert_eq!(todo.complete_calls, vec!["a"]);
        assert!(ledger.is_empty().unwrap());
    }

    #[test]
    fn test_sync_runs_all_sweeps() {
        let mut todo = todo_with_two_tasks()
            .with_task(local_task("c", "Analysis", "Sheet 2", &["EstimatedTime: 1h"]));
        todo.delete("b");
        let mut finished_remote = remote_task(1, "Analysis Sheet 1", "a");
        finished_remote.status = RemoteStatus::Complete;
        let mut scheduler = FakeScheduler::with_tasks(vec![
            finished_remote,
            remote_task(2, "Physics Lab", "b"),
        ]);
        let ledger = UploadLedger::open_in_memory().unwrap();
        ledger.insert("a").unwrap();
        ledger.insert("b").unwrap();

        let result = sync(&mut todo, &mut scheduler, &ledger, "Uni", options()).unwrap();
        assert_eq!(result.finished.completed.len(), 1);
        assert_eq!(result.remove_deleted.removed, vec!["b"]);
        assert_eq!(result.upload.uploaded.len(), 1);
        assert_eq!(result.upload.uploaded[0].local_id, "c");
        assert_eq!(ledger.all().unwrap(), vec!["c"]);
        assert!(!result.is_failure());
    }
}
