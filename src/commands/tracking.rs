//! Time tracking commands: start, stop, current and tracking.

use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{CommandResult, resolve_remote_task};
use crate::models::{RemoteTask, TimeEntry};
use crate::prompt::Prompter;
use crate::providers::{SchedulingProvider, TimeTrackingProvider};
use crate::reconcile::tracking::{Adjustment, clean_name};
use crate::reconcile::{TrackingWindow, plan};
use crate::{Error, Result};

fn clock(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%H:%M").to_string()
}

fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

// === start ===

#[derive(Debug, Serialize)]
pub struct StartResult {
    pub task: String,
    pub remote_id: u64,
    pub entry_id: u64,
    pub project: String,
    pub tags: Vec<String>,
}

impl CommandResult for StartResult {
    fn to_human(&self) -> String {
        format!("Started task {}", self.task)
    }
}

/// Start tracking a remote task and prioritize it.
///
/// The tracker project is the one named by the first word of the task
/// name.
pub fn start(
    scheduler: &mut dyn SchedulingProvider,
    tracker: &mut dyn TimeTrackingProvider,
    name: &str,
    tags: &[String],
    prompter: &mut dyn Prompter,
) -> Result<StartResult> {
    let task = resolve_remote_task(scheduler.tasks()?, name, prompter)?;

    if let Some(running) = tracker.current_entry()? {
        return Err(Error::InvalidInput(format!(
            "time tracking is already running ({})",
            running.description.as_deref().unwrap_or("no description")
        )));
    }

    let project_name = task.project_name();
    let project = tracker
        .projects()?
        .into_iter()
        .find(|p| p.active && p.name == project_name)
        .ok_or_else(|| {
            Error::NotFound(format!("no active tracker project named '{}'", project_name))
        })?;

    if !tags.is_empty() {
        let known = tracker.tags()?;
        if let Some(unknown) = tags.iter().find(|t| !known.contains(*t)) {
            return Err(Error::InvalidInput(format!("unknown tag '{}'", unknown)));
        }
    }

    let entry = tracker.start_entry(&task.name, project.id, tags)?;
    scheduler.prioritize(&task)?;
    info!(task = %task.name, entry = entry.id, "started tracking");

    Ok(StartResult {
        task: task.name,
        remote_id: task.id,
        entry_id: entry.id,
        project: project.name,
        tags: entry.tags,
    })
}

// === stop ===

#[derive(Debug, Serialize)]
pub struct StopResult {
    pub task: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    /// False when the task had no work event to log against.
    pub logged: bool,
    pub finished: bool,
}

impl CommandResult for StopResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if !self.logged {
            lines.push("Warning: task has no scheduled work, could not log it in Reclaim".to_string());
        }
        if self.finished {
            lines.push(format!("Finished {}", self.task));
        }
        let verb = if self.logged { "Logged work" } else { "Tracked" };
        lines.push(format!(
            "{} from {} to {} for {}",
            verb,
            clock(self.start),
            clock(self.stop),
            self.task
        ));
        lines.join("\n")
    }
}

/// Stop the running entry and move its task's current event onto it.
pub fn stop(
    scheduler: &mut dyn SchedulingProvider,
    tracker: &mut dyn TimeTrackingProvider,
    prompter: &mut dyn Prompter,
) -> Result<StopResult> {
    let running = tracker
        .current_entry()?
        .ok_or_else(|| Error::NotFound("no time entry is running".to_string()))?;
    let description = running
        .description
        .clone()
        .ok_or_else(|| Error::InvalidInput("the running time entry has no description".to_string()))?;
    let task = resolve_remote_task(scheduler.tasks()?, &description, prompter)?;

    let stopped = tracker.stop_entry(&running)?;
    let stop = stopped.effective_end().unwrap_or_else(Utc::now);

    let mut result = StopResult {
        task: task.name.clone(),
        start: running.start,
        stop,
        logged: false,
        finished: false,
    };

    let Some(event) = task.current_event() else {
        warn!(task = %task.name, "no work event to log against");
        return Ok(result);
    };
    scheduler.update_work_event(event, running.start, stop)?;
    result.logged = true;

    if prompter.confirm("Is task finished?", false)? {
        scheduler.mark_complete(&task)?;
        result.finished = true;
    }
    Ok(result)
}

// === current ===

#[derive(Debug, Serialize)]
pub struct CurrentResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<TimeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<i64>,
}

impl CommandResult for CurrentResult {
    fn to_human(&self) -> String {
        match (&self.entry, self.elapsed_secs) {
            (Some(entry), Some(elapsed)) => format!(
                "{} (since {}, {})",
                entry.description.as_deref().unwrap_or("(no description)"),
                clock(entry.start),
                format_elapsed(elapsed)
            ),
            _ => "Nothing running".to_string(),
        }
    }
}

pub fn current(tracker: &dyn TimeTrackingProvider, now: DateTime<Utc>) -> Result<CurrentResult> {
    let entry = tracker.current_entry()?;
    let elapsed_secs = entry.as_ref().map(|e| (now - e.start).num_seconds());
    Ok(CurrentResult {
        entry,
        elapsed_secs,
    })
}

// === tracking ===

#[derive(Debug, Serialize)]
pub struct LoggedEntry {
    pub entry_id: u64,
    pub task: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdjustedEvent {
    pub event_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TrackingResult {
    pub dry_run: bool,
    pub window: TrackingWindow,
    pub logged: Vec<LoggedEntry>,
    pub adjusted: Vec<AdjustedEvent>,
    /// Entries with neither an event nor a task of the same name.
    pub unmatched: Vec<String>,
    /// Entries too short to log as work.
    pub too_short: Vec<LoggedEntry>,
    pub in_sync: usize,
    pub skipped_running: usize,
}

impl CommandResult for TrackingResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        let (log_verb, adjust_verb) = if self.dry_run {
            ("Would log", "Would move")
        } else {
            ("Logged", "Moved")
        };
        for logged in &self.logged {
            lines.push(format!(
                "{} {} - {} for {}",
                log_verb,
                clock(logged.start),
                clock(logged.end),
                logged.task
            ));
        }
        for adjusted in &self.adjusted {
            lines.push(format!(
                "{} {} to {} - {}",
                adjust_verb,
                adjusted.title,
                clock(adjusted.start),
                clock(adjusted.end)
            ));
        }
        for name in &self.unmatched {
            lines.push(format!("No Reclaim task named {}, skipped", name));
        }
        for short in &self.too_short {
            lines.push(format!(
                "Skipped {} at {}: under a minute",
                short.task,
                clock(short.start)
            ));
        }
        if self.logged.is_empty() && self.adjusted.is_empty() {
            lines.push("Reclaim and Toggl are synced".to_string());
        }
        if self.skipped_running > 0 {
            lines.push("The running time entry was left alone".to_string());
        }
        lines.join("\n")
    }
}

/// Log untracked entries as work and move events that drifted from their
/// entries, for everything inside `window`.
pub fn tracking(
    scheduler: &mut dyn SchedulingProvider,
    tracker: &dyn TimeTrackingProvider,
    window: TrackingWindow,
    dry_run: bool,
) -> Result<TrackingResult> {
    let entries = tracker.entries(window.from, window.to)?;
    let events = scheduler.work_events(window.from, window.to)?;
    let plan = plan(&entries, &events);

    let mut result = TrackingResult {
        dry_run,
        window,
        logged: Vec::new(),
        adjusted: Vec::new(),
        unmatched: Vec::new(),
        too_short: Vec::new(),
        in_sync: plan.in_sync,
        skipped_running: plan.skipped_running,
    };
    if plan.is_empty() {
        return Ok(result);
    }

    let tasks = if plan.missing.is_empty() {
        Vec::new()
    } else {
        scheduler.tasks()?
    };
    for entry in &plan.missing {
        let (Some(description), Some(end)) = (entry.description.as_deref(), entry.effective_end())
        else {
            continue;
        };
        let name = clean_name(description);
        let Some(task) = find_task(&tasks, name) else {
            info!(entry = entry.id, name, "no remote task for time entry");
            result.unmatched.push(name.to_string());
            continue;
        };
        let logged = LoggedEntry {
            entry_id: entry.id,
            task: task.name.clone(),
            start: entry.start,
            end,
        };
        // Reclaim logs work in whole minutes.
        if end - entry.start < Duration::minutes(1) {
            info!(entry = entry.id, name, "time entry under a minute, not logged");
            result.too_short.push(logged);
            continue;
        }
        if !dry_run {
            scheduler.log_work(task, entry.start, end)?;
        }
        result.logged.push(logged);
    }

    for Adjustment { entry, event } in &plan.adjustments {
        let Some(end) = entry.effective_end() else {
            continue;
        };
        if !dry_run {
            scheduler.update_work_event(event, entry.start, end)?;
        }
        result.adjusted.push(AdjustedEvent {
            event_id: event.id.clone(),
            title: event.title.clone(),
            start: entry.start,
            end,
        });
    }
    Ok(result)
}

fn find_task<'a>(tasks: &'a [RemoteTask], name: &str) -> Option<&'a RemoteTask> {
    tasks.iter().find(|t| clean_name(&t.name) == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackerProject;
    use crate::test_utils::{
        FakeScheduler, FakeTracker, ScriptedPrompter, date, remote_task, time_entry, utc, work_event,
    };

    fn tracker_with_projects() -> FakeTracker {
        FakeTracker {
            projects: vec![
                TrackerProject {
                    id: 5,
                    name: "Analysis".to_string(),
                    active: true,
                },
                TrackerProject {
                    id: 6,
                    name: "Physics".to_string(),
                    active: false,
                },
            ],
            tags: vec!["focus".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_start_creates_entry_and_prioritizes() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 3", "a")]);
        let mut tracker = tracker_with_projects();
        let mut prompter = ScriptedPrompter::default();

        let result = start(
            &mut scheduler,
            &mut tracker,
            "Analysis Sheet 3",
            &["focus".to_string()],
            &mut prompter,
        )
        .unwrap();
        assert_eq!(result.entry_id, 77);
        assert_eq!(result.project, "Analysis");
        assert_eq!(
            tracker.started,
            vec![("Analysis Sheet 3".to_string(), 5, vec!["focus".to_string()])]
        );
        assert_eq!(scheduler.prioritized, vec![1]);
        assert_eq!(result.to_human(), "Started task Analysis Sheet 3");
    }

    #[test]
    fn test_start_refuses_when_running() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 3", "a")]);
        let mut tracker = tracker_with_projects();
        let t = utc(2026, 6, 1, 9, 0);
        let mut running = time_entry(1, "Physics Lab", t, t);
        running.stop = None;
        running.duration = -t.timestamp();
        tracker.current = Some(running);

        let result = start(&mut scheduler, &mut tracker, "Analysis Sheet 3", &[], &mut ScriptedPrompter::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(tracker.started.is_empty());
        assert!(scheduler.prioritized.is_empty());
    }

    #[test]
    fn test_start_requires_active_project() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(2, "Physics Lab", "b")]);
        let mut tracker = tracker_with_projects();
        let result = start(&mut scheduler, &mut tracker, "Physics Lab", &[], &mut ScriptedPrompter::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_start_rejects_unknown_tag() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 3", "a")]);
        let mut tracker = tracker_with_projects();
        let result = start(
            &mut scheduler,
            &mut tracker,
            "Analysis Sheet 3",
            &["deep".to_string()],
            &mut ScriptedPrompter::default(),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(tracker.started.is_empty());
    }

    fn running_tracker(description: &str) -> FakeTracker {
        let start = utc(2026, 6, 1, 9, 0);
        let mut entry = time_entry(77, description, start, start);
        entry.stop = None;
        entry.duration = -start.timestamp();
        FakeTracker {
            current: Some(entry),
            stop_at: Some(utc(2026, 6, 1, 10, 30)),
            ..Default::default()
        }
    }

    #[test]
    fn test_stop_updates_current_event_and_finishes() {
        let mut task = remote_task(1, "Analysis Sheet 3", "a");
        task.events = vec![
            work_event("ev-1", "Analysis Sheet 3", utc(2026, 5, 30, 9, 0), utc(2026, 5, 30, 10, 0)),
            work_event("ev-2", "Analysis Sheet 3", utc(2026, 6, 1, 8, 0), utc(2026, 6, 1, 9, 0)),
        ];
        let mut scheduler = FakeScheduler::with_tasks(vec![task]);
        let mut tracker = running_tracker("Analysis Sheet 3");
        let mut prompter = ScriptedPrompter::confirming(true);

        let result = stop(&mut scheduler, &mut tracker, &mut prompter).unwrap();
        assert!(result.logged);
        assert!(result.finished);
        assert_eq!(tracker.stopped, vec![77]);
        assert_eq!(
            scheduler.updated_events,
            vec![("ev-2".to_string(), utc(2026, 6, 1, 9, 0), utc(2026, 6, 1, 10, 30))]
        );
        assert_eq!(scheduler.completed, vec![1]);
        assert_eq!(prompter.confirm_calls, 1);
    }

    #[test]
    fn test_stop_defaults_to_not_finished() {
        let mut task = remote_task(1, "Analysis Sheet 3", "a");
        task.events = vec![work_event("ev-1", "Analysis Sheet 3", utc(2026, 6, 1, 8, 0), utc(2026, 6, 1, 9, 0))];
        let mut scheduler = FakeScheduler::with_tasks(vec![task]);
        let mut tracker = running_tracker("Analysis Sheet 3");

        let result = stop(&mut scheduler, &mut tracker, &mut ScriptedPrompter::default()).unwrap();
        assert!(!result.finished);
        assert!(scheduler.completed.is_empty());
    }

    #[test]
    fn test_stop_unscheduled_task_warns() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 3", "a")]);
        let mut tracker = running_tracker("Analysis Sheet 3");
        let mut prompter = ScriptedPrompter::default();

        let result = stop(&mut scheduler, &mut tracker, &mut prompter).unwrap();
        assert!(!result.logged);
        assert_eq!(tracker.stopped, vec![77]);
        assert!(scheduler.updated_events.is_empty());
        assert_eq!(prompter.confirm_calls, 0);
        let human = result.to_human();
        assert!(human.starts_with("Warning"));
        assert!(!human.contains("Logged work"));
        assert!(human.contains("Tracked from"));
    }

    #[test]
    fn test_stop_without_running_entry() {
        let mut scheduler = FakeScheduler::default();
        let mut tracker = FakeTracker::default();
        let result = stop(&mut scheduler, &mut tracker, &mut ScriptedPrompter::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_stop_keeps_running_when_task_unknown() {
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(1, "Analysis Sheet 3", "a")]);
        let mut tracker = running_tracker("Groceries");
        let result = stop(&mut scheduler, &mut tracker, &mut ScriptedPrompter::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(tracker.stopped.is_empty());
    }

    #[test]
    fn test_current() {
        let tracker = running_tracker("Analysis Sheet 3");
        let result = current(&tracker, utc(2026, 6, 1, 10, 15)).unwrap();
        assert_eq!(result.elapsed_secs, Some(75 * 60));
        assert!(result.to_human().contains("1:15:00"));

        let idle = current(&FakeTracker::default(), utc(2026, 6, 1, 10, 15)).unwrap();
        assert_eq!(idle.to_human(), "Nothing running");
    }

    #[test]
    fn test_tracking_logs_and_adjusts() {
        let window = TrackingWindow::ending_on(date(2026, 6, 10), 7).unwrap();
        let mut scheduler = FakeScheduler::with_tasks(vec![
            remote_task(1, "Analysis Sheet 3", "a"),
            remote_task(2, "Physics Lab", "b"),
        ]);
        scheduler.events = vec![
            work_event("ev-1", "Analysis Sheet 3", utc(2026, 6, 8, 9, 0), utc(2026, 6, 8, 10, 0)),
            work_event("ev-2", "Physics Lab", utc(2026, 6, 9, 14, 0), utc(2026, 6, 9, 15, 0)),
        ];
        let tracker = FakeTracker {
            entries: vec![
                time_entry(10, "Analysis Sheet 3", utc(2026, 6, 8, 9, 0), utc(2026, 6, 8, 10, 0)),
                time_entry(11, "Physics Lab", utc(2026, 6, 9, 14, 30), utc(2026, 6, 9, 16, 0)),
                time_entry(12, "Physics Lab", utc(2026, 6, 7, 8, 0), utc(2026, 6, 7, 9, 0)),
                time_entry(13, "Groceries", utc(2026, 6, 7, 18, 0), utc(2026, 6, 7, 18, 30)),
            ],
            ..Default::default()
        };

        let result = tracking(&mut scheduler, &tracker, window, false).unwrap();
        assert_eq!(result.in_sync, 1);
        assert_eq!(
            scheduler.updated_events,
            vec![("ev-2".to_string(), utc(2026, 6, 9, 14, 30), utc(2026, 6, 9, 16, 0))]
        );
        assert_eq!(scheduler.logged, vec![(2, utc(2026, 6, 7, 8, 0), utc(2026, 6, 7, 9, 0))]);
        assert_eq!(result.unmatched, vec!["Groceries"]);
    }

    #[test]
    fn test_tracking_skips_entries_under_a_minute() {
        let window = TrackingWindow::ending_on(date(2026, 6, 10), 7).unwrap();
        let mut scheduler = FakeScheduler::with_tasks(vec![
            remote_task(1, "Analysis Sheet 3", "a"),
            remote_task(2, "Physics Lab", "b"),
        ]);
        scheduler.events = vec![work_event(
            "ev-1",
            "Analysis Sheet 3",
            utc(2026, 6, 8, 9, 0),
            utc(2026, 6, 8, 10, 0),
        )];
        let short_start = utc(2026, 6, 7, 8, 0);
        let tracker = FakeTracker {
            entries: vec![
                time_entry(12, "Physics Lab", short_start, short_start + Duration::seconds(40)),
                time_entry(13, "Physics Lab", utc(2026, 6, 7, 9, 0), utc(2026, 6, 7, 10, 0)),
                time_entry(14, "Analysis Sheet 3", utc(2026, 6, 8, 9, 15), utc(2026, 6, 8, 10, 0)),
            ],
            ..Default::default()
        };

        let result = tracking(&mut scheduler, &tracker, window, false).unwrap();
        assert_eq!(scheduler.logged, vec![(2, utc(2026, 6, 7, 9, 0), utc(2026, 6, 7, 10, 0))]);
        assert_eq!(result.too_short.len(), 1);
        assert_eq!(result.too_short[0].entry_id, 12);
        assert_eq!(
            scheduler.updated_events,
            vec![("ev-1".to_string(), utc(2026, 6, 8, 9, 15), utc(2026, 6, 8, 10, 0))]
        );
        assert!(result.to_human().contains("Skipped Physics Lab"));
    }

    #[test]
    fn test_tracking_dry_run_changes_nothing() {
        let window = TrackingWindow::ending_on(date(2026, 6, 10), 7).unwrap();
        let mut scheduler = FakeScheduler::with_tasks(vec![remote_task(2, "Physics Lab", "b")]);
        let tracker = FakeTracker {
            entries: vec![time_entry(12, "Physics Lab", utc(2026, 6, 7, 8, 0), utc(2026, 6, 7, 9, 0))],
            ..Default::default()
        };

        let result = tracking(&mut scheduler, &tracker, window, true).unwrap();
        assert_eq!(result.logged.len(), 1);
        assert!(scheduler.logged.is_empty());
        assert!(result.to_human().starts_with("Would log"));
    }

    #[test]
    fn test_tracking_in_sync() {
        let window = TrackingWindow::ending_on(date(2026, 6, 10), 7).unwrap();
        let mut scheduler = FakeScheduler::default();
        let tracker = FakeTracker::default();
        let result = tracking(&mut scheduler, &tracker, window, false).unwrap();
        assert_eq!(result.to_human(), "Reclaim and Toggl are synced");
    }
}
