//! Read-only views over remote tasks.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use super::{CommandResult, plural};
use crate::models::RemoteTask;
use crate::providers::{SchedulingProvider, TodoProvider, area_projects};
use crate::{Error, Result};

fn filter_subject(tasks: Vec<RemoteTask>, subject: Option<&str>) -> Vec<RemoteTask> {
    match subject {
        Some(prefix) => tasks
            .into_iter()
            .filter(|t| t.name.starts_with(prefix))
            .collect(),
        None => tasks,
    }
}

// === list ===

/// Where a task stands relative to its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "days", rename_all = "snake_case")]
pub enum DueStatus {
    Left(i64),
    Overdue(i64),
    NoDeadline,
}

impl DueStatus {
    pub fn at(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match due {
            None => DueStatus::NoDeadline,
            Some(due) if now > due => DueStatus::Overdue((now - due).num_days()),
            Some(due) => DueStatus::Left((due - now).num_days()),
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, DueStatus::Overdue(_))
    }
}

impl std::fmt::Display for DueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DueStatus::Left(days) => write!(f, "{} days left", days),
            DueStatus::Overdue(days) => write!(f, "{} days overdue", days),
            DueStatus::NoDeadline => write!(f, "no deadline"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListRow {
    pub index: usize,
    pub id: u64,
    pub name: String,
    pub due: DueStatus,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub tasks: Vec<ListRow>,
}

impl CommandResult for ListResult {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found".to_string();
        }
        let width = self.tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
        self.tasks
            .iter()
            .map(|t| format!("({}) {:<width$}  {}", t.index, t.name, t.due, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remote tasks, optionally narrowed to names starting with `subject`.
pub fn list(
    scheduler: &dyn SchedulingProvider,
    subject: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ListResult> {
    let tasks = filter_subject(scheduler.tasks()?, subject);
    Ok(ListResult {
        tasks: tasks
            .into_iter()
            .enumerate()
            .map(|(i, t)| ListRow {
                index: i + 1,
                id: t.id,
                due: DueStatus::at(t.due_date, now),
                name: t.name,
            })
            .collect(),
    })
}

// === stats ===

#[derive(Debug, Serialize)]
pub struct ProjectStats {
    pub project: String,
    pub fine: usize,
    pub overdue: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResult {
    pub projects: Vec<ProjectStats>,
}

impl CommandResult for StatsResult {
    fn to_human(&self) -> String {
        if self.projects.is_empty() {
            return "No projects found".to_string();
        }
        let width = self
            .projects
            .iter()
            .map(|p| p.project.len())
            .max()
            .unwrap_or(0)
            .max("Project".len());
        let mut lines = vec![format!("{:<width$}  {:>5}  {:>7}", "Project", "Fine", "Overdue", width = width)];
        for p in &self.projects {
            lines.push(format!(
                "{:<width$}  {:>5}  {:>7}",
                p.project,
                p.fine,
                p.overdue,
                width = width
            ));
        }
        lines.join("\n")
    }
}

/// Count fine and overdue tasks for every project of `area`.
pub fn stats(
    todo: &dyn TodoProvider,
    scheduler: &dyn SchedulingProvider,
    area: &str,
    now: DateTime<Utc>,
) -> Result<StatsResult> {
    let tasks = scheduler.tasks()?;
    let projects = area_projects(todo, area)?
        .into_iter()
        .map(|project| {
            let (overdue, fine): (Vec<&RemoteTask>, Vec<&RemoteTask>) = tasks
                .iter()
                .filter(|t| t.name.starts_with(&project.title))
                .partition(|t| DueStatus::at(t.due_date, now).is_overdue());
            ProjectStats {
                project: project.title,
                fine: fine.len(),
                overdue: overdue.len(),
            }
        })
        .collect();
    Ok(StatsResult { projects })
}

// === time ===

#[derive(Debug, Serialize)]
pub struct TimeResult {
    pub task_count: usize,
    pub total_hours: f64,
    pub average_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scheduled: Option<DateTime<Utc>>,
    /// Seconds from now until the last scheduled start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn format_remaining(secs: i64) -> String {
    let sign = if secs < 0 { "-" } else { "" };
    let secs = secs.abs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{}{} days {:02}:{:02}", sign, days, hours, minutes)
}

impl CommandResult for TimeResult {
    fn to_human(&self) -> String {
        if self.task_count == 0 {
            return "No tasks found".to_string();
        }
        let mut lines = vec![
            format!(
                "Time needed to complete {}: {} hrs",
                plural(self.task_count, "task"),
                self.total_hours
            ),
            format!(
                "Average time needed to complete a task: {:.2} hrs",
                self.average_hours
            ),
        ];
        if let (Some(last), Some(remaining)) = (self.last_scheduled, self.remaining_secs) {
            lines.push(format!(
                "Last task is scheduled for {} ({} till completion)",
                last.with_timezone(&Local).format("%d.%m.%Y"),
                format_remaining(remaining)
            ));
        }
        if let Some(ref warning) = self.warning {
            lines.push(warning.clone());
        }
        lines.join("\n")
    }
}

/// Sum estimated work and find when the last task is scheduled.
pub fn time(
    scheduler: &dyn SchedulingProvider,
    subject: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TimeResult> {
    let tasks = filter_subject(scheduler.tasks()?, subject);
    let task_count = tasks.len();
    let total_hours: f64 = tasks.iter().map(|t| t.duration).sum();
    let average_hours = if task_count == 0 {
        0.0
    } else {
        total_hours / task_count as f64
    };

    let mut result = TimeResult {
        task_count,
        total_hours,
        average_hours,
        last_scheduled: None,
        remaining_secs: None,
        warning: None,
    };
    if task_count == 0 {
        return Ok(result);
    }

    match last_scheduled_start(&tasks) {
        Ok(last) => {
            result.last_scheduled = Some(last);
            result.remaining_secs = Some((last - now).num_seconds());
        }
        Err(e @ Error::IncompleteDateInfo(_)) => {
            tracing::warn!(error = %e, "cannot compute last scheduled date");
            result.warning = Some("Too many to-dos on the list, not all are scheduled".to_string());
        }
        Err(e) => return Err(e),
    }
    Ok(result)
}

/// Latest scheduled start across `tasks`; every task must be scheduled.
fn last_scheduled_start(tasks: &[RemoteTask]) -> Result<DateTime<Utc>> {
    let mut last = None;
    for task in tasks {
        let start = task.scheduled_start().ok_or_else(|| {
            Error::IncompleteDateInfo(format!("{} has no scheduled work", task.name))
        })?;
        last = last.max(Some(start));
    }
    last.ok_or_else(|| Error::IncompleteDateInfo("no tasks".to_string()))
}
