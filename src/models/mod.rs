//! Data models shared by the providers and the reconciliation core.
//!
//! This module defines the core data structures:
//! - `LocalTask` - A to-do read from the local to-do manager
//! - `RemoteTask` - A scheduled work item in the scheduling provider
//! - `WorkEvent` - A concrete time block scheduled for a `RemoteTask`
//! - `TimeEntry` - A tracked interval from the time-tracking provider
//! - `RemoteTaskDraft` - The field set used to create a new `RemoteTask`

pub mod tags;

pub use tags::{TaskTag, parse_tags};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the id tag embedded in a remote task's description.
pub const LOCAL_ID_PREFIX: &str = "things_task";

/// Build the description tag that carries a local task id.
pub fn local_id_tag(local_id: &str) -> String {
    format!("{}:{}", LOCAL_ID_PREFIX, local_id)
}

/// Recover a local task id from a remote description.
///
/// Returns `None` when the description does not carry the prefix.
pub fn parse_local_id_tag(description: &str) -> Option<&str> {
    let (prefix, id) = description.trim().split_once(':')?;
    if prefix.trim() != LOCAL_ID_PREFIX {
        return None;
    }
    let id = id.trim();
    if id.is_empty() { None } else { Some(id) }
}

/// Completion state of a to-do in the local manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatus {
    #[default]
    Open,
    Completed,
    Canceled,
}

impl LocalStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, LocalStatus::Open)
    }
}

/// An area in the to-do manager (e.g. "Uni").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub title: String,
}

/// A project inside an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
}

/// A to-do item owned by the local to-do manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTask {
    pub id: String,
    pub title: String,
    pub project_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    /// Raw tags, conventionally in `"Key: Value"` form.
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: LocalStatus,
}

impl LocalTask {
    /// Name used for the mirrored remote task: `"{project} {title}"`.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.project_title, self.title)
    }
}

/// Scheduling state of a remote task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    #[default]
    New,
    Scheduled,
    InProgress,
    Complete,
    Cancelled,
    Archived,
}

impl RemoteStatus {
    /// Parse the provider's upper-case status names.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "SCHEDULED" => RemoteStatus::Scheduled,
            "IN_PROGRESS" => RemoteStatus::InProgress,
            "COMPLETE" => RemoteStatus::Complete,
            "CANCELLED" => RemoteStatus::Cancelled,
            "ARCHIVED" => RemoteStatus::Archived,
            _ => RemoteStatus::New,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RemoteStatus::New | RemoteStatus::Scheduled | RemoteStatus::InProgress
        )
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteStatus::New => "new",
            RemoteStatus::Scheduled => "scheduled",
            RemoteStatus::InProgress => "in_progress",
            RemoteStatus::Complete => "complete",
            RemoteStatus::Cancelled => "cancelled",
            RemoteStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

/// A concrete scheduled time block attached to a remote task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEvent {
    pub id: String,
    /// Calendar the event lives in; needed to address updates.
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A scheduled work item owned by the scheduling provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub min_work_duration: f64,
    pub max_work_duration: f64,
    /// Estimated total work in hours.
    pub duration: f64,
    pub status: RemoteStatus,
    #[serde(default)]
    pub events: Vec<WorkEvent>,
}

impl RemoteTask {
    /// Local task id embedded in the description, if any.
    pub fn local_id(&self) -> Option<&str> {
        parse_local_id_tag(&self.description)
    }

    pub fn is_scheduled(&self) -> bool {
        !self.events.is_empty()
    }

    /// The most recent work event; the one work gets logged against.
    pub fn current_event(&self) -> Option<&WorkEvent> {
        self.events.iter().max_by_key(|e| e.start)
    }

    /// Start of the earliest scheduled work event.
    pub fn scheduled_start(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.start).min()
    }

    /// First word of the name, which names the owning project/course.
    pub fn project_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

/// A tracked time interval from the time-tracking provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: u64,
    pub workspace_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<DateTime<Utc>>,
    /// Seconds; negative while the entry is running.
    pub duration: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.stop.is_none() && self.duration < 0
    }

    /// End instant: the explicit stop, else `start + duration`.
    ///
    /// A running entry has no end.
    pub fn effective_end(&self) -> Option<DateTime<Utc>> {
        match self.stop {
            Some(stop) => Some(stop),
            None if self.duration >= 0 => Duration::try_seconds(self.duration)
                .and_then(|d| self.start.checked_add_signed(d)),
            None => None,
        }
    }
}

/// A project in the time-tracking provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerProject {
    pub id: u64,
    pub name: String,
    pub active: bool,
}

/// Fields for creating a remote task, produced by the task mapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteTaskDraft {
    pub name: String,
    pub description: String,
    pub min_work_duration: f64,
    pub max_work_duration: f64,
    pub duration: f64,
    /// Local wall-clock start; converted to an instant by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDateTime>,
    /// Tag keys that were not understood and therefore skipped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_tags: Vec<String>,
}
