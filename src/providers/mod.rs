//! External collaborators: the to-do manager, the scheduling service and
//! the time tracker.
//!
//! Each collaborator is a trait so commands can run against in-memory
//! fakes. Concrete clients:
//! - `things` - Things 3 database (read) + `things:///` URL scheme (complete)
//! - `reclaim` - Reclaim.ai REST API
//! - `toggl` - Toggl Track v9 REST API

pub mod reclaim;
pub mod things;
pub mod toggl;

pub use reclaim::ReclaimClient;
pub use things::ThingsDatabase;
pub use toggl::TogglClient;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{
    Area, LocalTask, Project, RemoteTask, RemoteTaskDraft, TimeEntry, TrackerProject, WorkEvent,
};
use crate::{Error, Result};

/// Errors raised while talking to a remote service.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Token is invalid or expired (401 Unauthorized)
    #[error("{0}: invalid or expired token (401 Unauthorized)")]
    Unauthorized(&'static str),

    /// Token lacks required permissions (403 Forbidden)
    #[error("{0}: token lacks required permissions (403 Forbidden)")]
    Forbidden(&'static str),

    /// Non-success status or transport failure
    #[error("{service}: HTTP request failed: {message}")]
    Http {
        service: &'static str,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("{service}: failed to parse response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },

    /// The service (or local app) could not be reached at all
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
}

/// Map a `ureq` failure to a provider error for `service`.
pub(crate) fn map_ureq_error(service: &'static str, err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(401, _) => ProviderError::Unauthorized(service),
        ureq::Error::Status(403, _) => ProviderError::Forbidden(service),
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            ProviderError::Http {
                service,
                message: format!("HTTP {}: {}", code, body),
            }
        }
        ureq::Error::Transport(t) => ProviderError::Unavailable {
            service,
            message: t.to_string(),
        },
    }
}

/// Decode a JSON response body.
pub(crate) fn read_json<T: DeserializeOwned>(
    service: &'static str,
    resp: ureq::Response,
) -> std::result::Result<T, ProviderError> {
    resp.into_json().map_err(|e| ProviderError::Parse {
        service,
        message: e.to_string(),
    })
}

/// The local to-do manager.
pub trait TodoProvider {
    fn areas(&self) -> Result<Vec<Area>>;

    fn projects(&self, area: &Area) -> Result<Vec<Project>>;

    /// Open to-dos of a project.
    fn todos(&self, project: &Project) -> Result<Vec<LocalTask>>;

    /// Look up a to-do by id, whatever its status.
    ///
    /// Deleted (trashed) to-dos are reported as `None`.
    fn get(&self, id: &str) -> Result<Option<LocalTask>>;

    /// Mark a to-do complete. The effect may become visible with a delay.
    fn complete(&mut self, id: &str) -> Result<()>;
}

/// Projects of the area titled `area_title`.
pub fn area_projects(todo: &dyn TodoProvider, area_title: &str) -> Result<Vec<Project>> {
    let area = todo
        .areas()?
        .into_iter()
        .find(|a| a.title == area_title)
        .ok_or_else(|| Error::NotFound(format!("area '{}'", area_title)))?;
    todo.projects(&area)
}

/// Open to-dos of every project in the area titled `area_title`.
pub fn area_todos(todo: &dyn TodoProvider, area_title: &str) -> Result<Vec<LocalTask>> {
    let mut tasks = Vec::new();
    for project in area_projects(todo, area_title)? {
        tasks.extend(todo.todos(&project)?);
    }
    Ok(tasks)
}

/// The scheduling service that owns remote tasks and their work events.
pub trait SchedulingProvider {
    /// Active (not completed, cancelled or archived) tasks.
    fn tasks(&self) -> Result<Vec<RemoteTask>>;

    fn create_task(&mut self, draft: &RemoteTaskDraft) -> Result<RemoteTask>;

    /// Move a task to the top of the schedule (used when work starts).
    fn prioritize(&mut self, task: &RemoteTask) -> Result<()>;

    fn mark_complete(&mut self, task: &RemoteTask) -> Result<()>;

    /// Task work events starting inside `[from, to)`.
    fn work_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WorkEvent>>;

    /// Record finished work as a new event on `task`.
    fn log_work(&mut self, task: &RemoteTask, start: DateTime<Utc>, end: DateTime<Utc>)
    -> Result<()>;

    /// Move an existing work event.
    fn update_work_event(
        &mut self,
        event: &WorkEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;

    /// Active task with exactly this name.
    fn find_by_name(&self, name: &str) -> Result<Option<RemoteTask>> {
        Ok(self.tasks()?.into_iter().find(|t| t.name == name))
    }
}

/// The time-tracking service.
pub trait TimeTrackingProvider {
    /// Entries starting inside `[from, to)`.
    fn entries(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<TimeEntry>>;

    /// The running entry, if any.
    fn current_entry(&self) -> Result<Option<TimeEntry>>;

    /// Active projects.
    fn projects(&self) -> Result<Vec<TrackerProject>>;

    /// Tag names of the workspace.
    fn tags(&self) -> Result<Vec<String>>;

    /// Start a running entry now.
    fn start_entry(
        &mut self,
        description: &str,
        project_id: u64,
        tags: &[String],
    ) -> Result<TimeEntry>;

    /// Stop a running entry; returns it with its stop instant set.
    fn stop_entry(&mut self, entry: &TimeEntry) -> Result<TimeEntry>;
}
