//! Toggl Track v9 client.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{TimeTrackingProvider, map_ureq_error, read_json};
use crate::Result;
use crate::models::{TimeEntry, TrackerProject};

const SERVICE: &str = "toggl";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.track.toggl.com/api/v9";

/// Value of `created_with` on entries we start.
const CREATED_WITH: &str = "things2reclaim";

/// `Authorization` header value for an API token.
pub fn basic_auth(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:api_token", token)))
}

#[derive(Debug, Deserialize)]
struct MeDto {
    default_workspace_id: u64,
}

#[derive(Debug, Deserialize)]
struct ProjectDto {
    id: u64,
    name: String,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct TagDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TimeEntryDto {
    id: u64,
    workspace_id: u64,
    #[serde(default)]
    project_id: Option<u64>,
    #[serde(default)]
    description: Option<String>,
    start: DateTime<Utc>,
    #[serde(default)]
    stop: Option<DateTime<Utc>>,
    duration: i64,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl From<TimeEntryDto> for TimeEntry {
    fn from(dto: TimeEntryDto) -> Self {
        TimeEntry {
            id: dto.id,
            workspace_id: dto.workspace_id,
            project_id: dto.project_id,
            description: dto.description.filter(|d| !d.is_empty()),
            start: dto.start,
            stop: dto.stop,
            duration: dto.duration,
            tags: dto.tags.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct StartEntryBody<'a> {
    created_with: &'static str,
    description: &'a str,
    project_id: u64,
    workspace_id: u64,
    start: String,
    duration: i64,
    tags: &'a [String],
}

/// Blocking Toggl client bound to the user's default workspace.
pub struct TogglClient {
    agent: ureq::Agent,
    base_url: String,
    auth: String,
    workspace_id: u64,
    projects: Vec<TrackerProject>,
}

impl TogglClient {
    /// Resolve the default workspace and cache its active projects.
    pub fn connect(base_url: &str, token: &str) -> Result<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        let mut client = Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: basic_auth(token),
            workspace_id: 0,
            projects: Vec::new(),
        };

        let resp = client
            .get("/me")
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let me: MeDto = read_json(SERVICE, resp)?;
        client.workspace_id = me.default_workspace_id;

        let resp = client
            .get(&format!("/workspaces/{}/projects", client.workspace_id))
            .query("active", "true")
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let projects: Option<Vec<ProjectDto>> = read_json(SERVICE, resp)?;
        client.projects = projects
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.active)
            .map(|p| TrackerProject {
                id: p.id,
                name: p.name,
                active: p.active,
            })
            .collect();

        tracing::debug!(
            workspace = client.workspace_id,
            projects = client.projects.len(),
            "connected to toggl"
        );
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent
            .get(&self.url(path))
            .set("Authorization", &self.auth)
            .set("Accept", "application/json")
    }
}

impl TimeTrackingProvider for TogglClient {
    fn entries(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<TimeEntry>> {
        let resp = self
            .get("/me/time_entries")
            .query("start_date", &from.to_rfc3339())
            .query("end_date", &to.to_rfc3339())
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let entries: Vec<TimeEntryDto> = read_json(SERVICE, resp)?;
        Ok(entries
            .into_iter()
            .map(TimeEntry::from)
            .filter(|e| e.start >= from && e.start < to)
            .collect())
    }

    fn current_entry(&self) -> Result<Option<TimeEntry>> {
        let resp = self
            .get("/me/time_entries/current")
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let entry: Option<TimeEntryDto> = read_json(SERVICE, resp)?;
        Ok(entry.map(TimeEntry::from))
    }

    fn projects(&self) -> Result<Vec<TrackerProject>> {
        Ok(self.projects.clone())
    }

    fn tags(&self) -> Result<Vec<String>> {
        let resp = self
            .get(&format!("/workspaces/{}/tags", self.workspace_id))
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let tags: Option<Vec<TagDto>> = read_json(SERVICE, resp)?;
        Ok(tags.unwrap_or_default().into_iter().map(|t| t.name).collect())
    }

    fn start_entry(
        &mut self,
        description: &str,
        project_id: u64,
        tags: &[String],
    ) -> Result<TimeEntry> {
        let body = StartEntryBody {
            created_with: CREATED_WITH,
            description,
            project_id,
            workspace_id: self.workspace_id,
            start: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            duration: -1,
            tags,
        };
        let resp = self
            .agent
            .post(&self.url(&format!("/workspaces/{}/time_entries", self.workspace_id)))
            .set("Authorization", &self.auth)
            .send_json(&body)
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let entry: TimeEntryDto = read_json(SERVICE, resp)?;
        Ok(entry.into())
    }

    fn stop_entry(&mut self, entry: &TimeEntry) -> Result<TimeEntry> {
        let resp = self
            .agent
            .request(
                "PATCH",
                &self.url(&format!(
                    "/workspaces/{}/time_entries/{}/stop",
                    entry.workspace_id, entry.id
                )),
            )
            .set("Authorization", &self.auth)
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let stopped: TimeEntryDto = read_json(SERVICE, resp)?;
        Ok(stopped.into())
    }
}
