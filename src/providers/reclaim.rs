//! Reclaim.ai client.
//!
//! Durations travel as 15-minute chunks; this module converts them to and
//! from hours so the rest of the crate never sees chunks.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ProviderError, SchedulingProvider, map_ureq_error, read_json};
use crate::models::{RemoteStatus, RemoteTask, RemoteTaskDraft, WorkEvent};
use crate::{Error, Result};

const SERVICE: &str = "reclaim";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.app.reclaim.ai/api";

const USER_AGENT: &str = concat!("things2reclaim/", env!("CARGO_PKG_VERSION"));

const CHUNKS_PER_HOUR: f64 = 4.0;

/// Statuses requested when listing tasks.
const ACTIVE_STATUSES: &str = "NEW,SCHEDULED,IN_PROGRESS";

pub fn hours_to_chunks(hours: f64) -> u32 {
    (hours * CHUNKS_PER_HOUR).round().max(0.0) as u32
}

pub fn chunks_to_hours(chunks: u32) -> f64 {
    chunks as f64 / CHUNKS_PER_HOUR
}

/// Interpret a wall-clock time in the local timezone.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times
/// that do not exist locally are rejected.
pub fn local_to_utc(naive: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidInput(format!("{} does not exist in local time", naive)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDto {
    id: u64,
    title: String,
    #[serde(default)]
    notes: Option<String>,
    status: String,
    #[serde(default)]
    snooze_until: Option<DateTime<Utc>>,
    #[serde(default)]
    due: Option<DateTime<Utc>>,
    #[serde(default)]
    time_chunks_required: u32,
    #[serde(default)]
    min_chunk_size: u32,
    #[serde(default)]
    max_chunk_size: u32,
    #[serde(default)]
    instances: Vec<InstanceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceDto {
    event_id: String,
    #[serde(default)]
    calendar_id: Option<serde_json::Value>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDto {
    event_id: String,
    #[serde(default)]
    calendar_id: Option<serde_json::Value>,
    #[serde(default)]
    title: String,
    event_start: DateTime<Utc>,
    event_end: DateTime<Utc>,
    #[serde(default)]
    assist: Option<AssistDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssistDto {
    #[serde(default)]
    task_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskBody<'a> {
    title: &'a str,
    notes: &'a str,
    event_category: &'static str,
    time_chunks_required: u32,
    min_chunk_size: u32,
    max_chunk_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    snooze_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<DateTime<Utc>>,
    always_private: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEventBody {
    event_start: DateTime<Utc>,
    event_end: DateTime<Utc>,
}

/// Calendar ids come back as numbers or strings depending on the endpoint.
fn calendar_id_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TaskDto {
    fn into_model(self) -> RemoteTask {
        let task_id = self.id;
        let name = self.title;
        let events = self
            .instances
            .into_iter()
            .map(|i| WorkEvent {
                id: i.event_id,
                calendar_id: calendar_id_string(i.calendar_id),
                task_id: Some(task_id),
                title: name.clone(),
                start: i.start,
                end: i.end,
            })
            .collect();
        RemoteTask {
            id: task_id,
            name,
            description: self.notes.unwrap_or_default(),
            start_date: self.snooze_until,
            due_date: self.due,
            min_work_duration: chunks_to_hours(self.min_chunk_size),
            max_work_duration: chunks_to_hours(self.max_chunk_size),
            duration: chunks_to_hours(self.time_chunks_required),
            status: RemoteStatus::parse(&self.status),
            events,
        }
    }
}

impl EventDto {
    fn into_model(self) -> WorkEvent {
        WorkEvent {
            id: self.event_id,
            calendar_id: calendar_id_string(self.calendar_id),
            task_id: self.assist.and_then(|a| a.task_id),
            title: self.title,
            start: self.event_start,
            end: self.event_end,
        }
    }
}

/// Blocking Reclaim REST client.
pub struct ReclaimClient {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl ReclaimClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent
            .get(&self.url(path))
            .set("Authorization", &self.auth())
            .set("Accept", "application/json")
    }

    fn post(&self, path: &str) -> ureq::Request {
        self.agent
            .post(&self.url(path))
            .set("Authorization", &self.auth())
            .set("Accept", "application/json")
    }

    fn draft_body<'a>(draft: &'a RemoteTaskDraft) -> Result<CreateTaskBody<'a>> {
        Ok(CreateTaskBody {
            title: &draft.name,
            notes: &draft.description,
            event_category: "WORK",
            time_chunks_required: hours_to_chunks(draft.duration),
            min_chunk_size: hours_to_chunks(draft.min_work_duration),
            max_chunk_size: hours_to_chunks(draft.max_work_duration),
            snooze_until: draft.start_date.map(local_to_utc).transpose()?,
            due: draft.due_date.map(local_to_utc).transpose()?,
            always_private: true,
        })
    }
}

impl SchedulingProvider for ReclaimClient {
    fn tasks(&self) -> Result<Vec<RemoteTask>> {
        let resp = self
            .get("/tasks")
            .query("instances", "true")
            .query("status", ACTIVE_STATUSES)
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let tasks: Vec<TaskDto> = read_json(SERVICE, resp)?;
        Ok(tasks
            .into_iter()
            .map(TaskDto::into_model)
            .filter(|t| t.status.is_active())
            .collect())
    }

    fn create_task(&mut self, draft: &RemoteTaskDraft) -> Result<RemoteTask> {
        let body = Self::draft_body(draft)?;
        tracing::debug!(name = %draft.name, "creating reclaim task");
        let resp = self
            .post("/tasks")
            .send_json(&body)
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let task: TaskDto = read_json(SERVICE, resp)?;
        Ok(task.into_model())
    }

    fn prioritize(&mut self, task: &RemoteTask) -> Result<()> {
        self.post(&format!("/planner/prioritize/task/{}", task.id))
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        Ok(())
    }

    fn mark_complete(&mut self, task: &RemoteTask) -> Result<()> {
        self.post(&format!("/planner/done/task/{}", task.id))
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        Ok(())
    }

    fn work_events(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<WorkEvent>> {
        // The endpoint filters by whole days; trim to the exact window here.
        let end_day = (to + chrono::Duration::days(1)).date_naive();
        let resp = self
            .get("/events")
            .query("start", &from.date_naive().to_string())
            .query("end", &end_day.to_string())
            .query("sourceDetails", "true")
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        let events: Vec<EventDto> = read_json(SERVICE, resp)?;
        Ok(events
            .into_iter()
            .map(EventDto::into_model)
            .filter(|e| e.task_id.is_some() && e.start >= from && e.start < to)
            .collect())
    }

    fn log_work(
        &mut self,
        task: &RemoteTask,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let minutes = (end - start).num_minutes();
        if minutes <= 0 {
            return Err(Error::InvalidInput(format!(
                "cannot log {} minutes of work",
                minutes
            )));
        }
        self.post(&format!("/planner/log-work/task/{}", task.id))
            .query("minutes", &minutes.to_string())
            .query("end", &end.to_rfc3339())
            .call()
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        Ok(())
    }

    fn update_work_event(
        &mut self,
        event: &WorkEvent,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let calendar_id = event.calendar_id.as_deref().ok_or_else(|| ProviderError::Parse {
            service: SERVICE,
            message: format!("event {} has no calendar id", event.id),
        })?;
        self.agent
            .request("PATCH", &self.url(&format!("/events/{}/{}", calendar_id, event.id)))
            .set("Authorization", &self.auth())
            .set("Accept", "application/json")
            .send_json(UpdateEventBody {
                event_start: start,
                event_end: end,
            })
            .map_err(|e| map_ureq_error(SERVICE, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_chunk_conversion() {
        assert_eq!(hours_to_chunks(2.0), 8);
        assert_eq!(hours_to_chunks(0.5), 2);
        assert_eq!(hours_to_chunks(1.0 / 3.0), 1);
        assert_eq!(chunks_to_hours(6), 1.5);
    }

    #[test]
    fn test_task_dto_into_model() {
        let json = r#"{
            "id": 42,
            "title": "Analysis Sheet 3",
            "notes": "things_task:abc",
            "status": "SCHEDULED",
            "snoozeUntil": "2026-03-02T07:00:00Z",
            "due": "2026-03-09T21:00:00Z",
            "timeChunksRequired": 8,
            "minChunkSize": 2,
            "maxChunkSize": 4,
            "instances": [
                {"eventId": "ev1", "calendarId": 9, "start": "2026-03-03T09:00:00Z", "end": "2026-03-03T10:00:00Z"}
            ]
        }"#;
        let dto: TaskDto = serde_json::from_str(json).unwrap();
        let task = dto.into_model();

        assert_eq!(task.id, 42);
        assert_eq!(task.local_id(), Some("abc"));
        assert_eq!(task.status, RemoteStatus::Scheduled);
        assert_eq!(task.duration, 2.0);
        assert_eq!(task.min_work_duration, 0.5);
        assert_eq!(task.max_work_duration, 1.0);
        assert_eq!(task.events.len(), 1);
        assert_eq!(task.events[0].calendar_id.as_deref(), Some("9"));
        assert_eq!(task.events[0].task_id, Some(42));
        assert_eq!(task.events[0].title, "Analysis Sheet 3");
    }

    #[test]
    fn test_task_dto_tolerates_missing_optionals() {
        let json = r#"{"id": 1, "title": "Physics Lab", "status": "NEW"}"#;
        let task = serde_json::from_str::<TaskDto>(json).unwrap().into_model();
        assert_eq!(task.description, "");
        assert!(task.events.is_empty());
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_event_dto_into_model() {
        let json = r#"{
            "eventId": "ev7",
            "calendarId": "cal",
            "title": "Analysis Sheet 3",
            "eventStart": "2026-03-03T09:00:00+01:00",
            "eventEnd": "2026-03-03T10:00:00+01:00",
            "assist": {"taskId": 42}
        }"#;
        let event = serde_json::from_str::<EventDto>(json).unwrap().into_model();
        assert_eq!(event.task_id, Some(42));
        assert_eq!(event.calendar_id.as_deref(), Some("cal"));
        assert_eq!(event.start.to_rfc3339(), "2026-03-03T08:00:00+00:00");
    }

    #[test]
    fn test_create_body_shape() {
        let draft = RemoteTaskDraft {
            name: "Analysis Sheet 3".to_string(),
            description: "things_task:abc".to_string(),
            min_work_duration: 0.5,
            max_work_duration: 1.0,
            duration: 2.0,
            start_date: None,
            due_date: None,
            ignored_tags: vec![],
        };
        let body = ReclaimClient::draft_body(&draft).unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["title"], "Analysis Sheet 3");
        assert_eq!(value["eventCategory"], "WORK");
        assert_eq!(value["timeChunksRequired"], 8);
        assert_eq!(value["minChunkSize"], 2);
        assert_eq!(value["maxChunkSize"], 4);
        assert!(value.get("due").is_none());
    }

    #[test]
    fn test_local_to_utc_preserves_wall_clock() {
        let naive = NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let utc = local_to_utc(naive).unwrap();
        assert_eq!(utc.with_timezone(&Local).naive_local(), naive);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ReclaimClient::new("https://example.test/api/", "t");
        assert_eq!(client.url("/tasks"), "https://example.test/api/tasks");
    }
}
