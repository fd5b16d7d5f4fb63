//! Turn a local to-do into the fields of a new remote task.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::duration::parse_duration;
use crate::models::{LocalTask, RemoteTaskDraft, TaskTag, local_id_tag, parse_tags};
use crate::{Error, Result};

/// Time of day used on the start date unless a `StartTime` tag says otherwise.
pub const DEFAULT_START_TIME: (u32, u32) = (8, 0);

/// Time of day used on the deadline unless a `DeadlineTime` tag says otherwise.
pub const DEFAULT_DEADLINE_TIME: (u32, u32) = (22, 0);

fn time_of_day((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_time_of_day(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| Error::InvalidFormat(format!("{} '{}' is not HH:MM", key, value)))
}

fn at(date: Option<NaiveDate>, time: NaiveTime) -> Option<NaiveDateTime> {
    date.map(|d| d.and_time(time))
}

/// Build the draft for `task`.
///
/// Fails with `MissingField` when the `EstimatedTime` tag is absent and
/// with `InvalidFormat` when a known tag carries an unparseable value.
pub fn map_local_task(task: &LocalTask) -> Result<RemoteTaskDraft> {
    let tags = parse_tags(&task.tags);

    let estimated = tags
        .iter()
        .find_map(|t| match t {
            TaskTag::EstimatedTime(v) => Some(v),
            _ => None,
        })
        .ok_or_else(|| {
            Error::MissingField(format!("'{}' has no EstimatedTime tag", task.full_name()))
        })?;
    let estimated = parse_duration(estimated)?;

    let mut draft = RemoteTaskDraft {
        name: task.full_name(),
        description: local_id_tag(&task.id),
        min_work_duration: estimated,
        max_work_duration: estimated,
        duration: estimated,
        start_date: at(task.start_date, time_of_day(DEFAULT_START_TIME)),
        due_date: at(task.deadline, time_of_day(DEFAULT_DEADLINE_TIME)),
        ignored_tags: Vec::new(),
    };

    for tag in &tags {
        match tag {
            TaskTag::EstimatedTime(_) => {}
            TaskTag::MinTime(v) => draft.min_work_duration = parse_duration(v)?,
            TaskTag::MaxTime(v) => draft.max_work_duration = parse_duration(v)?,
            TaskTag::StartTime(v) => {
                let time = parse_time_of_day(tag.key(), v)?;
                draft.start_date = at(task.start_date, time);
            }
            TaskTag::DeadlineTime(v) => {
                let time = parse_time_of_day(tag.key(), v)?;
                draft.due_date = at(task.deadline, time);
            }
            TaskTag::Unrecognized(key) => {
                tracing::warn!(task = %draft.name, tag = %key, "ignoring unrecognized tag");
                draft.ignored_tags.push(key.clone());
            }
        }
    }

    Ok(draft)
}
