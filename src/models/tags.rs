//! Typed view of the `"Key: Value"` tags carried by local to-dos.

use std::fmt;

/// A parsed to-do tag.
///
/// The key set is closed; anything else lands in `Unrecognized` and is
/// skipped by the task mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTag {
    /// Estimated total work, e.g. `EstimatedTime: 2h`.
    EstimatedTime(String),
    /// Minimum chunk of work, e.g. `MinTime: 30m`.
    MinTime(String),
    /// Maximum chunk of work, e.g. `MaxTime: 1h 30m`.
    MaxTime(String),
    /// Time of day on the start date, e.g. `StartTime: 10:00`.
    StartTime(String),
    /// Time of day on the deadline, e.g. `DeadlineTime: 18:00`.
    DeadlineTime(String),
    /// A key we do not handle, or a plain label without a value.
    Unrecognized(String),
}

impl TaskTag {
    /// Parse one raw tag.
    pub fn parse(raw: &str) -> Self {
        let Some((key, value)) = raw.split_once(": ") else {
            return TaskTag::Unrecognized(raw.trim().to_string());
        };
        let value = value.trim().to_string();
        match key.trim() {
            "EstimatedTime" => TaskTag::EstimatedTime(value),
            "MinTime" => TaskTag::MinTime(value),
            "MaxTime" => TaskTag::MaxTime(value),
            "StartTime" => TaskTag::StartTime(value),
            "DeadlineTime" => TaskTag::DeadlineTime(value),
            other => TaskTag::Unrecognized(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            TaskTag::EstimatedTime(_) => "EstimatedTime",
            TaskTag::MinTime(_) => "MinTime",
            TaskTag::MaxTime(_) => "MaxTime",
            TaskTag::StartTime(_) => "StartTime",
            TaskTag::DeadlineTime(_) => "DeadlineTime",
            TaskTag::Unrecognized(key) => key,
        }
    }
}

impl fmt::Display for TaskTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskTag::EstimatedTime(v)
            | TaskTag::MinTime(v)
            | TaskTag::MaxTime(v)
            | TaskTag::StartTime(v)
            | TaskTag::DeadlineTime(v) => write!(f, "{}: {}", self.key(), v),
            TaskTag::Unrecognized(key) => write!(f, "{}", key),
        }
    }
}

/// Parse all tags of a to-do, preserving order.
pub fn parse_tags<S: AsRef<str>>(raw: &[S]) -> Vec<TaskTag> {
    raw.iter().map(|t| TaskTag::parse(t.as_ref())).collect()
}
