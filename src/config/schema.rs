//! KDL schema definitions for config.kdl and state.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn first_string(doc: &KdlDocument, key: &str) -> Option<String> {
    doc.get(key)?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}

fn first_integer(doc: &KdlDocument, key: &str) -> Option<i128> {
    doc.get(key)?.entries().first()?.value().as_integer()
}

fn push_string(doc: &mut KdlDocument, key: &str, value: &str) {
    let mut node = KdlNode::new(key);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    doc.nodes_mut().push(node);
}

fn push_integer(doc: &mut KdlDocument, key: &str, value: i128) {
    let mut node = KdlNode::new(key);
    node.push(KdlEntry::new(KdlValue::Integer(value)));
    doc.nodes_mut().push(node);
}

/// User preferences stored in config.kdl.
///
/// File permissions: 0644 (rw-r--r--)
///
/// # KDL Schema
///
/// ```kdl
/// area "Uni"
/// database-path "/home/me/.local/share/things2reclaim/uploaded.db"
/// things-database "/Users/me/Library/Group Containers/.../main.sqlite"
/// reclaim-url "https://api.app.reclaim.ai/api"
/// toggl-url "https://api.track.toggl.com/api/v9"
/// completion-delay-secs 2
/// tracking-days 7
/// output-format "human"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Things area whose projects are mirrored
    pub area: Option<String>,
    /// Upload ledger location
    pub database_path: Option<PathBuf>,
    /// Things `main.sqlite` location
    pub things_database: Option<PathBuf>,
    pub reclaim_url: Option<String>,
    pub toggl_url: Option<String>,
    /// Wait before re-checking bulk completions
    pub completion_delay_secs: Option<u64>,
    /// Default look-back for `tracking`
    pub tracking_days: Option<i64>,
    pub output_format: Option<OutputFormat>,
}

impl AppConfig {
    /// Validate the config values.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(days) = self.tracking_days {
            if !(0..=crate::reconcile::tracking::MAX_TRACKING_DAYS).contains(&days) {
                return Err(format!(
                    "tracking-days must be 0-{}, got {}",
                    crate::reconcile::tracking::MAX_TRACKING_DAYS,
                    days
                ));
            }
        }
        if let Some(area) = &self.area {
            if area.trim().is_empty() {
                return Err("area must not be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown or mistyped keys are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            area: first_string(doc, "area"),
            database_path: first_string(doc, "database-path").map(PathBuf::from),
            things_database: first_string(doc, "things-database").map(PathBuf::from),
            reclaim_url: first_string(doc, "reclaim-url"),
            toggl_url: first_string(doc, "toggl-url"),
            completion_delay_secs: first_integer(doc, "completion-delay-secs")
                .and_then(|i| u64::try_from(i).ok()),
            tracking_days: first_integer(doc, "tracking-days").and_then(|i| i64::try_from(i).ok()),
            output_format: first_string(doc, "output-format").and_then(|s| OutputFormat::parse(&s)),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        if let Some(ref area) = self.area {
            push_string(&mut doc, "area", area);
        }
        if let Some(ref path) = self.database_path {
            push_string(&mut doc, "database-path", &path.to_string_lossy());
        }
        if let Some(ref path) = self.things_database {
            push_string(&mut doc, "things-database", &path.to_string_lossy());
        }
        if let Some(ref url) = self.reclaim_url {
            push_string(&mut doc, "reclaim-url", url);
        }
        if let Some(ref url) = self.toggl_url {
            push_string(&mut doc, "toggl-url", url);
        }
        if let Some(secs) = self.completion_delay_secs {
            push_integer(&mut doc, "completion-delay-secs", secs as i128);
        }
        if let Some(days) = self.tracking_days {
            push_integer(&mut doc, "tracking-days", days as i128);
        }
        if let Some(format) = self.output_format {
            push_string(&mut doc, "output-format", format.as_str());
        }
        doc
    }
}

/// Secrets stored in state.kdl.
///
/// **MUST be created with 0600 permissions (owner read/write only)**.
///
/// # KDL Schema
///
/// ```kdl
/// reclaim-token "..."
/// toggl-token "..."
/// things-auth-token "..."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub reclaim_token: Option<String>,
    pub toggl_token: Option<String>,
    /// Things URL-scheme token, needed to complete to-dos
    pub things_auth_token: Option<String>,
}

impl AppState {
    pub fn has_secrets(&self) -> bool {
        self.reclaim_token.is_some() || self.toggl_token.is_some() || self.things_auth_token.is_some()
    }

    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            reclaim_token: first_string(doc, "reclaim-token"),
            toggl_token: first_string(doc, "toggl-token"),
            things_auth_token: first_string(doc, "things-auth-token"),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        if let Some(ref token) = self.reclaim_token {
            push_string(&mut doc, "reclaim-token", token);
        }
        if let Some(ref token) = self.toggl_token {
            push_string(&mut doc, "toggl-token", token);
        }
        if let Some(ref token) = self.things_auth_token {
            push_string(&mut doc, "things-auth-token", token);
        }
        doc
    }
}

/// Mask a secret for display, keeping the first and last 4 characters.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        let head: String = chars.iter().take(4.min(chars.len())).collect();
        format!("{}...", head)
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Required permissions for state.kdl (owner read/write only).
pub const STATE_FILE_MODE: u32 = 0o600;

/// Required permissions for config.kdl (readable by all).
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// Written by `config init` when config.kdl does not exist.
pub const CONFIG_TEMPLATE: &str = r#"// things2reclaim preferences
// Things area whose projects are mirrored to Reclaim
area "Uni"
// database-path "/path/to/uploaded.db"
// things-database "/path/to/Things Database.thingsdatabase/main.sqlite"
// reclaim-url "https://api.app.reclaim.ai/api"
// toggl-url "https://api.track.toggl.com/api/v9"
completion-delay-secs 2
tracking-days 7
output-format "human"
"#;

/// Written by `config init` when state.kdl does not exist.
pub const STATE_TEMPLATE: &str = r#"// things2reclaim secrets - keep this file private
// reclaim-token "..."
// toggl-token "..."
// things-auth-token "..."
"#;
