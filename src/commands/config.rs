//! Config commands.

use serde::Serialize;
use std::path::PathBuf;

use super::CommandResult;
use crate::config::{CONFIG_FILE_MODE, CONFIG_TEMPLATE, STATE_FILE_MODE, STATE_TEMPLATE, Settings};
use crate::storage::{SettingsFiles, write_text};
use crate::Result;

#[derive(Debug, Serialize)]
pub struct ConfigInitResult {
    pub created: Vec<PathBuf>,
    /// Files that already existed and were left untouched.
    pub kept: Vec<PathBuf>,
}

impl CommandResult for ConfigInitResult {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        for path in &self.created {
            lines.push(format!("Created {}", path.display()));
        }
        for path in &self.kept {
            lines.push(format!("Kept existing {}", path.display()));
        }
        lines.join("\n")
    }
}

/// Write template settings files, never overwriting.
pub fn config_init(files: &SettingsFiles) -> Result<ConfigInitResult> {
    let mut result = ConfigInitResult {
        created: Vec::new(),
        kept: Vec::new(),
    };
    let targets = [
        (files.config_path(), CONFIG_TEMPLATE, CONFIG_FILE_MODE),
        (files.state_path(), STATE_TEMPLATE, STATE_FILE_MODE),
    ];
    for (path, template, mode) in targets {
        if path.exists() {
            result.kept.push(path);
        } else {
            write_text(&path, template, mode)?;
            result.created.push(path);
        }
    }
    Ok(result)
}

#[derive(Debug, Serialize)]
pub struct ConfigRow {
    pub key: String,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    pub settings: Vec<ConfigRow>,
}

impl CommandResult for ConfigShowResult {
    fn to_human(&self) -> String {
        let key_width = self.settings.iter().map(|r| r.key.len()).max().unwrap_or(0);
        let value_width = self.settings.iter().map(|r| r.value.len()).max().unwrap_or(0);
        self.settings
            .iter()
            .map(|r| {
                format!(
                    "{:<kw$}  {:<vw$}  ({})",
                    r.key,
                    r.value,
                    r.source,
                    kw = key_width,
                    vw = value_width
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Resolved settings with their sources; tokens are masked.
pub fn config_show(settings: &Settings) -> ConfigShowResult {
    ConfigShowResult {
        settings: settings
            .display_rows()
            .into_iter()
            .map(|(key, value, source)| ConfigRow {
                key: key.to_string(),
                value,
                source,
            })
            .collect(),
    }
}
