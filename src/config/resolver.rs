//! Precedence resolution for configuration and secrets.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (`--db`, `--json`)
//! 2. Environment variables (`T2R_*`)
//! 3. config.kdl / state.kdl
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use crate::config::schema::mask_token;
use crate::config::OutputFormat;
use crate::providers::{reclaim, things, toggl};
use crate::storage::SettingsFiles;
use crate::{Error, Result};

pub const RECLAIM_TOKEN_ENV: &str = "T2R_RECLAIM_TOKEN";
pub const TOGGL_TOKEN_ENV: &str = "T2R_TOGGL_TOKEN";
pub const THINGS_TOKEN_ENV: &str = "T2R_THINGS_TOKEN";
pub const DB_PATH_ENV: &str = "T2R_DB_PATH";

pub const DEFAULT_AREA: &str = "Uni";
pub const DEFAULT_COMPLETION_DELAY_SECS: u64 = 2;
pub const DEFAULT_TRACKING_DAYS: i64 = 7;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from a settings file (path)
    File(String),
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::File(path) => write!(f, "file:{}", path),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Everything a command needs to know about its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub area: Resolved<String>,
    pub database_path: Resolved<PathBuf>,
    /// `None` means auto-discover.
    pub things_database: Option<Resolved<PathBuf>>,
    pub reclaim_url: Resolved<String>,
    pub toggl_url: Resolved<String>,
    pub completion_delay_secs: Resolved<u64>,
    pub tracking_days: Resolved<i64>,
    pub output_format: Resolved<OutputFormat>,
    pub reclaim_token: Option<Resolved<String>>,
    pub toggl_token: Option<Resolved<String>>,
    pub things_auth_token: Option<Resolved<String>>,
}

fn missing_token(key: &str, env: &str) -> Error {
    Error::Config(format!(
        "{} is not set; add it to state.kdl (see `t2r config init`) or set {}",
        key, env
    ))
}

impl Settings {
    pub fn require_reclaim_token(&self) -> Result<&str> {
        self.reclaim_token
            .as_ref()
            .map(|r| r.value.as_str())
            .ok_or_else(|| missing_token("reclaim-token", RECLAIM_TOKEN_ENV))
    }

    pub fn require_toggl_token(&self) -> Result<&str> {
        self.toggl_token
            .as_ref()
            .map(|r| r.value.as_str())
            .ok_or_else(|| missing_token("toggl-token", TOGGL_TOKEN_ENV))
    }

    pub fn things_auth_token(&self) -> Option<String> {
        self.things_auth_token.as_ref().map(|r| r.value.clone())
    }

    /// Configured Things database, else the auto-discovered one.
    pub fn things_database_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.things_database {
            return Ok(path.value.clone());
        }
        things::discover_database().ok_or_else(|| {
            Error::Config(
                "Things database not found; set things-database in config.kdl".to_string(),
            )
        })
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_secs(self.completion_delay_secs.value)
    }

    /// `(key, display value, source)` rows for `config show`, secrets masked.
    pub fn display_rows(&self) -> Vec<(&'static str, String, String)> {
        fn row<T: ToString>(key: &'static str, r: &Resolved<T>) -> (&'static str, String, String) {
            (key, r.value.to_string(), r.source.to_string())
        }
        fn path_row(key: &'static str, r: &Resolved<PathBuf>) -> (&'static str, String, String) {
            (key, r.value.display().to_string(), r.source.to_string())
        }
        fn secret_row(
            key: &'static str,
            r: &Option<Resolved<String>>,
        ) -> (&'static str, String, String) {
            match r {
                Some(r) => (key, mask_token(&r.value), r.source.to_string()),
                None => (key, "(not set)".to_string(), "-".to_string()),
            }
        }

        vec![
            row("area", &self.area),
            path_row("database-path", &self.database_path),
            match &self.things_database {
                Some(r) => path_row("things-database", r),
                None => (
                    "things-database",
                    "(auto-discover)".to_string(),
                    ValueSource::Default.to_string(),
                ),
            },
            row("reclaim-url", &self.reclaim_url),
            row("toggl-url", &self.toggl_url),
            row("completion-delay-secs", &self.completion_delay_secs),
            row("tracking-days", &self.tracking_days),
            row("output-format", &self.output_format),
            secret_row("reclaim-token", &self.reclaim_token),
            secret_row("toggl-token", &self.toggl_token),
            secret_row("things-auth-token", &self.things_auth_token),
        ]
    }
}

fn or_default<T>(value: Option<T>, default: T, source: &ValueSource) -> Resolved<T> {
    match value {
        Some(v) => Resolved::new(v, source.clone()),
        None => Resolved::new(default, ValueSource::Default),
    }
}

/// Resolve settings against the process environment.
pub fn resolve_settings(files: &SettingsFiles, overrides: &ConfigOverrides) -> Result<Settings> {
    resolve_settings_with_env(files, overrides, |key| std::env::var(key).ok())
}

/// Resolve settings with an injectable environment lookup.
pub fn resolve_settings_with_env(
    files: &SettingsFiles,
    overrides: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let config = files.read_config()?;
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", files.config_path().display(), e)))?;
    let state = files.read_state()?;

    let config_src = ValueSource::File(files.config_path().display().to_string());
    let state_src = ValueSource::File(files.state_path().display().to_string());
    let env = |key: &str| env(key).filter(|v| !v.is_empty());

    let secret = |key: &str, file_value: Option<String>| -> Option<Resolved<String>> {
        if let Some(v) = env(key) {
            return Some(Resolved::new(v, ValueSource::EnvVar(key.to_string())));
        }
        file_value.map(|v| Resolved::new(v, state_src.clone()))
    };

    let database_path = if let Some(ref path) = overrides.database_path {
        Resolved::new(path.clone(), ValueSource::CliFlag)
    } else if let Some(path) = env(DB_PATH_ENV) {
        Resolved::new(PathBuf::from(path), ValueSource::EnvVar(DB_PATH_ENV.to_string()))
    } else {
        or_default(config.database_path.clone(), files.default_ledger_path(), &config_src)
    };

    let output_format = match overrides.output_format {
        Some(format) => Resolved::new(format, ValueSource::CliFlag),
        None => or_default(config.output_format, OutputFormat::default(), &config_src),
    };

    Ok(Settings {
        area: or_default(config.area.clone(), DEFAULT_AREA.to_string(), &config_src),
        database_path,
        things_database: config
            .things_database
            .clone()
            .map(|p| Resolved::new(p, config_src.clone())),
        reclaim_url: or_default(
            config.reclaim_url.clone(),
            reclaim::DEFAULT_BASE_URL.to_string(),
            &config_src,
        ),
        toggl_url: or_default(
            config.toggl_url.clone(),
            toggl::DEFAULT_BASE_URL.to_string(),
            &config_src,
        ),
        completion_delay_secs: or_default(
            config.completion_delay_secs,
            DEFAULT_COMPLETION_DELAY_SECS,
            &config_src,
        ),
        tracking_days: or_default(config.tracking_days, DEFAULT_TRACKING_DAYS, &config_src),
        output_format,
        reclaim_token: secret(RECLAIM_TOKEN_ENV, state.reclaim_token),
        toggl_token: secret(TOGGL_TOKEN_ENV, state.toggl_token),
        things_auth_token: secret(THINGS_TOKEN_ENV, state.things_auth_token),
    })
}
