//! Local persistence for things2reclaim.
//!
//! - `UploadLedger`: SQLite table of local task ids that have been mirrored
//!   to the scheduler. Default location `~/.local/share/things2reclaim/uploaded.db`.
//! - `SettingsFiles`: the `config.kdl` / `state.kdl` pair.
//!
//! Directory overrides:
//! - `T2R_CONFIG_DIR` replaces `~/.config/things2reclaim`
//! - `T2R_DATA_DIR` replaces `~/.local/share/things2reclaim`

use kdl::KdlDocument;
use rusqlite::{Connection, ErrorCode, params};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, AppState};
use crate::{Error, Result};

/// Directory name under the platform config/data roots.
pub const APP_DIR: &str = "things2reclaim";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "T2R_CONFIG_DIR";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "T2R_DATA_DIR";

/// File name of the ledger database inside the data directory.
pub const LEDGER_FILE: &str = "uploaded.db";

/// Ids of local tasks that have a remote mirror.
pub struct UploadLedger {
    conn: Connection,
}

impl UploadLedger {
    /// Open (or create) the ledger at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS uploaded_tasks (
                id INTEGER PRIMARY KEY,
                external_task_id TEXT NOT NULL UNIQUE
            );
            "#,
        )?;
        Ok(())
    }

    /// Record an uploaded id.
    ///
    /// Fails with `DuplicateLedgerEntry` if the id is already present.
    pub fn insert(&self, external_id: &str) -> Result<()> {
        match self.conn.execute(
            "INSERT INTO uploaded_tasks (external_task_id) VALUES (?1)",
            params![external_id],
        ) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(Error::DuplicateLedgerEntry(external_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an id; returns whether a row was removed.
    pub fn remove(&self, external_id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM uploaded_tasks WHERE external_task_id = ?1",
            params![external_id],
        )?;
        Ok(changed > 0)
    }

    /// All ids, in insertion order.
    pub fn all(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT external_task_id FROM uploaded_tasks ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn contains(&self, external_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM uploaded_tasks WHERE external_task_id = ?1",
            params![external_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM uploaded_tasks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Locations of `config.kdl` and `state.kdl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFiles {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl SettingsFiles {
    pub fn new(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Resolve directories from the environment, falling back to the
    /// platform defaults.
    pub fn from_env() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()
                .ok_or_else(|| Error::Other("Could not determine config directory".to_string()))?
                .join(APP_DIR),
        };
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
                .join(APP_DIR),
        };
        Ok(Self::new(config_dir, data_dir))
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.kdl")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.kdl")
    }

    pub fn default_ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    /// Read `config.kdl`; a missing file yields defaults.
    pub fn read_config(&self) -> Result<AppConfig> {
        let doc = read_kdl(&self.config_path())?;
        Ok(AppConfig::from_kdl(&doc))
    }

    /// Read `state.kdl`; a missing file yields an empty state.
    pub fn read_state(&self) -> Result<AppState> {
        let doc = read_kdl(&self.state_path())?;
        Ok(AppState::from_kdl(&doc))
    }

    pub fn write_config(&self, config: &AppConfig) -> Result<()> {
        write_text(
            &self.config_path(),
            &render_kdl(config.to_kdl()),
            crate::config::CONFIG_FILE_MODE,
        )
    }

    /// Write `state.kdl` with owner-only permissions.
    pub fn write_state(&self, state: &AppState) -> Result<()> {
        write_text(
            &self.state_path(),
            &render_kdl(state.to_kdl()),
            crate::config::STATE_FILE_MODE,
        )
    }
}

fn read_kdl(path: &Path) -> Result<KdlDocument> {
    if !path.exists() {
        return Ok(KdlDocument::new());
    }
    let content = fs::read_to_string(path)?;
    content
        .parse()
        .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))
}

fn render_kdl(mut doc: KdlDocument) -> String {
    doc.autoformat();
    doc.to_string()
}

/// Write `content` to `path`, creating parent directories.
///
/// `mode` is applied on Unix only.
pub(crate) fn write_text(path: &Path, content: &str, mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}
