//! Things 3 as the local to-do manager.
//!
//! Reads go straight to the app's SQLite database, opened read-only.
//! Writes go through the `things:///update` URL scheme, which Things
//! applies asynchronously; callers re-check status after a delay.
//!
//! Relevant tables:
//! - `TMArea(uuid, title, "index")`
//! - `TMTask(uuid, title, type, status, trashed, area, project, heading,
//!   startDate, deadline, "index")` where type 0 = to-do, 1 = project,
//!   2 = heading and status 0 = open, 2 = canceled, 3 = completed
//! - `TMTag(uuid, title)` and `TMTaskTag(tasks, tags)`

use chrono::{Datelike, NaiveDate};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ProviderError, TodoProvider};
use crate::models::{Area, LocalStatus, LocalTask, Project};
use crate::{Error, Result};

const SERVICE: &str = "things";

/// Group container holding the Things database on macOS.
const GROUP_CONTAINER: &str = "Library/Group Containers/JLMPQHK86H.com.culturedcode.ThingsMac";

const TASK_SELECT: &str = r#"
    SELECT t.uuid, t.title, COALESCE(p.title, ''), t.startDate, t.deadline, t.status
    FROM TMTask t
    LEFT JOIN TMTask h ON h.uuid = t.heading
    LEFT JOIN TMTask p ON p.uuid = COALESCE(t.project, h.project)
"#;

/// Decode Things' packed date integer (`year<<16 | month<<12 | day<<7`).
pub fn decode_date(value: i64) -> Option<NaiveDate> {
    if value <= 0 {
        return None;
    }
    let year = (value >> 16) as i32;
    let month = ((value >> 12) & 0xF) as u32;
    let day = ((value >> 7) & 0x1F) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Encode a date the way Things stores it.
pub fn encode_date(date: NaiveDate) -> i64 {
    ((date.year() as i64) << 16) | ((date.month() as i64) << 12) | ((date.day() as i64) << 7)
}

/// Locate `main.sqlite` inside the Things group container.
pub fn discover_database() -> Option<PathBuf> {
    let container = dirs::home_dir()?.join(GROUP_CONTAINER);
    let mut data_dirs: Vec<PathBuf> = std::fs::read_dir(&container)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("ThingsData-"))
        })
        .collect();
    data_dirs.sort();
    data_dirs
        .into_iter()
        .map(|d| d.join("Things Database.thingsdatabase").join("main.sqlite"))
        .find(|p| p.exists())
}

/// URL that asks Things to mark `id` completed.
pub fn completion_url(id: &str, auth_token: &str) -> String {
    format!(
        "things:///update?id={}&completed=true&auth-token={}",
        urlencoding::encode(id),
        urlencoding::encode(auth_token)
    )
}

/// Read-only handle on the Things database.
pub struct ThingsDatabase {
    conn: Connection,
    auth_token: Option<String>,
}

impl ThingsDatabase {
    /// Open the database at `path`.
    ///
    /// `auth_token` is only needed to complete to-dos.
    pub fn open(path: &Path, auth_token: Option<String>) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Things database not found at {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn, auth_token })
    }

    fn row_to_task(row: &Row<'_>) -> rusqlite::Result<LocalTask> {
        let status: i64 = row.get(5)?;
        Ok(LocalTask {
            id: row.get(0)?,
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            project_title: row.get(2)?,
            start_date: row.get::<_, Option<i64>>(3)?.and_then(decode_date),
            deadline: row.get::<_, Option<i64>>(4)?.and_then(decode_date),
            tags: Vec::new(),
            status: match status {
                3 => LocalStatus::Completed,
                2 => LocalStatus::Canceled,
                _ => LocalStatus::Open,
            },
        })
    }

    fn load_tags(&self, task: &mut LocalTask) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT tag.title FROM TMTaskTag tt JOIN TMTag tag ON tag.uuid = tt.tags
             WHERE tt.tasks = ?1 ORDER BY tag.title",
        )?;
        task.tags = stmt
            .query_map(params![task.id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(())
    }
}

impl TodoProvider for ThingsDatabase {
    fn areas(&self) -> Result<Vec<Area>> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT uuid, title FROM TMArea ORDER BY "index""#)?;
        let areas = stmt
            .query_map([], |row| {
                Ok(Area {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(areas)
    }

    fn projects(&self, area: &Area) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT uuid, title FROM TMTask
               WHERE type = 1 AND trashed = 0 AND status = 0 AND area = ?1
               ORDER BY "index""#,
        )?;
        let projects = stmt
            .query_map(params![area.id], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    fn todos(&self, project: &Project) -> Result<Vec<LocalTask>> {
        let sql = format!(
            r#"{} WHERE t.type = 0 AND t.trashed = 0 AND t.status = 0
                  AND COALESCE(t.project, h.project) = ?1
               ORDER BY t."index""#,
            TASK_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut tasks = stmt
            .query_map(params![project.id], Self::row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for task in &mut tasks {
            self.load_tags(task)?;
        }
        Ok(tasks)
    }

    fn get(&self, id: &str) -> Result<Option<LocalTask>> {
        let sql = format!("{} WHERE t.uuid = ?1 AND t.trashed = 0", TASK_SELECT);
        let task = self
            .conn
            .query_row(&sql, params![id], Self::row_to_task)
            .optional()?;
        match task {
            Some(mut task) => {
                self.load_tags(&mut task)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn complete(&mut self, id: &str) -> Result<()> {
        let token = self.auth_token.as_deref().ok_or_else(|| {
            Error::Config(
                "things-auth-token is not set; add it to state.kdl or set T2R_THINGS_TOKEN"
                    .to_string(),
            )
        })?;
        let url = completion_url(id, token);
        tracing::debug!(task = id, "asking Things to complete to-do");

        let status = Command::new("open")
            .arg("-g")
            .arg(&url)
            .status()
            .map_err(|e| ProviderError::Unavailable {
                service: SERVICE,
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(ProviderError::Unavailable {
                service: SERVICE,
                message: format!("`open` exited with {}", status),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_fixture() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE TMArea (uuid TEXT PRIMARY KEY, title TEXT, "index" INTEGER);
            CREATE TABLE TMTask (
                uuid TEXT PRIMARY KEY, title TEXT, type INTEGER, status INTEGER,
                trashed INTEGER, area TEXT, project TEXT, heading TEXT,
                startDate INTEGER, deadline INTEGER, "index" INTEGER
            );
            CREATE TABLE TMTag (uuid TEXT PRIMARY KEY, title TEXT);
            CREATE TABLE TMTaskTag (tasks TEXT, tags TEXT);

            INSERT INTO TMArea VALUES ('area-uni', 'Uni', 0), ('area-home', 'Home', 1);

            INSERT INTO TMTask VALUES
                ('p-ana', 'Analysis', 1, 0, 0, 'area-uni', NULL, NULL, NULL, NULL, 0),
                ('p-old', 'Old Course', 1, 3, 0, 'area-uni', NULL, NULL, NULL, NULL, 1),
                ('h-week', 'Week 1', 2, 0, 0, NULL, 'p-ana', NULL, NULL, NULL, 0),
                ('t-1', 'Sheet 1', 0, 0, 0, NULL, 'p-ana', NULL, 132945920, 132950528, 1),
                ('t-2', 'Sheet 2', 0, 0, 0, NULL, NULL, 'h-week', NULL, NULL, 2),
                ('t-3', 'Sheet 0', 0, 3, 0, NULL, 'p-ana', NULL, NULL, NULL, 0),
                ('t-4', 'Deleted', 0, 0, 1, NULL, 'p-ana', NULL, NULL, NULL, 3);

            INSERT INTO TMTag VALUES ('tag-est', 'EstimatedTime: 2h'), ('tag-min', 'MinTime: 30m');
            INSERT INTO TMTaskTag VALUES ('t-1', 'tag-est'), ('t-1', 'tag-min');
            "#,
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn test_date_codec() {
        let date = NaiveDate::from_ymd_opt(2028, 9, 16).unwrap();
        let encoded = encode_date(date);
        assert_eq!(decode_date(encoded), Some(date));
        assert_eq!(decode_date(0), None);
    }

    #[test]
    fn test_fixture_dates_decode() {
        // 132945920 = 2028-09-16, 132950528 = 2028-10-20
        assert_eq!(
            encode_date(NaiveDate::from_ymd_opt(2028, 9, 16).unwrap()),
            132945920
        );
        assert_eq!(
            encode_date(NaiveDate::from_ymd_opt(2028, 10, 20).unwrap()),
            132950528
        );
    }

    #[test]
    fn test_open_missing_database() {
        let dir = TempDir::new().unwrap();
        let result = ThingsDatabase::open(&dir.path().join("nope.sqlite"), None);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_areas_and_open_projects() {
        let (_dir, path) = create_fixture();
        let db = ThingsDatabase::open(&path, None).unwrap();

        let areas = db.areas().unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].title, "Uni");

        let projects = db.projects(&areas[0]).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].title, "Analysis");
    }

    #[test]
    fn test_todos_include_heading_children_and_skip_closed() {
        let (_dir, path) = create_fixture();
        let db = ThingsDatabase::open(&path, None).unwrap();
        let project = Project {
            id: "p-ana".to_string(),
            title: "Analysis".to_string(),
        };

        let todos = db.todos(&project).unwrap();
        let ids: Vec<_> = todos.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t-1", "t-2"]);

        let sheet1 = &todos[0];
        assert_eq!(sheet1.project_title, "Analysis");
        assert_eq!(sheet1.start_date, NaiveDate::from_ymd_opt(2028, 9, 16));
        assert_eq!(sheet1.deadline, NaiveDate::from_ymd_opt(2028, 10, 20));
        assert_eq!(sheet1.tags, vec!["EstimatedTime: 2h", "MinTime: 30m"]);

        assert_eq!(todos[1].project_title, "Analysis");
        assert!(todos[1].tags.is_empty());
    }

    #[test]
    fn test_get_reports_status_and_hides_trashed() {
        let (_dir, path) = create_fixture();
        let db = ThingsDatabase::open(&path, None).unwrap();

        let done = db.get("t-3").unwrap().unwrap();
        assert_eq!(done.status, LocalStatus::Completed);

        assert!(db.get("t-4").unwrap().is_none());
        assert!(db.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_complete_requires_auth_token() {
        let (_dir, path) = create_fixture();
        let mut db = ThingsDatabase::open(&path, None).unwrap();
        assert!(matches!(db.complete("t-1"), Err(Error::Config(_))));
    }

    #[test]
    fn test_completion_url() {
        assert_eq!(
            completion_url("t-1", "secret"),
            "things:///update?id=t-1&completed=true&auth-token=secret"
        );
    }

    #[test]
    fn test_completion_url_encodes_values() {
        assert_eq!(
            completion_url("a&b", "x=y z/+"),
            "things:///update?id=a%26b&completed=true&auth-token=x%3Dy%20z%2F%2B"
        );
    }
}
