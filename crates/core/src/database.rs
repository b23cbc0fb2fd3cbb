use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{named_params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info};

use crate::capture::TaskInput;
use crate::config::AppConfig;
use crate::model::{
    AddOutcome, DeleteResult, InsertableTask, NewTask, Priority, StatusUpdate, Task, TaskQuery,
    User,
};
use crate::parser;
use crate::query;

const TASK_COLUMNS: &str = "id, owner_id, name, description, due_date, priority, completed, \
     tags, progress, created_at, updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn initialize(config: &AppConfig) -> Result<Self> {
        let conn = Connection::open(config.db_path()).with_context(|| {
            format!("Failed to open database at {}", config.db_path().display())
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to configure SQLite pragmas")?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        register_functions(&conn).context("Failed to register SQL functions")?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    pub fn register_user(&self, username: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            bail!("Username cannot be empty");
        }
        if self.find_user(username)?.is_some() {
            bail!("User '{}' already exists", username);
        }

        self.conn.execute(
            "INSERT INTO users (username, created_at) VALUES (:username, :created_at)",
            named_params![
                ":username": username,
                ":created_at": Utc::now().to_rfc3339(),
            ],
        )?;
        info!(username, "registered user");

        self.find_user(username)?
            .ok_or_else(|| anyhow!("User '{}' vanished after insert", username))
    }

    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ? LIMIT 1",
                [username.trim()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, username, created_at)| -> Result<User> {
            Ok(User {
                id,
                username,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    pub fn handle_add(
        &self,
        owner_id: i64,
        input: &TaskInput,
        today: NaiveDate,
    ) -> Result<AddOutcome> {
        let (insertable, outcome) = parser::prepare_new_task(input, today)?;
        self.insert_task(owner_id, &insertable)?;
        Ok(outcome)
    }

    pub fn insert_task(&self, owner_id: i64, insertable: &InsertableTask) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let data = &insertable.data;
        let tags_json = serde_json::to_string(&data.tags)?;
        let due_date = format_due_date(data.due_date)?;

        self.conn.execute(
            "INSERT INTO tasks (
                id, owner_id, name, description, due_date, priority, completed, tags, progress,
                created_at, updated_at
            ) VALUES (
                :id, :owner_id, :name, :description, :due_date, :priority, :completed, :tags,
                :progress, :created_at, :updated_at
            )",
            named_params![
                ":id": &insertable.id,
                ":owner_id": owner_id,
                ":name": &data.name,
                ":description": data.description.as_deref(),
                ":due_date": due_date,
                ":priority": data.priority.as_str(),
                ":completed": data.completed,
                ":tags": tags_json,
                ":progress": i64::from(data.progress),
                ":created_at": &now,
                ":updated_at": &now,
            ],
        )?;
        info!(task_id = insertable.id.as_str(), owner_id, "inserted task");
        Ok(())
    }

    pub fn fetch_task(&self, owner_id: i64, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? AND id = ? LIMIT 1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![owner_id, id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(map_task(row)?))
        } else {
            Ok(None)
        }
    }

    /// Every task the owner has, in insertion order.
    pub fn fetch_all(&self, owner_id: i64) -> Result<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? ORDER BY seq ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([owner_id])?;
        collect_tasks(&mut rows)
    }

    /// Tasks due within `start..=end`, in insertion order.
    pub fn fetch_due_between(
        &self,
        owner_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Task>> {
        let Some((start, end)) = storable_range(start, end) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE owner_id = :owner AND due_date >= :start AND due_date <= :end \
             ORDER BY seq ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(named_params![
            ":owner": owner_id,
            ":start": start.format(DATE_FORMAT).to_string(),
            ":end": end.format(DATE_FORMAT).to_string(),
        ])?;
        collect_tasks(&mut rows)
    }

    /// Run a [`TaskQuery`] inside SQLite. Produces the same ordering as
    /// [`query::query`] over [`Database::fetch_all`].
    pub fn query_tasks(&self, owner_id: i64, params: &TaskQuery) -> Result<Vec<Task>> {
        let (filter_sql, needle) = query::where_clause(params);
        let order_sql = query::order_by_clause(params);
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = :owner{filter_sql}{order_sql}");
        debug!(sql = sql.as_str(), "running task query in storage");

        let mut bound: Vec<(&str, &dyn ToSql)> = vec![(":owner", &owner_id as &dyn ToSql)];
        if let Some(needle) = needle.as_ref() {
            bound.push((":needle", needle as &dyn ToSql));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(bound.as_slice())?;
        collect_tasks(&mut rows)
    }

    pub fn update_task(&self, owner_id: i64, id: &str, updated: &NewTask) -> Result<Option<Task>> {
        let tags_json = serde_json::to_string(&updated.tags)?;
        let due_date = format_due_date(updated.due_date)?;
        let affected = self.conn.execute(
            "UPDATE tasks SET
                name = :name,
                description = :description,
                due_date = :due_date,
                priority = :priority,
                completed = :completed,
                tags = :tags,
                progress = :progress,
                updated_at = :updated_at
             WHERE owner_id = :owner_id AND id = :id",
            named_params![
                ":name": &updated.name,
                ":description": updated.description.as_deref(),
                ":due_date": due_date,
                ":priority": updated.priority.as_str(),
                ":completed": updated.completed,
                ":tags": tags_json,
                ":progress": i64::from(updated.progress),
                ":updated_at": Utc::now().to_rfc3339(),
                ":owner_id": owner_id,
                ":id": id,
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        info!(task_id = id, owner_id, "updated task");
        self.fetch_task(owner_id, id)
    }

    pub fn set_completed(
        &self,
        owner_id: i64,
        ids: &[String],
        completed: bool,
    ) -> Result<Vec<StatusUpdate>> {
        let updated_ts = Utc::now().to_rfc3339();
        let mut results = Vec::new();
        for id in ids {
            let updated = self.conn.execute(
                "UPDATE tasks SET completed = :completed, updated_at = :updated \
                 WHERE owner_id = :owner_id AND id = :id AND completed <> :completed",
                named_params![
                    ":completed": completed,
                    ":updated": &updated_ts,
                    ":owner_id": owner_id,
                    ":id": id,
                ],
            )?;
            results.push(StatusUpdate {
                id: id.to_string(),
                changed: updated > 0,
            });
        }
        info!(owner_id, completed, count = ids.len(), "updated completion");
        Ok(results)
    }

    pub fn set_progress(&self, owner_id: i64, id: &str, progress: u8) -> Result<Option<Task>> {
        if progress > parser::MAX_PROGRESS {
            bail!("Progress must be between 0 and 100, got {}", progress);
        }
        let affected = self.conn.execute(
            "UPDATE tasks SET progress = :progress, updated_at = :updated \
             WHERE owner_id = :owner_id AND id = :id",
            named_params![
                ":progress": i64::from(progress),
                ":updated": Utc::now().to_rfc3339(),
                ":owner_id": owner_id,
                ":id": id,
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.fetch_task(owner_id, id)
    }

    /// Move a task to another due date (calendar drag and drop).
    pub fn reschedule(&self, owner_id: i64, id: &str, due_date: NaiveDate) -> Result<Option<Task>> {
        let stored_due = format_due_date(due_date)?;
        let affected = self.conn.execute(
            "UPDATE tasks SET due_date = :due_date, updated_at = :updated \
             WHERE owner_id = :owner_id AND id = :id",
            named_params![
                ":due_date": stored_due,
                ":updated": Utc::now().to_rfc3339(),
                ":owner_id": owner_id,
                ":id": id,
            ],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        info!(task_id = id, owner_id, due_date = %due_date, "rescheduled task");
        self.fetch_task(owner_id, id)
    }

    pub fn delete_tasks(&self, owner_id: i64, ids: &[String]) -> Result<Vec<DeleteResult>> {
        let mut results = Vec::new();
        for id in ids {
            let affected = self.conn.execute(
                "DELETE FROM tasks WHERE owner_id = :owner_id AND id = :id",
                named_params![":owner_id": owner_id, ":id": id],
            )?;
            results.push(DeleteResult {
                id: id.to_string(),
                deleted: affected > 0,
            });
        }
        info!(owner_id, count = ids.len(), "deleted tasks");
        Ok(results)
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS tasks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                description TEXT,
                due_date TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high')),
                completed INTEGER NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]',
                progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
             CREATE INDEX IF NOT EXISTS idx_tasks_owner_due ON tasks(owner_id, due_date);
            ",
        )?;
        Ok(())
    }
}

/// Case folding shared by SQL search and name ordering, so storage-side
/// queries agree with the in-memory engine.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "unicode_lower",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )
}

/// Text form of a due date. Only four-digit years keep text order equal to
/// date order, so anything else is rejected.
fn format_due_date(date: NaiveDate) -> Result<String> {
    let date = parser::ensure_due_date_in_range(date)?;
    Ok(date.format(DATE_FORMAT).to_string())
}

/// Intersect `start..=end` with the storable years; `None` when nothing stored
/// can fall inside.
fn storable_range(start: NaiveDate, end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(parser::MIN_DUE_YEAR, 1, 1)?;
    let last = NaiveDate::from_ymd_opt(parser::MAX_DUE_YEAR, 12, 31)?;
    if end < first || start > last || start > end {
        return None;
    }
    Some((start.max(first), end.min(last)))
}

fn collect_tasks(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<Task>> {
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(map_task(row)?);
    }
    Ok(tasks)
}

fn map_task(row: &Row<'_>) -> Result<Task> {
    let id: String = row.get(0)?;
    let due_raw: String = row.get(4)?;
    let priority_raw: String = row.get(5)?;
    let progress: i64 = row.get(8)?;

    Ok(Task {
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        due_date: NaiveDate::parse_from_str(&due_raw, DATE_FORMAT)
            .with_context(|| format!("Task {} has malformed due date '{}'", id, due_raw))?,
        priority: priority_raw
            .parse::<Priority>()
            .with_context(|| format!("Task {} has invalid priority", id))?,
        completed: row.get(6)?,
        tags: parse_string_list(row.get::<_, Option<String>>(7)?),
        progress: u8::try_from(progress)
            .with_context(|| format!("Task {} has invalid progress {}", id, progress))?,
        created_at: parse_timestamp(&row.get::<_, String>(9)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(10)?)?,
        id,
    })
}

fn parse_string_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse timestamp '{}': {}", raw, e))
}
