//! SQLite persistence for notes and tasks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT DEFAULT 'pending',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    due_date DATE
);
";

const NOTE_COLUMNS: &str = "id, title, content, created_at, updated_at";

const TASK_COLUMNS: &str = "id, title, description, status, created_at, due_date";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,

    /// Creation time, `YYYY-MM-DD HH:MM:SS` (UTC).
    pub created_at: String,

    /// Last modification time, `YYYY-MM-DD HH:MM:SS` (UTC).
    pub updated_at: String,
}

/// Progress state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,

    /// Creation time, `YYYY-MM-DD HH:MM:SS` (UTC).
    pub created_at: String,

    /// Due date, `YYYY-MM-DD`.
    pub due_date: Option<String>,
}

/// Fields to change on a task. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<TaskStatus>,
}

/// Notes and tasks backed by a single SQLite connection.
pub struct Store {
    conn: Mutex<Connection>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
    }
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| WorkspaceError::Internal("database lock poisoned".to_string()))
    }

    // ==================== Notes ====================

    pub fn create_note(&self, title: &str, content: &str) -> Result<Note> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notes (title, content) VALUES (?1, ?2)",
            params![title, content],
        )?;
        let id = conn.last_insert_rowid();
        fetch_note(&conn, id)?.ok_or(WorkspaceError::NoteNotFound(id))
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        fetch_note(&*self.conn()?, id)
    }

    /// Replace the given fields and refresh `updated_at`. Returns `None` if no such note.
    pub fn update_note(
        &self,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Option<Note>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notes
             SET title = COALESCE(?1, title),
                 content = COALESCE(?2, content),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![title, content, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        fetch_note(&conn, id)
    }

    /// Returns whether a note was deleted.
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Case-insensitive substring match on title or content.
    pub fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\'
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let notes = stmt
            .query_map(params![pattern], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        self.search_notes("")
    }

    // ==================== Tasks ====================

    pub fn create_task(
        &self,
        title: &str,
        description: Option<&str>,
        due_date: Option<&str>,
    ) -> Result<Task> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (title, description, due_date) VALUES (?1, ?2, ?3)",
            params![title, description, due_date],
        )?;
        let id = conn.last_insert_rowid();
        fetch_task(&conn, id)?.ok_or(WorkspaceError::TaskNotFound(id))
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        fetch_task(&*self.conn()?, id)
    }

    /// All tasks, newest first, optionally restricted to one status.
    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let tasks = stmt
            .query_map(params![status], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Apply `changes`. Returns `None` if no such task.
    pub fn update_task(&self, id: i64, changes: &TaskChanges) -> Result<Option<Task>> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE tasks
             SET title = COALESCE(?1, title),
                 description = COALESCE(?2, description),
                 due_date = COALESCE(?3, due_date),
                 status = COALESCE(?4, status)
             WHERE id = ?5",
            params![
                changes.title,
                changes.description,
                changes.due_date,
                changes.status,
                id
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        fetch_task(&conn, id)
    }

    /// Returns whether a task was deleted.
    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            // Rows written by older clients may carry a NULL status.
            ValueRef::Null => Ok(Self::Pending),
            _ => value
                .as_str()?
                .parse()
                .map_err(|e: String| FromSqlError::Other(e.into())),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn fetch_note(conn: &Connection, id: i64) -> Result<Option<Note>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            params![id],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn fetch_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        due_date: row.get(5)?,
    })
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
