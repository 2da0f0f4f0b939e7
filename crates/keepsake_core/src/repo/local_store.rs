//! Local store trait and SQLite-backed implementation.
//!
//! # Invariants
//! - `put` is an upsert keyed by record id; saving the same record twice
//!   leaves exactly one row.
//! - `delete` of an unknown id is a no-op, not an error.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::memory::{MediaKind, Memory};
use crate::model::todo::{TodoCategory, TodoItem};
use crate::model::{Collection, Record};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub type RepoResult<T> = Result<T, RepoError>;

/// Local persistence error. Quota and corruption failures surface as `Db`.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row mapping for a record type stored in its own table.
pub trait StoredRecord: Record + Sized {
    /// Full-collection read, in display order.
    const SELECT_ALL_SQL: &'static str;
    const SELECT_ONE_SQL: &'static str;
    const UPSERT_SQL: &'static str;

    /// Values bound to `UPSERT_SQL`, starting with the id.
    fn bind_values(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// Local store contract used by reconciliation.
pub trait LocalStore {
    fn get_all<T: StoredRecord>(&self) -> RepoResult<Vec<T>>;
    fn get<T: StoredRecord>(&self, id: &str) -> RepoResult<Option<T>>;
    fn put<T: StoredRecord>(&self, item: &T) -> RepoResult<()>;
    fn delete(&self, collection: Collection, id: &str) -> RepoResult<()>;
    /// Removes every record of the collection and returns how many were removed.
    fn clear(&self, collection: Collection) -> RepoResult<usize>;
    fn get_setting(&self, key: &str) -> RepoResult<Option<String>>;
    /// Stores `value` under `key`; `None` records an explicitly unset value.
    fn put_setting(&self, key: &str, value: Option<&str>) -> RepoResult<()>;
}

/// SQLite-backed local store owning its connection.
pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LocalStore for SqliteLocalStore {
    fn get_all<T: StoredRecord>(&self) -> RepoResult<Vec<T>> {
        let mut stmt = self.conn.prepare(T::SELECT_ALL_SQL)?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(T::from_row(row)?);
        }
        Ok(items)
    }

    fn get<T: StoredRecord>(&self, id: &str) -> RepoResult<Option<T>> {
        let mut stmt = self.conn.prepare(T::SELECT_ONE_SQL)?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    fn put<T: StoredRecord>(&self, item: &T) -> RepoResult<()> {
        if item.id().trim().is_empty() {
            return Err(RepoError::InvalidData(format!(
                "{} record id cannot be empty",
                T::COLLECTION
            )));
        }
        self.conn
            .execute(T::UPSERT_SQL, params_from_iter(item.bind_values()))?;
        Ok(())
    }

    fn delete(&self, collection: Collection, id: &str) -> RepoResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", collection.as_str()),
            [id],
        )?;
        Ok(())
    }

    fn clear(&self, collection: Collection) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {};", collection.as_str()), [])?;
        Ok(removed)
    }

    fn get_setting(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1;",
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn put_setting(&self, key: &str, value: Option<&str>) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}

impl StoredRecord for Memory {
    const SELECT_ALL_SQL: &'static str =
        "SELECT id, kind, content, caption, date FROM memories ORDER BY date DESC, id ASC;";
    const SELECT_ONE_SQL: &'static str =
        "SELECT id, kind, content, caption, date FROM memories WHERE id = ?1;";
    const UPSERT_SQL: &'static str = "INSERT INTO memories (id, kind, content, caption, date)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind,
            content = excluded.content,
            caption = excluded.caption,
            date = excluded.date;";

    fn bind_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.kind.as_str().to_string()),
            Value::Text(self.content.clone()),
            optional_text(self.caption.as_deref()),
            Value::Text(self.date.clone()),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let kind_text: String = row.get("kind")?;
        let kind = MediaKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid media kind `{kind_text}` in memories.kind"))
        })?;

        Ok(Self {
            id: row.get("id")?,
            kind,
            content: row.get("content")?,
            caption: row.get("caption")?,
            date: row.get("date")?,
        })
    }
}

impl StoredRecord for TodoItem {
    // Newest insert first; upserts keep their original rowid.
    const SELECT_ALL_SQL: &'static str =
        "SELECT id, text, completed, notes, category FROM todos ORDER BY rowid DESC;";
    const SELECT_ONE_SQL: &'static str =
        "SELECT id, text, completed, notes, category FROM todos WHERE id = ?1;";
    const UPSERT_SQL: &'static str = "INSERT INTO todos (id, text, completed, notes, category)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            text = excluded.text,
            completed = excluded.completed,
            notes = excluded.notes,
            category = excluded.category;";

    fn bind_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.text.clone()),
            Value::Integer(i64::from(self.completed)),
            optional_text(self.notes.as_deref()),
            optional_text(self.category.map(TodoCategory::as_str)),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let completed = match row.get::<_, i64>("completed")? {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid completed value `{other}` in todos.completed"
                )));
            }
        };

        let category = match row.get::<_, Option<String>>("category")? {
            Some(value) => Some(TodoCategory::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid category `{value}` in todos.category"))
            })?),
            None => None,
        };

        Ok(Self {
            id: row.get("id")?,
            text: row.get("text")?,
            completed,
            notes: row.get("notes")?,
            category,
        })
    }
}

fn optional_text(value: Option<&str>) -> Value {
    match value {
        Some(text) => Value::Text(text.to_string()),
        None => Value::Null,
    }
}
