//! Whole-dataset backup document (export/import).
//!
//! # Invariants
//! - Exported documents always carry `version = "1.0"`.
//! - Import accepts a document only when both `memories` and `todos` are
//!   arrays of records with non-empty, per-collection unique ids; these checks
//!   run before any destructive action.

use super::memory::Memory;
use super::todo::TodoItem;
use super::{Collection, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

#[derive(Debug)]
pub enum BackupError {
    /// Input is not JSON, or an entry does not match the record shape.
    Malformed(serde_json::Error),
    /// Top-level `memories`/`todos` arrays are missing.
    MissingCollections,
    /// A record carries a blank id.
    EmptyId { collection: Collection, index: usize },
    DuplicateId { collection: Collection, id: String },
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "backup file is not valid: {err}"),
            Self::MissingCollections => {
                write!(f, "invalid backup format: `memories` and `todos` arrays are required")
            }
            Self::EmptyId { collection, index } => {
                write!(f, "invalid backup: {collection} entry {index} has an empty id")
            }
            Self::DuplicateId { collection, id } => {
                write!(f, "invalid backup: {collection} id `{id}` appears more than once")
            }
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::MissingCollections | Self::EmptyId { .. } | Self::DuplicateId { .. } => None,
        }
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}

/// Snapshot of both collections plus avatar settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub export_date: String,
    pub memories: Vec<Memory>,
    pub todos: Vec<TodoItem>,
    /// Setting key to value; `null` marks an unset avatar.
    #[serde(default)]
    pub settings: BTreeMap<String, Option<String>>,
}

/// Counts shown to the user before a destructive import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSummary {
    pub memories: usize,
    pub todos: usize,
}

impl BackupDocument {
    pub fn new(
        memories: Vec<Memory>,
        todos: Vec<TodoItem>,
        settings: BTreeMap<String, Option<String>>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: BACKUP_FORMAT_VERSION.to_string(),
            export_date: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            memories,
            todos,
            settings,
        }
    }

    /// Parses and shape-checks an import payload.
    pub fn from_json(raw: &str) -> Result<Self, BackupError> {
        let value: Value = serde_json::from_str(raw)?;
        let has_collections = value.get("memories").is_some_and(Value::is_array)
            && value.get("todos").is_some_and(Value::is_array);
        if !has_collections {
            return Err(BackupError::MissingCollections);
        }
        let document: Self = serde_json::from_value(value)?;
        check_ids(&document.memories)?;
        check_ids(&document.todos)?;
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, BackupError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn summary(&self) -> BackupSummary {
        BackupSummary {
            memories: self.memories.len(),
            todos: self.todos.len(),
        }
    }
}

fn check_ids<T: Record>(records: &[T]) -> Result<(), BackupError> {
    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let id = record.id();
        if id.trim().is_empty() {
            return Err(BackupError::EmptyId {
                collection: T::COLLECTION,
                index,
            });
        }
        if !seen.insert(id) {
            return Err(BackupError::DuplicateId {
                collection: T::COLLECTION,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
