//! On-disk home of a profile's memories, todos and settings.
//!
//! # Responsibility
//! - Open the SQLite file a profile keeps its collections in.
//! - Refuse to hand out a connection whose tables are missing or whose
//!   schema comes from a newer build.
//!
//! # Invariants
//! - No collection is read or written before the schema check passes.
//! - Errors name the schema step or table at fault so a broken profile can
//!   be diagnosed from the log alone.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// A schema step failed; nothing from that open was kept.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The recorded version is current but a collection table is gone.
    MissingTable { table: &'static str },
    /// Written by a newer build; opening it could lose data.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "local store error: {err}"),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "local store schema step {version} ({name}) failed: {source}"),
            Self::MissingTable { table } => {
                write!(f, "local store is missing the `{table}` table")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "local store schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::MissingTable { .. } | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
