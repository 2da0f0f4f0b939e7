//! Shared domain model for memories, todos, settings and backups.
//!
//! # Responsibility
//! - Define the records persisted locally and mirrored remotely.
//! - Keep one identity (`id`) per record across both stores.
//!
//! # Invariants
//! - Identifiers are unique within a collection.
//! - Memories are displayed by `date` descending, recomputed on every load.

pub mod backup;
pub mod memory;
pub mod setting;
pub mod timer;
pub mod todo;

use std::fmt::{Display, Formatter};

/// Synchronized collections. Settings are keyed separately and are not a
/// `Collection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Memories,
    Todos,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Memories, Collection::Todos];

    /// Stable name used for local tables and remote paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memories => "memories",
            Self::Todos => "todos",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that lives in exactly one collection and is keyed by `id`.
pub trait Record: Clone {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Generates a client-side identifier for a new record.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
