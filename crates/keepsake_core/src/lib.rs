//! Core of Keepsake: shared memories and wishlist for two, stored locally
//! and mirrored to a hosted realtime database when one is configured.
//!
//! Local persistence lives in [`repo`], remote adapters in [`remote`],
//! local/remote reconciliation in [`sync`], and the application shell that
//! views drive in [`service`].

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{AppConfig, ConfigError, SyncConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::backup::{BackupDocument, BackupError, BackupSummary, BACKUP_FORMAT_VERSION};
pub use model::memory::{MediaKind, Memory};
pub use model::timer::Elapsed;
pub use model::todo::{TodoCategory, TodoItem};
pub use model::{Collection, Record};
pub use remote::{
    BlobStore, RemoteError, RemoteOutcome, RemotePath, RemoteSnapshot, RemoteStore, Subscription,
};
pub use repo::local_store::{LocalStore, RepoError, RepoResult, SqliteLocalStore};
pub use service::context::{AppContext, ContextError};
pub use service::shell::{AppShell, ImportReport, ShellError, ShellResult, View};
pub use sync::realtime::{setup_realtime_sync, RealtimeSync};
pub use sync::reconcile::Reconciler;
pub use sync::{RemoteSync, SyncReport, SyncState};

/// Minimal health-check API for linkage checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
