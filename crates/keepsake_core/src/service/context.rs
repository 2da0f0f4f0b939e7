//! Session context: every shared resource, constructed once at startup.
//!
//! # Invariants
//! - Sync readiness is decided in `init` and never re-checked.
//! - Once `LocalOnly`, no remote adapter is handed out for the session.
//! - Local store failures abort `init`; remote failures only downgrade it.

use crate::config::AppConfig;
use crate::db::DbError;
use crate::remote::firebase::FirebaseRemoteStore;
use crate::remote::{BlobStore, RemoteStore};
use crate::repo::local_store::SqliteLocalStore;
use crate::sync::reconcile::Reconciler;
use crate::sync::SyncState;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
pub enum ContextError {
    Storage(DbError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "failed to open local store: {err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

pub struct AppContext {
    config: AppConfig,
    local: SqliteLocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    state: SyncState,
}

impl AppContext {
    /// Opens the local store and tries to bring up remote sync.
    ///
    /// # Side effects
    /// - Creates/migrates the database file at `config.db_path`.
    /// - Performs anonymous sign-in when remote sync is configured.
    pub fn init(config: AppConfig) -> Result<Self, ContextError> {
        let local = SqliteLocalStore::open(&config.db_path)?;
        let started_at = Instant::now();
        info!("event=sync_init module=service status=start");

        if !config.sync.is_remote_configured() {
            info!(
                "event=sync_init module=service status=ok mode=local_only reason=not_configured"
            );
            return Ok(Self::with_stores(config, local, None, None));
        }

        match FirebaseRemoteStore::connect(&config.sync) {
            Ok(store) => {
                let blobs = store
                    .blob_store(&config.sync)
                    .map(|blobs| Arc::new(blobs) as Arc<dyn BlobStore>);
                info!(
                    "event=sync_init module=service status=ok mode=ready blob_offload={} duration_ms={}",
                    blobs.is_some(),
                    started_at.elapsed().as_millis()
                );
                let remote: Arc<dyn RemoteStore> = Arc::new(store);
                Ok(Self::with_stores(config, local, Some(remote), blobs))
            }
            Err(err) => {
                warn!(
                    "event=sync_init module=service status=degraded mode=local_only duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Ok(Self::with_stores(config, local, None, None))
            }
        }
    }

    /// Builds a context from already constructed stores.
    pub fn with_stores(
        config: AppConfig,
        local: SqliteLocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        blobs: Option<Arc<dyn BlobStore>>,
    ) -> Self {
        let remote_ready = remote.as_ref().is_some_and(|remote| remote.is_ready());
        let state = settle_sync_state(remote_ready);
        Self {
            config,
            local,
            remote: remote.filter(|_| state.is_remote_active()),
            blobs: blobs.filter(|_| state.is_remote_active()),
            state,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn local(&self) -> &SqliteLocalStore {
        &self.local
    }

    /// Remote adapter, only while the session is `Ready`.
    pub fn remote(&self) -> Option<&dyn RemoteStore> {
        self.remote.as_deref()
    }

    pub fn sync_state(&self) -> SyncState {
        self.state
    }

    pub fn reconciler(&self) -> Reconciler<'_, SqliteLocalStore> {
        Reconciler::new(&self.local, self.remote.as_deref(), self.blobs.as_deref())
    }

    /// Releases the session's stores.
    pub fn shutdown(self) {
        info!(
            "event=app_shutdown module=service status=ok sync_state={}",
            self.state
        );
    }
}

fn settle_sync_state(remote_ready: bool) -> SyncState {
    let next = if remote_ready {
        SyncState::Ready
    } else {
        SyncState::LocalOnly
    };
    SyncState::Uninitialized
        .advance(SyncState::Initializing)
        .and_then(|state| state.advance(next))
        .unwrap_or(SyncState::LocalOnly)
}
