//! Reconciliation between the local store and the remote store.
//!
//! # Responsibility
//! - Decide the source of truth per operation (remote wins when reachable).
//! - Track session sync readiness.
//! - Surface remote results as [`RemoteSync`] next to local results.
//!
//! # Invariants
//! - Local writes happen before remote writes within one operation.
//! - Only local failures are returned as `Err`.

pub mod realtime;
pub mod reconcile;
pub mod record;

use crate::remote::{RemoteError, RemoteOutcome};
use std::fmt::{Display, Formatter};

/// Session sync readiness. Decided once at startup; no reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Uninitialized,
    Initializing,
    /// Credential acquired; remote store usable.
    Ready,
    /// Config absent or credential failure. Terminal for the session.
    LocalOnly,
}

impl SyncState {
    /// Returns the next state when `next` is a legal transition.
    pub fn advance(self, next: SyncState) -> Option<SyncState> {
        match (self, next) {
            (Self::Uninitialized, Self::Initializing)
            | (Self::Initializing, Self::Ready)
            | (Self::Initializing, Self::LocalOnly) => Some(next),
            _ => None,
        }
    }

    pub fn is_remote_active(self) -> bool {
        self == Self::Ready
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::LocalOnly => "local_only",
        }
    }
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened on the remote side of one reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSync {
    Synced,
    /// Remote step intentionally not attempted.
    Skipped,
    Failed(RemoteError),
}

impl RemoteSync {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

impl<T> From<RemoteOutcome<T>> for RemoteSync {
    fn from(value: RemoteOutcome<T>) -> Self {
        match value {
            RemoteOutcome::Ok(_) => Self::Synced,
            RemoteOutcome::Degraded => Self::Skipped,
            RemoteOutcome::Err(err) => Self::Failed(err),
        }
    }
}

/// Local result of an operation plus its remote status.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport<T> {
    pub value: T,
    pub remote: RemoteSync,
}

impl<T> SyncReport<T> {
    pub fn new(value: T, remote: RemoteSync) -> Self {
        Self { value, remote }
    }

    pub fn skipped(value: T) -> Self {
        Self::new(value, RemoteSync::Skipped)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SyncReport<U> {
        SyncReport {
            value: f(self.value),
            remote: self.remote,
        }
    }
}
