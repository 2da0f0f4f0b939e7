//! Remote store contracts: realtime database, blob offload, subscriptions.
//!
//! # Responsibility
//! - Define the adapter boundary for the hosted realtime database and the
//!   object storage used for media offload.
//! - Report every remote call as an explicit [`RemoteOutcome`] so callers can
//!   tell "skipped" from "attempted and failed".
//!
//! # Invariants
//! - Remote failures never escape as `Result::Err` of a caller-visible API;
//!   they are logged at the adapter and carried as `RemoteOutcome::Err`.
//! - All paths are relative to one shared namespace chosen at deployment.

pub mod firebase;
pub mod inline;
pub mod storage;
pub mod subscription;

use crate::model::memory::MediaKind;
use crate::model::Collection;
use crossbeam_channel::Sender;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use subscription::{subscription_pair, ListenerGuard, Subscription};

/// Full value at a listened path; `None` when the path holds nothing.
pub type RemoteSnapshot = Option<Value>;

/// Result of one remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome<T> {
    Ok(T),
    /// The call was intentionally not attempted.
    Degraded,
    Err(RemoteError),
}

impl<T> RemoteOutcome<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Degraded | Self::Err(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteOutcome<U> {
        match self {
            Self::Ok(value) => RemoteOutcome::Ok(f(value)),
            Self::Degraded => RemoteOutcome::Degraded,
            Self::Err(err) => RemoteOutcome::Err(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    NotConfigured,
    Auth(String),
    Transport(String),
    Status { status: u16, body: String },
    Decode(String),
    InvalidKey(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "remote sync is not configured"),
            Self::Auth(message) => write!(f, "remote sign-in failed: {message}"),
            Self::Transport(message) => write!(f, "remote request failed: {message}"),
            Self::Status { status, body } => {
                write!(f, "remote request returned HTTP {status}: {body}")
            }
            Self::Decode(message) => write!(f, "remote payload is invalid: {message}"),
            Self::InvalidKey(key) => write!(f, "`{key}` is not a valid remote key"),
        }
    }
}

impl Error for RemoteError {}

/// Path relative to the shared namespace, e.g. `memories/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn collection(collection: Collection) -> Self {
        Self(collection.as_str().to_string())
    }

    pub fn item(collection: Collection, id: &str) -> Self {
        Self(format!("{}/{id}", collection.as_str()))
    }

    pub fn setting(key: &str) -> Self {
        Self(format!("settings/{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Returns whether `self` equals `ancestor` or lies below it.
    pub fn is_within(&self, ancestor: &RemotePath) -> bool {
        let mut own = self.segments();
        ancestor.segments().all(|segment| own.next() == Some(segment))
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns whether `key` can be used as one remote path segment.
pub fn is_valid_remote_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/') || c.is_control())
}

/// Realtime database adapter.
pub trait RemoteStore: Send + Sync {
    /// True only after credential acquisition succeeded.
    fn is_ready(&self) -> bool;
    fn get(&self, path: &RemotePath) -> RemoteOutcome<RemoteSnapshot>;
    fn set(&self, path: &RemotePath, value: &Value) -> RemoteOutcome<()>;
    fn remove(&self, path: &RemotePath) -> RemoteOutcome<()>;
    /// Streams the full value at `path` into `sink` on every remote change,
    /// starting with the current value.
    fn listen(&self, path: &RemotePath, sink: Sender<RemoteSnapshot>)
        -> RemoteOutcome<Subscription>;
}

/// Object storage used to offload inline media.
pub trait BlobStore: Send + Sync {
    /// Uploads inline-encoded media and returns a stable download URL.
    fn upload(&self, inline: &str, id: &str, kind: MediaKind) -> RemoteOutcome<String>;
}
