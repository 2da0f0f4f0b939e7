//! Per-record sync behavior: field-level merge and remote payload shaping.

use crate::model::memory::Memory;
use crate::model::todo::TodoItem;
use crate::remote::{BlobStore, RemoteOutcome};
use crate::repo::local_store::StoredRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait SyncRecord: StoredRecord + Serialize + DeserializeOwned {
    /// Combines the authoritative remote copy with the local copy of the same
    /// id. Remote wins unless a type says otherwise.
    fn merge_remote(remote: Self, _local: Option<&Self>) -> Self {
        remote
    }

    /// Builds the copy written to the remote store.
    fn remote_copy(&self, _blobs: Option<&dyn BlobStore>) -> RemoteOutcome<Self> {
        RemoteOutcome::Ok(self.clone())
    }
}

impl SyncRecord for TodoItem {}

impl SyncRecord for Memory {
    /// Keeps local inline media so offline viewing works; caption and date
    /// still come from the remote copy.
    fn merge_remote(remote: Self, local: Option<&Self>) -> Self {
        match local {
            Some(local) if local.is_inline() => Self {
                content: local.content.clone(),
                ..remote
            },
            _ => remote,
        }
    }

    /// Inline media is offloaded first and the remote copy references the
    /// uploaded URL. Without a blob store the remote write is skipped.
    fn remote_copy(&self, blobs: Option<&dyn BlobStore>) -> RemoteOutcome<Self> {
        if !self.is_inline() {
            return RemoteOutcome::Ok(self.clone());
        }
        let Some(blobs) = blobs else {
            return RemoteOutcome::Degraded;
        };
        blobs
            .upload(&self.content, &self.id, self.kind)
            .map(|url| Self {
                content: url,
                ..self.clone()
            })
    }
}
