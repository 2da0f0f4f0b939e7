//! Local/remote reconciliation for collections and settings.
//!
//! # Invariants
//! - With the remote unreachable, every operation is local-only and
//!   reports `RemoteSync::Skipped`.
//! - With the remote reachable, the remote collection is the source of
//!   truth: local items missing remotely are pruned, and an empty remote
//!   collection empties the local one.
//! - Remote writes target one item path; concurrent writers of different
//!   items never overwrite each other. Same-item writes are last-writer-wins.

use super::record::SyncRecord;
use super::{RemoteSync, SyncReport};
use crate::model::memory::{is_inline_content, MediaKind};
use crate::model::Collection;
use crate::remote::{
    is_valid_remote_key, BlobStore, RemoteError, RemoteOutcome, RemotePath, RemoteSnapshot,
    RemoteStore,
};
use crate::repo::local_store::{LocalStore, RepoResult};
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Mediates every collection/setting operation between both stores.
pub struct Reconciler<'a, L: LocalStore> {
    local: &'a L,
    remote: Option<&'a dyn RemoteStore>,
    blobs: Option<&'a dyn BlobStore>,
}

impl<'a, L: LocalStore> Reconciler<'a, L> {
    pub fn new(
        local: &'a L,
        remote: Option<&'a dyn RemoteStore>,
        blobs: Option<&'a dyn BlobStore>,
    ) -> Self {
        Self {
            local,
            remote,
            blobs,
        }
    }

    /// Local-only reconciler.
    pub fn local_only(local: &'a L) -> Self {
        Self::new(local, None, None)
    }

    fn ready_remote(&self) -> Option<&'a dyn RemoteStore> {
        self.remote.filter(|remote| remote.is_ready())
    }

    /// Reads a whole collection, reconciling against the remote when ready.
    pub fn read_all<T: SyncRecord>(&self) -> RepoResult<SyncReport<Vec<T>>> {
        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(self.local.get_all()?));
        };

        match remote.get(&RemotePath::collection(T::COLLECTION)) {
            RemoteOutcome::Ok(snapshot) => {
                let items = self.apply_snapshot::<T>(snapshot)?;
                Ok(SyncReport::new(items, RemoteSync::Synced))
            }
            RemoteOutcome::Degraded => Ok(SyncReport::skipped(self.local.get_all()?)),
            RemoteOutcome::Err(err) => {
                warn!(
                    "event=reconcile module=sync status=degraded op=read_all collection={} error={}",
                    T::COLLECTION,
                    err
                );
                Ok(SyncReport::new(self.local.get_all()?, RemoteSync::Failed(err)))
            }
        }
    }

    /// Merges a full remote snapshot into the local collection and returns
    /// the resulting items.
    ///
    /// An absent or empty snapshot means every item was deleted everywhere:
    /// the local collection is emptied. A remote entry that fails to decode
    /// leaves its local copy in place and in the result.
    pub fn apply_snapshot<T: SyncRecord>(&self, snapshot: RemoteSnapshot) -> RepoResult<Vec<T>> {
        let Some(entries) = snapshot_entries(T::COLLECTION, snapshot) else {
            return self.local.get_all();
        };

        if entries.is_empty() {
            let removed = self.local.clear(T::COLLECTION)?;
            info!(
                "event=reconcile module=sync status=ok op=apply collection={} remote_items=0 pruned={}",
                T::COLLECTION,
                removed
            );
            return Ok(Vec::new());
        }

        let mut local_by_id: HashMap<String, T> = self
            .local
            .get_all::<T>()?
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect();
        let mut remote_ids: HashSet<String> = HashSet::with_capacity(entries.len());
        let mut merged = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            remote_ids.insert(key.clone());
            if value.is_null() {
                continue;
            }
            let remote_item: T = match serde_json::from_value(value) {
                Ok(item) => item,
                Err(err) => {
                    warn!(
                        "event=reconcile module=sync status=degraded op=apply collection={} id={} error_code=remote_item_invalid error={}",
                        T::COLLECTION,
                        key,
                        err
                    );
                    // Unreadable remote copy: the local one stays and is shown.
                    if let Some(local) = local_by_id.remove(&key) {
                        merged.push(local);
                    }
                    continue;
                }
            };
            remote_ids.insert(remote_item.id().to_string());
            let local = local_by_id.remove(remote_item.id());
            let item = T::merge_remote(remote_item, local.as_ref());
            self.local.put(&item)?;
            merged.push(item);
        }

        let mut pruned = 0usize;
        for id in local_by_id.keys() {
            if !remote_ids.contains(id) {
                self.local.delete(T::COLLECTION, id)?;
                pruned += 1;
            }
        }

        info!(
            "event=reconcile module=sync status=ok op=apply collection={} remote_items={} pruned={}",
            T::COLLECTION,
            merged.len(),
            pruned
        );
        Ok(merged)
    }

    /// Upserts locally, then writes the item's remote copy.
    pub fn save<T: SyncRecord>(&self, item: &T) -> RepoResult<SyncReport<()>> {
        self.local.put(item)?;

        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(()));
        };
        if !is_valid_remote_key(item.id()) {
            let err = RemoteError::InvalidKey(item.id().to_string());
            warn!(
                "event=reconcile module=sync status=degraded op=save collection={} error={}",
                T::COLLECTION,
                err
            );
            return Ok(SyncReport::new((), RemoteSync::Failed(err)));
        }

        let payload = match item.remote_copy(self.blobs) {
            RemoteOutcome::Ok(payload) => payload,
            RemoteOutcome::Degraded => {
                info!(
                    "event=reconcile module=sync status=skipped op=save collection={} id={} reason=no_blob_store",
                    T::COLLECTION,
                    item.id()
                );
                return Ok(SyncReport::skipped(()));
            }
            RemoteOutcome::Err(err) => return Ok(SyncReport::new((), RemoteSync::Failed(err))),
        };
        let value = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(err) => {
                let err = RemoteError::Decode(err.to_string());
                return Ok(SyncReport::new((), RemoteSync::Failed(err)));
            }
        };

        let outcome = remote.set(&RemotePath::item(T::COLLECTION, item.id()), &value);
        Ok(SyncReport::new((), outcome.into()))
    }

    /// Deletes locally, then removes the item's remote path.
    pub fn delete<T: SyncRecord>(&self, id: &str) -> RepoResult<SyncReport<()>> {
        self.local.delete(T::COLLECTION, id)?;

        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(()));
        };
        if !is_valid_remote_key(id) {
            let err = RemoteError::InvalidKey(id.to_string());
            return Ok(SyncReport::new((), RemoteSync::Failed(err)));
        }
        let outcome = remote.remove(&RemotePath::item(T::COLLECTION, id));
        Ok(SyncReport::new((), outcome.into()))
    }

    /// Empties the collection locally and remotely. Returns local removals.
    pub fn clear<T: SyncRecord>(&self) -> RepoResult<SyncReport<usize>> {
        let removed = self.local.clear(T::COLLECTION)?;

        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(removed));
        };
        let outcome = remote.remove(&RemotePath::collection(T::COLLECTION));
        Ok(SyncReport::new(removed, outcome.into()))
    }

    /// Reads one setting; a remote value wins unless the local value is
    /// inline media.
    pub fn read_setting(&self, key: &str) -> RepoResult<SyncReport<Option<String>>> {
        let local = self.local.get_setting(key)?;
        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(local));
        };

        match remote.get(&RemotePath::setting(key)) {
            RemoteOutcome::Ok(Some(Value::String(remote_value))) => {
                if local.as_deref().is_some_and(is_inline_content) {
                    return Ok(SyncReport::new(local, RemoteSync::Synced));
                }
                self.local.put_setting(key, Some(&remote_value))?;
                Ok(SyncReport::new(Some(remote_value), RemoteSync::Synced))
            }
            RemoteOutcome::Ok(_) => Ok(SyncReport::new(local, RemoteSync::Synced)),
            RemoteOutcome::Degraded => Ok(SyncReport::skipped(local)),
            RemoteOutcome::Err(err) => Ok(SyncReport::new(local, RemoteSync::Failed(err))),
        }
    }

    /// Writes one setting locally, then remotely. Inline media is offloaded
    /// first; the local value keeps the inline data.
    pub fn save_setting(&self, key: &str, value: Option<&str>) -> RepoResult<SyncReport<()>> {
        self.local.put_setting(key, value)?;

        let Some(remote) = self.ready_remote() else {
            return Ok(SyncReport::skipped(()));
        };
        let path = RemotePath::setting(key);
        let outcome = match value {
            None => remote.remove(&path),
            Some(inline) if is_inline_content(inline) => match self.blobs {
                Some(blobs) => match blobs.upload(inline, key, MediaKind::Image) {
                    RemoteOutcome::Ok(url) => remote.set(&path, &Value::String(url)),
                    RemoteOutcome::Degraded => RemoteOutcome::Degraded,
                    RemoteOutcome::Err(err) => RemoteOutcome::Err(err),
                },
                None => RemoteOutcome::Degraded,
            },
            Some(value) => remote.set(&path, &Value::String(value.to_string())),
        };
        Ok(SyncReport::new((), outcome.into()))
    }
}

/// Normalizes a snapshot into `id -> value` entries. Returns `None` when the
/// shape is unusable, in which case local state is left untouched.
fn snapshot_entries(
    collection: Collection,
    snapshot: RemoteSnapshot,
) -> Option<Map<String, Value>> {
    match snapshot {
        None => Some(Map::new()),
        Some(Value::Object(entries)) => Some(entries),
        // Sequential keys come back as arrays; re-key them by record id.
        Some(Value::Array(items)) => {
            let present = items.iter().filter(|item| !item.is_null()).count();
            let entries: Map<String, Value> = items
                .into_iter()
                .filter_map(|item| {
                    let id = item.get("id")?.as_str()?.to_string();
                    Some((id, item))
                })
                .collect();
            if present > 0 && entries.is_empty() {
                warn!(
                    "event=reconcile module=sync status=degraded op=apply collection={} error_code=unexpected_snapshot kind=array_without_ids items={}",
                    collection, present
                );
                return None;
            }
            Some(entries)
        }
        Some(other) => {
            warn!(
                "event=reconcile module=sync status=degraded op=apply collection={} error_code=unexpected_snapshot kind={}",
                collection,
                value_kind(&other)
            );
            None
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
