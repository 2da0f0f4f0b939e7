//! Live subscription plumbing: one single-consumer channel per collection.
//!
//! Listener threads push full collection snapshots; the application shell
//! drains them on its own schedule and applies only the newest one, since
//! every snapshot supersedes the ones before it.

use crate::model::Collection;
use crate::remote::{RemoteOutcome, RemotePath, RemoteSnapshot, RemoteStore, Subscription};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::info;
use std::time::Duration;

struct CollectionFeed {
    collection: Collection,
    receiver: Receiver<RemoteSnapshot>,
    subscription: Subscription,
}

/// Active listeners for both collections. Dropping it unsubscribes both.
pub struct RealtimeSync {
    feeds: Vec<CollectionFeed>,
}

/// Registers one listener per collection.
///
/// If any listener cannot be registered, the ones already registered are
/// torn down and the failing outcome is returned.
pub fn setup_realtime_sync(remote: &dyn RemoteStore) -> RemoteOutcome<RealtimeSync> {
    if !remote.is_ready() {
        return RemoteOutcome::Degraded;
    }

    let mut feeds = Vec::with_capacity(Collection::ALL.len());
    for collection in Collection::ALL {
        let (sender, receiver) = crossbeam_channel::unbounded();
        match remote.listen(&RemotePath::collection(collection), sender) {
            RemoteOutcome::Ok(subscription) => feeds.push(CollectionFeed {
                collection,
                receiver,
                subscription,
            }),
            RemoteOutcome::Degraded => return RemoteOutcome::Degraded,
            RemoteOutcome::Err(err) => return RemoteOutcome::Err(err),
        }
    }

    info!(
        "event=remote_listen module=sync status=ok collections={}",
        feeds.len()
    );
    RemoteOutcome::Ok(RealtimeSync { feeds })
}

impl RealtimeSync {
    fn feed(&self, collection: Collection) -> Option<&CollectionFeed> {
        self.feeds.iter().find(|feed| feed.collection == collection)
    }

    /// Drains pending snapshots for `collection`, returning the newest.
    pub fn latest(&self, collection: Collection) -> Option<RemoteSnapshot> {
        self.feed(collection)?.receiver.try_iter().last()
    }

    /// Blocks up to `timeout` for the next snapshot, then drains anything
    /// queued behind it.
    pub fn wait_latest(&self, collection: Collection, timeout: Duration) -> Option<RemoteSnapshot> {
        let feed = self.feed(collection)?;
        match feed.receiver.recv_timeout(timeout) {
            Ok(first) => Some(feed.receiver.try_iter().last().unwrap_or(first)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.feeds.iter().all(|feed| feed.subscription.is_active())
    }

    /// Tears down every collection listener.
    pub fn unsubscribe(self) {
        for feed in self.feeds {
            feed.subscription.unsubscribe();
        }
        info!("event=remote_listen module=sync status=stopped");
    }
}
