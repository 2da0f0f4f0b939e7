//! Listener lifetime handles.
//!
//! A [`Subscription`] is held by the consumer; the paired [`ListenerGuard`]
//! is held by whatever produces snapshots. Dropping or unsubscribing the
//! subscription flips the shared flag and the producer stops delivering.

use super::RemotePath;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    path: RemotePath,
}

#[derive(Debug, Clone)]
pub struct ListenerGuard {
    active: Arc<AtomicBool>,
}

/// Creates a linked subscription/guard pair for one listened path.
pub fn subscription_pair(path: RemotePath) -> (Subscription, ListenerGuard) {
    let active = Arc::new(AtomicBool::new(true));
    (
        Subscription {
            active: Arc::clone(&active),
            path,
        },
        ListenerGuard { active },
    )
}

impl Subscription {
    pub fn path(&self) -> &RemotePath {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.active.swap(false, Ordering::AcqRel) {
            debug!(
                "event=remote_listen module=remote status=stopped path={}",
                self.path
            );
        }
    }
}

impl ListenerGuard {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
