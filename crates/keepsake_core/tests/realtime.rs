mod common;

use common::{local_store, FakeRemote};
use keepsake_core::{
    setup_realtime_sync, Collection, LocalStore, Reconciler, RemoteOutcome, RemotePath,
    TodoItem,
};
use serde_json::json;
use std::time::Duration;

const WAIT: Duration = Duration::from_millis(200);

#[test]
fn listeners_deliver_current_and_later_snapshots() {
    let remote = FakeRemote::new();
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!({"t1": {"id": "t1", "text": "first"}}),
    );

    let realtime = setup_realtime_sync(&*remote).ok().unwrap();
    assert!(realtime.is_active());
    assert_eq!(remote.listener_count(), 2);

    let initial = realtime.wait_latest(Collection::Todos, WAIT).unwrap().unwrap();
    assert_eq!(initial["t1"]["text"], "first");
    assert_eq!(realtime.wait_latest(Collection::Memories, WAIT), Some(None));

    remote.seed(
        &RemotePath::item(Collection::Todos, "t2"),
        json!({"id": "t2", "text": "second"}),
    );
    remote.seed(
        &RemotePath::item(Collection::Todos, "t3"),
        json!({"id": "t3", "text": "third"}),
    );

    // Only the newest queued snapshot is returned.
    let latest = realtime.latest(Collection::Todos).unwrap().unwrap();
    assert_eq!(latest.as_object().unwrap().len(), 3);
    assert!(realtime.latest(Collection::Todos).is_none());
    assert!(realtime.latest(Collection::Memories).is_none());
}

#[test]
fn applying_a_snapshot_reconciles_local_state() {
    let remote = FakeRemote::new();
    let local = local_store();
    local.put(&common::todo("old", "removed elsewhere")).unwrap();

    let realtime = setup_realtime_sync(&*remote).ok().unwrap();
    remote.seed(
        &RemotePath::item(Collection::Todos, "new"),
        json!({"id": "new", "text": "added elsewhere"}),
    );

    let snapshot = realtime.wait_latest(Collection::Todos, WAIT).unwrap();
    let items = Reconciler::local_only(&local)
        .apply_snapshot::<TodoItem>(snapshot)
        .unwrap();
    assert_eq!(items, vec![common::todo("new", "added elsewhere")]);
    assert_eq!(local.get_all::<TodoItem>().unwrap(), items);
}

#[test]
fn unsubscribe_stops_delivery() {
    let remote = FakeRemote::new();
    let realtime = setup_realtime_sync(&*remote).ok().unwrap();
    realtime.unsubscribe();
    assert_eq!(remote.listener_count(), 0);

    remote.seed(
        &RemotePath::item(Collection::Todos, "t1"),
        json!({"id": "t1", "text": "unseen"}),
    );
    assert_eq!(remote.listener_count(), 0);
}

#[test]
fn dropping_realtime_sync_unsubscribes() {
    let remote = FakeRemote::new();
    {
        let _realtime = setup_realtime_sync(&*remote).ok().unwrap();
        assert_eq!(remote.listener_count(), 2);
    }
    assert_eq!(remote.listener_count(), 0);
}

#[test]
fn listener_setup_reports_remote_state() {
    let not_ready = FakeRemote::not_ready();
    assert!(matches!(
        setup_realtime_sync(&*not_ready),
        RemoteOutcome::Degraded
    ));

    let failing = FakeRemote::new();
    failing.set_failing(true);
    assert!(matches!(
        setup_realtime_sync(&*failing),
        RemoteOutcome::Err(_)
    ));
    assert_eq!(failing.listener_count(), 0);
}
