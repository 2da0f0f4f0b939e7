mod common;

use common::{inline_memory, local_store, memory, todo, FakeBlobs, FakeRemote, PNG_DATA};
use keepsake_core::{
    Collection, LocalStore, Memory, Reconciler, RemoteError, RemotePath, RemoteSync,
    SqliteLocalStore, TodoItem,
};
use serde_json::json;

fn reconciler<'a>(
    local: &'a SqliteLocalStore,
    remote: &'a FakeRemote,
    blobs: &'a FakeBlobs,
) -> Reconciler<'a, SqliteLocalStore> {
    Reconciler::new(local, Some(remote), Some(blobs))
}

#[test]
fn local_only_save_then_read_returns_item() {
    let local = local_store();
    let sync = Reconciler::local_only(&local);

    let report = sync.save(&todo("t1", "paint the kitchen")).unwrap();
    assert_eq!(report.remote, RemoteSync::Skipped);

    let items = sync.read_all::<TodoItem>().unwrap();
    assert_eq!(items.remote, RemoteSync::Skipped);
    assert_eq!(items.value, vec![todo("t1", "paint the kitchen")]);
}

#[test]
fn save_is_idempotent_on_both_sides() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);
    let item = todo("t1", "sunrise hike");

    sync.save(&item).unwrap();
    sync.save(&item).unwrap();

    let items = sync.read_all::<TodoItem>().unwrap().value;
    assert_eq!(items, vec![item]);
    let snapshot = remote.read(&RemotePath::collection(Collection::Todos)).unwrap();
    assert_eq!(snapshot.as_object().unwrap().len(), 1);
}

#[test]
fn delete_removes_item_from_later_reads() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);
    sync.save(&todo("t1", "keep")).unwrap();
    sync.save(&todo("t2", "drop")).unwrap();

    let report = sync.delete::<TodoItem>("t2").unwrap();
    assert!(report.remote.is_synced());

    let ids: Vec<String> = sync
        .read_all::<TodoItem>()
        .unwrap()
        .value
        .into_iter()
        .map(|item| item.id)
        .collect();
    assert_eq!(ids, vec!["t1"]);
    assert!(remote.read(&RemotePath::item(Collection::Todos, "t2")).is_none());
}

#[test]
fn empty_remote_collection_empties_local() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    local.put(&todo("t1", "stale")).unwrap();
    local.put(&memory("m1", "2024-01-01")).unwrap();

    let sync = reconciler(&local, &remote, &blobs);
    let todos = sync.read_all::<TodoItem>().unwrap();
    assert!(todos.remote.is_synced());
    assert!(todos.value.is_empty());
    assert!(local.get_all::<TodoItem>().unwrap().is_empty());

    // The other collection is reconciled on its own read.
    assert_eq!(local.get_all::<Memory>().unwrap().len(), 1);
    assert!(sync.read_all::<Memory>().unwrap().value.is_empty());
}

#[test]
fn read_all_prunes_local_items_missing_remotely() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    local.put(&todo("gone", "deleted on the other phone")).unwrap();
    local.put(&todo("kept", "old text")).unwrap();
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!({
            "kept": {"id": "kept", "text": "new text", "completed": true},
            "fresh": {"id": "fresh", "text": "added remotely", "category": "travel"}
        }),
    );

    let sync = reconciler(&local, &remote, &blobs);
    let mut items = sync.read_all::<TodoItem>().unwrap().value;
    items.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "fresh");
    assert_eq!(items[1].text, "new text");
    assert!(items[1].completed);
    assert!(local.get::<TodoItem>("gone").unwrap().is_none());
    assert_eq!(local.get_all::<TodoItem>().unwrap().len(), 2);
}

#[test]
fn malformed_remote_items_are_skipped() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!({
            "ok": {"id": "ok", "text": "valid"},
            "bad": {"id": "bad", "completed": "maybe"}
        }),
    );

    let items = reconciler(&local, &remote, &blobs)
        .read_all::<TodoItem>()
        .unwrap()
        .value;
    assert_eq!(items, vec![todo("ok", "valid")]);
}

#[test]
fn unreadable_remote_copy_keeps_and_returns_local_copy() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    local.put(&todo("bad", "local text")).unwrap();
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!({
            "ok": {"id": "ok", "text": "valid"},
            "bad": {"id": "bad", "completed": "maybe"}
        }),
    );

    let mut items = reconciler(&local, &remote, &blobs)
        .read_all::<TodoItem>()
        .unwrap()
        .value;
    items.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(items, vec![todo("bad", "local text"), todo("ok", "valid")]);
    assert_eq!(
        local.get::<TodoItem>("bad").unwrap(),
        Some(todo("bad", "local text"))
    );
}

#[test]
fn array_snapshot_without_ids_leaves_local_untouched() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    local.put(&todo("t1", "keep me")).unwrap();
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!([{"text": "no id"}, {"text": "also none"}]),
    );

    let items = reconciler(&local, &remote, &blobs)
        .read_all::<TodoItem>()
        .unwrap()
        .value;
    assert_eq!(items, vec![todo("t1", "keep me")]);
    assert_eq!(local.get_all::<TodoItem>().unwrap().len(), 1);
}

#[test]
fn inline_memory_is_offloaded_but_kept_inline_locally() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);

    let report = sync.save(&inline_memory("m1", "2024-02-14")).unwrap();
    assert!(report.remote.is_synced());
    assert_eq!(blobs.uploads(), vec!["https://blobs.test/m1.png"]);

    let remote_copy = remote
        .read(&RemotePath::item(Collection::Memories, "m1"))
        .unwrap();
    assert_eq!(remote_copy["content"], "https://blobs.test/m1.png");
    assert_eq!(remote_copy["type"], "image");

    // Reading back merges the remote copy but keeps local inline media.
    let items = sync.read_all::<Memory>().unwrap().value;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, PNG_DATA);
}

#[test]
fn failed_upload_skips_remote_write_but_keeps_local() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    blobs.set_failing(true);
    let sync = reconciler(&local, &remote, &blobs);

    let report = sync.save(&inline_memory("m1", "2024-02-14")).unwrap();
    assert!(matches!(report.remote, RemoteSync::Failed(RemoteError::Transport(_))));
    assert_eq!(remote.write_count(), 0);
    assert!(local.get::<Memory>("m1").unwrap().is_some());
}

#[test]
fn inline_memory_without_blob_store_stays_local() {
    let (local, remote) = (local_store(), FakeRemote::new());
    let sync = Reconciler::new(&local, Some(&*remote), None);

    let report = sync.save(&inline_memory("m1", "2024-02-14")).unwrap();
    assert_eq!(report.remote, RemoteSync::Skipped);
    assert_eq!(remote.write_count(), 0);
    assert_eq!(local.get::<Memory>("m1").unwrap().unwrap().content, PNG_DATA);
}

#[test]
fn remote_failure_is_reported_next_to_local_success() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    remote.set_failing(true);
    let sync = reconciler(&local, &remote, &blobs);

    let report = sync.save(&todo("t1", "offline")).unwrap();
    assert!(matches!(report.remote, RemoteSync::Failed(_)));

    let items = sync.read_all::<TodoItem>().unwrap();
    assert!(matches!(items.remote, RemoteSync::Failed(_)));
    assert_eq!(items.value, vec![todo("t1", "offline")]);
}

#[test]
fn remote_that_is_not_ready_is_never_called() {
    let (local, remote, blobs) = (local_store(), FakeRemote::not_ready(), FakeBlobs::new());
    remote.seed(
        &RemotePath::collection(Collection::Todos),
        json!({"r1": {"id": "r1", "text": "remote only"}}),
    );
    let writes_before = remote.write_count();
    let sync = reconciler(&local, &remote, &blobs);

    assert_eq!(sync.save(&todo("t1", "local")).unwrap().remote, RemoteSync::Skipped);
    let items = sync.read_all::<TodoItem>().unwrap();
    assert_eq!(items.remote, RemoteSync::Skipped);
    assert_eq!(items.value, vec![todo("t1", "local")]);
    assert_eq!(remote.write_count(), writes_before);
}

#[test]
fn two_devices_saving_different_items_both_survive() {
    let remote = FakeRemote::new();
    let blobs = FakeBlobs::new();
    let (phone_a, phone_b) = (local_store(), local_store());

    // Both devices read the same (empty) state before writing.
    reconciler(&phone_a, &remote, &blobs).read_all::<TodoItem>().unwrap();
    reconciler(&phone_b, &remote, &blobs).read_all::<TodoItem>().unwrap();

    reconciler(&phone_a, &remote, &blobs)
        .save(&todo("a", "from jerry"))
        .unwrap();
    reconciler(&phone_b, &remote, &blobs)
        .save(&todo("b", "from claire"))
        .unwrap();

    let mut ids: Vec<String> = reconciler(&phone_a, &remote, &blobs)
        .read_all::<TodoItem>()
        .unwrap()
        .value
        .into_iter()
        .map(|item| item.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn clear_empties_collection_everywhere() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);
    sync.save(&todo("t1", "one")).unwrap();
    sync.save(&todo("t2", "two")).unwrap();

    let report = sync.clear::<TodoItem>().unwrap();
    assert_eq!(report.value, 2);
    assert!(report.remote.is_synced());
    assert!(remote.read(&RemotePath::collection(Collection::Todos)).is_none());
}

#[test]
fn invalid_remote_key_keeps_local_write() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);

    let report = sync.save(&todo("a.b", "dotted id")).unwrap();
    assert!(matches!(report.remote, RemoteSync::Failed(RemoteError::InvalidKey(_))));
    assert!(local.get::<TodoItem>("a.b").unwrap().is_some());
    assert_eq!(remote.write_count(), 0);
}

#[test]
fn settings_prefer_remote_values_except_local_inline_media() {
    let (local, remote, blobs) = (local_store(), FakeRemote::new(), FakeBlobs::new());
    let sync = reconciler(&local, &remote, &blobs);

    remote.seed(&RemotePath::setting("avatar_jerry"), json!("https://cdn.test/j.jpg"));
    let report = sync.read_setting("avatar_jerry").unwrap();
    assert_eq!(report.value.as_deref(), Some("https://cdn.test/j.jpg"));
    assert_eq!(
        local.get_setting("avatar_jerry").unwrap().as_deref(),
        Some("https://cdn.test/j.jpg")
    );

    sync.save_setting("avatar_claire", Some(PNG_DATA)).unwrap();
    assert_eq!(
        remote.read(&RemotePath::setting("avatar_claire")),
        Some(json!("https://blobs.test/avatar_claire.png"))
    );
    let report = sync.read_setting("avatar_claire").unwrap();
    assert_eq!(report.value.as_deref(), Some(PNG_DATA));

    sync.save_setting("avatar_claire", None).unwrap();
    assert!(remote.read(&RemotePath::setting("avatar_claire")).is_none());
    assert_eq!(local.get_setting("avatar_claire").unwrap(), None);
}
