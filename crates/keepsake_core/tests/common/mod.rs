#![allow(dead_code)]

use crossbeam_channel::Sender;
use keepsake_core::remote::inline::InlineMedia;
use keepsake_core::remote::{subscription_pair, ListenerGuard};
use keepsake_core::{
    BlobStore, MediaKind, Memory, RemoteError, RemoteOutcome, RemotePath, RemoteSnapshot,
    RemoteStore, SqliteLocalStore, Subscription, TodoItem,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-process realtime database: a JSON tree with listener fan-out.
pub struct FakeRemote {
    ready: bool,
    root: Mutex<Value>,
    listeners: Mutex<Vec<Listener>>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

struct Listener {
    path: RemotePath,
    sink: Sender<RemoteSnapshot>,
    guard: ListenerGuard,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_ready(true))
    }

    pub fn not_ready() -> Arc<Self> {
        Arc::new(Self::with_ready(false))
    }

    fn with_ready(ready: bool) -> Self {
        Self {
            ready,
            root: Mutex::new(Value::Object(Map::new())),
            listeners: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|listener| listener.guard.is_active());
        listeners.len()
    }

    /// Writes directly, as another device would, and notifies listeners.
    pub fn seed(&self, path: &RemotePath, value: Value) {
        self.write(path, Some(value));
    }

    pub fn read(&self, path: &RemotePath) -> RemoteSnapshot {
        let root = self.root.lock().unwrap();
        let mut node = &*root;
        for segment in path.segments() {
            node = node.get(segment)?;
        }
        match node {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            other => Some(other.clone()),
        }
    }

    fn write(&self, path: &RemotePath, value: Option<Value>) {
        {
            let mut root = self.root.lock().unwrap();
            let segments: Vec<&str> = path.segments().collect();
            let Some((last, parents)) = segments.split_last() else {
                return;
            };
            let mut node = &mut *root;
            for segment in parents {
                let map = node.as_object_mut().unwrap();
                node = map
                    .entry(segment.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !node.is_object() {
                    *node = Value::Object(Map::new());
                }
            }
            let map = node.as_object_mut().unwrap();
            match value {
                Some(value) if !value.is_null() => {
                    map.insert(last.to_string(), value);
                }
                _ => {
                    map.remove(*last);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.notify(path);
    }

    fn notify(&self, changed: &RemotePath) {
        let targets: Vec<(RemotePath, Sender<RemoteSnapshot>)> = {
            let mut listeners = self.listeners.lock().unwrap();
            listeners.retain(|listener| listener.guard.is_active());
            listeners
                .iter()
                .filter(|listener| {
                    changed.is_within(&listener.path) || listener.path.is_within(changed)
                })
                .map(|listener| (listener.path.clone(), listener.sink.clone()))
                .collect()
        };
        for (path, sink) in targets {
            let _ = sink.send(self.read(&path));
        }
    }

    fn injected<T>(&self) -> Option<RemoteOutcome<T>> {
        self.failing
            .load(Ordering::SeqCst)
            .then(|| RemoteOutcome::Err(RemoteError::Transport("injected failure".to_string())))
    }
}

impl RemoteStore for FakeRemote {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn get(&self, path: &RemotePath) -> RemoteOutcome<RemoteSnapshot> {
        if let Some(failure) = self.injected() {
            return failure;
        }
        RemoteOutcome::Ok(self.read(path))
    }

    fn set(&self, path: &RemotePath, value: &Value) -> RemoteOutcome<()> {
        if let Some(failure) = self.injected() {
            return failure;
        }
        self.write(path, Some(value.clone()));
        RemoteOutcome::Ok(())
    }

    fn remove(&self, path: &RemotePath) -> RemoteOutcome<()> {
        if let Some(failure) = self.injected() {
            return failure;
        }
        self.write(path, None);
        RemoteOutcome::Ok(())
    }

    fn listen(
        &self,
        path: &RemotePath,
        sink: Sender<RemoteSnapshot>,
    ) -> RemoteOutcome<Subscription> {
        if let Some(failure) = self.injected() {
            return failure;
        }
        let (subscription, guard) = subscription_pair(path.clone());
        let _ = sink.send(self.read(path));
        self.listeners.lock().unwrap().push(Listener {
            path: path.clone(),
            sink,
            guard,
        });
        RemoteOutcome::Ok(subscription)
    }
}

/// Blob store returning deterministic URLs.
pub struct FakeBlobs {
    failing: AtomicBool,
    uploads: Mutex<Vec<String>>,
}

impl FakeBlobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

impl BlobStore for FakeBlobs {
    fn upload(&self, inline: &str, id: &str, kind: MediaKind) -> RemoteOutcome<String> {
        if self.failing.load(Ordering::SeqCst) {
            return RemoteOutcome::Err(RemoteError::Transport("upload refused".to_string()));
        }
        let Some(media) = InlineMedia::parse(inline) else {
            return RemoteOutcome::Err(RemoteError::Decode("not inline".to_string()));
        };
        let url = format!("https://blobs.test/{id}.{}", media.extension(kind));
        self.uploads.lock().unwrap().push(url.clone());
        RemoteOutcome::Ok(url)
    }
}

pub const PNG_DATA: &str = "data:image/png;base64,aGVsbG8=";

pub fn local_store() -> SqliteLocalStore {
    SqliteLocalStore::open_in_memory().unwrap()
}

pub fn memory(id: &str, date: &str) -> Memory {
    Memory {
        id: id.to_string(),
        kind: MediaKind::Image,
        content: format!("https://cdn.test/{id}.jpg"),
        caption: Some(format!("caption {id}")),
        date: date.to_string(),
    }
}

pub fn inline_memory(id: &str, date: &str) -> Memory {
    Memory {
        content: PNG_DATA.to_string(),
        ..memory(id, date)
    }
}

pub fn todo(id: &str, text: &str) -> TodoItem {
    TodoItem {
        id: id.to_string(),
        text: text.to_string(),
        completed: false,
        notes: None,
        category: None,
    }
}

pub fn as_remote(remote: &Arc<FakeRemote>) -> Arc<dyn RemoteStore> {
    Arc::clone(remote) as Arc<dyn RemoteStore>
}

pub fn as_blobs(blobs: &Arc<FakeBlobs>) -> Arc<dyn BlobStore> {
    Arc::clone(blobs) as Arc<dyn BlobStore>
}
