//! Application shell: in-memory state for the views and the user intents
//! that mutate it.
//!
//! # Responsibility
//! - Hold the memories, todos and avatars the presentation layer renders.
//! - Route every intent through [`Reconciler`](crate::sync::reconcile::Reconciler).
//! - Export and import whole-dataset backups.
//! - Drain realtime snapshots into state.
//!
//! # Invariants
//! - `memories()` is always sorted by date descending.
//! - State never holds two records with the same id.
//! - Import validates the document before asking for confirmation, and
//!   nothing is deleted unless the confirmation returns `true`.
//! - A storage failure partway through an import reloads state from the
//!   stores before the error is returned.

use super::context::AppContext;
use crate::model::backup::{BackupDocument, BackupError, BackupSummary};
use crate::model::memory::{sort_memories, MediaKind, Memory};
use crate::model::setting::{avatar_key, is_avatar_key};
use crate::model::timer::Elapsed;
use crate::model::todo::{TodoCategory, TodoItem};
use crate::model::{Collection, Record};
use crate::remote::RemoteOutcome;
use crate::repo::local_store::RepoError;
use crate::sync::realtime::{setup_realtime_sync, RealtimeSync};
use crate::sync::{RemoteSync, SyncReport};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Timer,
    Gallery,
    Todos,
    Settings,
}

#[derive(Debug)]
pub enum ShellError {
    Repo(RepoError),
    Backup(BackupError),
    /// The user declined the destructive import.
    ImportCancelled,
    NotFound { collection: Collection, id: String },
}

impl Display for ShellError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Backup(err) => write!(f, "{err}"),
            Self::ImportCancelled => write!(f, "import cancelled"),
            Self::NotFound { collection, id } => write!(f, "{collection} item not found: {id}"),
        }
    }
}

impl Error for ShellError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Backup(err) => Some(err),
            Self::ImportCancelled | Self::NotFound { .. } => None,
        }
    }
}

impl From<RepoError> for ShellError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<BackupError> for ShellError {
    fn from(value: BackupError) -> Self {
        Self::Backup(value)
    }
}

pub type ShellResult<T> = Result<T, ShellError>;

/// Outcome of a confirmed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub memories: usize,
    pub todos: usize,
    /// Remote writes that were attempted and failed.
    pub remote_failures: usize,
}

pub struct AppShell {
    ctx: AppContext,
    view: View,
    memories: Vec<Memory>,
    todos: Vec<TodoItem>,
    avatars: BTreeMap<String, Option<String>>,
    realtime: Option<RealtimeSync>,
}

impl AppShell {
    pub fn new(ctx: AppContext) -> Self {
        let avatars = ctx
            .config()
            .partners
            .iter()
            .map(|partner| (avatar_key(partner), None))
            .collect();
        Self {
            ctx,
            view: View::Timer,
            memories: Vec::new(),
            todos: Vec::new(),
            avatars,
            realtime: None,
        }
    }

    /// Loads all state and, when the remote is ready, subscribes to live
    /// updates.
    pub fn start(&mut self) -> ShellResult<()> {
        self.load()?;
        if let Some(remote) = self.ctx.remote() {
            match setup_realtime_sync(remote) {
                RemoteOutcome::Ok(realtime) => self.realtime = Some(realtime),
                RemoteOutcome::Degraded => {}
                RemoteOutcome::Err(err) => {
                    warn!("event=remote_listen module=service status=degraded error={err}");
                }
            }
        }
        Ok(())
    }

    /// Re-reads both collections and the avatars through reconciliation.
    pub fn load(&mut self) -> ShellResult<()> {
        let reconciler = self.ctx.reconciler();
        let memories = reconciler.read_all::<Memory>()?;
        let todos = reconciler.read_all::<TodoItem>()?;
        let mut avatars = BTreeMap::new();
        for key in self.avatars.keys() {
            avatars.insert(key.clone(), reconciler.read_setting(key)?.value);
        }

        info!(
            "event=app_load module=service status=ok memories={} todos={} memories_remote={} todos_remote={}",
            memories.value.len(),
            todos.value.len(),
            remote_label(&memories.remote),
            remote_label(&todos.remote)
        );
        self.avatars = avatars;
        self.replace_memories(memories.value);
        self.replace_todos(todos.value);
        Ok(())
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }

    pub fn todos(&self) -> &[TodoItem] {
        &self.todos
    }

    pub fn avatar(&self, partner: &str) -> Option<&str> {
        self.avatars.get(&avatar_key(partner))?.as_deref()
    }

    /// Short text for the sync status indicator.
    pub fn status_label(&self) -> &'static str {
        if self.ctx.sync_state().is_remote_active() {
            "cloud sync on"
        } else {
            "local only"
        }
    }

    /// Time since (or until) the configured anniversary.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Elapsed {
        Elapsed::between(&self.ctx.config().anniversary, &now)
    }

    pub fn add_memory(
        &mut self,
        kind: MediaKind,
        content: impl Into<String>,
        caption: Option<String>,
        date: Option<String>,
    ) -> ShellResult<SyncReport<Memory>> {
        let date = date.unwrap_or_else(|| iso_now(Utc::now()));
        let memory = Memory::new(kind, content, caption, date);
        let report = self.ctx.reconciler().save(&memory)?;
        upsert_front(&mut self.memories, memory.clone());
        sort_memories(&mut self.memories);
        Ok(report.map(|()| memory))
    }

    pub fn edit_memory(
        &mut self,
        id: &str,
        caption: Option<String>,
        date: impl Into<String>,
    ) -> ShellResult<SyncReport<Memory>> {
        let mut memory = find(&self.memories, id)?.clone();
        memory.caption = caption;
        memory.date = date.into();
        let report = self.ctx.reconciler().save(&memory)?;
        upsert_front(&mut self.memories, memory.clone());
        sort_memories(&mut self.memories);
        Ok(report.map(|()| memory))
    }

    pub fn delete_memory(&mut self, id: &str) -> ShellResult<SyncReport<()>> {
        let report = self.ctx.reconciler().delete::<Memory>(id)?;
        self.memories.retain(|memory| memory.id != id);
        Ok(report)
    }

    /// Adds a todo at the top of the list.
    pub fn add_todo(
        &mut self,
        text: impl Into<String>,
        category: Option<TodoCategory>,
        notes: Option<String>,
    ) -> ShellResult<SyncReport<TodoItem>> {
        let mut item = TodoItem::new(text);
        item.category = category;
        item.notes = notes;
        let report = self.ctx.reconciler().save(&item)?;
        upsert_front(&mut self.todos, item.clone());
        Ok(report.map(|()| item))
    }

    pub fn toggle_todo(&mut self, id: &str) -> ShellResult<SyncReport<TodoItem>> {
        let mut item = find(&self.todos, id)?.clone();
        item.toggle();
        self.store_todo(item)
    }

    pub fn edit_todo(
        &mut self,
        id: &str,
        text: impl Into<String>,
        notes: Option<String>,
        category: Option<TodoCategory>,
    ) -> ShellResult<SyncReport<TodoItem>> {
        let mut item = find(&self.todos, id)?.clone();
        item.text = text.into();
        item.notes = notes;
        item.category = category;
        self.store_todo(item)
    }

    pub fn delete_todo(&mut self, id: &str) -> ShellResult<SyncReport<()>> {
        let report = self.ctx.reconciler().delete::<TodoItem>(id)?;
        self.todos.retain(|item| item.id != id);
        Ok(report)
    }

    /// Sets or clears one partner's avatar.
    pub fn set_avatar(
        &mut self,
        partner: &str,
        value: Option<String>,
    ) -> ShellResult<SyncReport<()>> {
        let key = avatar_key(partner);
        let report = self.ctx.reconciler().save_setting(&key, value.as_deref())?;
        self.avatars.insert(key, value);
        Ok(report)
    }

    /// Snapshot of the current in-memory state.
    pub fn export_backup(&self, now: DateTime<Utc>) -> BackupDocument {
        let document = BackupDocument::new(
            self.memories.clone(),
            self.todos.clone(),
            self.avatars.clone(),
            now,
        );
        info!(
            "event=export_backup module=service status=ok memories={} todos={}",
            document.memories.len(),
            document.todos.len()
        );
        document
    }

    pub fn export_backup_json(&self, now: DateTime<Utc>) -> ShellResult<String> {
        Ok(self.export_backup(now).to_json_pretty()?)
    }

    /// Replaces both collections with the contents of a backup.
    ///
    /// `confirm` receives the item counts and must return `true` for the
    /// destructive part to run.
    pub fn import_backup(
        &mut self,
        raw: &str,
        confirm: impl FnOnce(&BackupSummary) -> bool,
    ) -> ShellResult<ImportReport> {
        let document = match BackupDocument::from_json(raw) {
            Ok(document) => document,
            Err(err) => {
                warn!("event=import_backup module=service status=error error={err}");
                return Err(err.into());
            }
        };
        let summary = document.summary();
        if !confirm(&summary) {
            info!("event=import_backup module=service status=cancelled");
            return Err(ShellError::ImportCancelled);
        }

        let remote_failures = match self.write_imported(&document) {
            Ok(remote_failures) => remote_failures,
            Err(err) => {
                warn!("event=import_backup module=service status=error error={err}");
                // Collections may already be cleared; show what storage holds.
                if let Err(reload_err) = self.load() {
                    warn!("event=app_load module=service status=error error={reload_err}");
                }
                return Err(err);
            }
        };

        let mut avatars = self.avatars.clone();
        for (key, value) in document.settings {
            if is_avatar_key(&key) {
                avatars.insert(key, value);
            }
        }
        self.avatars = avatars;
        self.replace_memories(document.memories);
        self.replace_todos(document.todos);

        info!(
            "event=import_backup module=service status=ok memories={} todos={} remote_failures={}",
            summary.memories, summary.todos, remote_failures
        );
        Ok(ImportReport {
            memories: summary.memories,
            todos: summary.todos,
            remote_failures,
        })
    }

    /// Applies the newest pending realtime snapshot of each collection.
    ///
    /// Returns whether any state changed.
    pub fn drain_remote_updates(&mut self) -> ShellResult<bool> {
        let Some(realtime) = self.realtime.as_ref() else {
            return Ok(false);
        };
        let memories_snapshot = realtime.latest(Collection::Memories);
        let todos_snapshot = realtime.latest(Collection::Todos);

        let mut changed = false;
        if let Some(snapshot) = memories_snapshot {
            let items = self.ctx.reconciler().apply_snapshot::<Memory>(snapshot)?;
            self.replace_memories(items);
            changed = true;
        }
        if let Some(snapshot) = todos_snapshot {
            let items = self.ctx.reconciler().apply_snapshot::<TodoItem>(snapshot)?;
            self.replace_todos(items);
            changed = true;
        }
        Ok(changed)
    }

    pub fn is_live(&self) -> bool {
        self.realtime.as_ref().is_some_and(RealtimeSync::is_active)
    }

    /// Stops live updates and releases the session.
    pub fn shutdown(self) {
        if let Some(realtime) = self.realtime {
            realtime.unsubscribe();
        }
        self.ctx.shutdown();
    }

    /// Clears both collections and writes the imported records. Returns the
    /// number of failed remote writes.
    fn write_imported(&self, document: &BackupDocument) -> ShellResult<usize> {
        let reconciler = self.ctx.reconciler();
        let mut remote_failures = 0usize;
        let mut track = |remote: RemoteSync| {
            if matches!(remote, RemoteSync::Failed(_)) {
                remote_failures += 1;
            }
        };

        track(reconciler.clear::<Memory>()?.remote);
        track(reconciler.clear::<TodoItem>()?.remote);
        for memory in &document.memories {
            track(reconciler.save(memory)?.remote);
        }
        for item in &document.todos {
            track(reconciler.save(item)?.remote);
        }
        for (key, value) in &document.settings {
            if is_avatar_key(key) {
                track(reconciler.save_setting(key, value.as_deref())?.remote);
            }
        }
        Ok(remote_failures)
    }

    fn store_todo(&mut self, item: TodoItem) -> ShellResult<SyncReport<TodoItem>> {
        let report = self.ctx.reconciler().save(&item)?;
        if let Some(slot) = self.todos.iter_mut().find(|todo| todo.id == item.id) {
            *slot = item.clone();
        }
        Ok(report.map(|()| item))
    }

    fn replace_memories(&mut self, items: Vec<Memory>) {
        self.memories = dedup_by_id(items);
        sort_memories(&mut self.memories);
    }

    fn replace_todos(&mut self, items: Vec<TodoItem>) {
        self.todos = dedup_by_id(items);
    }
}

fn find<'a, T: Record>(items: &'a [T], id: &str) -> ShellResult<&'a T> {
    items
        .iter()
        .find(|item| item.id() == id)
        .ok_or_else(|| ShellError::NotFound {
            collection: T::COLLECTION,
            id: id.to_string(),
        })
}

/// Replaces the record with the same id, or prepends it.
fn upsert_front<T: Record>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|existing| existing.id() == item.id()) {
        Some(slot) => *slot = item,
        None => items.insert(0, item),
    }
}

/// Keeps the first record per id.
fn dedup_by_id<T: Record>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().to_string()))
        .collect()
}

fn iso_now(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn remote_label(remote: &RemoteSync) -> &'static str {
    match remote {
        RemoteSync::Synced => "synced",
        RemoteSync::Skipped => "skipped",
        RemoteSync::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::{dedup_by_id, upsert_front};
    use crate::model::todo::TodoItem;

    #[test]
    fn upsert_front_replaces_or_prepends() {
        let first = TodoItem::new("first");
        let second = TodoItem::new("second");
        let mut items = vec![first.clone()];

        upsert_front(&mut items, second.clone());
        assert_eq!(items[0].id, second.id);

        let mut renamed = first.clone();
        renamed.text = "renamed".to_string();
        upsert_front(&mut items, renamed);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].text, "renamed");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let item = TodoItem::new("echo");
        let mut echoed = item.clone();
        echoed.completed = true;
        let items = dedup_by_id(vec![item.clone(), echoed]);
        assert_eq!(items, vec![item]);
    }
}
