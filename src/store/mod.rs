//! Storage abstraction for taskdesk.
//!
//! The [`Store`] trait is the storage port: it defines every entity
//! operation the CLI and HTTP façade need, enabling pluggable backends
//! (SQLite, flat JSON files). The trait is the sole mutator and reader of
//! the three entity collections — id assignment, default population,
//! timestamping, and tag decoding all happen behind it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Error contract
//!
//! A missing id on read/update/delete is a normal result (`Ok(None)` /
//! `Ok(false)`), never an error. An unreachable file or database is a fatal
//! `anyhow` error surfaced to the caller.

pub mod json;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::models::{
    NewNote, NewPerson, NewTask, Note, NotePatch, Person, PersonPatch, Stats, Task, TaskFilter,
    TaskPatch,
};

/// Abstract storage backend.
///
/// Operations are uniform across the three entity kinds: list, get, create,
/// update (patch merge), delete, plus substring search for tasks and notes
/// and a full-rescan stats aggregate.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- tasks ----

    /// List tasks matching the filter, in the configured listing order.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    async fn get_task(&self, id: i64) -> Result<Option<Task>>;

    /// Assign the next id, apply defaults, persist, and return the stored
    /// task. Callers validate the payload first.
    async fn create_task(&self, new: NewTask) -> Result<Task>;

    /// Merge the patch into the task. Returns `None` when the id does not
    /// exist.
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Option<Task>>;

    /// Remove the task. Returns whether a record was actually removed;
    /// deleting a missing id is an idempotent no-op.
    async fn delete_task(&self, id: i64) -> Result<bool>;

    /// Case-insensitive substring search over title + description. An empty
    /// query matches everything; ordering is the unfiltered list ordering.
    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>>;

    // ---- notes ----

    async fn list_notes(&self) -> Result<Vec<Note>>;
    async fn get_note(&self, id: i64) -> Result<Option<Note>>;
    async fn create_note(&self, new: NewNote) -> Result<Note>;
    async fn update_note(&self, id: i64, patch: &NotePatch) -> Result<Option<Note>>;
    async fn delete_note(&self, id: i64) -> Result<bool>;

    /// Case-insensitive substring search over title + content.
    async fn search_notes(&self, query: &str) -> Result<Vec<Note>>;

    // ---- people ----

    /// List people ordered by name ascending.
    async fn list_people(&self) -> Result<Vec<Person>>;
    async fn get_person(&self, id: i64) -> Result<Option<Person>>;
    async fn create_person(&self, new: NewPerson) -> Result<Person>;
    async fn update_person(&self, id: i64, patch: &PersonPatch) -> Result<Option<Person>>;

    /// Deleting a person never touches tasks that reference it; a dangling
    /// `assigned_to` is tolerated.
    async fn delete_person(&self, id: i64) -> Result<bool>;

    // ---- aggregates ----

    /// Aggregate counts over the full task collection, recomputed by
    /// rescanning on every call.
    async fn stats(&self) -> Result<Stats>;
}

/// Open the backend selected in `[store].backend`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    match config.store.backend {
        StoreBackend::Sqlite => Ok(Arc::new(sqlite::SqliteStore::connect(config).await?)),
        StoreBackend::Json => Ok(Arc::new(json::JsonStore::open(config)?)),
    }
}
