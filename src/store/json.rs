//! Flat-JSON-file storage backend.
//!
//! Three documents under `[store].data_dir` — `tasks.json`, `notes.json`,
//! `people.json` — each holding one entity collection plus its monotonic id
//! counter. Every mutation rewrites the whole document.
//!
//! In-process callers are serialized through a mutex. There is no
//! cross-process write isolation: two processes writing concurrently resolve
//! to whichever write lands last, and the losing update is gone. Deployments
//! that need concurrent writers should use the SQLite backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::{
    compute_stats, sort_tasks, NewNote, NewPerson, NewTask, Note, NotePatch, Person, PersonPatch,
    Stats, Task, TaskFilter, TaskOrder, TaskPatch,
};
use crate::store::Store;

const TASKS_FILE: &str = "tasks.json";
const NOTES_FILE: &str = "notes.json";
const PEOPLE_FILE: &str = "people.json";

/// One persisted entity collection with its id counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collection<T> {
    next_id: i64,
    items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            items: Vec::new(),
            last_updated: None,
        }
    }
}

impl<T> Collection<T> {
    fn take_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Collection<T>> {
    if !path.exists() {
        return Ok(Collection::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_collection<T: Serialize>(path: &Path, collection: &mut Collection<T>) -> Result<()> {
    collection.last_updated = Some(Utc::now());
    let json = serde_json::to_string_pretty(collection)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Persist the collection; on write failure restore the pre-mutation
/// snapshot so the in-memory state never drifts ahead of disk.
fn save_or_rollback<T: Serialize + Clone>(
    path: &Path,
    collection: &mut Collection<T>,
    snapshot: Collection<T>,
) -> Result<()> {
    if let Err(err) = save_collection(path, collection) {
        *collection = snapshot;
        return Err(err);
    }
    Ok(())
}

struct State {
    tasks: Collection<Task>,
    notes: Collection<Note>,
    people: Collection<Person>,
}

pub struct JsonStore {
    dir: PathBuf,
    order: TaskOrder,
    state: Mutex<State>,
}

impl JsonStore {
    /// Open (and create, if missing) the data directory and its three
    /// collection documents.
    pub fn open(config: &Config) -> Result<Self> {
        let dir = config.store.data_dir.clone();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;

        let mut tasks: Collection<Task> = load_collection(&dir.join(TASKS_FILE))?;
        let mut notes: Collection<Note> = load_collection(&dir.join(NOTES_FILE))?;
        let mut people: Collection<Person> = load_collection(&dir.join(PEOPLE_FILE))?;

        // Materialize missing documents so a fresh data dir is usable.
        if !dir.join(TASKS_FILE).exists() {
            save_collection(&dir.join(TASKS_FILE), &mut tasks)?;
        }
        if !dir.join(NOTES_FILE).exists() {
            save_collection(&dir.join(NOTES_FILE), &mut notes)?;
        }
        if !dir.join(PEOPLE_FILE).exists() {
            save_collection(&dir.join(PEOPLE_FILE), &mut people)?;
        }

        Ok(Self {
            dir,
            order: config.store.task_order,
            state: Mutex::new(State {
                tasks,
                notes,
                people,
            }),
        })
    }

}

#[async_trait]
impl Store for JsonStore {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .items
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        drop(state);
        sort_tasks(&mut tasks, self.order);
        Ok(tasks)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let state = self.state.lock().await;
        Ok(state.tasks.items.iter().find(|t| t.id == id).cloned())
    }

    async fn create_task(&self, new: NewTask) -> Result<Task> {
        let mut state = self.state.lock().await;
        let snapshot = state.tasks.clone();
        let id = state.tasks.take_id();
        let task = new.into_task(id, Utc::now());
        state.tasks.items.push(task.clone());
        save_or_rollback(&self.dir.join(TASKS_FILE), &mut state.tasks, snapshot)?;
        Ok(task)
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.tasks.items.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let snapshot = state.tasks.clone();
        patch.apply(&mut state.tasks.items[pos], Utc::now());
        let updated = state.tasks.items[pos].clone();
        save_or_rollback(&self.dir.join(TASKS_FILE), &mut state.tasks, snapshot)?;
        Ok(Some(updated))
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.tasks.items.iter().any(|t| t.id == id) {
            return Ok(false);
        }
        let snapshot = state.tasks.clone();
        state.tasks.items.retain(|t| t.id != id);
        save_or_rollback(&self.dir.join(TASKS_FILE), &mut state.tasks, snapshot)?;
        Ok(true)
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        let query_lower = query.to_lowercase();
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .items
            .iter()
            .filter(|t| t.matches_query(&query_lower))
            .cloned()
            .collect();
        drop(state);
        sort_tasks(&mut tasks, self.order);
        Ok(tasks)
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        let state = self.state.lock().await;
        let mut notes = state.notes.items.clone();
        notes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(notes)
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let state = self.state.lock().await;
        Ok(state.notes.items.iter().find(|n| n.id == id).cloned())
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let mut state = self.state.lock().await;
        let snapshot = state.notes.clone();
        let id = state.notes.take_id();
        let note = new.into_note(id, Utc::now());
        state.notes.items.push(note.clone());
        save_or_rollback(&self.dir.join(NOTES_FILE), &mut state.notes, snapshot)?;
        Ok(note)
    }

    async fn update_note(&self, id: i64, patch: &NotePatch) -> Result<Option<Note>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.notes.items.iter().position(|n| n.id == id) else {
            return Ok(None);
        };
        let snapshot = state.notes.clone();
        patch.apply(&mut state.notes.items[pos], Utc::now());
        let updated = state.notes.items[pos].clone();
        save_or_rollback(&self.dir.join(NOTES_FILE), &mut state.notes, snapshot)?;
        Ok(Some(updated))
    }

    async fn delete_note(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.notes.items.iter().any(|n| n.id == id) {
            return Ok(false);
        }
        let snapshot = state.notes.clone();
        state.notes.items.retain(|n| n.id != id);
        save_or_rollback(&self.dir.join(NOTES_FILE), &mut state.notes, snapshot)?;
        Ok(true)
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let query_lower = query.to_lowercase();
        let state = self.state.lock().await;
        let mut notes: Vec<Note> = state
            .notes
            .items
            .iter()
            .filter(|n| n.matches_query(&query_lower))
            .cloned()
            .collect();
        drop(state);
        notes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(notes)
    }

    async fn list_people(&self) -> Result<Vec<Person>> {
        let state = self.state.lock().await;
        let mut people = state.people.items.clone();
        people.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(people)
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>> {
        let state = self.state.lock().await;
        Ok(state.people.items.iter().find(|p| p.id == id).cloned())
    }

    async fn create_person(&self, new: NewPerson) -> Result<Person> {
        let mut state = self.state.lock().await;
        let snapshot = state.people.clone();
        let id = state.people.take_id();
        let person = new.into_person(id, Utc::now());
        state.people.items.push(person.clone());
        save_or_rollback(&self.dir.join(PEOPLE_FILE), &mut state.people, snapshot)?;
        Ok(person)
    }

    async fn update_person(&self, id: i64, patch: &PersonPatch) -> Result<Option<Person>> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.people.items.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let snapshot = state.people.clone();
        patch.apply(&mut state.people.items[pos], Utc::now());
        let updated = state.people.items[pos].clone();
        save_or_rollback(&self.dir.join(PEOPLE_FILE), &mut state.people, snapshot)?;
        Ok(Some(updated))
    }

    async fn delete_person(&self, id: i64) -> Result<bool> {
        // Tasks referencing this person keep their assigned_to value.
        let mut state = self.state.lock().await;
        if !state.people.items.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        let snapshot = state.people.clone();
        state.people.items.retain(|p| p.id != id);
        save_or_rollback(&self.dir.join(PEOPLE_FILE), &mut state.people, snapshot)?;
        Ok(true)
    }

    async fn stats(&self) -> Result<Stats> {
        let state = self.state.lock().await;
        Ok(compute_stats(
            &state.tasks.items,
            state.notes.items.len(),
            Utc::now(),
        ))
    }
}
