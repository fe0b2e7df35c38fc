//! Core data model: the three entity kinds (Task, Note, Person), their
//! creation payloads and patch structs, list filters, and the shared
//! ordering/stats/reminder logic used by every storage backend.
//!
//! Wire names are camelCase (`assignedTo`, `createdAt`, …) to match the JSON
//! contract consumed by API clients. Updates are explicit patch structs with
//! one optional slot per mutable field; nullable fields use a double
//! `Option` so a JSON `null` clears the field while absence keeps it.

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => bail!("unknown status: '{}'. Use todo, in-progress, or done.", other),
        }
    }
}

/// Task priority. Ranked urgent > high > medium > low when listing in
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Fixed rank used by the priority ordering mode.
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Urgent => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => bail!("unknown priority: '{}'. Use low, medium, high, or urgent.", other),
        }
    }
}

/// A tracked task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Person reference. No delete protection — a dangling id is tolerated.
    pub assigned_to: Option<i64>,
    pub deadline: Option<DateTime<Utc>>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    /// Estimated duration in minutes.
    pub estimated_duration: Option<i64>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped on the first transition into `done`; never cleared afterwards,
    /// even when the status later leaves `done`.
    pub completed_at: Option<DateTime<Utc>>,
    pub source: String,
}

impl Task {
    /// Case-insensitive substring match over title + description.
    /// An empty (already lowercased) query matches everything.
    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.description.to_lowercase().contains(query_lower)
    }
}

/// A free-form note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: String,
}

impl Note {
    /// Case-insensitive substring match over title + content.
    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
    }
}

/// A person tasks can be assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ Creation payloads ============

/// Fields accepted when creating a task. Everything but the title is
/// optional; defaults are applied by [`NewTask::into_task`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewTask {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            bail!("title is required");
        }
        Ok(())
    }

    /// Build the stored task with the store-assigned id and defaults applied:
    /// `status = todo`, `priority = medium`, `tags = []`, `source = "web"`,
    /// both timestamps set to `now`, `completed_at` unset.
    pub fn into_task(self, id: i64, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            status: self.status.unwrap_or(TaskStatus::Todo),
            priority: self.priority.unwrap_or(Priority::Medium),
            assigned_to: self.assigned_to,
            deadline: self.deadline,
            scheduled_date: self.scheduled_date,
            scheduled_time: self.scheduled_time,
            estimated_duration: self.estimated_duration,
            tags: self.tags,
            created_at: now,
            updated_at: now,
            completed_at: None,
            source: self.source.unwrap_or_else(|| "web".to_string()),
        }
    }
}

/// Fields accepted when creating a note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewNote {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.title.trim().is_empty() {
            bail!("title is required");
        }
        if self.content.trim().is_empty() {
            bail!("content is required");
        }
        Ok(())
    }

    pub fn into_note(self, id: i64, now: DateTime<Utc>) -> Note {
        Note {
            id,
            title: self.title,
            content: self.content,
            category: self.category.unwrap_or_else(|| "general".to_string()),
            tags: self.tags,
            created_at: now,
            updated_at: now,
            source: self.source.unwrap_or_else(|| "web".to_string()),
        }
    }
}

/// Fields accepted when creating a person.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewPerson {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            bail!("name is required");
        }
        Ok(())
    }

    pub fn into_person(self, id: i64, now: DateTime<Utc>) -> Person {
        Person {
            id,
            name: self.name,
            role: self.role,
            email: self.email,
            phone: self.phone,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============ Patches ============

/// Deserialize helper distinguishing an absent field (`None`) from an
/// explicit JSON `null` (`Some(None)`).
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Partial update for a task: only supplied fields change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub estimated_duration: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                bail!("title must not be empty");
            }
        }
        Ok(())
    }

    /// Merge the patch into `task`. The first transition of `status` into
    /// `done` stamps `completed_at`; an already-set `completed_at` is left
    /// alone. `updated_at` is always refreshed.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            if status == TaskStatus::Done && task.completed_at.is_none() {
                task.completed_at = Some(now);
            }
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assigned_to) = self.assigned_to {
            task.assigned_to = assigned_to;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(scheduled_date) = self.scheduled_date {
            task.scheduled_date = scheduled_date;
        }
        if let Some(scheduled_time) = &self.scheduled_time {
            task.scheduled_time = scheduled_time.clone();
        }
        if let Some(estimated_duration) = self.estimated_duration {
            task.estimated_duration = estimated_duration;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        task.updated_at = now;
    }
}

/// Partial update for a note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NotePatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                bail!("title must not be empty");
            }
        }
        if let Some(content) = &self.content {
            if content.trim().is_empty() {
                bail!("content must not be empty");
            }
        }
        Ok(())
    }

    pub fn apply(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(category) = &self.category {
            note.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
        note.updated_at = now;
    }
}

/// Partial update for a person.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub role: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl PersonPatch {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                bail!("name must not be empty");
            }
        }
        Ok(())
    }

    pub fn apply(&self, person: &mut Person, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            person.name = name.clone();
        }
        if let Some(role) = &self.role {
            person.role = role.clone();
        }
        if let Some(email) = &self.email {
            person.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            person.phone = phone.clone();
        }
        if let Some(notes) = &self.notes {
            person.notes = notes.clone();
        }
        person.updated_at = now;
    }
}

// ============ Filters and ordering ============

/// Assignee condition for task listing: a concrete person id, or explicitly
/// unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    Person(i64),
    Unset,
}

impl FromStr for AssigneeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unset" | "none" | "null" => Ok(AssigneeFilter::Unset),
            other => match other.parse::<i64>() {
                Ok(id) => Ok(AssigneeFilter::Person(id)),
                Err(_) => {
                    bail!("invalid assignee filter: '{}'. Use a person id or 'unset'.", other)
                }
            },
        }
    }
}

/// Equality predicates for task listing. Absent keys impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<AssigneeFilter>,
}

impl TaskFilter {
    /// Parse raw string arguments (CLI flags or query parameters) into a
    /// filter, rejecting unknown values.
    pub fn from_args(
        status: Option<&str>,
        priority: Option<&str>,
        assigned_to: Option<&str>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            status: status.map(str::parse).transpose()?,
            priority: priority.map(str::parse).transpose()?,
            assigned_to: assigned_to.map(str::parse).transpose()?,
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        match self.assigned_to {
            Some(AssigneeFilter::Person(id)) => {
                if task.assigned_to != Some(id) {
                    return false;
                }
            }
            Some(AssigneeFilter::Unset) => {
                if task.assigned_to.is_some() {
                    return false;
                }
            }
            None => {}
        }
        true
    }
}

/// Listing order for tasks, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOrder {
    /// Most recently created first.
    #[default]
    Recency,
    /// Priority rank descending, then ascending deadline (tasks with a
    /// deadline before tasks without one), then most recently created.
    Priority,
}

/// Sort tasks for listing. Both backends run their results through this so
/// the configured ordering mode behaves identically regardless of backend.
pub fn sort_tasks(tasks: &mut [Task], order: TaskOrder) {
    match order {
        TaskOrder::Recency => {
            tasks.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            });
        }
        TaskOrder::Priority => {
            tasks.sort_by(|a, b| {
                b.priority
                    .rank()
                    .cmp(&a.priority.rank())
                    .then_with(|| match (a.deadline, b.deadline) {
                        (Some(x), Some(y)) => x.cmp(&y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    })
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.cmp(&a.id))
            });
        }
    }
}

// ============ Stats and reminders ============

/// Aggregate counts over the full task collection, recomputed on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    /// Tasks with a deadline strictly before now and a status other than
    /// `done`.
    pub overdue: usize,
    pub total_notes: usize,
}

pub fn compute_stats(tasks: &[Task], note_count: usize, now: DateTime<Utc>) -> Stats {
    Stats {
        total: tasks.len(),
        todo: tasks.iter().filter(|t| t.status == TaskStatus::Todo).count(),
        in_progress: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
        done: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        overdue: tasks
            .iter()
            .filter(|t| {
                t.status != TaskStatus::Done && t.deadline.map(|d| d < now).unwrap_or(false)
            })
            .count(),
        total_notes: note_count,
    }
}

/// A task needs a reminder when it is not done and either its deadline falls
/// on today or tomorrow, or it is scheduled for today.
pub fn needs_reminder(task: &Task, now: DateTime<Utc>) -> bool {
    if task.status == TaskStatus::Done {
        return false;
    }
    let today = now.date_naive();
    if let Some(deadline) = task.deadline {
        let days_until = (deadline.date_naive() - today).num_days();
        if (0..=1).contains(&days_until) {
            return true;
        }
    }
    task.scheduled_date == Some(today)
}

// ============ Tag encoding ============

/// Encode a tag list into the single TEXT column used by the SQLite backend.
pub fn encode_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// Decode the stored tag text back into an ordered list. An absent, empty,
/// or malformed field decodes to an empty list, never null.
pub fn decode_tags(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => serde_json::from_str(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}
