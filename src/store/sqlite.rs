//! SQLite storage backend.
//!
//! One table per entity kind plus an AUTOINCREMENT id, so ids stay monotonic
//! even after deletes. Timestamps are stored as RFC 3339 TEXT (which sorts
//! lexicographically in creation order) and the tag list round-trips through
//! a single TEXT column.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::{
    compute_stats, decode_tags, encode_tags, sort_tasks, AssigneeFilter, NewNote, NewPerson,
    NewTask, Note, NotePatch, Person, PersonPatch, Stats, Task, TaskFilter, TaskOrder, TaskPatch,
};
use crate::store::Store;

pub struct SqliteStore {
    pool: SqlitePool,
    order: TaskOrder,
}

impl SqliteStore {
    /// Connect to the configured database file. The schema must already
    /// exist (see `migrate::run_migrations`, run by `td init`).
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self {
            pool,
            order: config.store.task_order,
        })
    }

    // Unordered on purpose: callers that list run the rows through
    // `sort_tasks`, and stats does not care about order.
    async fn fetch_all_tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(task_from_row).collect()
    }
}

fn parse_ts(raw: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&raw)
        .with_context(|| format!("invalid stored timestamp: {}", raw))?
        .with_timezone(&Utc))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(parse_ts).transpose()
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        s.parse::<NaiveDate>()
            .with_context(|| format!("invalid stored date: {}", s))
    })
    .transpose()
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let status: String = row.get("status");
    let priority: String = row.get("priority");
    let tags: Option<String> = row.get("tags");
    Ok(Task {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        status: status.parse()?,
        priority: priority.parse()?,
        assigned_to: row.get("assigned_to"),
        deadline: parse_opt_ts(row.get("deadline"))?,
        scheduled_date: parse_opt_date(row.get("scheduled_date"))?,
        scheduled_time: row.get("scheduled_time"),
        estimated_duration: row.get("estimated_duration"),
        tags: decode_tags(tags.as_deref()),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
        completed_at: parse_opt_ts(row.get("completed_at"))?,
        source: row.get("source"),
    })
}

fn note_from_row(row: &SqliteRow) -> Result<Note> {
    let tags: Option<String> = row.get("tags");
    Ok(Note {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        tags: decode_tags(tags.as_deref()),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
        source: row.get("source"),
    })
}

fn person_from_row(row: &SqliteRow) -> Result<Person> {
    Ok(Person {
        id: row.get("id"),
        name: row.get("name"),
        role: row.get("role"),
        email: row.get("email"),
        phone: row.get("phone"),
        notes: row.get("notes"),
        created_at: parse_ts(row.get("created_at"))?,
        updated_at: parse_ts(row.get("updated_at"))?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks WHERE 1=1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND priority = ");
            qb.push_bind(priority.as_str());
        }
        match filter.assigned_to {
            Some(AssigneeFilter::Person(id)) => {
                qb.push(" AND assigned_to = ");
                qb.push_bind(id);
            }
            Some(AssigneeFilter::Unset) => {
                qb.push(" AND assigned_to IS NULL");
            }
            None => {}
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut tasks: Vec<Task> = rows.iter().map(task_from_row).collect::<Result<_>>()?;
        sort_tasks(&mut tasks, self.order);
        Ok(tasks)
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn create_task(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        // The id placeholder is replaced by the AUTOINCREMENT value below.
        let task = new.into_task(0, now);
        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                title, description, status, priority, assigned_to,
                deadline, scheduled_date, scheduled_time, estimated_duration,
                tags, created_at, updated_at, completed_at, source
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.assigned_to)
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(task.scheduled_date.map(|d| d.to_string()))
        .bind(&task.scheduled_time)
        .bind(task.estimated_duration)
        .bind(encode_tags(&task.tags))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(Option::<String>::None)
        .bind(&task.source)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_task(id)
            .await?
            .with_context(|| format!("task {} missing after insert", id))
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Option<Task>> {
        let Some(mut task) = self.get_task(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut task, Utc::now());

        // The whole record is rewritten; two racing updates resolve to
        // whichever write lands last.
        sqlx::query(
            r#"
            UPDATE tasks SET
                title = ?, description = ?, status = ?, priority = ?,
                assigned_to = ?, deadline = ?, scheduled_date = ?,
                scheduled_time = ?, estimated_duration = ?, tags = ?,
                updated_at = ?, completed_at = ?, source = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.assigned_to)
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(task.scheduled_date.map(|d| d.to_string()))
        .bind(&task.scheduled_time)
        .bind(task.estimated_duration)
        .bind(encode_tags(&task.tags))
        .bind(task.updated_at.to_rfc3339())
        .bind(task.completed_at.map(|d| d.to_rfc3339()))
        .bind(&task.source)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(task))
    }

    async fn delete_task(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        // Filtered in memory so case-insensitivity is not limited to ASCII
        // the way SQLite LIKE is.
        let query_lower = query.to_lowercase();
        let mut tasks = self.fetch_all_tasks().await?;
        tasks.retain(|t| t.matches_query(&query_lower));
        sort_tasks(&mut tasks, self.order);
        Ok(tasks)
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        let rows = sqlx::query("SELECT * FROM notes ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(note_from_row).collect()
    }

    async fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(note_from_row).transpose()
    }

    async fn create_note(&self, new: NewNote) -> Result<Note> {
        let note = new.into_note(0, Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO notes (title, content, category, tags, created_at, updated_at, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.category)
        .bind(encode_tags(&note.tags))
        .bind(note.created_at.to_rfc3339())
        .bind(note.updated_at.to_rfc3339())
        .bind(&note.source)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_note(id)
            .await?
            .with_context(|| format!("note {} missing after insert", id))
    }

    async fn update_note(&self, id: i64, patch: &NotePatch) -> Result<Option<Note>> {
        let Some(mut note) = self.get_note(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut note, Utc::now());

        sqlx::query(
            "UPDATE notes SET title = ?, content = ?, category = ?, tags = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.category)
        .bind(encode_tags(&note.tags))
        .bind(note.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(note))
    }

    async fn delete_note(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let query_lower = query.to_lowercase();
        let mut notes = self.list_notes().await?;
        notes.retain(|n| n.matches_query(&query_lower));
        Ok(notes)
    }

    async fn list_people(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query("SELECT * FROM people ORDER BY name ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(person_from_row).collect()
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>> {
        let row = sqlx::query("SELECT * FROM people WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    async fn create_person(&self, new: NewPerson) -> Result<Person> {
        let person = new.into_person(0, Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO people (name, role, email, phone, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&person.name)
        .bind(&person.role)
        .bind(&person.email)
        .bind(&person.phone)
        .bind(&person.notes)
        .bind(person.created_at.to_rfc3339())
        .bind(person.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_person(id)
            .await?
            .with_context(|| format!("person {} missing after insert", id))
    }

    async fn update_person(&self, id: i64, patch: &PersonPatch) -> Result<Option<Person>> {
        let Some(mut person) = self.get_person(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut person, Utc::now());

        sqlx::query(
            "UPDATE people SET name = ?, role = ?, email = ?, phone = ?, notes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&person.name)
        .bind(&person.role)
        .bind(&person.email)
        .bind(&person.phone)
        .bind(&person.notes)
        .bind(person.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(person))
    }

    async fn delete_person(&self, id: i64) -> Result<bool> {
        // Tasks referencing this person keep their assigned_to value.
        let result = sqlx::query("DELETE FROM people WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<Stats> {
        let tasks = self.fetch_all_tasks().await?;
        let note_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(compute_stats(&tasks, note_count as usize, Utc::now()))
    }
}
