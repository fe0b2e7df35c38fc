//! Backend-agnostic store tests.
//!
//! Every test runs against both backends through the store port, proving they
//! are interchangeable: same defaults, same patch semantics, same search and
//! stats behavior.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

use taskdesk::config::Config;
use taskdesk::migrate;
use taskdesk::models::{
    NewNote, NewPerson, NewTask, Priority, TaskFilter, TaskPatch, TaskStatus,
};
use taskdesk::store::{open_store, Store};

fn sqlite_config(tmp: &TempDir) -> Config {
    let content = format!(
        r#"
[store]
backend = "sqlite"
path = "{}/taskdesk.sqlite"
"#,
        tmp.path().display()
    );
    toml::from_str(&content).unwrap()
}

fn json_config(tmp: &TempDir) -> Config {
    let content = format!(
        r#"
[store]
backend = "json"
data_dir = "{}/data"
"#,
        tmp.path().display()
    );
    toml::from_str(&content).unwrap()
}

/// Open a fresh store of each backend and run the check against both.
async fn with_both_backends<F, Fut>(check: F)
where
    F: Fn(Arc<dyn Store>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let tmp = TempDir::new().unwrap();
    let cfg = sqlite_config(&tmp);
    migrate::run_migrations(&cfg).await.unwrap();
    check(open_store(&cfg).await.unwrap()).await;

    let tmp = TempDir::new().unwrap();
    let cfg = json_config(&tmp);
    check(open_store(&cfg).await.unwrap()).await;
}

fn new_task(title: &str) -> NewTask {
    NewTask {
        title: title.to_string(),
        ..NewTask::default()
    }
}

#[tokio::test]
async fn create_applies_defaults() {
    with_both_backends(|store| async move {
        let task = store.create_task(new_task("Buy milk")).await.unwrap();

        assert_eq!(task.id, 1);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.source, "web");
        assert!(task.tags.is_empty());
        assert!(task.completed_at.is_none());
        assert_eq!(task.created_at, task.updated_at);
    })
    .await;
}

#[tokio::test]
async fn ids_are_sequential_and_never_reused() {
    with_both_backends(|store| async move {
        let a = store.create_task(new_task("a")).await.unwrap();
        let b = store.create_task(new_task("b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(store.delete_task(b.id).await.unwrap());
        let c = store.create_task(new_task("c")).await.unwrap();
        assert_eq!(c.id, 3, "deleted ids must not be reused");
    })
    .await;
}

#[tokio::test]
async fn tags_survive_round_trip_and_are_never_null() {
    with_both_backends(|store| async move {
        let task = store
            .create_task(NewTask {
                title: "tagged".to_string(),
                tags: vec!["home".to_string(), "errand".to_string()],
                ..NewTask::default()
            })
            .await
            .unwrap();

        let fetched = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.tags, vec!["home", "errand"]);

        let wire = serde_json::to_value(&fetched).unwrap();
        assert!(wire["tags"].is_array(), "tags must serialize as a list");
    })
    .await;
}

#[tokio::test]
async fn patch_updates_only_supplied_fields() {
    with_both_backends(|store| async move {
        let task = store
            .create_task(NewTask {
                title: "original".to_string(),
                description: "keep me".to_string(),
                ..NewTask::default()
            })
            .await
            .unwrap();

        let patch = TaskPatch {
            title: Some("renamed".to_string()),
            priority: Some(Priority::High),
            ..TaskPatch::default()
        };
        let updated = store.update_task(task.id, &patch).await.unwrap().unwrap();

        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.description, "keep me");
        assert_eq!(updated.status, TaskStatus::Todo);
        assert!(updated.updated_at >= task.updated_at);
    })
    .await;
}

#[tokio::test]
async fn completing_stamps_completed_at_once() {
    with_both_backends(|store| async move {
        let task = store.create_task(new_task("finish me")).await.unwrap();

        let done = TaskPatch {
            status: Some(TaskStatus::Done),
            ..TaskPatch::default()
        };
        let completed = store.update_task(task.id, &done).await.unwrap().unwrap();
        let stamp = completed.completed_at.expect("completed_at stamped");
        assert!(stamp >= completed.created_at);

        // Reopening and re-completing must keep the original stamp.
        let reopen = TaskPatch {
            status: Some(TaskStatus::Todo),
            ..TaskPatch::default()
        };
        let reopened = store.update_task(task.id, &reopen).await.unwrap().unwrap();
        assert_eq!(reopened.completed_at, Some(stamp));

        let redone = store.update_task(task.id, &done).await.unwrap().unwrap();
        assert_eq!(redone.completed_at, Some(stamp));
    })
    .await;
}

#[tokio::test]
async fn missing_ids_are_not_errors() {
    with_both_backends(|store| async move {
        assert!(store.get_task(99).await.unwrap().is_none());
        assert!(store
            .update_task(99, &TaskPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_task(99).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn list_filters_by_status_priority_and_assignee() {
    with_both_backends(|store| async move {
        let person = store
            .create_person(NewPerson {
                name: "Dana".to_string(),
                ..NewPerson::default()
            })
            .await
            .unwrap();

        store
            .create_task(NewTask {
                title: "assigned urgent".to_string(),
                priority: Some(Priority::Urgent),
                assigned_to: Some(person.id),
                ..NewTask::default()
            })
            .await
            .unwrap();
        store
            .create_task(NewTask {
                title: "unassigned".to_string(),
                status: Some(TaskStatus::Done),
                ..NewTask::default()
            })
            .await
            .unwrap();

        let filter = TaskFilter::from_args(None, Some("urgent"), None).unwrap();
        let urgent = store.list_tasks(&filter).await.unwrap();
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].title, "assigned urgent");

        let filter = TaskFilter::from_args(Some("done"), None, None).unwrap();
        assert_eq!(store.list_tasks(&filter).await.unwrap().len(), 1);

        let filter =
            TaskFilter::from_args(None, None, Some(&person.id.to_string())).unwrap();
        let assigned = store.list_tasks(&filter).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].assigned_to, Some(person.id));

        let filter = TaskFilter::from_args(None, None, Some("unset")).unwrap();
        let unassigned = store.list_tasks(&filter).await.unwrap();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].title, "unassigned");
    })
    .await;
}

#[tokio::test]
async fn list_returns_most_recently_created_first() {
    with_both_backends(|store| async move {
        for title in ["first", "second", "third"] {
            store.create_task(new_task(title)).await.unwrap();
        }
        let tasks = store.list_tasks(&TaskFilter::default()).await.unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    })
    .await;
}

#[tokio::test]
async fn search_is_case_insensitive_and_empty_query_matches_all() {
    with_both_backends(|store| async move {
        store
            .create_task(NewTask {
                title: "Buy MILK".to_string(),
                ..NewTask::default()
            })
            .await
            .unwrap();
        store
            .create_task(NewTask {
                title: "Walk the dog".to_string(),
                description: "bring milk bones".to_string(),
                ..NewTask::default()
            })
            .await
            .unwrap();

        let hits = store.search_tasks("milk").await.unwrap();
        assert_eq!(hits.len(), 2, "matches title and description");

        let all = store.search_tasks("").await.unwrap();
        let listed = store.list_tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), listed.len());

        assert!(store.search_tasks("zebra").await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn stats_count_statuses_overdue_and_notes() {
    with_both_backends(|store| async move {
        store.create_task(new_task("open")).await.unwrap();
        store
            .create_task(NewTask {
                title: "late".to_string(),
                deadline: Some(Utc::now() - Duration::hours(2)),
                ..NewTask::default()
            })
            .await
            .unwrap();
        // Done task with a past deadline must not count as overdue.
        let done = store
            .create_task(NewTask {
                title: "done late".to_string(),
                deadline: Some(Utc::now() - Duration::hours(2)),
                ..NewTask::default()
            })
            .await
            .unwrap();
        store
            .update_task(
                done.id,
                &TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();

        store
            .create_note(NewNote {
                title: "shopping".to_string(),
                content: "milk, bread".to_string(),
                ..NewNote::default()
            })
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.todo, 2);
        assert_eq!(stats.done, 1);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.total_notes, 1);
    })
    .await;
}

#[tokio::test]
async fn notes_crud_and_search() {
    with_both_backends(|store| async move {
        let note = store
            .create_note(NewNote {
                title: "Standup".to_string(),
                content: "Discuss the release plan".to_string(),
                category: Some("work".to_string()),
                ..NewNote::default()
            })
            .await
            .unwrap();
        assert_eq!(note.category, "work");
        assert_eq!(note.source, "web");

        let hits = store.search_notes("release").await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(store.delete_note(note.id).await.unwrap());
        assert!(store.get_note(note.id).await.unwrap().is_none());
        assert!(!store.delete_note(note.id).await.unwrap());
    })
    .await;
}

#[tokio::test]
async fn people_are_listed_by_name() {
    with_both_backends(|store| async move {
        for name in ["Noa", "Avner", "Dana"] {
            store
                .create_person(NewPerson {
                    name: name.to_string(),
                    ..NewPerson::default()
                })
                .await
                .unwrap();
        }

        let people = store.list_people().await.unwrap();
        let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Avner", "Dana", "Noa"]);
    })
    .await;
}

#[tokio::test]
async fn deleting_a_person_leaves_assigned_tasks_dangling() {
    with_both_backends(|store| async move {
        let person = store
            .create_person(NewPerson {
                name: "Avner".to_string(),
                ..NewPerson::default()
            })
            .await
            .unwrap();
        let task = store
            .create_task(NewTask {
                title: "call back".to_string(),
                assigned_to: Some(person.id),
                ..NewTask::default()
            })
            .await
            .unwrap();

        assert!(store.delete_person(person.id).await.unwrap());

        let task = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.assigned_to, Some(person.id));
    })
    .await;
}

#[tokio::test]
async fn priority_ordering_applies_when_configured() {
    let tmp = TempDir::new().unwrap();
    let content = format!(
        r#"
[store]
backend = "json"
data_dir = "{}/data"
task_order = "priority"
"#,
        tmp.path().display()
    );
    let cfg: Config = toml::from_str(&content).unwrap();
    let store = open_store(&cfg).await.unwrap();

    store
        .create_task(NewTask {
            title: "low".to_string(),
            priority: Some(Priority::Low),
            ..NewTask::default()
        })
        .await
        .unwrap();
    store
        .create_task(NewTask {
            title: "urgent".to_string(),
            priority: Some(Priority::Urgent),
            ..NewTask::default()
        })
        .await
        .unwrap();
    store
        .create_task(NewTask {
            title: "high".to_string(),
            priority: Some(Priority::High),
            ..NewTask::default()
        })
        .await
        .unwrap();

    let tasks = store.list_tasks(&TaskFilter::default()).await.unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["urgent", "high", "low"]);
}

/// A failed file write must not leave the JSON store holding state that was
/// never persisted: the record is not visible afterwards and the id counter
/// is not consumed.
#[tokio::test]
async fn json_store_rolls_back_when_write_fails() {
    let tmp = TempDir::new().unwrap();
    let cfg = json_config(&tmp);
    let store = open_store(&cfg).await.unwrap();

    store.create_task(new_task("kept")).await.unwrap();

    // Make tasks.json unwritable by turning it into a directory.
    let path = tmp.path().join("data").join("tasks.json");
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    assert!(store.create_task(new_task("lost")).await.is_err());
    assert!(store.get_task(2).await.unwrap().is_none());
    assert_eq!(store.list_tasks(&TaskFilter::default()).await.unwrap().len(), 1);

    // With the file writable again, the failed create left no trace.
    std::fs::remove_dir(&path).unwrap();
    let task = store.create_task(new_task("retry")).await.unwrap();
    assert_eq!(task.id, 2);
    assert_eq!(store.list_tasks(&TaskFilter::default()).await.unwrap().len(), 2);
}

/// The data a JSON store writes is readable by a second instance opened on the
/// same directory.
#[tokio::test]
async fn json_store_persists_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let cfg = json_config(&tmp);

    {
        let store = open_store(&cfg).await.unwrap();
        store.create_task(new_task("persisted")).await.unwrap();
    }

    let store = open_store(&cfg).await.unwrap();
    let task = store.get_task(1).await.unwrap().unwrap();
    assert_eq!(task.title, "persisted");

    let next = store.create_task(new_task("second")).await.unwrap();
    assert_eq!(next.id, 2, "id counter survives reopen");
}
