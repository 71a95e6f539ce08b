//! SQLite task store tests against a real temp-dir database.

use tempfile::TempDir;

use tickd::tasks::store::{SqliteTaskStore, TaskStore};
use tickd::tasks::{TaskPatch, TaskPriority, TaskRecord, TaskStatus};

async fn make_store(dir: &TempDir) -> SqliteTaskStore {
    SqliteTaskStore::new(dir.path()).await.unwrap()
}

fn record(external_id: &str) -> TaskRecord {
    TaskRecord {
        external_id: external_id.to_string(),
        title: "title".to_string(),
        content: "content".to_string(),
        status: TaskStatus::Todo,
        priority: TaskPriority::None,
        impact: 5,
        confidence: 5,
        ease: 5,
        due_date: Some("2026-09-01T09:00:00Z".to_string()),
        start_date: None,
        tags: vec!["home".to_string(), "deep-work".to_string()],
        last_sync: None,
    }
}

#[tokio::test]
async fn create_and_find_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;

    store.create(record("t1")).await.unwrap();

    let found = store.find_by_external_id("t1").await.unwrap().unwrap();
    assert_eq!(found.title, "title");
    assert_eq!(found.due_date.as_deref(), Some("2026-09-01T09:00:00Z"));
    assert_eq!(found.tags, vec!["home".to_string(), "deep-work".to_string()]);
    assert!(store.find_by_external_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn create_derives_priority_from_triple() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;

    let mut rec = record("t1");
    rec.impact = 9;
    rec.confidence = 9;
    rec.ease = 9;
    rec.priority = TaskPriority::None; // ignored — priority is derived

    let created = store.create(rec).await.unwrap();
    assert_eq!(created.priority, TaskPriority::High);
    let found = store.find_by_external_id("t1").await.unwrap().unwrap();
    assert_eq!(found.priority, TaskPriority::High);
}

#[tokio::test]
async fn duplicate_external_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;

    store.create(record("t1")).await.unwrap();
    assert!(store.create(record("t1")).await.is_err());
}

#[tokio::test]
async fn update_merges_patch_and_rederives_priority() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;
    store.create(record("t1")).await.unwrap();

    let updated = store
        .update(
            "t1",
            TaskPatch {
                title: Some("renamed".to_string()),
                impact: Some(2),
                confidence: Some(2),
                ease: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.priority, TaskPriority::None);
    // Untouched fields survive the merge.
    assert_eq!(updated.content, "content");
    assert_eq!(updated.status, TaskStatus::Todo);

    let found = store.find_by_external_id("t1").await.unwrap().unwrap();
    assert_eq!(found.title, "renamed");
    assert_eq!(found.impact, 2);
}

#[tokio::test]
async fn partial_triple_update_keeps_stored_priority() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;
    store.create(record("t1")).await.unwrap(); // 5/5/5 → Medium

    let updated = store
        .update(
            "t1",
            TaskPatch {
                impact: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.impact, 10);
    assert_eq!(updated.priority, TaskPriority::Medium);
}

#[tokio::test]
async fn update_missing_task_errors() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;

    assert!(store
        .update("ghost", TaskPatch::default())
        .await
        .is_err());
}

#[tokio::test]
async fn list_returns_tasks_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;

    store.create(record("b")).await.unwrap();
    store.create(record("a")).await.unwrap();
    store.create(record("c")).await.unwrap();

    let ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.external_id)
        .collect();
    assert_eq!(ids, vec!["b".to_string(), "a".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn corrupt_tags_column_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let store = make_store(&dir).await;
    store.create(record("t1")).await.unwrap();

    sqlx::query("UPDATE tasks SET tags = 'not json' WHERE external_id = 't1'")
        .execute(&store.pool())
        .await
        .unwrap();

    let found = store.find_by_external_id("t1").await.unwrap().unwrap();
    assert!(found.tags.is_empty());
}

#[tokio::test]
async fn store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = make_store(&dir).await;
        store.create(record("t1")).await.unwrap();
    }
    let store = make_store(&dir).await;
    assert!(store.find_by_external_id("t1").await.unwrap().is_some());
}
