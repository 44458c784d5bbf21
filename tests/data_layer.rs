use std::sync::Arc;
use std::time::Duration;

use project_board::ProjectData;
use project_board::cache::QueryStatus;
use project_board::store::{MemoryStore, Row, StoreOp};
use project_board::types::{Issue, NewProject, Project, ProjectStatus, Task};
use serde_json::json;

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn setup(store: MemoryStore) -> (Arc<MemoryStore>, ProjectData) {
    let store = Arc::new(store);
    let data = ProjectData::new(store.clone());
    (store, data)
}

#[tokio::test]
async fn create_project_shows_up_after_refetch() {
    let (store, data) = setup(MemoryStore::new());
    assert!(data.projects().await.data.is_empty());

    store.push_next_id("42");
    let created = data
        .create_project(&NewProject {
            name: "X".into(),
            status: ProjectStatus::Planned,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.id, "42");
    assert_eq!(data.peek::<Project>().status, QueryStatus::Stale);

    let projects = data.projects().await.data;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, "42");
    assert_eq!(projects[0].name, "X");
    assert!(projects[0].custom_sections.is_empty());
    assert!(projects[0].tech_stack.is_empty());
    assert!(!projects[0].created_at.is_empty());
    assert_eq!(store.calls(StoreOp::Select, "projects"), 2);
}

#[tokio::test]
async fn updated_task_has_new_title_and_later_timestamp() {
    let (store, data) = setup(MemoryStore::new());
    store.seed(
        "tasks",
        vec![row(json!({
            "id": 7,
            "project_id": "p1",
            "title": "old title",
            "description": "",
            "status": "todo",
            "due_date": null,
            "created_at": "2024-01-01T00:00:00.000Z",
            "updated_at": "2024-01-01T00:00:00.000Z"
        }))],
    );

    let before = data.tasks().await.data;
    let mut task = before[0].clone();
    assert_eq!(task.id, "7");
    task.title = "new title".into();
    data.update_task(&task).await.unwrap();

    let after = data.tasks().await.data;
    assert_eq!(after[0].title, "new title");
    assert!(after[0].updated_at > before[0].updated_at);
    assert_eq!(after[0].created_at, before[0].created_at);
}

#[tokio::test]
async fn failed_delete_leaves_issue_cached_and_error_clear() {
    let (store, data) = setup(MemoryStore::new());
    store.seed(
        "issues",
        vec![row(json!({
            "id": "3",
            "project_id": "p1",
            "title": "crash on save",
            "status": "open",
            "labels": ["bug"]
        }))],
    );
    let before = data.issues().await;

    store.fail_next(StoreOp::Delete, "connection reset");
    let err = data.delete_issue("3").await.unwrap_err();
    assert!(err.is_transport());

    let after = data.peek::<Issue>();
    assert_eq!(after.status, QueryStatus::Ready);
    assert!(after.error.is_none());
    assert_eq!(after.data.len(), 1);
    assert_eq!(after.data[0].id, before.data[0].id);
    assert_eq!(after.data[0].labels, before.data[0].labels);
    assert_eq!(store.rows("issues").len(), 1);
    assert_eq!(store.calls(StoreOp::Select, "issues"), 1);
}

#[tokio::test]
async fn concurrent_reads_share_one_fetch() {
    let (store, data) = setup(MemoryStore::new().with_latency(Duration::from_millis(50)));
    store.seed("projects", vec![row(json!({"id": "p1", "name": "Site"}))]);
    let (a, b) = tokio::join!(data.projects(), data.projects());
    for snap in [&a, &b] {
        assert!(snap.error.is_none());
        assert!(!snap.loading);
        assert_eq!(snap.status, QueryStatus::Ready);
        assert_eq!(snap.data.len(), 1);
        assert_eq!(snap.data[0].id, "p1");
    }
    assert_eq!(store.calls(StoreOp::Select, "projects"), 1);
}

#[tokio::test]
async fn timed_out_read_can_be_retried() {
    let (store, data) = setup(MemoryStore::new().with_latency(Duration::from_millis(50)));
    store.seed("tasks", vec![row(json!({"id": "t1", "project_id": "p1", "title": "docs"}))]);

    let first = tokio::time::timeout(Duration::from_millis(10), data.tasks()).await;
    assert!(first.is_err());
    assert_ne!(data.peek::<Task>().status, QueryStatus::Loading);

    let snap = data.tasks().await;
    assert_eq!(snap.status, QueryStatus::Ready);
    assert_eq!(snap.data.len(), 1);
    assert_eq!(store.calls(StoreOp::Select, "tasks"), 2);
}

#[tokio::test]
async fn failed_create_leaves_projects_cached() {
    let (store, data) = setup(MemoryStore::new());
    store.seed("projects", vec![row(json!({"id": "p1", "name": "Site", "status": "active"}))]);
    let before = data.projects().await;

    store.fail_next(StoreOp::Insert, "timeout");
    let err = data
        .create_project(&NewProject {
            name: "Y".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_transport());

    let after = data.peek::<Project>();
    assert_eq!(after.status, QueryStatus::Ready);
    assert!(after.error.is_none());
    assert_eq!(after.data.len(), before.data.len());
    assert_eq!(after.data[0].id, before.data[0].id);
    assert_eq!(after.data[0].name, before.data[0].name);

    data.projects().await;
    assert_eq!(store.calls(StoreOp::Select, "projects"), 1);
    assert_eq!(store.rows("projects").len(), 1);
}

#[tokio::test]
async fn failed_update_leaves_tasks_cached() {
    let (store, data) = setup(MemoryStore::new());
    store.seed(
        "tasks",
        vec![row(json!({
            "id": "t1",
            "project_id": "p1",
            "title": "old title",
            "updated_at": "2024-01-01T00:00:00.000Z"
        }))],
    );
    let before = data.tasks().await;

    let mut edited = before.data[0].clone();
    edited.title = "new title".into();
    store.fail_next(StoreOp::Update, "connection reset");
    assert!(data.update_task(&edited).await.is_err());

    let after = data.peek::<Task>();
    assert_eq!(after.status, QueryStatus::Ready);
    assert!(after.error.is_none());
    assert_eq!(after.data[0].title, "old title");
    assert_eq!(after.data[0].updated_at, before.data[0].updated_at);

    data.tasks().await;
    assert_eq!(store.calls(StoreOp::Select, "tasks"), 1);
    assert_eq!(store.rows("tasks")[0]["title"], "old title");
}

#[tokio::test]
async fn read_failure_sets_error_and_keeps_it_until_invalidated() {
    let (store, data) = setup(MemoryStore::new());
    store.fail_next(StoreOp::Select, "dns failure");
    assert!(data.tasks().await.is_error());
    assert!(data.tasks().await.is_error());
    assert_eq!(store.calls(StoreOp::Select, "tasks"), 1);

    data.retry_all();
    let snap = data.tasks().await;
    assert!(snap.error.is_none());
    assert_eq!(snap.status, QueryStatus::Ready);
}

#[tokio::test]
async fn invalidation_during_fetch_leaves_collection_stale() {
    let (store, data) = setup(MemoryStore::new().with_latency(Duration::from_millis(50)));
    let invalidate_midway = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        data.invalidate(project_board::types::EntityKind::Task);
    };
    let (snap, ()) = tokio::join!(data.tasks(), invalidate_midway);
    assert!(snap.error.is_none());
    assert_eq!(data.peek::<Task>().status, QueryStatus::Stale);

    data.tasks().await;
    assert_eq!(store.calls(StoreOp::Select, "tasks"), 2);
}

#[tokio::test]
async fn writes_to_one_kind_leave_others_cached() {
    let (store, data) = setup(MemoryStore::new());
    data.projects().await;
    data.issues().await;
    data.delete_project("missing").await.unwrap();

    data.projects().await;
    data.issues().await;
    assert_eq!(store.calls(StoreOp::Select, "projects"), 2);
    assert_eq!(store.calls(StoreOp::Select, "issues"), 1);
}
