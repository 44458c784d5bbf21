//! Data layer
//!
//! [`ProjectData`] owns the store handle and one [`QueryCell`] per entity
//! kind. Reads go through the cells; writes go through [`ProjectData::mutate`],
//! which invalidates the written kind only after the store call succeeded.
//! A failed write returns its error to the caller and leaves both the cached
//! collection and the kind's fetch error untouched.
//!
//! Custom sections are never read from or sent to the store. They are kept per
//! session in [`ProjectData`] and laid over every project it hands out, so
//! they survive re-fetches until the session ends.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::cache::{QueryCell, QuerySnapshot};
use crate::error::ServiceResult;
use crate::mapper;
use crate::store::{OrderBy, RemoteStore, Row};
use crate::types::{CustomSection, EntityKind, Issue, NewIssue, NewProject, NewTask, Project, Task};

/// An entity kind the data layer can fetch and write generically.
pub trait Resource: Clone + Send + Sync + Sized + 'static {
    const KIND: EntityKind;
    type Draft: Send + Sync;

    fn from_row(row: &Row) -> Self;
    fn insert_row(draft: &Self::Draft) -> Row;
    /// Mutable fields plus `updated_at`.
    fn update_row(&self, updated_at: &str) -> Row;
    fn id(&self) -> &str;
    fn set_updated_at(&mut self, updated_at: String);
    fn cell(data: &ProjectData) -> &QueryCell<Self>;

    fn order() -> Option<OrderBy> {
        None
    }

    /// Session-local state to lay over a snapshot before handing it out.
    fn attach(_items: &mut [Self], _data: &ProjectData) {}
}

impl Resource for Project {
    const KIND: EntityKind = EntityKind::Project;
    type Draft = NewProject;

    fn from_row(row: &Row) -> Self {
        mapper::map_project(row)
    }

    fn insert_row(draft: &NewProject) -> Row {
        mapper::project_insert_row(draft)
    }

    fn update_row(&self, updated_at: &str) -> Row {
        mapper::project_update_row(self, updated_at)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_updated_at(&mut self, updated_at: String) {
        self.updated_at = updated_at;
    }

    fn cell(data: &ProjectData) -> &QueryCell<Self> {
        &data.projects
    }

    fn order() -> Option<OrderBy> {
        Some(OrderBy::desc("created_at"))
    }

    fn attach(items: &mut [Self], data: &ProjectData) {
        let sections = data.sections();
        for project in items {
            if let Some(list) = sections.get(&project.id) {
                project.custom_sections = list.clone();
            }
        }
    }
}

impl Resource for Task {
    const KIND: EntityKind = EntityKind::Task;
    type Draft = NewTask;

    fn from_row(row: &Row) -> Self {
        mapper::map_task(row)
    }

    fn insert_row(draft: &NewTask) -> Row {
        mapper::task_insert_row(draft)
    }

    fn update_row(&self, updated_at: &str) -> Row {
        mapper::task_update_row(self, updated_at)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_updated_at(&mut self, updated_at: String) {
        self.updated_at = updated_at;
    }

    fn cell(data: &ProjectData) -> &QueryCell<Self> {
        &data.tasks
    }
}

impl Resource for Issue {
    const KIND: EntityKind = EntityKind::Issue;
    type Draft = NewIssue;

    fn from_row(row: &Row) -> Self {
        mapper::map_issue(row)
    }

    fn insert_row(draft: &NewIssue) -> Row {
        mapper::issue_insert_row(draft)
    }

    fn update_row(&self, updated_at: &str) -> Row {
        mapper::issue_update_row(self, updated_at)
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_updated_at(&mut self, updated_at: String) {
        self.updated_at = updated_at;
    }

    fn cell(data: &ProjectData) -> &QueryCell<Self> {
        &data.issues
    }
}

/// Current time in the store's timestamp format.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One per session; pass it by reference to whatever reads or writes.
pub struct ProjectData {
    store: Arc<dyn RemoteStore>,
    projects: QueryCell<Project>,
    tasks: QueryCell<Task>,
    issues: QueryCell<Issue>,
    sections: Mutex<HashMap<String, Vec<CustomSection>>>,
}

impl ProjectData {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            projects: QueryCell::new(EntityKind::Project),
            tasks: QueryCell::new(EntityKind::Task),
            issues: QueryCell::new(EntityKind::Issue),
            sections: Mutex::new(HashMap::new()),
        }
    }

    // read path

    /// Cached collection of `R`, fetched on first access or after invalidation.
    pub async fn list<R: Resource>(&self) -> QuerySnapshot<R> {
        let mut snapshot = R::cell(self).read(|| self.fetch::<R>()).await;
        R::attach(&mut snapshot.data, self);
        snapshot
    }

    /// Cached collection of `R` as it is right now; never fetches.
    pub fn peek<R: Resource>(&self) -> QuerySnapshot<R> {
        let mut snapshot = R::cell(self).snapshot();
        R::attach(&mut snapshot.data, self);
        snapshot
    }

    fn sections(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<CustomSection>>> {
        self.sections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch<R: Resource>(&self) -> ServiceResult<Vec<R>> {
        let rows = self
            .store
            .select_all(R::KIND.collection(), R::order())
            .await?;
        Ok(rows.iter().map(R::from_row).collect())
    }

    pub async fn projects(&self) -> QuerySnapshot<Project> {
        self.list::<Project>().await
    }

    pub async fn tasks(&self) -> QuerySnapshot<Task> {
        self.list::<Task>().await
    }

    pub async fn issues(&self) -> QuerySnapshot<Issue> {
        self.list::<Issue>().await
    }

    // invalidation

    pub fn invalidate(&self, kind: EntityKind) {
        match kind {
            EntityKind::Project => self.projects.invalidate(),
            EntityKind::Task => self.tasks.invalidate(),
            EntityKind::Issue => self.issues.invalidate(),
        }
    }

    /// Mark every collection stale; used to recover from fetch errors.
    pub fn retry_all(&self) {
        for kind in EntityKind::ALL {
            self.invalidate(kind);
        }
    }

    // write path

    /// Run one store write and invalidate `kind` if it succeeded.
    async fn mutate<T, Fut>(&self, kind: EntityKind, action: &'static str, write: Fut) -> ServiceResult<T>
    where
        Fut: Future<Output = ServiceResult<T>>,
    {
        match write.await {
            Ok(value) => {
                info!(collection = kind.collection(), action, "write succeeded");
                self.invalidate(kind);
                Ok(value)
            }
            Err(err) => {
                warn!(collection = kind.collection(), action, error = %err, "write failed");
                Err(err)
            }
        }
    }

    pub async fn create<R: Resource>(&self, draft: &R::Draft) -> ServiceResult<R> {
        let row = R::insert_row(draft);
        self.mutate(R::KIND, "create", async {
            let stored = self.store.insert_one(R::KIND.collection(), row).await?;
            Ok(R::from_row(&stored))
        })
        .await
    }

    /// Send the mutable fields of `entity` with a fresh `updated_at`; returns
    /// the entity carrying that timestamp.
    pub async fn update<R: Resource>(&self, entity: &R) -> ServiceResult<R> {
        let updated_at = timestamp();
        let patch = entity.update_row(&updated_at);
        self.mutate(
            R::KIND,
            "update",
            self.store
                .update_by_id(R::KIND.collection(), entity.id(), patch),
        )
        .await?;

        let mut updated = entity.clone();
        updated.set_updated_at(updated_at);
        Ok(updated)
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> ServiceResult<()> {
        self.mutate(
            R::KIND,
            "delete",
            self.store.delete_by_id(R::KIND.collection(), id),
        )
        .await
    }

    pub async fn create_project(&self, draft: &NewProject) -> ServiceResult<Project> {
        self.create::<Project>(draft).await
    }

    pub async fn update_project(&self, project: &Project) -> ServiceResult<Project> {
        self.update(project).await
    }

    pub async fn delete_project(&self, id: &str) -> ServiceResult<()> {
        self.delete::<Project>(id).await?;
        self.sections().remove(id);
        Ok(())
    }

    /// Save `project` and keep its section list for the rest of the session.
    /// The list is only kept if the store accepted the update.
    pub async fn update_sections(&self, project: &Project) -> ServiceResult<Project> {
        let updated = self.update_project(project).await?;
        self.sections()
            .insert(project.id.clone(), project.custom_sections.clone());
        Ok(updated)
    }

    pub async fn create_task(&self, draft: &NewTask) -> ServiceResult<Task> {
        self.create::<Task>(draft).await
    }

    pub async fn update_task(&self, task: &Task) -> ServiceResult<Task> {
        self.update(task).await
    }

    pub async fn delete_task(&self, id: &str) -> ServiceResult<()> {
        self.delete::<Task>(id).await
    }

    pub async fn create_issue(&self, draft: &NewIssue) -> ServiceResult<Issue> {
        self.create::<Issue>(draft).await
    }

    pub async fn update_issue(&self, issue: &Issue) -> ServiceResult<Issue> {
        self.update(issue).await
    }

    pub async fn delete_issue(&self, id: &str) -> ServiceResult<()> {
        self.delete::<Issue>(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryStatus;
    use crate::store::{MemoryStore, StoreOp};

    fn setup() -> (Arc<MemoryStore>, ProjectData) {
        let store = Arc::new(MemoryStore::new());
        let data = ProjectData::new(store.clone());
        (store, data)
    }

    #[tokio::test]
    async fn test_first_read_fetches_once() {
        let (store, data) = setup();
        assert!(data.peek::<Task>().loading);

        let snap = data.tasks().await;
        assert!(snap.data.is_empty());
        assert!(!snap.loading);
        data.tasks().await;
        assert_eq!(store.calls(StoreOp::Select, "tasks"), 1);
    }

    #[tokio::test]
    async fn test_write_only_invalidates_its_own_kind() {
        let (store, data) = setup();
        data.projects().await;
        data.tasks().await;

        data.create_task(&NewTask {
            project_id: "p".into(),
            title: "t".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(data.peek::<Task>().status, QueryStatus::Stale);
        assert_eq!(data.peek::<Project>().status, QueryStatus::Ready);
        data.projects().await;
        assert_eq!(store.calls(StoreOp::Select, "projects"), 1);
    }

    #[tokio::test]
    async fn test_update_returns_fresh_timestamp() {
        let (_store, data) = setup();
        let created = data
            .create_project(&NewProject {
                name: "X".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let mut edited = created.clone();
        edited.updated_at = "2000-01-01T00:00:00.000Z".into();
        let updated = data.update_project(&edited).await.unwrap();
        assert!(updated.updated_at > edited.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_sections_survive_refetch_within_session() {
        let (store, data) = setup();
        store.push_next_id("p1");
        data.create_project(&NewProject {
            name: "Site".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let project = data.projects().await.data[0].clone();
        assert!(project.custom_sections.is_empty());

        let with_section =
            crate::sections::add_section(&project, "Docs", "https://x", None, &timestamp()).unwrap();
        data.update_sections(&with_section).await.unwrap();

        let refetched = data.projects().await;
        assert_eq!(refetched.data[0].custom_sections.len(), 1);
        assert_eq!(refetched.data[0].custom_sections[0].title, "Docs");
        assert!(!store.rows("projects")[0].contains_key("custom_sections"));
        assert_eq!(store.calls(StoreOp::Select, "projects"), 2);
    }

    #[tokio::test]
    async fn test_failed_section_update_is_not_kept() {
        let (store, data) = setup();
        store.push_next_id("p1");
        data.create_project(&NewProject {
            name: "Site".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let project = data.projects().await.data[0].clone();
        let with_section =
            crate::sections::add_section(&project, "Docs", "body", None, &timestamp()).unwrap();

        store.fail_next(StoreOp::Update, "offline");
        assert!(data.update_sections(&with_section).await.is_err());
        assert!(data.peek::<Project>().data[0].custom_sections.is_empty());
    }

    #[tokio::test]
    async fn test_retry_all_marks_every_kind_stale() {
        let (store, data) = setup();
        store.fail_next(StoreOp::Select, "offline");
        let projects = data.projects().await;
        assert!(projects.is_error());
        data.tasks().await;
        data.issues().await;

        data.retry_all();
        for status in [
            data.peek::<Project>().status,
            data.peek::<Task>().status,
            data.peek::<Issue>().status,
        ] {
            assert_eq!(status, QueryStatus::Stale);
        }

        let projects = data.projects().await;
        assert!(projects.error.is_none());
        assert_eq!(store.calls(StoreOp::Select, "projects"), 2);
    }
}
