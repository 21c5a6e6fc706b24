//! Test data builders and repository wrappers shared by the integration tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use task_orchestrator::config::EngineConfig;
use task_orchestrator::models::{
    Dependency, EntityKind, FeatureRecord, ProjectRecord, Status, TaskRecord,
};
use task_orchestrator::repository::{DependencyRepository, EntityRepository, InMemoryRepository};
use task_orchestrator::state_machine::ConfigContext;
use task_orchestrator::{OrchestrationCore, OrchestratorError, Result};
use tempfile::TempDir;
use uuid::Uuid;

/// Orchestration core over an in-memory repository, rooted in a scratch workspace
pub struct TestWorld {
    pub repo: Arc<InMemoryRepository>,
    pub core: OrchestrationCore,
    pub workspace: TempDir,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::for_test())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let workspace = TempDir::new().expect("Failed to create test workspace");
        let core = OrchestrationCore::new(
            config,
            repo.clone(),
            repo.clone(),
            ConfigContext::new(workspace.path()),
        )
        .expect("Failed to build orchestration core");
        Self {
            repo,
            core,
            workspace,
        }
    }

    pub fn task(&self) -> TaskBuilder<'_> {
        TaskBuilder::new(&self.repo)
    }

    /// Insert `n` pending tasks with increasing creation times
    pub fn tasks(&self, n: usize) -> Vec<Uuid> {
        (0..n)
            .map(|i| {
                self.task()
                    .titled(&format!("task {i}"))
                    .created_offset(i as i64)
                    .insert()
            })
            .collect()
    }

    pub fn feature(&self, status: &str, project_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.repo.insert_feature(FeatureRecord {
            id,
            name: format!("feature {}", &id.to_string()[..8]),
            status: status_of(status),
            project_id,
            created_at: Utc::now(),
        });
        id
    }

    pub fn project(&self, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.repo.insert_project(ProjectRecord {
            id,
            name: format!("project {}", &id.to_string()[..8]),
            status: status_of(status),
            created_at: Utc::now(),
        });
        id
    }

    /// Write a workflow document into this world's workspace
    pub fn write_workflow(&self, contents: &str) {
        write_workflow(self.workspace.path(), contents);
    }

    pub async fn status_of(&self, kind: EntityKind, id: Uuid) -> Status {
        self.repo
            .current_status(kind, id)
            .await
            .expect("status lookup failed")
            .expect("entity missing")
    }
}

pub fn write_workflow(root: &Path, contents: &str) {
    let dir = root.join(".taskorchestrator");
    std::fs::create_dir_all(&dir).expect("Failed to create workflow config dir");
    std::fs::write(dir.join("config.yaml"), contents).expect("Failed to write workflow config");
}

pub fn status_of(raw: &str) -> Status {
    Status::parse(raw).expect("invalid status in test")
}

/// Builder pattern for creating test tasks
pub struct TaskBuilder<'a> {
    repo: &'a InMemoryRepository,
    title: String,
    status: String,
    summary: Option<String>,
    feature_id: Option<Uuid>,
    created_offset_ms: i64,
}

impl<'a> TaskBuilder<'a> {
    pub fn new(repo: &'a InMemoryRepository) -> Self {
        Self {
            repo,
            title: "test task".to_string(),
            status: "pending".to_string(),
            summary: None,
            feature_id: None,
            created_offset_ms: 0,
        }
    }

    pub fn titled(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn summary_chars(mut self, length: usize) -> Self {
        self.summary = Some("s".repeat(length));
        self
    }

    pub fn in_feature(mut self, feature_id: Uuid) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    pub fn created_offset(mut self, millis: i64) -> Self {
        self.created_offset_ms = millis;
        self
    }

    pub fn insert(self) -> Uuid {
        let id = Uuid::new_v4();
        self.repo.insert_task(TaskRecord {
            id,
            title: self.title,
            status: status_of(&self.status),
            summary: self.summary,
            feature_id: self.feature_id,
            created_at: Utc::now() + Duration::milliseconds(self.created_offset_ms),
        });
        id
    }
}

/// Dependency repository whose deletes fail for selected ids
#[derive(Debug)]
pub struct FailingDeleteRepository {
    inner: Arc<InMemoryRepository>,
    failing: Mutex<HashSet<Uuid>>,
}

impl FailingDeleteRepository {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_deletes_of(&self, id: Uuid) {
        self.failing.lock().insert(id);
    }
}

#[async_trait]
impl DependencyRepository for FailingDeleteRepository {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.inner.create(dependency).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dependency>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        self.inner.find_by_task(task_id).await
    }

    async fn find_all(&self) -> Result<Vec<Dependency>> {
        self.inner.find_all().await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        if self.failing.lock().contains(&id) {
            return Err(OrchestratorError::repository("storage unavailable"));
        }
        self.inner.delete_by_id(id).await
    }

    async fn delete_by_task(&self, task_id: Uuid) -> Result<usize> {
        self.inner.delete_by_task(task_id).await
    }
}

/// Dependency repository that stalls edge lookups, widening the gap between a cycle
/// check and the write that follows it
#[derive(Debug)]
pub struct SlowDependencyRepository {
    inner: Arc<InMemoryRepository>,
    delay: std::time::Duration,
}

impl SlowDependencyRepository {
    pub fn new(inner: Arc<InMemoryRepository>, delay: std::time::Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl DependencyRepository for SlowDependencyRepository {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.inner.create(dependency).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dependency>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_by_task(task_id).await
    }

    async fn find_all(&self) -> Result<Vec<Dependency>> {
        self.inner.find_all().await
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_by_id(id).await
    }

    async fn delete_by_task(&self, task_id: Uuid) -> Result<usize> {
        self.inner.delete_by_task(task_id).await
    }
}

/// One step of a status change as seen by the entity store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Read { status: Status },
    Write { status: Status },
}

/// Entity repository that records status reads and writes and slows them down, so
/// overlapping status changes would interleave if nothing serialized them
#[derive(Debug)]
pub struct RecordingEntityRepository {
    inner: Arc<InMemoryRepository>,
    delay: std::time::Duration,
    log: Mutex<Vec<StoreEvent>>,
}

impl RecordingEntityRepository {
    pub fn new(inner: Arc<InMemoryRepository>, delay: std::time::Duration) -> Self {
        Self {
            inner,
            delay,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl EntityRepository for RecordingEntityRepository {
    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>> {
        self.inner.get_task(id).await
    }

    async fn get_feature(&self, id: Uuid) -> Result<Option<FeatureRecord>> {
        self.inner.get_feature(id).await
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>> {
        self.inner.get_project(id).await
    }

    async fn tasks_for_feature(&self, feature_id: Uuid) -> Result<Vec<TaskRecord>> {
        self.inner.tasks_for_feature(feature_id).await
    }

    async fn features_for_project(&self, project_id: Uuid) -> Result<Vec<FeatureRecord>> {
        self.inner.features_for_project(project_id).await
    }

    async fn update_status(&self, kind: EntityKind, id: Uuid, status: &Status) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        let updated = self.inner.update_status(kind, id, status).await?;
        self.log.lock().push(StoreEvent::Write {
            status: status.clone(),
        });
        Ok(updated)
    }

    async fn current_status(&self, kind: EntityKind, id: Uuid) -> Result<Option<Status>> {
        let status = self.inner.current_status(kind, id).await?;
        if let Some(status) = &status {
            self.log.lock().push(StoreEvent::Read {
                status: status.clone(),
            });
        }
        tokio::time::sleep(self.delay).await;
        Ok(status)
    }
}
