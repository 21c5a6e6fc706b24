//! # Repository Interfaces
//!
//! Persistence is owned by an external store. The core talks to it through two traits:
//!
//! - [`DependencyRepository`]: CRUD over dependency edges
//! - [`EntityRepository`]: read access to tasks/features/projects plus status writes
//!
//! Implementations must give read-committed consistency and make each individual
//! create/delete atomic; the core layers its own validation ordering and per-entity
//! locking on top and never opens storage transactions itself.
//!
//! [`InMemoryRepository`] implements both traits and backs the test suite.

pub mod in_memory;

use crate::error::Result;
use crate::models::{Dependency, EntityKind, FeatureRecord, ProjectRecord, Status, TaskRecord};
use async_trait::async_trait;
use uuid::Uuid;

pub use in_memory::InMemoryRepository;

#[async_trait]
pub trait DependencyRepository: Send + Sync {
    /// Persist an already-validated dependency
    async fn create(&self, dependency: Dependency) -> Result<Dependency>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dependency>>;

    /// Every edge with `task_id` at either end, oldest first
    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Dependency>>;

    async fn find_all(&self) -> Result<Vec<Dependency>>;

    /// Returns `false` when no edge with that id exists
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;

    /// Delete every edge touching `task_id`, returning how many were removed
    async fn delete_by_task(&self, task_id: Uuid) -> Result<usize>;
}

#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>>;

    async fn get_feature(&self, id: Uuid) -> Result<Option<FeatureRecord>>;

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>>;

    async fn tasks_for_feature(&self, feature_id: Uuid) -> Result<Vec<TaskRecord>>;

    async fn features_for_project(&self, project_id: Uuid) -> Result<Vec<FeatureRecord>>;

    /// Overwrite the status of an entity; `false` when the entity does not exist
    async fn update_status(&self, kind: EntityKind, id: Uuid, status: &Status) -> Result<bool>;

    /// Batch task lookup; ids that do not resolve are skipped
    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<TaskRecord>> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get_task(*id).await? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    async fn task_exists(&self, id: Uuid) -> Result<bool> {
        Ok(self.get_task(id).await?.is_some())
    }

    async fn current_status(&self, kind: EntityKind, id: Uuid) -> Result<Option<Status>> {
        let status = match kind {
            EntityKind::Task => self.get_task(id).await?.map(|task| task.status),
            EntityKind::Feature => self.get_feature(id).await?.map(|feature| feature.status),
            EntityKind::Project => self.get_project(id).await?.map(|project| project.status),
        };
        Ok(status)
    }
}
