//! In-memory repository backed by `HashMap`s behind `parking_lot` locks.
//!
//! Suitable for tests and short-lived embedding. Locks are never held across an
//! `.await`, so every trait method completes without yielding.

use super::{DependencyRepository, EntityRepository};
use crate::error::Result;
use crate::models::{Dependency, EntityKind, FeatureRecord, ProjectRecord, Status, TaskRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Entities {
    tasks: HashMap<Uuid, TaskRecord>,
    features: HashMap<Uuid, FeatureRecord>,
    projects: HashMap<Uuid, ProjectRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    entities: RwLock<Entities>,
    dependencies: RwLock<HashMap<Uuid, Dependency>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&self, task: TaskRecord) {
        self.entities.write().tasks.insert(task.id, task);
    }

    pub fn insert_feature(&self, feature: FeatureRecord) {
        self.entities.write().features.insert(feature.id, feature);
    }

    pub fn insert_project(&self, project: ProjectRecord) {
        self.entities.write().projects.insert(project.id, project);
    }

    pub fn set_task_summary(&self, id: Uuid, summary: Option<String>) -> bool {
        match self.entities.write().tasks.get_mut(&id) {
            Some(task) => {
                task.summary = summary;
                true
            }
            None => false,
        }
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.read().len()
    }
}

fn sort_oldest_first(dependencies: &mut [Dependency]) {
    dependencies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl DependencyRepository for InMemoryRepository {
    async fn create(&self, dependency: Dependency) -> Result<Dependency> {
        self.dependencies
            .write()
            .insert(dependency.id, dependency.clone());
        Ok(dependency)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dependency>> {
        Ok(self.dependencies.read().get(&id).cloned())
    }

    async fn find_by_task(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        let mut found: Vec<Dependency> = self
            .dependencies
            .read()
            .values()
            .filter(|dependency| dependency.involves(task_id))
            .cloned()
            .collect();
        sort_oldest_first(&mut found);
        Ok(found)
    }

    async fn find_all(&self) -> Result<Vec<Dependency>> {
        let mut all: Vec<Dependency> = self.dependencies.read().values().cloned().collect();
        sort_oldest_first(&mut all);
        Ok(all)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.dependencies.write().remove(&id).is_some())
    }

    async fn delete_by_task(&self, task_id: Uuid) -> Result<usize> {
        let mut dependencies = self.dependencies.write();
        let before = dependencies.len();
        dependencies.retain(|_, dependency| !dependency.involves(task_id));
        Ok(before - dependencies.len())
    }
}

#[async_trait]
impl EntityRepository for InMemoryRepository {
    async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>> {
        Ok(self.entities.read().tasks.get(&id).cloned())
    }

    async fn get_feature(&self, id: Uuid) -> Result<Option<FeatureRecord>> {
        Ok(self.entities.read().features.get(&id).cloned())
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<ProjectRecord>> {
        Ok(self.entities.read().projects.get(&id).cloned())
    }

    async fn tasks_for_feature(&self, feature_id: Uuid) -> Result<Vec<TaskRecord>> {
        let mut tasks: Vec<TaskRecord> = self
            .entities
            .read()
            .tasks
            .values()
            .filter(|task| task.feature_id == Some(feature_id))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn features_for_project(&self, project_id: Uuid) -> Result<Vec<FeatureRecord>> {
        let mut features: Vec<FeatureRecord> = self
            .entities
            .read()
            .features
            .values()
            .filter(|feature| feature.project_id == Some(project_id))
            .cloned()
            .collect();
        features.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(features)
    }

    async fn update_status(&self, kind: EntityKind, id: Uuid, status: &Status) -> Result<bool> {
        let mut entities = self.entities.write();
        let slot = match kind {
            EntityKind::Task => entities.tasks.get_mut(&id).map(|task| &mut task.status),
            EntityKind::Feature => entities
                .features
                .get_mut(&id)
                .map(|feature| &mut feature.status),
            EntityKind::Project => entities
                .projects
                .get_mut(&id)
                .map(|project| &mut project.status),
        };

        match slot {
            Some(current) => {
                *current = status.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_tasks(&self, ids: &[Uuid]) -> Result<Vec<TaskRecord>> {
        let entities = self.entities.read();
        Ok(ids
            .iter()
            .filter_map(|id| entities.tasks.get(id).cloned())
            .collect())
    }
}
