//! # Dependency Store
//!
//! Typed access to the dependency repository with the validation the repository does not
//! do itself. Checks on `add` run cheapest first so a bad request never reaches the
//! graph walk:
//!
//! 1. self-dependency and `unblockAt` shape (no I/O)
//! 2. both endpoints exist (two entity lookups)
//! 3. no identical `(from, to, type)` edge (one edge query)
//! 4. the edge does not close a blocking cycle (BFS over the blocked end's downstream)
//! 5. persist
//!
//! Blocking edges are checked and persisted under one store-wide mutex. Endpoint locks
//! alone cannot stop two adds over disjoint pairs from each passing the cycle walk before
//! the other is written. `RELATES_TO` edges skip it.

use super::{DependencyGraph, TraversalDirection};
use crate::constants::events;
use crate::error::{MissingRecord, OrchestratorError, Result};
use crate::logging::log_dependency_operation;
use crate::models::{Dependency, DependencyType, NewDependency};
use crate::repository::{DependencyRepository, EntityRepository};
use crate::validation::validate_new_dependency;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-item outcome of a bulk delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted: Vec<Uuid>,
    pub failed: Vec<DeleteFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFailure {
    pub dependency_id: Uuid,
    pub reason: String,
}

impl BulkDeleteReport {
    pub fn count(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-item outcome of a batch create
#[derive(Debug, Default)]
pub struct BatchCreateReport {
    pub results: Vec<Result<Dependency>>,
}

impl BatchCreateReport {
    pub fn created(&self) -> impl Iterator<Item = &Dependency> {
        self.results.iter().filter_map(|result| result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &OrchestratorError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| result.as_ref().err().map(|err| (index, err)))
    }
}

#[derive(Clone)]
pub struct DependencyStore {
    dependencies: Arc<dyn DependencyRepository>,
    entities: Arc<dyn EntityRepository>,
    blocking_writes: Arc<Mutex<()>>,
}

impl std::fmt::Debug for DependencyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyStore").finish_non_exhaustive()
    }
}

impl DependencyStore {
    pub fn new(
        dependencies: Arc<dyn DependencyRepository>,
        entities: Arc<dyn EntityRepository>,
    ) -> Self {
        Self {
            dependencies,
            entities,
            blocking_writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn entities(&self) -> &Arc<dyn EntityRepository> {
        &self.entities
    }

    /// Validate and persist a new dependency
    pub async fn add(&self, request: NewDependency) -> Result<Dependency> {
        let _serialized = if request.dependency_type.is_blocking() {
            Some(self.blocking_writes.lock().await)
        } else {
            None
        };

        match self.check_new(&request).await {
            Ok(()) => {}
            Err(err) => {
                debug!(
                    event = events::DEPENDENCY_REJECTED,
                    from_task_id = %request.from_task_id,
                    to_task_id = %request.to_task_id,
                    dependency_type = %request.dependency_type,
                    error = %err,
                    "Dependency rejected"
                );
                return Err(err);
            }
        }

        let dependency = self.dependencies.create(request.into_dependency()).await?;
        log_dependency_operation(
            events::DEPENDENCY_CREATED,
            Some(dependency.id),
            Some(dependency.from_task_id),
            Some(dependency.to_task_id),
            "created",
            Some(dependency.dependency_type.as_str()),
        );
        Ok(dependency)
    }

    async fn check_new(&self, request: &NewDependency) -> Result<()> {
        validate_new_dependency(request)?;

        for task_id in [request.from_task_id, request.to_task_id] {
            if !self.entities.task_exists(task_id).await? {
                return Err(OrchestratorError::not_found(MissingRecord::Task, task_id));
            }
        }

        let existing = self.dependencies.find_by_task(request.from_task_id).await?;
        if existing.iter().any(|dependency| {
            dependency.matches_relation(
                request.from_task_id,
                request.to_task_id,
                request.dependency_type,
            )
        }) {
            return Err(OrchestratorError::DuplicateDependency {
                from_task_id: request.from_task_id,
                to_task_id: request.to_task_id,
                dependency_type: request.dependency_type,
            });
        }

        if let Some((blocker, blocked)) = request.blocking_pair() {
            if self.reaches(blocked, blocker).await? {
                warn!(
                    from_task_id = %request.from_task_id,
                    to_task_id = %request.to_task_id,
                    dependency_type = %request.dependency_type,
                    "Rejected dependency that would close a blocking cycle"
                );
                return Err(OrchestratorError::CycleDetected {
                    from_task_id: request.from_task_id,
                    to_task_id: request.to_task_id,
                    dependency_type: request.dependency_type,
                });
            }
        }

        Ok(())
    }

    /// Create several dependencies in order, recording each outcome
    ///
    /// Earlier items are visible to the checks of later ones, so a batch cannot sneak a
    /// cycle in across two items.
    pub async fn add_many(&self, requests: Vec<NewDependency>) -> BatchCreateReport {
        let mut report = BatchCreateReport::default();
        for request in requests {
            report.results.push(self.add(request).await);
        }
        report
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Dependency>> {
        self.dependencies.find_by_id(id).await
    }

    /// `Ok(false)` when no dependency has that id
    pub async fn remove_by_id(&self, id: Uuid) -> Result<bool> {
        let removed = self.dependencies.delete_by_id(id).await?;
        if removed {
            log_dependency_operation(
                events::DEPENDENCY_DELETED,
                Some(id),
                None,
                None,
                "deleted",
                None,
            );
        }
        Ok(removed)
    }

    /// Delete every edge `from -> to` (any `to` when `None`) of the given type (any when `None`)
    pub async fn remove_by_relation(
        &self,
        from: Uuid,
        to: Option<Uuid>,
        dependency_type: Option<DependencyType>,
    ) -> Result<BulkDeleteReport> {
        let targets: Vec<Uuid> = self
            .dependencies
            .find_by_task(from)
            .await?
            .into_iter()
            .filter(|dependency| dependency.from_task_id == from)
            .filter(|dependency| to.map_or(true, |to| dependency.to_task_id == to))
            .filter(|dependency| {
                dependency_type.map_or(true, |kind| dependency.dependency_type == kind)
            })
            .map(|dependency| dependency.id)
            .collect();

        let mut report = BulkDeleteReport::default();
        for id in targets {
            match self.dependencies.delete_by_id(id).await {
                Ok(true) => report.deleted.push(id),
                Ok(false) => report.failed.push(DeleteFailure {
                    dependency_id: id,
                    reason: "dependency no longer exists".to_string(),
                }),
                Err(err) => report.failed.push(DeleteFailure {
                    dependency_id: id,
                    reason: err.to_string(),
                }),
            }
        }

        log_dependency_operation(
            events::DEPENDENCIES_BULK_DELETED,
            None,
            Some(from),
            to,
            if report.is_complete() { "deleted" } else { "partial" },
            Some(&format!(
                "deleted={} failed={}",
                report.deleted.len(),
                report.failed.len()
            )),
        );
        Ok(report)
    }

    /// Delete every edge touching `task_id`; zero when there were none
    pub async fn remove_all_for_task(&self, task_id: Uuid) -> Result<usize> {
        let removed = self.dependencies.delete_by_task(task_id).await?;
        if removed > 0 {
            log_dependency_operation(
                events::DEPENDENCIES_BULK_DELETED,
                None,
                Some(task_id),
                None,
                "deleted",
                Some(&format!("deleted={removed}")),
            );
        }
        Ok(removed)
    }

    pub async fn list_by_task(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        self.dependencies.find_by_task(task_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<Dependency>> {
        self.dependencies.find_all().await
    }

    /// Blocking edges whose blocked end is `task_id`
    pub async fn blockers_of(&self, task_id: Uuid) -> Result<Vec<Dependency>> {
        Ok(self
            .dependencies
            .find_by_task(task_id)
            .await?
            .into_iter()
            .filter(|dependency| dependency.blocks_task(task_id))
            .collect())
    }

    /// Every blocking edge reachable from `start` walking in `direction`
    ///
    /// Issues one repository query per visited task; each task is visited once.
    pub async fn blocking_subgraph(
        &self,
        start: Uuid,
        direction: TraversalDirection,
    ) -> Result<Vec<Dependency>> {
        let mut collected: HashMap<Uuid, Dependency> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for dependency in self.dependencies.find_by_task(node).await? {
                let Some((blocker, blocked)) = dependency.blocking_pair() else {
                    continue;
                };
                let next = match direction {
                    TraversalDirection::Outgoing if blocker == node => blocked,
                    TraversalDirection::Incoming if blocked == node => blocker,
                    _ => continue,
                };
                collected.entry(dependency.id).or_insert(dependency);
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        Ok(collected.into_values().collect())
    }

    /// Whether `to` is downstream of `from` in the blocking graph
    async fn reaches(&self, from: Uuid, to: Uuid) -> Result<bool> {
        let downstream = self
            .blocking_subgraph(from, TraversalDirection::Outgoing)
            .await?;
        Ok(DependencyGraph::from_edges(&downstream).reaches(from, to))
    }
}
