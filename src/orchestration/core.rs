//! # Orchestration Core
//!
//! The single entry point the tool layer talks to. Wires the dependency store and
//! analyzer, the workflow config cache, the transition validator, the prerequisite checker
//! and the entity lock manager from one [`EngineConfig`].
//!
//! Mutating operations run under [`EntityLockManager`]:
//!
//! - dependency edits lock both endpoint tasks, always in ascending id order
//! - status changes lock the entity whose status changes
//!
//! Read operations take no locks.

use crate::config::{ConfigManager, EngineConfig};
use crate::constants::events;
use crate::coordination::{EntityLockGuard, EntityLockManager};
use crate::dependencies::{
    BatchCreateReport, BulkDeleteReport, DependencyStore, Direction, GraphAnalyzer, GraphReport,
    NeighborQuery, NeighborSet,
};
use crate::error::{MissingRecord, OrchestratorError, Result};
use crate::logging::{log_error, log_status_operation};
use crate::models::{Dependency, DependencyType, EntityKind, NewDependency, Status};
use crate::repository::{DependencyRepository, EntityRepository};
use crate::state_machine::guards::missing_record;
use crate::state_machine::{
    BlockingItem, CacheStats, ConfigCache, ConfigContext, PrerequisiteChecker,
    PrerequisiteOutcome, TransitionValidator, ValidationResult, WorkflowConfigSource,
    WorkflowSpec, YamlFileConfigSource,
};
use crate::validation::{parse_unblock_role, validate_new_dependency};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// A status change that was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub entity_id: Uuid,
    pub kind: EntityKind,
    pub from: Status,
    pub to: Status,
}

#[derive(Debug, Clone)]
pub struct OrchestrationCore {
    config: Arc<EngineConfig>,
    store: DependencyStore,
    analyzer: GraphAnalyzer,
    cache: Arc<ConfigCache>,
    validator: TransitionValidator,
    checker: PrerequisiteChecker,
    locks: Arc<EntityLockManager>,
    context: ConfigContext,
}

impl OrchestrationCore {
    /// Build a core reading workflow documents from disk under `context`
    pub fn new(
        config: EngineConfig,
        dependencies: Arc<dyn DependencyRepository>,
        entities: Arc<dyn EntityRepository>,
        context: ConfigContext,
    ) -> Result<Self> {
        let source = Arc::new(YamlFileConfigSource::new(&config.workflow));
        Self::with_source(config, dependencies, entities, source, context)
    }

    pub fn from_config(
        manager: &ConfigManager,
        dependencies: Arc<dyn DependencyRepository>,
        entities: Arc<dyn EntityRepository>,
        context: ConfigContext,
    ) -> Result<Self> {
        info!(
            environment = %manager.environment(),
            config_directory = %manager.config_directory().display(),
            "Initializing OrchestrationCore from configuration"
        );
        Self::new(manager.config().clone(), dependencies, entities, context)
    }

    /// Build a core with a custom workflow document source
    pub fn with_source(
        config: EngineConfig,
        dependencies: Arc<dyn DependencyRepository>,
        entities: Arc<dyn EntityRepository>,
        source: Arc<dyn WorkflowConfigSource>,
        context: ConfigContext,
    ) -> Result<Self> {
        config.validate()?;

        let store = DependencyStore::new(dependencies, entities);
        let cache = Arc::new(ConfigCache::new(source, &config.cache));
        let checker =
            PrerequisiteChecker::new(store.clone(), cache.clone(), config.prerequisites.clone());

        debug!(
            cache_ttl_seconds = config.cache.ttl_seconds,
            lock_timeout_ms = config.locking.timeout_ms,
            context = %context.fingerprint(),
            "OrchestrationCore initialized"
        );

        Ok(Self {
            analyzer: GraphAnalyzer::new(store.clone()),
            validator: TransitionValidator::new(cache.clone()),
            locks: Arc::new(EntityLockManager::new(&config.locking)),
            config: Arc::new(config),
            store,
            cache,
            checker,
            context,
        })
    }

    /// Same engine (shared cache and locks) bound to another working context
    pub fn with_context(&self, context: ConfigContext) -> Self {
        Self {
            context,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &ConfigContext {
        &self.context
    }

    pub fn store(&self) -> &DependencyStore {
        &self.store
    }

    pub fn analyzer(&self) -> &GraphAnalyzer {
        &self.analyzer
    }

    pub fn lock_manager(&self) -> &EntityLockManager {
        &self.locks
    }

    // ----- dependencies -----

    /// Create a dependency from raw tool parameters
    pub async fn create_dependency(
        &self,
        from_task_id: Uuid,
        to_task_id: Uuid,
        dependency_type: DependencyType,
        unblock_at: Option<&str>,
    ) -> Result<Dependency> {
        let request = NewDependency {
            from_task_id,
            to_task_id,
            dependency_type,
            unblock_at: parse_unblock_role(unblock_at, dependency_type)?,
        };
        self.add_dependency(request).await
    }

    /// Create a typed dependency under the endpoint locks
    pub async fn add_dependency(&self, request: NewDependency) -> Result<Dependency> {
        // self-dependency would otherwise try to take the same lock twice
        validate_new_dependency(&request)?;
        let _guards = self
            .lock_tasks(request.from_task_id, request.to_task_id)
            .await?;
        self.store.add(request).await
    }

    /// Create several dependencies, recording each outcome without stopping at failures
    pub async fn create_dependencies(&self, requests: Vec<NewDependency>) -> BatchCreateReport {
        let mut report = BatchCreateReport::default();
        for request in requests {
            report.results.push(self.add_dependency(request).await);
        }
        report
    }

    /// Delete one dependency; a missing id is `NotFound`
    pub async fn delete_dependency(&self, id: Uuid) -> Result<bool> {
        let dependency = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(MissingRecord::Dependency, id))?;

        let _guards = self
            .lock_tasks(dependency.from_task_id, dependency.to_task_id)
            .await?;
        if self.store.remove_by_id(id).await? {
            Ok(true)
        } else {
            // removed by a concurrent caller between lookup and lock
            Err(OrchestratorError::not_found(MissingRecord::Dependency, id))
        }
    }

    pub async fn delete_dependencies(
        &self,
        from_task_id: Uuid,
        to_task_id: Option<Uuid>,
        dependency_type: Option<DependencyType>,
    ) -> Result<BulkDeleteReport> {
        let _guards = match to_task_id {
            Some(to) if to != from_task_id => self.lock_tasks(from_task_id, to).await?,
            _ => vec![self.locks.acquire(from_task_id).await?],
        };
        self.store
            .remove_by_relation(from_task_id, to_task_id, dependency_type)
            .await
    }

    /// Delete every dependency touching `task_id`
    pub async fn delete_task_dependencies(&self, task_id: Uuid) -> Result<usize> {
        self.locks
            .with_lock(task_id, || self.store.remove_all_for_task(task_id))
            .await
    }

    pub async fn query_neighbors(&self, task_id: Uuid, query: NeighborQuery) -> Result<NeighborSet> {
        self.require_task(task_id).await?;
        self.analyzer.neighbors(task_id, query).await
    }

    pub async fn query_graph(
        &self,
        task_id: Uuid,
        direction: Direction,
        include_task_info: bool,
    ) -> Result<GraphReport> {
        self.require_task(task_id).await?;
        self.analyzer
            .traverse(task_id, direction, include_task_info)
            .await
    }

    /// Blockers still preventing `task_id` from starting
    pub async fn blocked_by(&self, task_id: Uuid) -> Result<Vec<BlockingItem>> {
        self.checker.blocked_by(task_id, &self.context).await
    }

    // ----- status progression -----

    pub async fn workflow(&self, kind: EntityKind) -> Arc<WorkflowSpec> {
        self.cache.get(kind, &self.context).await
    }

    pub async fn validate_status(&self, kind: EntityKind, status: &str) -> ValidationResult {
        self.validator
            .validate_status(kind, status, &self.context)
            .await
    }

    pub async fn validate_transition(&self, kind: EntityKind, from: &str, to: &str) -> ValidationResult {
        let (from, to) = match (Status::parse(from), Status::parse(to)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(reason), _) | (_, Err(reason)) => return ValidationResult::Invalid(reason),
        };
        self.validator.validate(kind, &from, &to, &self.context).await
    }

    pub async fn validate_prerequisites(
        &self,
        entity_id: Uuid,
        kind: EntityKind,
        to: &str,
    ) -> Result<PrerequisiteOutcome> {
        let to = Status::parse(to).map_err(OrchestratorError::Validation)?;
        self.checker
            .check_transition(entity_id, kind, &to, &self.context)
            .await
    }

    /// Validate and apply a status change while holding the entity's lock
    ///
    /// The current status is read under the lock, so two concurrent changes to one entity
    /// each see the result of the other.
    pub async fn change_status(
        &self,
        entity_id: Uuid,
        kind: EntityKind,
        to: &str,
    ) -> Result<StatusChange> {
        let to = Status::parse(to).map_err(OrchestratorError::Validation)?;
        self.locks
            .with_lock(entity_id, || self.apply_status_change(entity_id, kind, to))
            .await
    }

    async fn apply_status_change(
        &self,
        entity_id: Uuid,
        kind: EntityKind,
        to: Status,
    ) -> Result<StatusChange> {
        let entities = self.store.entities();
        let from = entities
            .current_status(kind, entity_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(missing_record(kind), entity_id))?;

        if let ValidationResult::Invalid(reason) = self
            .validator
            .validate(kind, &from, &to, &self.context)
            .await
        {
            debug!(
                event = events::STATUS_TRANSITION_REJECTED,
                entity_id = %entity_id,
                entity_kind = %kind,
                from_status = %from,
                to_status = %to,
                reason = %reason,
                "Status transition rejected"
            );
            return Err(OrchestratorError::Validation(reason));
        }

        self.checker
            .check_transition(entity_id, kind, &to, &self.context)
            .await?
            .into_result()?;

        if !entities.update_status(kind, entity_id, &to).await? {
            log_error(
                "orchestration_core",
                "change_status",
                "entity disappeared before its status was written",
                Some(&entity_id.to_string()),
            );
            return Err(OrchestratorError::not_found(missing_record(kind), entity_id));
        }

        log_status_operation(
            events::STATUS_CHANGED,
            entity_id,
            &kind.to_string(),
            Some(from.as_str()),
            to.as_str(),
            None,
        );
        Ok(StatusChange {
            entity_id,
            kind,
            from,
            to,
        })
    }

    // ----- config cache -----

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached workflow specs; `None` clears every kind
    pub async fn invalidate_workflow_config(&self, kind: Option<EntityKind>) {
        match kind {
            Some(kind) => self.cache.invalidate(kind).await,
            None => self.cache.clear().await,
        }
    }

    // ----- helpers -----

    async fn require_task(&self, task_id: Uuid) -> Result<()> {
        if self.store.entities().task_exists(task_id).await? {
            Ok(())
        } else {
            Err(OrchestratorError::not_found(MissingRecord::Task, task_id))
        }
    }

    /// Lock two distinct tasks in ascending id order
    async fn lock_tasks(&self, a: Uuid, b: Uuid) -> Result<Vec<EntityLockGuard<'_>>> {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first = self.locks.acquire(first).await?;
        let second = self.locks.acquire(second).await?;
        Ok(vec![first, second])
    }
}
