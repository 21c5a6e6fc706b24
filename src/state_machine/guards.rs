//! # Transition Guards
//!
//! Entity-specific preconditions checked before a status change is applied. Each rule is a
//! [`StateGuard`]; [`PrerequisiteChecker`] picks the guards that apply to a
//! `(kind, target status)` pair and runs them in order, stopping at the first failure.
//!
//! | Kind    | Target                  | Guard                        |
//! |---------|-------------------------|------------------------------|
//! | task    | `COMPLETED`             | [`SummaryLengthGuard`]       |
//! | task    | `IN_PROGRESS`           | [`BlockersResolvedGuard`]    |
//! | feature | `IN_DEVELOPMENT`        | [`HasChildTasksGuard`]       |
//! | feature | `TESTING`, `COMPLETED`  | [`ChildTasksTerminalGuard`]  |
//! | project | `COMPLETED`             | [`ChildFeaturesTerminalGuard`] |
//!
//! Guards only read. Each issues a bounded number of repository calls: the entity, its
//! direct children or its incoming edges, and one batch lookup of the tasks involved.

use super::config_cache::ConfigCache;
use super::errors::{BlockingItem, PrerequisiteFailure, PrerequisiteRule};
use super::source::ConfigContext;
use super::states::{FeatureStatus, ProjectStatus, TaskStatus};
use crate::config::PrerequisiteConfig;
use crate::constants::events;
use crate::dependencies::DependencyStore;
use crate::error::{MissingRecord, OrchestratorError, Result};
use crate::models::{EntityKind, Status, StatusRole};
use crate::repository::EntityRepository;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Result of running the prerequisite guards for a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "failure", rename_all = "lowercase")]
pub enum PrerequisiteOutcome {
    Satisfied,
    Unmet(PrerequisiteFailure),
}

impl PrerequisiteOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    /// `Unmet` becomes [`OrchestratorError::PrerequisiteUnmet`]
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Satisfied => Ok(()),
            Self::Unmet(failure) => Err(OrchestratorError::PrerequisiteUnmet(failure)),
        }
    }
}

/// Read access a guard needs
pub struct GuardContext<'a> {
    pub entities: &'a dyn EntityRepository,
    pub store: &'a DependencyStore,
    pub cache: &'a ConfigCache,
    pub config_context: &'a ConfigContext,
    pub settings: &'a PrerequisiteConfig,
}

#[async_trait]
pub trait StateGuard: Send + Sync {
    /// `Ok(None)` when the guard passes
    async fn check(
        &self,
        entity_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Completed tasks need a summary within the configured length bounds
pub struct SummaryLengthGuard;

#[async_trait]
impl StateGuard for SummaryLengthGuard {
    async fn check(
        &self,
        task_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>> {
        let task = context
            .entities
            .get_task(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(MissingRecord::Task, task_id))?;

        let actual = task.summary_length();
        let (min, max) = (
            context.settings.summary_min_length,
            context.settings.summary_max_length,
        );
        let rule = PrerequisiteRule::SummaryLength { actual, min, max };

        let failure = if actual < min {
            Some(PrerequisiteFailure::new(
                rule,
                format!(
                    "Task summary is {actual} characters, below the minimum of {min} \
                     (required range {min}-{max})"
                ),
            ))
        } else if actual > max {
            Some(PrerequisiteFailure::new(
                rule,
                format!(
                    "Task summary is {actual} characters, above the maximum of {max} \
                     (required range {min}-{max})"
                ),
            ))
        } else {
            None
        };
        Ok(failure)
    }

    fn description(&self) -> &'static str {
        "Task summary must be within the configured length bounds"
    }
}

/// Starting a task needs every blocker to have reached its unblock role
pub struct BlockersResolvedGuard;

#[async_trait]
impl StateGuard for BlockersResolvedGuard {
    async fn check(
        &self,
        task_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>> {
        let blockers = unresolved_blockers(task_id, context).await?;
        if blockers.is_empty() {
            return Ok(None);
        }

        let reason = format!(
            "Task is blocked by {} incomplete {}",
            blockers.len(),
            if blockers.len() == 1 { "task" } else { "tasks" }
        );
        Ok(Some(
            PrerequisiteFailure::new(PrerequisiteRule::BlockingDependencies, reason)
                .with_items(blockers),
        ))
    }

    fn description(&self) -> &'static str {
        "Blocking dependencies must be resolved"
    }
}

/// Features need at least one task before development starts
pub struct HasChildTasksGuard;

#[async_trait]
impl StateGuard for HasChildTasksGuard {
    async fn check(
        &self,
        feature_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>> {
        let tasks = context.entities.tasks_for_feature(feature_id).await?;
        if !tasks.is_empty() {
            return Ok(None);
        }
        Ok(Some(PrerequisiteFailure::new(
            PrerequisiteRule::NoChildTasks,
            "Feature must have at least 1 task before moving to IN_DEVELOPMENT",
        )))
    }

    fn description(&self) -> &'static str {
        "Feature must own at least one task"
    }
}

/// Every task of the feature must be in a terminal status
pub struct ChildTasksTerminalGuard;

#[async_trait]
impl StateGuard for ChildTasksTerminalGuard {
    async fn check(
        &self,
        feature_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>> {
        let (task_spec, tasks) = futures::join!(
            context.cache.get(EntityKind::Task, context.config_context),
            context.entities.tasks_for_feature(feature_id)
        );
        let tasks = tasks?;

        let incomplete: Vec<BlockingItem> = tasks
            .iter()
            .filter(|task| !task_spec.is_terminal(&task.status))
            .map(|task| BlockingItem {
                id: task.id,
                kind: EntityKind::Task,
                title: task.title.clone(),
                status: task.status.to_string(),
                required_role: None,
            })
            .collect();

        if incomplete.is_empty() {
            return Ok(None);
        }
        let reason = format!(
            "{} of {} tasks in the feature are not complete",
            incomplete.len(),
            tasks.len()
        );
        Ok(Some(
            PrerequisiteFailure::new(PrerequisiteRule::IncompleteChildTasks, reason)
                .with_items(incomplete),
        ))
    }

    fn description(&self) -> &'static str {
        "All feature tasks must be in a terminal status"
    }
}

/// Every feature of the project must be in a terminal status
pub struct ChildFeaturesTerminalGuard;

#[async_trait]
impl StateGuard for ChildFeaturesTerminalGuard {
    async fn check(
        &self,
        project_id: Uuid,
        context: &GuardContext<'_>,
    ) -> Result<Option<PrerequisiteFailure>> {
        let (feature_spec, features) = futures::join!(
            context.cache.get(EntityKind::Feature, context.config_context),
            context.entities.features_for_project(project_id)
        );
        let features = features?;

        let incomplete: Vec<BlockingItem> = features
            .iter()
            .filter(|feature| !feature_spec.is_terminal(&feature.status))
            .map(|feature| BlockingItem {
                id: feature.id,
                kind: EntityKind::Feature,
                title: feature.name.clone(),
                status: feature.status.to_string(),
                required_role: None,
            })
            .collect();

        if incomplete.is_empty() {
            return Ok(None);
        }
        let reason = format!(
            "{} of {} features in the project are not complete",
            incomplete.len(),
            features.len()
        );
        Ok(Some(
            PrerequisiteFailure::new(PrerequisiteRule::IncompleteChildFeatures, reason)
                .with_items(incomplete),
        ))
    }

    fn description(&self) -> &'static str {
        "All project features must be in a terminal status"
    }
}

/// Blockers of `task_id` whose status role has not reached the edge's unblock role
async fn unresolved_blockers(
    task_id: Uuid,
    context: &GuardContext<'_>,
) -> Result<Vec<BlockingItem>> {
    let edges = context.store.blockers_of(task_id).await?;
    if edges.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let requirements: Vec<(Uuid, StatusRole)> = edges
        .iter()
        .filter_map(|edge| edge.blocking_pair().map(|(blocker, _)| (blocker, edge)))
        .filter(|(blocker, _)| seen.insert(*blocker))
        .map(|(blocker, edge)| (blocker, edge.unblock_at.unwrap_or(StatusRole::Terminal)))
        .collect();
    let ids: Vec<Uuid> = requirements.iter().map(|(id, _)| *id).collect();

    let (task_spec, tasks) = futures::join!(
        context.cache.get(EntityKind::Task, context.config_context),
        context.entities.get_tasks(&ids)
    );
    let tasks = tasks?;

    let mut unresolved = Vec::new();
    for (blocker_id, required) in requirements {
        let Some(task) = tasks.iter().find(|task| task.id == blocker_id) else {
            debug!(task_id = %task_id, blocker_id = %blocker_id, "Ignoring edge to a missing blocker");
            continue;
        };
        if !task_spec.role_of(&task.status).satisfies(required) {
            unresolved.push(BlockingItem {
                id: task.id,
                kind: EntityKind::Task,
                title: task.title.clone(),
                status: task.status.to_string(),
                required_role: Some(required),
            });
        }
    }
    Ok(unresolved)
}

fn guards_for(kind: EntityKind, to: &Status) -> Vec<Box<dyn StateGuard>> {
    match kind {
        EntityKind::Task => match to.as_str().parse::<TaskStatus>() {
            Ok(TaskStatus::Completed) => vec![Box::new(SummaryLengthGuard)],
            Ok(TaskStatus::InProgress) => vec![Box::new(BlockersResolvedGuard)],
            _ => Vec::new(),
        },
        EntityKind::Feature => match to.as_str().parse::<FeatureStatus>() {
            Ok(FeatureStatus::InDevelopment) => vec![Box::new(HasChildTasksGuard)],
            Ok(FeatureStatus::Testing | FeatureStatus::Completed) => {
                vec![Box::new(ChildTasksTerminalGuard)]
            }
            _ => Vec::new(),
        },
        EntityKind::Project => match to.as_str().parse::<ProjectStatus>() {
            Ok(ProjectStatus::Completed) => vec![Box::new(ChildFeaturesTerminalGuard)],
            _ => Vec::new(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct PrerequisiteChecker {
    store: DependencyStore,
    cache: Arc<ConfigCache>,
    settings: PrerequisiteConfig,
}

impl PrerequisiteChecker {
    pub fn new(store: DependencyStore, cache: Arc<ConfigCache>, settings: PrerequisiteConfig) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    fn guard_context<'a>(&'a self, config_context: &'a ConfigContext) -> GuardContext<'a> {
        GuardContext {
            entities: self.store.entities().as_ref(),
            store: &self.store,
            cache: &self.cache,
            config_context,
            settings: &self.settings,
        }
    }

    /// Run the guards for moving `entity_id` to `to`
    ///
    /// Fails with `NotFound` when the entity does not exist; a rejected transition is an
    /// `Ok(PrerequisiteOutcome::Unmet)`.
    pub async fn check_transition(
        &self,
        entity_id: Uuid,
        kind: EntityKind,
        to: &Status,
        config_context: &ConfigContext,
    ) -> Result<PrerequisiteOutcome> {
        let entities = self.store.entities();
        if entities.current_status(kind, entity_id).await?.is_none() {
            return Err(OrchestratorError::not_found(missing_record(kind), entity_id));
        }

        let spec = self.cache.get(kind, config_context).await;
        if !self.settings.enabled || !spec.rules.validate_prerequisites {
            return Ok(PrerequisiteOutcome::Satisfied);
        }

        let context = self.guard_context(config_context);
        for guard in guards_for(kind, to) {
            if let Some(failure) = guard.check(entity_id, &context).await? {
                debug!(
                    event = events::STATUS_PREREQUISITES_UNMET,
                    entity_id = %entity_id,
                    entity_kind = %kind,
                    to_status = %to,
                    guard = guard.description(),
                    blocking_items = failure.blocking_items.len(),
                    "Transition prerequisites not met"
                );
                return Ok(PrerequisiteOutcome::Unmet(failure));
            }
        }
        Ok(PrerequisiteOutcome::Satisfied)
    }

    /// Blockers of `task_id` that still prevent it from starting
    pub async fn blocked_by(
        &self,
        task_id: Uuid,
        config_context: &ConfigContext,
    ) -> Result<Vec<BlockingItem>> {
        if !self.store.entities().task_exists(task_id).await? {
            return Err(OrchestratorError::not_found(MissingRecord::Task, task_id));
        }
        unresolved_blockers(task_id, &self.guard_context(config_context)).await
    }
}

pub(crate) fn missing_record(kind: EntityKind) -> MissingRecord {
    match kind {
        EntityKind::Task => MissingRecord::Task,
        EntityKind::Feature => MissingRecord::Feature,
        EntityKind::Project => MissingRecord::Project,
    }
}
