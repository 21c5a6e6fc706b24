//! Workflow documents, transition validation and prerequisite enforcement

mod common;

use common::{status_of, TestWorld};
use std::time::{Duration, Instant};
use task_orchestrator::models::{DependencyType, EntityKind, StatusRole};
use task_orchestrator::repository::EntityRepository;
use task_orchestrator::state_machine::errors::PrerequisiteRule;
use task_orchestrator::state_machine::ConfigContext;
use task_orchestrator::{OrchestratorError, PrerequisiteOutcome};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const SIGNOFF_WORKFLOW: &str = r#"
status_progression:
  tasks:
    default_flow: [pending, in-progress, awaiting-signoff, completed]
    emergency_transitions: [blocked, cancelled]
    terminal_statuses: [completed, cancelled]
    status_roles:
      awaiting-signoff: review
status_validation:
  allow_backward: false
"#;

#[tokio::test]
async fn test_custom_flow_from_workspace_document() {
    let world = TestWorld::new();
    world.write_workflow(SIGNOFF_WORKFLOW);

    assert!(world
        .core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());
    // built-in statuses stay valid values even when the flow skips them
    assert!(world
        .core
        .validate_status(EntityKind::Task, "testing")
        .await
        .is_valid());

    assert!(world
        .core
        .validate_transition(EntityKind::Task, "in-progress", "awaiting-signoff")
        .await
        .is_valid());

    let skip = world
        .core
        .validate_transition(EntityKind::Task, "in-progress", "completed")
        .await;
    assert!(skip
        .reason()
        .unwrap()
        .contains("next status in default flow is AWAITING_SIGNOFF"));

    let backward = world
        .core
        .validate_transition(EntityKind::Task, "awaiting-signoff", "pending")
        .await;
    assert!(backward.reason().unwrap().contains("Backward transition"));

    let spec = world.core.workflow(EntityKind::Task).await;
    assert_eq!(spec.role_of(&status_of("awaiting-signoff")), StatusRole::Review);
    assert!(!spec.is_emergency(&status_of("on-hold")));

    // features keep the built-in flow
    assert!(world
        .core
        .validate_transition(EntityKind::Feature, "planning", "in-development")
        .await
        .is_valid());
}

#[tokio::test]
async fn test_unknown_status_lists_allowed_values() {
    let world = TestWorld::new();
    let result = world.core.validate_status(EntityKind::Project, "shipping").await;
    let reason = result.reason().unwrap();
    assert!(reason.contains("SHIPPING"));
    assert!(reason.contains("IN_DEVELOPMENT"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["result"], "invalid");
}

#[tokio::test]
async fn test_malformed_document_falls_back_to_built_in() {
    let world = TestWorld::new();
    world.write_workflow("status_progression: [unterminated\n  tasks: {");

    assert!(world
        .core
        .validate_transition(EntityKind::Task, "pending", "in-progress")
        .await
        .is_valid());
    let spec = world.core.workflow(EntityKind::Task).await;
    assert_eq!(spec.default_flow.len(), 4);
    assert!(world.core.cache_stats().fallbacks >= 1);
}

#[tokio::test]
async fn test_documents_are_scoped_to_the_working_context() {
    let world = TestWorld::new();
    world.write_workflow(SIGNOFF_WORKFLOW);

    let other = TempDir::new().unwrap();
    let other_core = world.core.with_context(ConfigContext::new(other.path()));

    assert!(world
        .core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());
    assert!(!other_core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());

    // switching back reloads the first workspace's document
    assert!(world
        .core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());
    assert!(world.core.cache_stats().reloads >= 2);
}

#[tokio::test]
async fn test_invalidation_picks_up_edits() {
    let world = TestWorld::new();
    assert!(!world
        .core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());

    world.write_workflow(SIGNOFF_WORKFLOW);
    world
        .core
        .invalidate_workflow_config(Some(EntityKind::Task))
        .await;
    assert!(world
        .core
        .validate_status(EntityKind::Task, "awaiting-signoff")
        .await
        .is_valid());
}

#[tokio::test]
async fn test_change_status_walks_the_flow() {
    let world = TestWorld::new();
    let task = world.task().summary_chars(320).insert();

    for (from, to) in [
        ("PENDING", "in-progress"),
        ("IN_PROGRESS", "testing"),
        ("TESTING", "completed"),
    ] {
        let change = assert_ok!(world.core.change_status(task, EntityKind::Task, to).await);
        assert_eq!(change.from.as_str(), from);
        assert_eq!(change.to, status_of(to));
    }
    assert_eq!(
        world.status_of(EntityKind::Task, task).await,
        status_of("completed")
    );
    assert_eq!(world.core.lock_manager().tracked_entities(), 0);
}

#[tokio::test]
async fn test_rejected_transition_leaves_status_unchanged() {
    let world = TestWorld::new();
    let task = world.task().insert();

    let err = assert_err!(world.core.change_status(task, EntityKind::Task, "completed").await);
    assert!(matches!(err, OrchestratorError::Validation(ref reason) if reason.contains("Cannot skip")));

    let err = world
        .core
        .change_status(task, EntityKind::Task, "pending")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Validation(ref reason) if reason.contains("already in status")));

    assert_eq!(
        world.status_of(EntityKind::Task, task).await,
        status_of("pending")
    );
}

#[tokio::test]
async fn test_summary_length_bounds() {
    let world = TestWorld::new();

    for (length, allowed) in [(0, false), (299, false), (300, true), (500, true), (501, false)] {
        let task = world.task().status("testing").summary_chars(length).insert();
        let outcome = world
            .core
            .validate_prerequisites(task, EntityKind::Task, "completed")
            .await
            .unwrap();
        assert_eq!(outcome.is_satisfied(), allowed, "summary of {length} chars");

        if let PrerequisiteOutcome::Unmet(failure) = outcome {
            assert!(matches!(
                failure.rule,
                PrerequisiteRule::SummaryLength { actual, min: 300, max: 500 } if actual == length
            ));
        }
    }

    let task = world.task().status("testing").summary_chars(10).insert();
    let err = world
        .core
        .change_status(task, EntityKind::Task, "completed")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PrerequisiteUnmet(_)));
    assert_eq!(
        world.status_of(EntityKind::Task, task).await,
        status_of("testing")
    );
}

#[tokio::test]
async fn test_blockers_gate_starting_work() {
    let world = TestWorld::new();
    let blocker = world.task().titled("schema migration").insert();
    let early = world.task().titled("api draft").insert();
    let blocked = world.task().titled("api rollout").insert();

    world
        .core
        .create_dependency(blocker, blocked, DependencyType::Blocks, None)
        .await
        .unwrap();
    world
        .core
        .create_dependency(blocked, early, DependencyType::IsBlockedBy, Some("work"))
        .await
        .unwrap();

    let items = world.core.blocked_by(blocked).await.unwrap();
    assert_eq!(items.len(), 2);

    let err = world
        .core
        .change_status(blocked, EntityKind::Task, "in-progress")
        .await
        .unwrap_err();
    let failure = match err {
        OrchestratorError::PrerequisiteUnmet(failure) => failure,
        other => panic!("expected unmet prerequisites, got {other:?}"),
    };
    assert_eq!(failure.rule, PrerequisiteRule::BlockingDependencies);
    assert_eq!(failure.blocking_items.len(), 2);

    // the `work` edge resolves as soon as its blocker starts
    world
        .core
        .change_status(early, EntityKind::Task, "in-progress")
        .await
        .unwrap();
    let items = world.core.blocked_by(blocked).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, blocker);
    assert_eq!(items[0].title, "schema migration");
    assert_eq!(items[0].required_role, Some(StatusRole::Terminal));

    // a terminal blocker resolves the default edge
    world
        .core
        .change_status(blocker, EntityKind::Task, "cancelled")
        .await
        .unwrap();
    assert!(world.core.blocked_by(blocked).await.unwrap().is_empty());
    world
        .core
        .change_status(blocked, EntityKind::Task, "in-progress")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_feature_guards() {
    let world = TestWorld::new();
    let empty = world.feature("planning", None);

    let outcome = world
        .core
        .validate_prerequisites(empty, EntityKind::Feature, "in-development")
        .await
        .unwrap();
    let PrerequisiteOutcome::Unmet(failure) = outcome else {
        panic!("feature without tasks must not start development");
    };
    assert_eq!(failure.rule, PrerequisiteRule::NoChildTasks);

    let feature = world.feature("validating", None);
    for i in 0..100 {
        let status = if i % 2 == 0 { "completed" } else { "in-progress" };
        world
            .task()
            .titled(&format!("child {i}"))
            .status(status)
            .in_feature(feature)
            .insert();
    }

    let started = Instant::now();
    let outcome = world
        .core
        .validate_prerequisites(feature, EntityKind::Feature, "completed")
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let PrerequisiteOutcome::Unmet(failure) = outcome else {
        panic!("half the tasks are incomplete");
    };
    assert_eq!(failure.rule, PrerequisiteRule::IncompleteChildTasks);
    assert_eq!(failure.blocking_items.len(), 50);
    assert!(failure
        .blocking_items
        .iter()
        .all(|item| item.kind == EntityKind::Task && item.status == "IN_PROGRESS"));
    assert!(failure.reason.starts_with("50 of 100 tasks"));

    let started = Instant::now();
    let outcome = world
        .core
        .validate_prerequisites(feature, EntityKind::Feature, "testing")
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let PrerequisiteOutcome::Unmet(failure) = outcome else {
        panic!("testing also needs every task finished");
    };
    assert_eq!(failure.rule, PrerequisiteRule::IncompleteChildTasks);
    assert_eq!(failure.blocking_items.len(), 50);
}

#[tokio::test]
async fn test_project_completion_requires_terminal_features() {
    let world = TestWorld::new();
    let project = world.project("in-development");
    world.feature("completed", Some(project));
    let open = world.feature("testing", Some(project));

    let err = world
        .core
        .change_status(project, EntityKind::Project, "completed")
        .await
        .unwrap_err();
    let failure = match err {
        OrchestratorError::PrerequisiteUnmet(failure) => failure,
        other => panic!("expected unmet prerequisites, got {other:?}"),
    };
    assert_eq!(failure.rule, PrerequisiteRule::IncompleteChildFeatures);
    assert_eq!(failure.blocking_items.len(), 1);
    assert_eq!(failure.blocking_items[0].id, open);

    world
        .repo
        .update_status(EntityKind::Feature, open, &status_of("archived"))
        .await
        .unwrap();
    world
        .core
        .change_status(project, EntityKind::Project, "completed")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_prerequisites_can_be_disabled_per_workspace() {
    let world = TestWorld::new();
    world.write_workflow("status_validation:\n  validate_prerequisites: false\n");

    let task = world.task().status("testing").insert();
    let outcome = world
        .core
        .validate_prerequisites(task, EntityKind::Task, "completed")
        .await
        .unwrap();
    assert!(outcome.is_satisfied());
}

#[tokio::test]
async fn test_missing_entity_is_not_found() {
    let world = TestWorld::new();
    let err = world
        .core
        .change_status(uuid::Uuid::new_v4(), EntityKind::Feature, "in-development")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound { .. }));
}
