//! Concurrent use of one orchestration core

mod common;

use common::{
    status_of, RecordingEntityRepository, SlowDependencyRepository, StoreEvent, TaskBuilder,
    TestWorld,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use task_orchestrator::config::EngineConfig;
use task_orchestrator::models::{DependencyType, EntityKind};
use task_orchestrator::repository::InMemoryRepository;
use task_orchestrator::state_machine::ConfigContext;
use task_orchestrator::{OrchestrationCore, OrchestratorError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_status_validation_matches_sequential() {
    let world = TestWorld::new();
    let candidates = [
        "pending",
        "in-progress",
        "testing",
        "completed",
        "bogus",
        "ready-for-qa",
        "shipping",
        "on_hold",
        "",
        "CANCELLED",
    ];

    let mut expected = Vec::new();
    for raw in candidates {
        expected.push(world.core.validate_status(EntityKind::Task, raw).await);
    }

    let handles = (0..50).map(|i| {
        let core = world.core.clone();
        let raw = candidates[i % candidates.len()];
        tokio::spawn(async move { (i, core.validate_status(EntityKind::Task, raw).await) })
    });
    for joined in join_all(handles).await {
        let (i, result) = joined.unwrap();
        assert_eq!(result, expected[i % candidates.len()]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_status_changes_on_one_entity_never_interleave() {
    let repo = Arc::new(InMemoryRepository::new());
    let recording = Arc::new(RecordingEntityRepository::new(
        repo.clone(),
        Duration::from_millis(20),
    ));
    let workspace = tempfile::TempDir::new().unwrap();
    let core = OrchestrationCore::new(
        EngineConfig::for_test(),
        repo.clone(),
        recording.clone(),
        ConfigContext::new(workspace.path()),
    )
    .unwrap();
    let task = TaskBuilder::new(&repo).insert();

    // either order is a valid pair of transitions
    let first = tokio::spawn({
        let core = core.clone();
        async move { core.change_status(task, EntityKind::Task, "in-progress").await }
    });
    let second = tokio::spawn({
        let core = core.clone();
        async move { core.change_status(task, EntityKind::Task, "blocked").await }
    });
    let mut changes = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    changes.sort_by_key(|change| change.from != status_of("pending"));

    // the later change observed the earlier one's result
    assert_eq!(changes[0].from, status_of("pending"));
    assert_eq!(changes[1].from, changes[0].to);

    // each change reads then writes with no foreign step in between
    let events = recording.events();
    let writes: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| matches!(event, StoreEvent::Write { .. }))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(writes.len(), 2);
    let StoreEvent::Write { status: written } = &events[writes[0]] else {
        unreachable!()
    };
    for event in &events[writes[0] + 1..writes[1]] {
        assert_eq!(event, &StoreEvent::Read { status: written.clone() });
    }
    assert!(events[..writes[0]]
        .iter()
        .all(|event| event == &StoreEvent::Read { status: status_of("pending") }));
    assert_eq!(core.lock_manager().tracked_entities(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_over_disjoint_pairs_cannot_close_a_cycle() {
    let repo = Arc::new(InMemoryRepository::new());
    let slow = Arc::new(SlowDependencyRepository::new(
        repo.clone(),
        Duration::from_millis(30),
    ));
    let workspace = tempfile::TempDir::new().unwrap();
    let core = OrchestrationCore::new(
        EngineConfig::for_test(),
        slow,
        repo.clone(),
        ConfigContext::new(workspace.path()),
    )
    .unwrap();
    let [a, b, c, d] = [(); 4].map(|_| TaskBuilder::new(&repo).insert());
    core.create_dependency(a, b, DependencyType::Blocks, None)
        .await
        .unwrap();
    core.create_dependency(c, d, DependencyType::Blocks, None)
        .await
        .unwrap();

    // b -> c and d -> a lock disjoint endpoints; together they would close a -> b -> c -> d -> a
    let (first, second) = tokio::join!(
        core.create_dependency(b, c, DependencyType::Blocks, None),
        core.create_dependency(d, a, DependencyType::Blocks, None),
    );

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    let rejected = first.err().or(second.err()).unwrap();
    assert!(matches!(rejected, OrchestratorError::CycleDetected { .. }));
    assert_eq!(repo.dependency_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_relates_to_adds_all_persist() {
    let repo = Arc::new(InMemoryRepository::new());
    let slow = Arc::new(SlowDependencyRepository::new(
        repo.clone(),
        Duration::from_millis(30),
    ));
    let workspace = tempfile::TempDir::new().unwrap();
    let core = OrchestrationCore::new(
        EngineConfig::for_test(),
        slow,
        repo.clone(),
        ConfigContext::new(workspace.path()),
    )
    .unwrap();
    let ids: Vec<_> = (0..8).map(|_| TaskBuilder::new(&repo).insert()).collect();

    let adds = ids.chunks(2).map(|pair| {
        let core = core.clone();
        let (from, to) = (pair[0], pair[1]);
        tokio::spawn(async move {
            core.create_dependency(from, to, DependencyType::RelatesTo, None)
                .await
        })
    });
    for joined in join_all(adds).await {
        joined.unwrap().unwrap();
    }
    assert_eq!(repo.dependency_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conflicting_changes_reject_the_loser() {
    let world = TestWorld::new();
    let task = world.task().insert();

    let attempts = (0..5).map(|_| {
        let core = world.core.clone();
        tokio::spawn(async move { core.change_status(task, EntityKind::Task, "in-progress").await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |err| matches!(err, OrchestratorError::Validation(reason) if reason.contains("already in status"))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_prerequisite_checks_match_sequential() {
    let world = TestWorld::new();
    let tasks = world.tasks(20);
    for pair in tasks.chunks(2) {
        world
            .core
            .create_dependency(pair[0], pair[1], DependencyType::Blocks, None)
            .await
            .unwrap();
    }
    // every fourth blocker is already done
    for blocker in tasks.chunks(2).step_by(2).map(|pair| pair[0]) {
        world
            .core
            .change_status(blocker, EntityKind::Task, "cancelled")
            .await
            .unwrap();
    }

    let blocked: Vec<_> = tasks.chunks(2).map(|pair| pair[1]).collect();
    let mut expected = Vec::new();
    for task in &blocked {
        let outcome = world
            .core
            .validate_prerequisites(*task, EntityKind::Task, "in-progress")
            .await
            .unwrap();
        expected.push(outcome.is_satisfied());
    }
    assert_eq!(expected.iter().filter(|satisfied| **satisfied).count(), 5);

    let checks = blocked.iter().map(|task| {
        let core = world.core.clone();
        let task = *task;
        tokio::spawn(async move {
            core.validate_prerequisites(task, EntityKind::Task, "in-progress")
                .await
                .map(|outcome| outcome.is_satisfied())
        })
    });
    let concurrent: Vec<bool> = join_all(checks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    assert_eq!(concurrent, expected);
}

#[tokio::test]
async fn test_lock_timeout_surfaces_as_conflict() {
    let mut config = EngineConfig::for_test();
    config.locking.timeout_ms = 50;
    let world = TestWorld::with_config(config);
    let task = world.task().insert();

    let _held = world.core.lock_manager().acquire(task).await.unwrap();
    let err = world
        .core
        .change_status(task, EntityKind::Task, "in-progress")
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::LockTimeout { entity_id, .. } if entity_id == task));
    assert!(err.is_retryable());
}
