#![allow(clippy::doc_markdown)] // Allow technical terms like YAML, BFS in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Task Orchestrator Core
//!
//! Dependency graph analysis, status progression and per-entity coordination for an
//! AI-agent task management backend.
//!
//! ## Overview
//!
//! Agents create tasks, features and projects and link tasks with dependencies. This crate
//! is the part of the backend that reasons about those links and decides when an entity may
//! change status. Many agent tool calls run at once, so every mutation of one entity is
//! serialized while unrelated entities proceed in parallel.
//!
//! Storage and the tool/protocol layer are outside the crate: entities and dependency
//! edges are reached through the traits in [`repository`].
//!
//! ## Module Organization
//!
//! - [`dependencies`] - dependency store, graph traversal and analysis
//! - [`state_machine`] - workflow specs, config cache, transition and prerequisite checks
//! - [`coordination`] - per-entity lock manager
//! - [`orchestration`] - [`OrchestrationCore`], the facade the tool layer calls
//! - [`models`] - dependencies, entity records, statuses
//! - [`repository`] - storage traits and an in-memory implementation
//! - [`config`] - engine settings
//! - [`error`] - structured error handling
//! - [`logging`] - structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use task_orchestrator::config::EngineConfig;
//! use task_orchestrator::dependencies::Direction;
//! use task_orchestrator::models::{DependencyType, EntityKind};
//! use task_orchestrator::repository::InMemoryRepository;
//! use task_orchestrator::state_machine::ConfigContext;
//! use task_orchestrator::OrchestrationCore;
//! # use uuid::Uuid;
//!
//! # async fn example(a: Uuid, b: Uuid) -> task_orchestrator::Result<()> {
//! let repo = Arc::new(InMemoryRepository::new());
//! let core = OrchestrationCore::new(
//!     EngineConfig::default(),
//!     repo.clone(),
//!     repo,
//!     ConfigContext::new("/path/to/workspace"),
//! )?;
//!
//! core.create_dependency(a, b, DependencyType::Blocks, None).await?;
//! let report = core.query_graph(a, Direction::Outgoing, true).await?;
//! println!("critical path: {:?}", report.critical_path);
//!
//! core.change_status(a, EntityKind::Task, "in-progress").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod coordination;
pub mod dependencies;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod repository;
pub mod state_machine;
pub mod validation;

pub use config::{ConfigManager, ConfigurationError, EngineConfig};
pub use coordination::EntityLockManager;
pub use dependencies::{DependencyStore, Direction, GraphAnalyzer, GraphReport, NeighborSet};
pub use error::{ErrorCategory, OrchestratorError, Result};
pub use models::{Dependency, DependencyType, EntityKind, NewDependency, Status, StatusRole};
pub use orchestration::{OrchestrationCore, StatusChange};
pub use state_machine::{
    ConfigCache, ConfigContext, PrerequisiteChecker, PrerequisiteOutcome, TransitionValidator,
    ValidationResult, WorkflowSpec,
};
