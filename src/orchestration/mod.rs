//! # Orchestration
//!
//! [`OrchestrationCore`] exposes the operations the tool layer calls: dependency creation
//! and deletion, neighbour and graph queries, status and transition validation,
//! prerequisite checks and locked status changes.

pub mod core;

pub use self::core::{OrchestrationCore, StatusChange};
