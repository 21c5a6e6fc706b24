//! # Dependency Graph
//!
//! Storage-facing validation and read-only analysis of the task dependency graph.
//!
//! ## Components
//!
//! - [`DependencyStore`]: typed view over the external dependency repository. Owns the
//!   validation ordering for new edges (self → existence → duplicate → cycle → persist).
//! - [`DependencyGraph`]: pure, in-memory algorithms over a set of edges (chain, depth,
//!   critical path, bottlenecks, parallel groups, reachability).
//! - [`GraphAnalyzer`]: fetches the relevant neighbourhood from the store and runs the
//!   pure algorithms, optionally decorating results with task titles.
//!
//! Only `BLOCKS` / `IS_BLOCKED_BY` edges take part in traversal and cycle checks.
//! `RELATES_TO` edges show up in neighbour queries only.

pub mod analyzer;
pub mod graph;
pub mod store;

use crate::models::{DependencyType, DependencyView};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub use analyzer::GraphAnalyzer;
pub use graph::DependencyGraph;
pub use store::{BatchCreateReport, BulkDeleteReport, DependencyStore};

/// Which edges of a task a query follows
///
/// For neighbour queries, `Incoming` means edges whose `toTaskId` is the task and
/// `Outgoing` edges whose `fromTaskId` is the task. For traversal the direction is taken
/// over the normalised blocking relation: `Outgoing` walks from blockers to what they
/// block, `Incoming` walks back towards blockers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    All,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incoming => write!(f, "incoming"),
            Self::Outgoing => write!(f, "outgoing"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            "all" => Ok(Self::All),
            _ => Err(format!("Invalid direction: {s}")),
        }
    }
}

/// Direction a traversal walks; `Direction::All` analyses downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Incoming,
    Outgoing,
}

impl From<Direction> for TraversalDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Incoming => Self::Incoming,
            Direction::Outgoing | Direction::All => Self::Outgoing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborQuery {
    pub direction: Direction,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_filter: Option<DependencyType>,
    pub include_task_info: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborCounts {
    pub total: usize,
    pub incoming: usize,
    pub outgoing: usize,
    pub by_type: BTreeMap<DependencyType, usize>,
}

/// Single-hop view of a task's edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborSet {
    pub task_id: Uuid,
    pub items: Vec<DependencyView>,
    pub counts: NeighborCounts,
    pub applied_filters: NeighborQuery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub task_id: Uuid,
    pub fan_out: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelGroup {
    pub depth: usize,
    pub tasks: Vec<Uuid>,
}

/// Result of a full traversal from one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphReport {
    pub chain: Vec<Uuid>,
    pub depth: usize,
    pub critical_path: Vec<Uuid>,
    pub bottlenecks: Vec<Bottleneck>,
    pub parallelizable: Vec<ParallelGroup>,
}

impl GraphReport {
    /// Report for a task with no edges in the traversed direction
    pub fn single(task_id: Uuid) -> Self {
        Self {
            chain: vec![task_id],
            depth: 0,
            critical_path: vec![task_id],
            bottlenecks: Vec::new(),
            parallelizable: Vec::new(),
        }
    }
}
