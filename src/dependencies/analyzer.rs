//! Read-only queries over the dependency graph.

use super::{
    DependencyGraph, DependencyStore, Direction, GraphReport, NeighborCounts, NeighborQuery,
    NeighborSet, TraversalDirection,
};
use crate::error::Result;
use crate::models::{Dependency, DependencyView, TaskInfo, TaskRecord};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GraphAnalyzer {
    store: DependencyStore,
}

impl GraphAnalyzer {
    pub fn new(store: DependencyStore) -> Self {
        Self { store }
    }

    /// Single-hop view of the edges touching `task_id`
    ///
    /// The type filter is applied before counting, so `counts` describe the returned items.
    pub async fn neighbors(&self, task_id: Uuid, query: NeighborQuery) -> Result<NeighborSet> {
        let edges: Vec<Dependency> = self
            .store
            .list_by_task(task_id)
            .await?
            .into_iter()
            .filter(|dependency| match query.direction {
                Direction::Incoming => dependency.to_task_id == task_id,
                Direction::Outgoing => dependency.from_task_id == task_id,
                Direction::All => true,
            })
            .filter(|dependency| {
                query
                    .type_filter
                    .map_or(true, |kind| dependency.dependency_type == kind)
            })
            .collect();

        let mut counts = NeighborCounts {
            total: edges.len(),
            ..NeighborCounts::default()
        };
        for dependency in &edges {
            if dependency.to_task_id == task_id {
                counts.incoming += 1;
            }
            if dependency.from_task_id == task_id {
                counts.outgoing += 1;
            }
            *counts.by_type.entry(dependency.dependency_type).or_insert(0) += 1;
        }

        let titles = if query.include_task_info {
            let ids: Vec<Uuid> = edges
                .iter()
                .flat_map(|dependency| [dependency.from_task_id, dependency.to_task_id])
                .collect();
            self.task_lookup(&ids).await?
        } else {
            HashMap::new()
        };

        let items = edges
            .iter()
            .map(|dependency| {
                let mut view = DependencyView::from(dependency);
                if query.include_task_info {
                    view.from_task = titles.get(&dependency.from_task_id).map(task_info);
                    view.to_task = titles.get(&dependency.to_task_id).map(task_info);
                }
                view
            })
            .collect();

        Ok(NeighborSet {
            task_id,
            items,
            counts,
            applied_filters: query,
        })
    }

    /// Full breadth-first analysis of the blocking graph reachable from `start`
    pub async fn traverse(
        &self,
        start: Uuid,
        direction: Direction,
        include_task_info: bool,
    ) -> Result<GraphReport> {
        let direction = TraversalDirection::from(direction);
        let edges = self.store.blocking_subgraph(start, direction).await?;
        let graph = DependencyGraph::from_edges(&edges);
        let mut report = graph.analyze(start, direction);

        if include_task_info && !report.bottlenecks.is_empty() {
            let ids: Vec<Uuid> = report.bottlenecks.iter().map(|b| b.task_id).collect();
            let titles = self.task_lookup(&ids).await?;
            for bottleneck in &mut report.bottlenecks {
                bottleneck.title = titles
                    .get(&bottleneck.task_id)
                    .map(|task| task.title.clone());
            }
        }

        debug!(
            task_id = %start,
            direction = ?direction,
            edges = edges.len(),
            depth = report.depth,
            visited = report.chain.len(),
            "Dependency graph traversed"
        );
        Ok(report)
    }

    async fn task_lookup(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, TaskRecord>> {
        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        Ok(self
            .store
            .entities()
            .get_tasks(&unique)
            .await?
            .into_iter()
            .map(|task| (task.id, task))
            .collect())
    }
}

fn task_info(task: &TaskRecord) -> TaskInfo {
    TaskInfo {
        title: task.title.clone(),
        status: task.status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DependencyType, NewDependency, Status};
    use crate::repository::InMemoryRepository;
    use chrono::Utc;
    use std::sync::Arc;

    async fn analyzer_with(tasks: usize) -> (GraphAnalyzer, Vec<Uuid>) {
        let repo = Arc::new(InMemoryRepository::new());
        let mut ids = Vec::new();
        for i in 0..tasks {
            let id = Uuid::new_v4();
            repo.insert_task(TaskRecord {
                id,
                title: format!("task {i}"),
                status: Status::parse("pending").unwrap(),
                summary: None,
                feature_id: None,
                created_at: Utc::now(),
            });
            ids.push(id);
        }
        let store = DependencyStore::new(repo.clone(), repo);
        (GraphAnalyzer::new(store), ids)
    }

    #[tokio::test]
    async fn test_neighbors_counts_and_filters() {
        let (analyzer, ids) = analyzer_with(4).await;
        let store = &analyzer.store;
        store.add(NewDependency::blocks(ids[0], ids[1])).await.unwrap();
        store.add(NewDependency::blocks(ids[2], ids[0])).await.unwrap();
        store
            .add(NewDependency::new(ids[0], ids[3], DependencyType::RelatesTo))
            .await
            .unwrap();

        let all = analyzer
            .neighbors(ids[0], NeighborQuery::default())
            .await
            .unwrap();
        assert_eq!(all.counts.total, 3);
        assert_eq!(all.counts.incoming, 1);
        assert_eq!(all.counts.outgoing, 2);
        assert_eq!(all.counts.by_type[&DependencyType::Blocks], 2);
        assert!(all.items.iter().all(|item| item.from_task.is_none()));

        let blocking_out = analyzer
            .neighbors(
                ids[0],
                NeighborQuery {
                    direction: Direction::Outgoing,
                    type_filter: Some(DependencyType::Blocks),
                    include_task_info: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(blocking_out.counts.total, 1);
        assert_eq!(blocking_out.items[0].to_task_id, ids[1]);
        assert_eq!(
            blocking_out.items[0].to_task.as_ref().map(|t| t.title.as_str()),
            Some("task 1")
        );
        assert_eq!(blocking_out.applied_filters.direction, Direction::Outgoing);
    }

    #[tokio::test]
    async fn test_traverse_diamond_with_titles() {
        let (analyzer, ids) = analyzer_with(4).await;
        let store = &analyzer.store;
        for (from, to) in [(0, 1), (0, 2), (1, 3), (2, 3)] {
            store
                .add(NewDependency::blocks(ids[from], ids[to]))
                .await
                .unwrap();
        }

        let report = analyzer.traverse(ids[0], Direction::All, true).await.unwrap();
        assert_eq!(report.depth, 2);
        assert_eq!(report.chain.len(), 4);
        assert_eq!(report.bottlenecks.len(), 1);
        assert_eq!(report.bottlenecks[0].fan_out, 2);
        assert_eq!(report.bottlenecks[0].title.as_deref(), Some("task 0"));
        assert_eq!(report.parallelizable.len(), 1);
        assert_eq!(report.parallelizable[0].depth, 1);
    }

    #[tokio::test]
    async fn test_traverse_leaf_is_single() {
        let (analyzer, ids) = analyzer_with(2).await;
        analyzer
            .store
            .add(NewDependency::blocks(ids[0], ids[1]))
            .await
            .unwrap();

        let report = analyzer
            .traverse(ids[1], Direction::Outgoing, false)
            .await
            .unwrap();
        assert_eq!(report, GraphReport::single(ids[1]));
    }
}
