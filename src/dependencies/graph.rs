//! In-memory blocking graph and the traversal algorithms run over it.
//!
//! Built from a slice of [`Dependency`] edges; `RELATES_TO` edges are ignored. Every
//! blocking edge becomes a `blocker -> blocked` arc. Arcs out of a node are ordered by
//! edge creation time, then neighbour id, which makes every result deterministic and
//! gives the critical-path tie break for free.

use super::{Bottleneck, GraphReport, ParallelGroup, TraversalDirection};
use crate::models::Dependency;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct Link {
    target: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    forward: HashMap<Uuid, Vec<Uuid>>,
    reverse: HashMap<Uuid, Vec<Uuid>>,
}

impl DependencyGraph {
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Dependency>) -> Self {
        let mut forward: HashMap<Uuid, Vec<Link>> = HashMap::new();
        let mut reverse: HashMap<Uuid, Vec<Link>> = HashMap::new();

        for edge in edges {
            let Some((blocker, blocked)) = edge.blocking_pair() else {
                continue;
            };
            forward.entry(blocker).or_default().push(Link {
                target: blocked,
                created_at: edge.created_at,
            });
            reverse.entry(blocked).or_default().push(Link {
                target: blocker,
                created_at: edge.created_at,
            });
        }

        Self {
            forward: Self::ordered(forward),
            reverse: Self::ordered(reverse),
        }
    }

    /// Sort arcs by (created_at, target) and drop repeated targets, keeping the oldest arc
    fn ordered(arcs: HashMap<Uuid, Vec<Link>>) -> HashMap<Uuid, Vec<Uuid>> {
        arcs.into_iter()
            .map(|(node, mut arcs)| {
                arcs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.target.cmp(&b.target)));
                let mut seen = HashSet::new();
                let targets = arcs
                    .into_iter()
                    .filter(|arc| seen.insert(arc.target))
                    .map(|arc| arc.target)
                    .collect();
                (node, targets)
            })
            .collect()
    }

    fn adjacency(&self, direction: TraversalDirection) -> &HashMap<Uuid, Vec<Uuid>> {
        match direction {
            TraversalDirection::Outgoing => &self.forward,
            TraversalDirection::Incoming => &self.reverse,
        }
    }

    /// Nodes one hop away from `node` in `direction`
    pub fn next(&self, node: Uuid, direction: TraversalDirection) -> &[Uuid] {
        self.adjacency(direction)
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Whether `to` can be reached from `from` following blocker -> blocked arcs
    pub fn reaches(&self, from: Uuid, to: Uuid) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(node) = queue.pop_front() {
            for &next in self.next(node, TraversalDirection::Outgoing) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Breadth-first analysis from `start`
    ///
    /// Bottleneck titles are left empty; the analyzer fills them in when asked.
    pub fn analyze(&self, start: Uuid, direction: TraversalDirection) -> GraphReport {
        if self.next(start, direction).is_empty() {
            return GraphReport::single(start);
        }

        let (chain, levels) = self.breadth_first(start, direction);
        let (depth, critical_path) = self.critical_path(start, direction);

        GraphReport {
            bottlenecks: self.bottlenecks(&chain, direction),
            parallelizable: self.parallel_groups(&chain, &levels),
            chain,
            depth,
            critical_path,
        }
    }

    /// Visit order plus the BFS level (hop distance from `start`) of each visited node
    fn breadth_first(
        &self,
        start: Uuid,
        direction: TraversalDirection,
    ) -> (Vec<Uuid>, HashMap<Uuid, usize>) {
        let mut chain = vec![start];
        let mut levels = HashMap::from([(start, 0usize)]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let level = levels[&node];
            for &next in self.next(node, direction) {
                if levels.contains_key(&next) {
                    continue;
                }
                levels.insert(next, level + 1);
                chain.push(next);
                queue.push_back(next);
            }
        }

        (chain, levels)
    }

    /// Longest path (in hops) from `start`, with the path itself
    fn critical_path(&self, start: Uuid, direction: TraversalDirection) -> (usize, Vec<Uuid>) {
        let mut memo: HashMap<Uuid, (usize, Option<Uuid>)> = HashMap::new();
        let mut on_path = HashSet::new();
        let depth = self.longest_from(start, direction, &mut memo, &mut on_path);

        let mut path = vec![start];
        let mut current = start;
        while let Some(&(_, Some(next))) = memo.get(&current) {
            // a cycle in the stored graph must not loop forever
            if path.contains(&next) {
                break;
            }
            path.push(next);
            current = next;
        }

        (depth, path)
    }

    fn longest_from(
        &self,
        node: Uuid,
        direction: TraversalDirection,
        memo: &mut HashMap<Uuid, (usize, Option<Uuid>)>,
        on_path: &mut HashSet<Uuid>,
    ) -> usize {
        if let Some(&(length, _)) = memo.get(&node) {
            return length;
        }

        on_path.insert(node);
        let mut best = (0usize, None);
        for &next in self.next(node, direction) {
            if on_path.contains(&next) {
                continue;
            }
            let length = 1 + self.longest_from(next, direction, memo, on_path);
            // strict comparison keeps the earliest-created arc on ties
            if length > best.0 {
                best = (length, Some(next));
            }
        }
        on_path.remove(&node);

        memo.insert(node, best);
        best.0
    }

    fn bottlenecks(&self, visited: &[Uuid], direction: TraversalDirection) -> Vec<Bottleneck> {
        let mut bottlenecks: Vec<Bottleneck> = visited
            .iter()
            .map(|&task_id| Bottleneck {
                task_id,
                fan_out: self.next(task_id, direction).len(),
                title: None,
            })
            .filter(|bottleneck| bottleneck.fan_out >= 2)
            .collect();

        bottlenecks.sort_by(|a, b| b.fan_out.cmp(&a.fan_out).then(a.task_id.cmp(&b.task_id)));
        bottlenecks
    }

    fn parallel_groups(&self, chain: &[Uuid], levels: &HashMap<Uuid, usize>) -> Vec<ParallelGroup> {
        let mut by_level: Vec<Vec<Uuid>> = Vec::new();
        for task_id in chain {
            let level = levels[task_id];
            if by_level.len() <= level {
                by_level.resize_with(level + 1, Vec::new);
            }
            by_level[level].push(*task_id);
        }

        by_level
            .into_iter()
            .enumerate()
            .filter(|(_, tasks)| tasks.len() >= 2 && self.independent(tasks))
            .map(|(depth, tasks)| ParallelGroup { depth, tasks })
            .collect()
    }

    /// No blocking arc, in either orientation, between any two members
    fn independent(&self, tasks: &[Uuid]) -> bool {
        let members: HashSet<Uuid> = tasks.iter().copied().collect();
        tasks.iter().all(|task| {
            self.next(*task, TraversalDirection::Outgoing)
                .iter()
                .all(|next| !members.contains(next))
        })
    }
}
