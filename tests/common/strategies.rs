use proptest::prelude::*;

/// Graph shapes with a known structure, expressed over task indices
#[derive(Debug, Clone)]
pub enum WorkflowPattern {
    Linear { length: usize },
    Diamond,
    FanOut { width: usize },
    FanIn { width: usize },
    Layered { layers: usize, width: usize },
}

impl WorkflowPattern {
    pub fn task_count(&self) -> usize {
        match self {
            Self::Linear { length } => *length,
            Self::Diamond => 4,
            Self::FanOut { width } | Self::FanIn { width } => width + 1,
            Self::Layered { layers, width } => layers * width,
        }
    }

    /// `(blocker, blocked)` index pairs; every pair points from a lower to a higher index
    pub fn edges(&self) -> Vec<(usize, usize)> {
        match self {
            Self::Linear { length } => (1..*length).map(|i| (i - 1, i)).collect(),
            Self::Diamond => vec![(0, 1), (0, 2), (1, 3), (2, 3)],
            Self::FanOut { width } => (1..=*width).map(|i| (0, i)).collect(),
            Self::FanIn { width } => (0..*width).map(|i| (i, *width)).collect(),
            Self::Layered { layers, width } => {
                let mut edges = Vec::new();
                for layer in 1..*layers {
                    for to in 0..*width {
                        for from in 0..*width {
                            edges.push(((layer - 1) * width + from, layer * width + to));
                        }
                    }
                }
                edges
            }
        }
    }

    /// Longest chain of edges starting at task 0
    pub fn depth_from_root(&self) -> usize {
        match self {
            Self::Linear { length } => length.saturating_sub(1),
            Self::Diamond => 2,
            Self::FanOut { .. } => 1,
            Self::FanIn { .. } => 1,
            Self::Layered { layers, .. } => layers.saturating_sub(1),
        }
    }
}

pub fn workflow_pattern_strategy() -> impl Strategy<Value = WorkflowPattern> {
    prop_oneof![
        (2usize..=12).prop_map(|length| WorkflowPattern::Linear { length }),
        Just(WorkflowPattern::Diamond),
        (1usize..=8).prop_map(|width| WorkflowPattern::FanOut { width }),
        (1usize..=8).prop_map(|width| WorkflowPattern::FanIn { width }),
        ((2usize..=4), (1usize..=3))
            .prop_map(|(layers, width)| WorkflowPattern::Layered { layers, width }),
    ]
}

/// Arbitrary index pairs over `task_count` tasks, self-loops excluded
pub fn edge_list_strategy(task_count: usize, max_edges: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec(
        (0..task_count, 0..task_count).prop_filter("No self-loops", |(from, to)| from != to),
        0..max_edges,
    )
}
