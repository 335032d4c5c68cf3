// src/kitchen/plan.rs

//! The fixed stage graph.
//!
//! ```text
//!   dough.combine -> dough.rise -> dough.roll --\
//!   sauce.combine ------------------------------+--> merge
//!   cheese.grate -------------------------------/
//! ```
//!
//! The gated strategy submits stages in the plan's topological order. The
//! pool dispatches FIFO, so a stage waiting on a gate was always submitted
//! after that gate's producer and can never hold the last worker the
//! producer needs.

use std::fmt;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{BakedagError, Result};
use crate::types::Branch;

/// One node of the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    CombineDough,
    Rise,
    Roll,
    CombineSauce,
    Grate,
    /// Final assembly of the three branch outputs.
    Merge,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::CombineDough,
        Stage::Rise,
        Stage::CombineSauce,
        Stage::Grate,
        Stage::Roll,
        Stage::Merge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::CombineDough => "dough.combine",
            Stage::Rise => "dough.rise",
            Stage::Roll => "dough.roll",
            Stage::CombineSauce => "sauce.combine",
            Stage::Grate => "cheese.grate",
            Stage::Merge => "merge",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::CombineDough | Stage::CombineSauce => "combining",
            Stage::Rise => "letting rise",
            Stage::Roll => "rolling",
            Stage::Grate => "grating",
            Stage::Merge => "assembling",
        }
    }

    /// Branch the stage belongs to; `None` for the merge.
    pub fn branch(self) -> Option<Branch> {
        match self {
            Stage::CombineDough | Stage::Rise | Stage::Roll => Some(Branch::Dough),
            Stage::CombineSauce => Some(Branch::Sauce),
            Stage::Grate => Some(Branch::Cheese),
            Stage::Merge => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dependency graph of the stages.
#[derive(Debug, Clone)]
pub struct StagePlan {
    graph: DiGraphMap<Stage, ()>,
}

impl StagePlan {
    pub fn new() -> Self {
        // Edge direction: prerequisite -> dependent.
        let mut graph = DiGraphMap::new();
        for stage in Stage::ALL {
            graph.add_node(stage);
        }
        graph.add_edge(Stage::CombineDough, Stage::Rise, ());
        graph.add_edge(Stage::Rise, Stage::Roll, ());
        graph.add_edge(Stage::Roll, Stage::Merge, ());
        graph.add_edge(Stage::CombineSauce, Stage::Merge, ());
        graph.add_edge(Stage::Grate, Stage::Merge, ());
        Self { graph }
    }

    /// Direct prerequisites of `stage`.
    pub fn dependencies_of(&self, stage: Stage) -> Vec<Stage> {
        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(stage, Direction::Incoming)
            .collect();
        deps.sort();
        deps
    }

    /// Stages in an order where every stage comes after its prerequisites.
    pub fn submission_order(&self) -> Result<Vec<Stage>> {
        toposort(&self.graph, None).map_err(|cycle| {
            BakedagError::ConfigError(format!(
                "cycle detected in stage plan involving stage '{}'",
                cycle.node_id()
            ))
        })
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_order_respects_dependencies() {
        let plan = StagePlan::new();
        let order = plan.submission_order().unwrap();
        assert_eq!(order.len(), Stage::ALL.len());

        let pos = |s: Stage| order.iter().position(|x| *x == s).unwrap();
        for stage in Stage::ALL {
            for dep in plan.dependencies_of(stage) {
                assert!(pos(dep) < pos(stage), "{dep} must precede {stage}");
            }
        }
        assert_eq!(order.last(), Some(&Stage::Merge));
    }

    #[test]
    fn merge_waits_on_one_terminal_stage_per_branch() {
        let plan = StagePlan::new();
        let deps = plan.dependencies_of(Stage::Merge);
        assert_eq!(deps, vec![Stage::Roll, Stage::CombineSauce, Stage::Grate]);

        let branches: Vec<_> = deps.iter().filter_map(|s| s.branch()).collect();
        assert_eq!(branches, vec![Branch::Dough, Branch::Sauce, Branch::Cheese]);
    }
}
