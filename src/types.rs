use std::fmt;

use serde::Deserialize;

/// Which synchronization strategy an orchestrator uses to wire the graph.
///
/// - `Future`: one-shot result handles composed with `and_then` / `combine`.
/// - `Gate`: every stage is submitted up front and waits on completion gates
///   guarding write-once branch slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Future,
    Gate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Future => f.write_str("future"),
            Strategy::Gate => f.write_str("gate"),
        }
    }
}

/// One of the three independent sub-pipelines merged into the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Branch {
    Dough,
    Sauce,
    Cheese,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Dough => f.write_str("dough"),
            Branch::Sauce => f.write_str("sauce"),
            Branch::Cheese => f.write_str("cheese"),
        }
    }
}
