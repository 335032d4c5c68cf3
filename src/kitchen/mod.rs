// src/kitchen/mod.rs

//! The pizza pipeline and the two strategies that orchestrate it.
//!
//! - [`recipe`]: ingredients, timings and stage transforms.
//! - [`plan`]: the fixed stage graph.
//! - [`future`]: composition of one-shot handles.
//! - [`gate`]: counting completion gates.
//!
//! Both strategies produce the same artifact for the same recipe, and both
//! report the same fault when a stage fails.

pub mod future;
pub mod gate;
pub mod plan;
pub mod recipe;

use tracing::info;

use crate::errors::Result;
use crate::stage::StageContext;
use crate::sync::{Outcome, StageHandle};
use crate::types::Strategy;

pub use future::FutureOrchestrator;
pub use gate::{GateOrchestrator, GatedBuild};
pub use plan::{Stage, StagePlan};
pub use recipe::{Ingredients, Recipe, Timing};

/// Builds the artifact from a recipe on a worker pool.
///
/// Every call to [`build_async`](Orchestrator::build_async) or
/// [`build`](Orchestrator::build) runs the whole graph from scratch.
pub trait Orchestrator: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn context(&self) -> &StageContext;

    /// Submit every stage and return a handle for the final artifact.
    fn build_async(&self) -> StageHandle<String>;

    /// Build and block the calling thread until the artifact is ready.
    ///
    /// Must not be called from a pool worker.
    fn build(&self) -> Outcome<String> {
        let artifact = self.build_async();
        let outcome = self.context().pool().block_on(artifact.wait());
        if let Ok(ref value) = outcome {
            info!(strategy = %self.strategy(), stage = artifact.stage(), artifact = %value, "build finished");
        }
        outcome
    }
}

/// Create the orchestrator for `strategy`.
pub fn new_orchestrator(
    strategy: Strategy,
    ctx: StageContext,
    recipe: Recipe,
) -> Result<Box<dyn Orchestrator>> {
    Ok(match strategy {
        Strategy::Future => Box::new(FutureOrchestrator::new(ctx, recipe)),
        Strategy::Gate => Box::new(GateOrchestrator::new(ctx, recipe)?),
    })
}
