// src/kitchen/future.rs

//! Handle-composition strategy.
//!
//! The dough branch is a chain of `and_then` continuations; sauce and cheese
//! are submitted straight away. The three branches are merged with two
//! pairwise `combine` steps: sauce onto crust, then cheese onto that.

use tracing::debug;

use crate::kitchen::plan::Stage;
use crate::kitchen::recipe::{self, Recipe};
use crate::kitchen::Orchestrator;
use crate::stage::StageContext;
use crate::sync::{StageHandle, submit_task};
use crate::types::Strategy;

#[derive(Debug)]
pub struct FutureOrchestrator {
    ctx: StageContext,
    recipe: Recipe,
}

impl FutureOrchestrator {
    pub fn new(ctx: StageContext, recipe: Recipe) -> Self {
        Self { ctx, recipe }
    }
}

impl Orchestrator for FutureOrchestrator {
    fn strategy(&self) -> Strategy {
        Strategy::Future
    }

    fn context(&self) -> &StageContext {
        &self.ctx
    }

    fn build_async(&self) -> StageHandle<String> {
        let Self { ctx, recipe } = self;
        debug!(strategy = %Strategy::Future, "submitting stage graph");

        let crust = submit_task(
            ctx,
            recipe.spec(Stage::CombineDough),
            recipe.dough.clone(),
            recipe::combine,
        )
        .and_then(ctx, recipe.spec(Stage::Rise), recipe::rise)
        .and_then(ctx, recipe.spec(Stage::Roll), recipe::roll);

        let sauce = submit_task(
            ctx,
            recipe.spec(Stage::CombineSauce),
            recipe.sauce.clone(),
            recipe::combine,
        );

        let cheese = submit_task(
            ctx,
            recipe.spec(Stage::Grate),
            recipe.cheese.clone(),
            recipe::grate,
        );

        crust
            .combine(ctx, &sauce, "sauce-on-crust", |crust, sauce| {
                Ok(recipe::sauce_on_crust(crust, sauce))
            })
            .combine(ctx, &cheese, Stage::Merge.name(), |saucy_crust, cheese| {
                Ok(recipe::cheese_on(saucy_crust, cheese))
            })
    }
}
