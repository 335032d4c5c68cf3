#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bakedag::kitchen::{Ingredients, Recipe, Timing};
use bakedag::pool::WorkerPool;
use bakedag::stage::{StageContext, TraceLog};

/// The artifact the built-in recipe produces.
pub const DEFAULT_ARTIFACT: &str =
    "grated cheese on Tomato+Oil+Garlic+Oregano on rolled risen Flour+Water+Yeast";

/// Builder for `Recipe` to simplify test setup.
///
/// Starts from the built-in recipe with every stage taking 1ms, so tests
/// stay fast but still interleave.
pub struct RecipeBuilder {
    recipe: Recipe,
}

impl RecipeBuilder {
    pub fn new() -> Self {
        Self {
            recipe: Recipe {
                timing: fast_timing(),
                ..Recipe::default()
            },
        }
    }

    pub fn dough<S: Into<String>>(mut self, items: impl IntoIterator<Item = S>) -> Self {
        self.recipe.dough = Ingredients::new(items);
        self
    }

    pub fn sauce<S: Into<String>>(mut self, items: impl IntoIterator<Item = S>) -> Self {
        self.recipe.sauce = Ingredients::new(items);
        self
    }

    pub fn cheese(mut self, cheese: &str) -> Self {
        self.recipe.cheese = cheese.to_string();
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.recipe.timing = timing;
        self
    }

    /// Make one branch much slower than the others.
    pub fn slow_grate(mut self, grate: Duration) -> Self {
        self.recipe.timing.grate = grate;
        self
    }

    pub fn build(self) -> Recipe {
        self.recipe
    }
}

impl Default for RecipeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Every stage takes 1ms (combining, per ingredient).
pub fn fast_timing() -> Timing {
    let ms = Duration::from_millis(1);
    Timing {
        combine_per_ingredient: ms,
        rise: ms,
        roll: ms,
        grate: ms,
    }
}

/// A stage context on `pool` that records trace events into the returned log.
pub fn traced_context(pool: &WorkerPool) -> (StageContext, Arc<TraceLog>) {
    let log = Arc::new(TraceLog::new());
    let ctx = StageContext::new(pool.handle(), log.clone());
    (ctx, log)
}
