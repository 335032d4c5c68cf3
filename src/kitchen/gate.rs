// src/kitchen/gate.rs

//! Completion-gate strategy.
//!
//! All five stages plus the merge are submitted up front, in plan order.
//! Each stage first waits for its prerequisite slot (and therefore its
//! gate), then does its timed work and publishes into its own slot:
//!
//! - `dough-combined` (1): raw dough ready, rise may start.
//! - `dough-risen` (1): risen dough ready, roll may start.
//! - `layers-ready` (3): crust, sauce and cheese ready, merge may read.
//!
//! A stage whose prerequisite faulted publishes the same fault without
//! running, and a stage that dies before publishing publishes an
//! interruption, so every gate always opens.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::kitchen::Orchestrator;
use crate::kitchen::plan::{Stage, StagePlan};
use crate::kitchen::recipe::{self, Recipe};
use crate::stage::{StageContext, StageSpec, run_stage};
use crate::sync::{CompletionGate, GatedSlot, Outcome, Publisher, Resolver, StageHandle, StageState};
use crate::types::Strategy;

#[derive(Debug)]
pub struct GateOrchestrator {
    ctx: StageContext,
    recipe: Recipe,
    order: Vec<Stage>,
}

/// One in-flight gated build: the artifact handle plus the branch slots,
/// which stay observable for diagnostics.
#[derive(Debug)]
pub struct GatedBuild {
    pub artifact: StageHandle<String>,
    slots: BranchSlots,
}

#[derive(Debug, Clone)]
struct BranchSlots {
    raw_dough: Arc<GatedSlot<String>>,
    risen_dough: Arc<GatedSlot<String>>,
    crust: Arc<GatedSlot<String>>,
    sauce: Arc<GatedSlot<String>>,
    cheese: Arc<GatedSlot<String>>,
}

/// Where a gated stage gets its input from.
enum Source<I> {
    Ready(I),
    After(Arc<GatedSlot<I>>),
}

impl GateOrchestrator {
    pub fn new(ctx: StageContext, recipe: Recipe) -> Result<Self> {
        let order = StagePlan::new().submission_order()?;
        Ok(Self { ctx, recipe, order })
    }

    /// Submit the whole graph and return the in-flight build.
    ///
    /// Gates and slots are created fresh for every build.
    pub fn start(&self) -> GatedBuild {
        let Self { ctx, recipe, order } = self;
        let slots = BranchSlots::new();
        let (resolver, artifact) = StageHandle::pending(Stage::Merge.name());
        let mut resolver = Some(resolver);

        debug!(strategy = %Strategy::Gate, ?order, "submitting stage graph");

        for &stage in order {
            let spec = recipe.spec(stage);
            match stage {
                Stage::CombineDough => submit_gated(
                    ctx,
                    spec,
                    Source::Ready(recipe.dough.clone()),
                    slots.raw_dough.publisher(),
                    recipe::combine,
                ),
                Stage::Rise => submit_gated(
                    ctx,
                    spec,
                    Source::After(Arc::clone(&slots.raw_dough)),
                    slots.risen_dough.publisher(),
                    recipe::rise,
                ),
                Stage::Roll => submit_gated(
                    ctx,
                    spec,
                    Source::After(Arc::clone(&slots.risen_dough)),
                    slots.crust.publisher(),
                    recipe::roll,
                ),
                Stage::CombineSauce => submit_gated(
                    ctx,
                    spec,
                    Source::Ready(recipe.sauce.clone()),
                    slots.sauce.publisher(),
                    recipe::combine,
                ),
                Stage::Grate => submit_gated(
                    ctx,
                    spec,
                    Source::Ready(recipe.cheese.clone()),
                    slots.cheese.publisher(),
                    recipe::grate,
                ),
                Stage::Merge => {
                    if let Some(resolver) = resolver.take() {
                        submit_merge(ctx, slots.clone(), resolver);
                    }
                }
            }
        }

        GatedBuild { artifact, slots }
    }
}

impl Orchestrator for GateOrchestrator {
    fn strategy(&self) -> Strategy {
        Strategy::Gate
    }

    fn context(&self) -> &StageContext {
        &self.ctx
    }

    fn build_async(&self) -> StageHandle<String> {
        self.start().artifact
    }
}

impl GatedBuild {
    /// Current state of a gated stage; `None` for the merge.
    pub fn state_of(&self, stage: Stage) -> Option<StageState> {
        let slot = match stage {
            Stage::CombineDough => &self.slots.raw_dough,
            Stage::Rise => &self.slots.risen_dough,
            Stage::Roll => &self.slots.crust,
            Stage::CombineSauce => &self.slots.sauce,
            Stage::Grate => &self.slots.cheese,
            Stage::Merge => return None,
        };
        Some(slot.state())
    }
}

impl BranchSlots {
    fn new() -> Self {
        let dough_combined = Arc::new(CompletionGate::new("dough-combined", 1));
        let dough_risen = Arc::new(CompletionGate::new("dough-risen", 1));
        let layers_ready = Arc::new(CompletionGate::new("layers-ready", 3));

        Self {
            raw_dough: GatedSlot::new(Stage::CombineDough.name(), dough_combined),
            risen_dough: GatedSlot::new(Stage::Rise.name(), dough_risen),
            crust: GatedSlot::new(Stage::Roll.name(), Arc::clone(&layers_ready)),
            sauce: GatedSlot::new(Stage::CombineSauce.name(), Arc::clone(&layers_ready)),
            cheese: GatedSlot::new(Stage::Grate.name(), layers_ready),
        }
    }
}

fn submit_gated<I, F>(
    ctx: &StageContext,
    spec: StageSpec,
    source: Source<I>,
    publisher: Publisher<String>,
    transform: F,
) where
    I: Display + Clone + Send + Sync + 'static,
    F: FnOnce(I) -> anyhow::Result<String> + Send + 'static,
{
    let sink = Arc::clone(ctx.sink());
    let name = spec.name.clone();

    let job = async move {
        let input = match source {
            Source::Ready(input) => Ok(input),
            Source::After(slot) => {
                debug!(
                    stage = %spec.name,
                    after = %slot.stage(),
                    gate = slot.gate().name(),
                    "waiting on prerequisite"
                );
                slot.read().await
            }
        };

        let outcome = match input {
            Ok(input) => match publisher.begin() {
                Ok(()) => run_stage(&spec, input, transform, sink.as_ref()).await,
                Err(err) => Err(err),
            },
            Err(err) => {
                debug!(stage = %spec.name, error = %err, "prerequisite faulted; forwarding");
                Err(err)
            }
        };

        if let Err(err) = publisher.publish(outcome) {
            error!(stage = %spec.name, error = %err, "failed to publish stage output");
        }
    };

    if let Err(err) = ctx.pool().submit(job) {
        warn!(stage = %name, error = %err, "could not submit stage");
    }
}

fn submit_merge(ctx: &StageContext, slots: BranchSlots, resolver: Resolver<String>) {
    let job = async move {
        let outcome = merge(&slots).await;
        resolver.resolve_or_log(outcome);
    };

    if let Err(err) = ctx.pool().submit(job) {
        warn!(stage = Stage::Merge.name(), error = %err, "could not submit merge");
    }
}

/// Wait for `layers-ready`, then stack cheese on sauce on crust.
async fn merge(slots: &BranchSlots) -> Outcome<String> {
    let crust = slots.crust.read().await?;
    let sauce = slots.sauce.read().await?;
    let cheese = slots.cheese.read().await?;
    Ok(recipe::cheese_on(recipe::sauce_on_crust(crust, sauce), cheese))
}
