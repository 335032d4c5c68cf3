// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod kitchen;
pub mod logging;
pub mod pool;
pub mod stage;
pub mod sync;
pub mod types;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, error, info};

use crate::cli::{CliArgs, StrategyArg};
use crate::config::{ConfigFile, RawConfigFile, default_config_path, load_from_path};
use crate::errors::BakedagError;
use crate::kitchen::{Recipe, StagePlan, new_orchestrator};
use crate::pool::WorkerPool;
use crate::stage::StageContext;
use crate::types::Strategy;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading + CLI overrides
/// - the worker pool
/// - one orchestrator per requested strategy
///
/// Blocks until every requested build finished, then shuts the pool down.
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(&args)?;
    let strategy = args
        .strategy
        .unwrap_or_else(|| StrategyArg::from(cfg.recipe.strategy));

    if args.dry_run {
        print_dry_run(&cfg, strategy)?;
        return Ok(());
    }

    let pool = WorkerPool::new(cfg.pool.workers)?;
    let recipe = Recipe::from_config(&cfg);
    let outcome = bake(&pool, &recipe, strategy.strategies());
    pool.shutdown();

    let artifact = outcome?;
    println!("Ready to bake: {artifact}");
    Ok(())
}

/// Run each strategy on a fresh orchestrator; all of them must agree.
///
/// A failed build surfaces as [`BakedagError::Stage`] carrying the fault of
/// the stage that broke.
fn bake(pool: &WorkerPool, recipe: &Recipe, strategies: Vec<Strategy>) -> errors::Result<String> {
    let mut agreed: Option<(Strategy, String)> = None;

    for strategy in strategies {
        let ctx = StageContext::with_tracing(pool.handle());
        let orchestrator = new_orchestrator(strategy, ctx, recipe.clone())?;
        info!(%strategy, workers = pool.size(), "baking");

        let artifact = orchestrator.build().map_err(|err| {
            error!(%strategy, stage = err.stage().unwrap_or("pool"), error = %err, "build failed");
            BakedagError::Stage(err)
        })?;

        match &agreed {
            Some((first, expected)) if *expected != artifact => {
                return Err(BakedagError::Other(anyhow!(
                    "strategies disagree: {first} built '{expected}', {strategy} built '{artifact}'"
                )));
            }
            Some(_) => {}
            None => agreed = Some((strategy, artifact)),
        }
    }

    agreed
        .map(|(_, artifact)| artifact)
        .ok_or_else(|| BakedagError::ConfigError("no strategy selected".to_string()))
}

/// Load the config file (if any) and apply CLI overrides before validating.
fn resolve_config(args: &CliArgs) -> Result<ConfigFile> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(PathBuf::from(path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!(path = %path.display(), "using default config file");
                load_from_path(&path)?
            } else {
                debug!("no config file; using built-in recipe");
                RawConfigFile::default()
            }
        }
    };

    if let Some(workers) = args.workers {
        raw.pool.workers = workers;
    }

    Ok(ConfigFile::try_from(raw)?)
}

/// Print the resolved configuration and the stage plan.
fn print_dry_run(cfg: &ConfigFile, strategy: StrategyArg) -> Result<()> {
    let recipe = Recipe::from_config(cfg);
    let plan = StagePlan::new();

    println!("bakedag dry-run");
    println!("  pool.workers = {}", cfg.pool.workers);
    println!("  strategy = {strategy:?}");
    println!("  dough = [{}]", recipe.dough);
    println!("  sauce = [{}]", recipe.sauce);
    println!("  cheese = {}", recipe.cheese);
    println!();

    println!("stages (submission order):");
    for stage in plan.submission_order()? {
        let spec = recipe.spec(stage);
        match stage.branch() {
            Some(branch) => println!("  - {stage} [{branch}] ({}, {:?})", spec.label, spec.cost),
            None => println!("  - {stage} ({}, {:?})", spec.label, spec.cost),
        }
        let deps = plan.dependencies_of(stage);
        if !deps.is_empty() {
            let deps: Vec<_> = deps.iter().map(|d| d.name()).collect();
            println!("      after: {deps:?}");
        }
    }

    debug!("dry-run complete (nothing baked)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageError;
    use crate::kitchen::{Ingredients, Timing};

    fn instant_recipe() -> Recipe {
        Recipe {
            timing: Timing::instant(),
            ..Recipe::default()
        }
    }

    #[test]
    fn both_strategies_agree_on_the_default_recipe() {
        let pool = WorkerPool::new(2).unwrap();
        let artifact = bake(&pool, &instant_recipe(), StrategyArg::Both.strategies()).unwrap();
        pool.shutdown();

        assert_eq!(
            artifact,
            "grated cheese on Tomato+Oil+Garlic+Oregano on rolled risen Flour+Water+Yeast"
        );
    }

    #[test]
    fn failed_build_keeps_the_stage_fault() {
        let pool = WorkerPool::new(2).unwrap();
        let recipe = Recipe {
            sauce: Ingredients::new(Vec::<String>::new()),
            ..instant_recipe()
        };
        let err = bake(&pool, &recipe, vec![Strategy::Gate]).unwrap_err();
        pool.shutdown();

        match err {
            BakedagError::Stage(fault) => {
                assert_eq!(fault.stage(), Some("sauce.combine"));
                assert!(matches!(fault, StageError::Transform { .. }));
            }
            other => panic!("expected a stage fault, got {other:?}"),
        }
    }
}
