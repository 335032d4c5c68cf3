use std::time::Duration;

use bakedag::errors::StageError;
use bakedag::kitchen::{Stage, new_orchestrator};
use bakedag::pool::WorkerPool;
use bakedag::stage::TracePhase;
use bakedag::types::Strategy;
use bakedag_test_utils::builders::{RecipeBuilder, traced_context};
use bakedag_test_utils::init_tracing;

const STRATEGIES: [Strategy; 2] = [Strategy::Future, Strategy::Gate];

fn nothing_to_combine(stage: Stage) -> StageError {
    StageError::Transform {
        stage: stage.name().to_string(),
        reason: "nothing to combine".to_string(),
    }
}

#[test]
fn empty_sauce_faults_the_artifact() {
    init_tracing();

    let pool = WorkerPool::new(2).unwrap();
    for strategy in STRATEGIES {
        let (ctx, log) = traced_context(&pool);
        let recipe = RecipeBuilder::new().sauce(Vec::<String>::new()).build();
        let err = new_orchestrator(strategy, ctx, recipe).unwrap().build().unwrap_err();

        assert_eq!(err, nothing_to_combine(Stage::CombineSauce), "{strategy}");
        assert!(log.position(TracePhase::Finished, Stage::CombineSauce.name()).is_none());
    }
    pool.shutdown();
}

#[test]
fn dough_fault_skips_the_rest_of_the_dough_branch() {
    init_tracing();

    let pool = WorkerPool::new(2).unwrap();
    for strategy in STRATEGIES {
        let (ctx, log) = traced_context(&pool);
        let recipe = RecipeBuilder::new().dough(Vec::<String>::new()).build();
        let err = new_orchestrator(strategy, ctx, recipe).unwrap().build().unwrap_err();

        assert_eq!(err, nothing_to_combine(Stage::CombineDough), "{strategy}");
        assert!(log.position(TracePhase::Started, Stage::Rise.name()).is_none());
        assert!(log.position(TracePhase::Started, Stage::Roll.name()).is_none());
    }
    pool.shutdown();
}

#[test]
fn failed_build_waits_for_slow_branches_to_publish() {
    init_tracing();

    let pool = WorkerPool::new(4).unwrap();
    for strategy in STRATEGIES {
        let (ctx, log) = traced_context(&pool);
        let recipe = RecipeBuilder::new()
            .dough(Vec::<String>::new())
            .slow_grate(Duration::from_millis(60))
            .build();
        let err = new_orchestrator(strategy, ctx, recipe).unwrap().build().unwrap_err();

        assert_eq!(err, nothing_to_combine(Stage::CombineDough), "{strategy}");
        for stage in [Stage::CombineSauce, Stage::Grate] {
            assert!(
                log.position(TracePhase::Finished, stage.name()).is_some(),
                "{strategy}: build returned before {stage} finished"
            );
        }
    }
    pool.shutdown();
}

#[test]
fn crust_fault_wins_over_sauce_fault() {
    init_tracing();

    let pool = WorkerPool::new(3).unwrap();
    for strategy in STRATEGIES {
        let (ctx, _log) = traced_context(&pool);
        let recipe = RecipeBuilder::new()
            .dough(Vec::<String>::new())
            .sauce(Vec::<String>::new())
            .build();
        let err = new_orchestrator(strategy, ctx, recipe).unwrap().build().unwrap_err();
        assert_eq!(err, nothing_to_combine(Stage::CombineDough), "{strategy}");
    }
    pool.shutdown();
}

#[test]
fn failed_build_leaves_the_pool_usable() {
    init_tracing();

    let pool = WorkerPool::new(1).unwrap();
    for strategy in STRATEGIES {
        let (ctx, _log) = traced_context(&pool);
        let broken = RecipeBuilder::new().sauce(Vec::<String>::new()).build();
        assert!(new_orchestrator(strategy, ctx.clone(), broken).unwrap().build().is_err());

        let fine = new_orchestrator(strategy, ctx, RecipeBuilder::new().build()).unwrap();
        assert!(fine.build().is_ok(), "{strategy}");
    }
    pool.shutdown();
}
