use std::error::Error;
use std::io::Write;

use bakedag::config::{load_and_validate, load_from_path};
use bakedag::errors::BakedagError;
use bakedag::kitchen::{Recipe, Stage};
use bakedag::types::Strategy;
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn full_config_round_trips_into_a_recipe() -> TestResult {
    let file = write_config(
        r#"
[pool]
workers = 2

[recipe]
strategy = "gate"
dough = ["Rye", "Water"]
sauce = ["Pesto"]
cheese = "parmesan"

[timing]
combine_per_ingredient_ms = 10
rise_ms = 5
roll_ms = 1
grate_ms = 7
"#,
    );

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.pool.workers, 2);
    assert_eq!(cfg.recipe.strategy, Strategy::Gate);

    let recipe = Recipe::from_config(&cfg);
    assert_eq!(recipe.dough.as_slice(), ["Rye", "Water"]);
    assert_eq!(recipe.cheese, "parmesan");
    assert_eq!(recipe.spec(Stage::CombineDough).cost.as_millis(), 20);
    assert_eq!(recipe.spec(Stage::Grate).cost.as_millis(), 7);
    Ok(())
}

#[test]
fn empty_file_uses_the_built_in_recipe() -> TestResult {
    let file = write_config("");
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.pool.workers, 4);
    assert_eq!(cfg.recipe.strategy, Strategy::Future);
    assert_eq!(Recipe::from_config(&cfg), Recipe::default());
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let file = write_config("[pool]\nworkers = 0\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, BakedagError::ConfigError(ref msg) if msg.contains("workers")));
}

#[test]
fn empty_or_blank_ingredients_are_rejected() {
    for body in [
        "[recipe]\ndough = []\n",
        "[recipe]\nsauce = [\"Tomato\", \"  \"]\n",
        "[recipe]\ncheese = \"\"\n",
    ] {
        let file = write_config(body);
        let err = load_and_validate(file.path()).unwrap_err();
        assert!(matches!(err, BakedagError::ConfigError(_)), "{body}: {err}");
    }
}

#[test]
fn raw_load_skips_validation() -> TestResult {
    let file = write_config("[pool]\nworkers = 0\n");
    let raw = load_from_path(file.path())?;
    assert_eq!(raw.pool.workers, 0);
    Ok(())
}

#[test]
fn unknown_strategy_is_a_toml_error() {
    let file = write_config("[recipe]\nstrategy = \"telepathy\"\n");
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, BakedagError::TomlError(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Bakedag.toml")).unwrap_err();
    assert!(matches!(err, BakedagError::IoError(_)));
}
