// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BakedagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BakedagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.pool, raw.recipe, raw.timing))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_pool(cfg)?;
    validate_ingredients("dough", &cfg.recipe.dough)?;
    validate_ingredients("sauce", &cfg.recipe.sauce)?;
    validate_cheese(cfg)?;
    Ok(())
}

fn validate_pool(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pool.workers == 0 {
        return Err(BakedagError::ConfigError(
            "[pool].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_ingredients(branch: &str, ingredients: &[String]) -> Result<()> {
    if ingredients.is_empty() {
        return Err(BakedagError::ConfigError(format!(
            "[recipe].{branch} must list at least one ingredient"
        )));
    }
    if let Some(pos) = ingredients.iter().position(|i| i.trim().is_empty()) {
        return Err(BakedagError::ConfigError(format!(
            "[recipe].{branch} has a blank ingredient at position {pos}"
        )));
    }
    Ok(())
}

fn validate_cheese(cfg: &RawConfigFile) -> Result<()> {
    if cfg.recipe.cheese.trim().is_empty() {
        return Err(BakedagError::ConfigError(
            "[recipe].cheese must not be blank".to_string(),
        ));
    }
    Ok(())
}
