// src/kitchen/recipe.rs

//! What the orchestrators assemble: ingredient lists, stage costs, and the
//! transforms each stage applies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, ensure};

use crate::config::{ConfigFile, TimingSection};
use crate::kitchen::plan::Stage;
use crate::stage::StageSpec;

/// Ordered, immutable list of raw inputs to a combine stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredients(Arc<[String]>);

impl Ingredients {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items.into_iter().collect()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Ingredients {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Ingredients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Simulated cost of each kind of stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub combine_per_ingredient: Duration,
    pub rise: Duration,
    pub roll: Duration,
    pub grate: Duration,
}

impl Timing {
    /// Every stage completes without delay.
    pub fn instant() -> Self {
        Self {
            combine_per_ingredient: Duration::ZERO,
            rise: Duration::ZERO,
            roll: Duration::ZERO,
            grate: Duration::ZERO,
        }
    }

    /// Cost of combining `count` ingredients.
    pub fn combine(&self, count: usize) -> Duration {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.combine_per_ingredient.saturating_mul(count)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&TimingSection::default())
    }
}

impl From<&TimingSection> for Timing {
    fn from(section: &TimingSection) -> Self {
        Self {
            combine_per_ingredient: section.combine_per_ingredient(),
            rise: section.rise(),
            roll: section.roll(),
            grate: section.grate(),
        }
    }
}

/// Inputs of one build: the three branches' raw ingredients and the timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub dough: Ingredients,
    pub sauce: Ingredients,
    pub cheese: String,
    pub timing: Timing,
}

impl Recipe {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            dough: Ingredients::new(cfg.recipe.dough.iter().cloned()),
            sauce: Ingredients::new(cfg.recipe.sauce.iter().cloned()),
            cheese: cfg.recipe.cheese.clone(),
            timing: Timing::from(&cfg.timing),
        }
    }

    /// Name, label and cost of `stage` for this recipe.
    pub fn spec(&self, stage: Stage) -> StageSpec {
        let cost = match stage {
            Stage::CombineDough => self.timing.combine(self.dough.len()),
            Stage::Rise => self.timing.rise,
            Stage::Roll => self.timing.roll,
            Stage::CombineSauce => self.timing.combine(self.sauce.len()),
            Stage::Grate => self.timing.grate,
            Stage::Merge => Duration::ZERO,
        };
        StageSpec::new(stage.name(), stage.label(), cost)
    }
}

impl Default for Recipe {
    fn default() -> Self {
        Self::from_config(&ConfigFile::default())
    }
}

/// Join ingredients with `+`, keeping their order.
pub fn combine(ingredients: Ingredients) -> Result<String> {
    ensure!(!ingredients.is_empty(), "nothing to combine");
    Ok(ingredients.as_slice().join("+"))
}

pub fn rise(dough: String) -> Result<String> {
    Ok(format!("risen {dough}"))
}

pub fn roll(dough: String) -> Result<String> {
    Ok(format!("rolled {dough}"))
}

pub fn grate(cheese: String) -> Result<String> {
    Ok(format!("grated {cheese}"))
}

pub fn sauce_on_crust(crust: String, sauce: String) -> String {
    format!("{sauce} on {crust}")
}

pub fn cheese_on(saucy_crust: String, cheese: String) -> String {
    format!("{cheese} on {saucy_crust}")
}
