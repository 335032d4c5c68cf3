// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::Strategy;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [pool]
/// workers = 4
///
/// [recipe]
/// strategy = "gate"
/// dough = ["Flour", "Water", "Yeast"]
/// sauce = ["Tomato", "Oil", "Garlic", "Oregano"]
/// cheese = "cheese"
///
/// [timing]
/// combine_per_ingredient_ms = 120
/// rise_ms = 100
/// roll_ms = 50
/// grate_ms = 400
/// ```
///
/// All sections are optional and default to the values above.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub pool: PoolSection,

    #[serde(default)]
    pub recipe: RecipeSection,

    #[serde(default)]
    pub timing: TimingSection,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub pool: PoolSection,
    pub recipe: RecipeSection,
    pub timing: TimingSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        pool: PoolSection,
        recipe: RecipeSection,
        timing: TimingSection,
    ) -> Self {
        Self {
            pool,
            recipe,
            timing,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let RawConfigFile {
            pool,
            recipe,
            timing,
        } = RawConfigFile::default();
        Self::new_unchecked(pool, recipe, timing)
    }
}

/// `[pool]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSection {
    /// Number of workers, i.e. the maximum number of stages running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    4
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// `[recipe]` section: what goes into each branch.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeSection {
    #[serde(default)]
    pub strategy: Strategy,

    /// Dough ingredients, combined in this order.
    #[serde(default = "default_dough")]
    pub dough: Vec<String>,

    /// Sauce ingredients, combined in this order.
    #[serde(default = "default_sauce")]
    pub sauce: Vec<String>,

    #[serde(default = "default_cheese")]
    pub cheese: String,
}

fn default_dough() -> Vec<String> {
    ["Flour", "Water", "Yeast"].map(String::from).to_vec()
}

fn default_sauce() -> Vec<String> {
    ["Tomato", "Oil", "Garlic", "Oregano"]
        .map(String::from)
        .to_vec()
}

fn default_cheese() -> String {
    "cheese".to_string()
}

impl Default for RecipeSection {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            dough: default_dough(),
            sauce: default_sauce(),
            cheese: default_cheese(),
        }
    }
}

/// `[timing]` section: simulated cost of each kind of stage.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingSection {
    /// Combining costs this much per ingredient.
    #[serde(default = "default_combine_per_ingredient_ms")]
    pub combine_per_ingredient_ms: u64,

    #[serde(default = "default_rise_ms")]
    pub rise_ms: u64,

    #[serde(default = "default_roll_ms")]
    pub roll_ms: u64,

    #[serde(default = "default_grate_ms")]
    pub grate_ms: u64,
}

fn default_combine_per_ingredient_ms() -> u64 {
    120
}

fn default_rise_ms() -> u64 {
    100
}

fn default_roll_ms() -> u64 {
    50
}

fn default_grate_ms() -> u64 {
    400
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            combine_per_ingredient_ms: default_combine_per_ingredient_ms(),
            rise_ms: default_rise_ms(),
            roll_ms: default_roll_ms(),
            grate_ms: default_grate_ms(),
        }
    }
}

impl TimingSection {
    pub fn combine_per_ingredient(&self) -> Duration {
        Duration::from_millis(self.combine_per_ingredient_ms)
    }

    pub fn rise(&self) -> Duration {
        Duration::from_millis(self.rise_ms)
    }

    pub fn roll(&self) -> Duration {
        Duration::from_millis(self.roll_ms)
    }

    pub fn grate(&self) -> Duration {
        Duration::from_millis(self.grate_ms)
    }
}
