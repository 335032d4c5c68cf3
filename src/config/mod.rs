// src/config/mod.rs

//! Configuration loading.
//!
//! - [`model`] mirrors the TOML layout.
//! - [`loader`] reads and deserializes files.
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, PoolSection, RawConfigFile, RecipeSection, TimingSection};
