// src/errors.rs

//! Crate-wide error types.
//!
//! - [`StageError`] is the fault channel of the orchestration core. It is what
//!   a handle or a gated slot hands to its readers when a stage did not
//!   produce a value, so it has to be cheap to clone.
//! - [`BakedagError`] covers everything around the core (config, IO, CLI).

use thiserror::Error;

/// Fault recorded by a stage and surfaced to whoever observes its result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The stage's transform returned an error.
    #[error("stage '{stage}' failed: {reason}")]
    Transform { stage: String, reason: String },

    /// The stage ended without publishing its output: its work was dropped,
    /// panicked, or never got to run because the pool shut down.
    #[error("stage '{stage}' was interrupted before publishing its output")]
    Interrupted { stage: String },

    /// A one-shot handle was resolved a second time.
    #[error("stage '{stage}' was resolved more than once")]
    AlreadyResolved { stage: String },

    /// A completion gate received more signals than it was created with.
    #[error("gate '{gate}' was signaled more times than required")]
    GateOverSignaled { gate: String },

    /// A gated stage tried to start running twice.
    #[error("stage '{stage}' tried to re-enter the running state")]
    StageReentered { stage: String },

    /// Work was submitted after the worker pool stopped accepting it.
    #[error("worker pool is shut down")]
    PoolShutDown,
}

impl StageError {
    /// Name of the stage (or gate) the fault is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            StageError::Transform { stage, .. }
            | StageError::Interrupted { stage }
            | StageError::AlreadyResolved { stage }
            | StageError::StageReentered { stage } => Some(stage),
            StageError::GateOverSignaled { gate } => Some(gate),
            StageError::PoolShutDown => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum BakedagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BakedagError>;
