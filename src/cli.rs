// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::Strategy;

/// Command-line arguments for `bakedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bakedag",
    version,
    about = "Assemble a pizza from concurrently prepared dough, sauce and cheese.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Bakedag.toml` is used when it exists, otherwise the
    /// built-in recipe.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Orchestration strategy; overrides `recipe.strategy`.
    #[arg(long, value_enum, value_name = "STRATEGY")]
    pub strategy: Option<StrategyArg>,

    /// Number of pool workers; overrides `pool.workers`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BAKEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the stage plan, but don't bake anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Strategy as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Future,
    Gate,
    /// Run both strategies and check they agree.
    Both,
}

impl StrategyArg {
    pub fn strategies(self) -> Vec<Strategy> {
        match self {
            StrategyArg::Future => vec![Strategy::Future],
            StrategyArg::Gate => vec![Strategy::Gate],
            StrategyArg::Both => vec![Strategy::Future, Strategy::Gate],
        }
    }
}

impl From<Strategy> for StrategyArg {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Future => StrategyArg::Future,
            Strategy::Gate => StrategyArg::Gate,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
