//! Command-line interface for running fast-gradient attacks.
//!
//! The `attack` command synthesises a random graph, node features and a
//! linearised GCN surrogate from a seed, attacks one target node, and reports
//! the flips and the surrogate's prediction before and after.

mod commands;
mod failure;
mod synthetic;

pub use commands::{
    AttackCommand, Cli, CliError, Command, ExecutionSummary, PolicyArg, render_summary, run_cli,
};
pub use failure::FailureCodes;
pub use synthetic::{SyntheticError, SyntheticGraph, SyntheticSpec};
