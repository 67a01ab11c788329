//! Benchmark setup error type.

use crate::scenario::ScenarioError;
use gradflip_core::AttackError;

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Scenario generation failed.
    #[error("scenario generation failed: {0}")]
    Scenario(#[from] ScenarioError),
    /// Building or running the attack failed.
    #[error("attack failed: {0}")]
    Attack(#[from] AttackError),
}
