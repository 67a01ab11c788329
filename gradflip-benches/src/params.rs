//! Benchmark parameter types.

use std::fmt;

/// Parameters for an attack benchmark run.
#[derive(Clone, Debug)]
pub struct AttackBenchParams {
    /// Number of nodes in the graph.
    pub nodes: usize,
    /// Number of perturbations per attack.
    pub perturbations: usize,
}

impl fmt::Display for AttackBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={},k={}", self.nodes, self.perturbations)
    }
}
