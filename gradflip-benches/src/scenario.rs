//! Seeded attack scenarios for benchmarking.
//!
//! Graphs are Erdos-Renyi with a fixed expected degree so the edge count
//! grows linearly with the node count.

use gradflip_core::{CsrMatrix, DenseMatrix, LinearGcn, MatrixError, OracleError};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Errors that may occur during scenario generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum ScenarioError {
    /// Fewer than two nodes were requested.
    #[error("scenario needs at least two nodes (got {nodes})")]
    TooFewNodes {
        /// Requested node count.
        nodes: usize,
    },
    /// A generated matrix had an inconsistent shape.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// The surrogate rejected its weights or the clean graph.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Configuration for scenario generation.
#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    /// Number of nodes.
    pub nodes: usize,
    /// Expected node degree.
    pub mean_degree: f64,
    /// Feature dimension.
    pub dimensions: usize,
    /// Number of classes.
    pub classes: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// Inputs for one benchmark attack.
///
/// # Examples
///
/// ```
/// use gradflip_benches::scenario::{Scenario, ScenarioConfig};
///
/// let config = ScenarioConfig { nodes: 10, mean_degree: 3.0, dimensions: 4, classes: 2, seed: 7 };
/// let scenario = Scenario::generate(&config).expect("valid config");
/// assert_eq!(scenario.labels.len(), 10);
/// ```
#[derive(Clone, Debug)]
pub struct Scenario {
    /// Node features.
    pub features: DenseMatrix,
    /// Clean adjacency.
    pub adjacency: CsrMatrix,
    /// Surrogate model.
    pub model: LinearGcn,
    /// Surrogate predictions on the clean graph.
    pub labels: Vec<usize>,
    /// Every node.
    pub train: Vec<usize>,
}

impl Scenario {
    /// Generates a scenario from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::TooFewNodes`] for fewer than two nodes and
    /// [`ScenarioError::Oracle`] when `classes` is zero.
    pub fn generate(config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        if config.nodes < 2 {
            return Err(ScenarioError::TooFewNodes {
                nodes: config.nodes,
            });
        }
        let mut rng = SmallRng::seed_from_u64(config.seed);
        let pairs = config.nodes - 1;
        let probability = (config.mean_degree / f64::from(u32::try_from(pairs).unwrap_or(u32::MAX)))
            .clamp(0.0, 1.0);
        let mut edges = Vec::new();
        for u in 0..config.nodes {
            for v in (u + 1)..config.nodes {
                if rng.gen_bool(probability) {
                    edges.push((u, v));
                }
            }
        }
        let adjacency = CsrMatrix::from_undirected_edges(config.nodes, &edges)?;
        let features = uniform(&mut rng, config.nodes, config.dimensions)?;
        let model = LinearGcn::new(uniform(&mut rng, config.dimensions, config.classes)?)?;
        let labels = model.predict(&features, &adjacency.to_dense())?;
        Ok(Self {
            features,
            adjacency,
            model,
            labels,
            train: (0..config.nodes).collect(),
        })
    }
}

fn uniform(rng: &mut SmallRng, rows: usize, cols: usize) -> Result<DenseMatrix, MatrixError> {
    let data = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    DenseMatrix::from_vec(rows, cols, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn rejects_tiny_graphs(#[case] nodes: usize) {
        let config = ScenarioConfig {
            nodes,
            mean_degree: 2.0,
            dimensions: 2,
            classes: 2,
            seed: 1,
        };
        assert_eq!(
            Scenario::generate(&config).expect_err("too few nodes"),
            ScenarioError::TooFewNodes { nodes }
        );
    }

    #[test]
    fn generation_is_seeded() {
        let config = ScenarioConfig {
            nodes: 30,
            mean_degree: 4.0,
            dimensions: 3,
            classes: 2,
            seed: 5,
        };
        let first = Scenario::generate(&config).expect("valid config");
        let second = Scenario::generate(&config).expect("valid config");
        assert_eq!(first.adjacency, second.adjacency);
        assert_eq!(first.labels, second.labels);
    }
}
