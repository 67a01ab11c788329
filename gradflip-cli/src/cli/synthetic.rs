//! Seeded generation of attack scenarios.

use gradflip_core::{CsrMatrix, DenseMatrix, LinearGcn, MatrixError, OracleError};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use tracing::{debug, instrument};

const HIDDEN_UNITS: usize = 16;

/// Parameters for [`SyntheticGraph::generate`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticSpec {
    /// Number of nodes.
    pub nodes: usize,
    /// Probability of each undirected edge, in `[0, 1]`.
    pub edge_probability: f64,
    /// Feature dimension.
    pub features: usize,
    /// Number of classes scored by the surrogate.
    pub classes: usize,
    /// Probability of each node joining the training set, in `[0, 1]`.
    pub train_fraction: f64,
    /// RNG seed.
    pub seed: u64,
}

/// A complete attack scenario.
///
/// Labels are the surrogate's own predictions on the clean graph, so the
/// training loss starts low and every flip is measured against a consistent
/// baseline.
#[derive(Clone, Debug)]
pub struct SyntheticGraph {
    /// Node features (`nodes x features`).
    pub features: DenseMatrix,
    /// Symmetric binary adjacency without self-loops.
    pub adjacency: CsrMatrix,
    /// Surrogate with random two-layer weights.
    pub model: LinearGcn,
    /// Clean-graph prediction per node.
    pub labels: Vec<usize>,
    /// Nodes contributing to the loss. May be empty for tiny fractions.
    pub train: Vec<usize>,
}

/// Errors raised while generating a scenario.
#[derive(Debug, thiserror::Error)]
pub enum SyntheticError {
    /// A generated matrix had an inconsistent shape.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// The surrogate rejected its weights or the clean graph.
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// A probability parameter was outside `[0, 1]`.
    #[error("{name} must lie in [0, 1] (got {value})")]
    Probability {
        /// Name of the offending parameter.
        name: &'static str,
        /// Supplied value.
        value: f64,
    },
}

impl SyntheticGraph {
    /// Generates a scenario deterministically from `spec.seed`.
    ///
    /// # Errors
    /// Returns [`SyntheticError::Probability`] for a probability outside
    /// `[0, 1]` and [`SyntheticError::Oracle`] when `spec.classes` is zero.
    #[instrument(
        name = "synthetic.generate",
        err,
        skip(spec),
        fields(nodes = spec.nodes, seed = spec.seed),
    )]
    pub fn generate(spec: &SyntheticSpec) -> Result<Self, SyntheticError> {
        for (name, value) in [
            ("edge_probability", spec.edge_probability),
            ("train_fraction", spec.train_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SyntheticError::Probability { name, value });
            }
        }
        let mut rng = SmallRng::seed_from_u64(spec.seed);
        let mut edges = Vec::new();
        for u in 0..spec.nodes {
            for v in (u + 1)..spec.nodes {
                if rng.gen_bool(spec.edge_probability) {
                    edges.push((u, v));
                }
            }
        }
        let adjacency = CsrMatrix::from_undirected_edges(spec.nodes, &edges)?;
        let features = uniform(&mut rng, spec.nodes, spec.features)?;
        let hidden = uniform(&mut rng, spec.features, HIDDEN_UNITS)?;
        let output = uniform(&mut rng, HIDDEN_UNITS, spec.classes)?;
        let model = LinearGcn::from_layers(&hidden, &output)?.with_name("synthetic-gcn");
        let labels = model.predict(&features, &adjacency.to_dense())?;
        let train = (0..spec.nodes)
            .filter(|_| rng.gen_bool(spec.train_fraction))
            .collect::<Vec<_>>();
        debug!(edges = edges.len(), train = train.len(), "generated scenario");
        Ok(Self {
            features,
            adjacency,
            model,
            labels,
            train,
        })
    }
}

fn uniform(rng: &mut SmallRng, rows: usize, cols: usize) -> Result<DenseMatrix, MatrixError> {
    let data = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    DenseMatrix::from_vec(rows, cols, data)
}
