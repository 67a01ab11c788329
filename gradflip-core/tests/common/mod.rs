use gradflip_core::{CsrMatrix, DenseMatrix, GradientOracle, GradientQuery, OracleError};
use std::sync::Arc;

/// Oracle that always returns the same gradient.
#[derive(Clone, Debug)]
pub struct FixedGradient {
    gradient: Vec<f32>,
}

impl FixedGradient {
    #[must_use]
    pub fn new(gradient: Vec<f32>) -> Self {
        Self { gradient }
    }
}

impl GradientOracle for FixedGradient {
    fn name(&self) -> &str {
        "fixed"
    }

    fn relaxation_gradient(&self, _query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        Ok(self.gradient.clone())
    }
}

/// Oracle that always fails with [`OracleError::Evaluation`].
#[derive(Clone, Debug)]
pub struct FailingOracle;

impl GradientOracle for FailingOracle {
    fn name(&self) -> &str {
        "failing"
    }

    fn relaxation_gradient(&self, _query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        Err(OracleError::Evaluation {
            reason: Arc::from("model offline"),
        })
    }
}

/// Attack inputs for a four-node cycle `0-1-2-3-0`.
pub struct Ring {
    pub features: DenseMatrix,
    pub adjacency: CsrMatrix,
    pub labels: Vec<usize>,
    pub train: Vec<usize>,
}

#[must_use]
pub fn ring() -> Ring {
    Ring {
        features: DenseMatrix::identity(4),
        adjacency: CsrMatrix::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])
            .expect("ring edges are in bounds"),
        labels: vec![0, 1, 0, 1],
        train: vec![0, 1, 2, 3],
    }
}
