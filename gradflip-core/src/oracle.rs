//! Gradient oracle abstraction over the surrogate model.
//!
//! The attack never evaluates a model directly. It hands a
//! [`GradientQuery`] describing the current graph to a [`GradientOracle`] and
//! receives the gradient of the training loss with respect to the relaxation
//! vector attached to the target row.

use crate::{error::OracleError, matrix::DenseMatrix};

/// Snapshot of the attack state handed to a [`GradientOracle`].
///
/// `adjacency` is the current working graph with every previous flip folded
/// in. `relaxation` has one entry per node and is added to row `target` only.
#[derive(Clone, Copy, Debug)]
pub struct GradientQuery<'a> {
    /// Node feature matrix (`N x D`).
    pub features: &'a DenseMatrix,
    /// Current dense adjacency (`N x N`).
    pub adjacency: &'a DenseMatrix,
    /// Continuous relaxation added to the target row.
    pub relaxation: &'a [f32],
    /// Ground-truth class per node.
    pub labels: &'a [usize],
    /// Nodes contributing to the loss.
    pub train_indices: &'a [usize],
    /// Node whose row carries the relaxation.
    pub target: usize,
}

impl GradientQuery<'_> {
    /// Number of nodes described by the query.
    #[must_use]
    pub const fn nodes(&self) -> usize {
        self.adjacency.rows()
    }

    /// Materialises `A'`: the adjacency with `relaxation` added to row
    /// `target` and every other row unchanged.
    ///
    /// # Errors
    /// Returns [`OracleError::NodeOutOfBounds`] when `target` is invalid and
    /// [`OracleError::DimensionMismatch`] when the relaxation length differs
    /// from the row length.
    ///
    /// # Examples
    /// ```
    /// use gradflip_core::{DenseMatrix, GradientQuery};
    ///
    /// let adjacency = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]])?;
    /// let features = DenseMatrix::identity(2);
    /// let query = GradientQuery {
    ///     features: &features,
    ///     adjacency: &adjacency,
    ///     relaxation: &[0.5, 0.0],
    ///     labels: &[0, 1],
    ///     train_indices: &[0],
    ///     target: 0,
    /// };
    /// let perturbed = query.perturbed_adjacency()?;
    /// assert_eq!(perturbed.row(0), Some(&[0.5, 1.0][..]));
    /// assert_eq!(perturbed.row(1), Some(&[1.0, 0.0][..]));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn perturbed_adjacency(&self) -> Result<DenseMatrix, OracleError> {
        let nodes = self.nodes();
        if self.relaxation.len() != self.adjacency.cols() {
            return Err(OracleError::DimensionMismatch {
                input: "relaxation",
                axis: "entries",
                expected: self.adjacency.cols(),
                actual: self.relaxation.len(),
            });
        }
        let mut perturbed = self.adjacency.clone();
        let row = perturbed
            .row_mut(self.target)
            .ok_or(OracleError::NodeOutOfBounds {
                index: self.target,
                nodes,
            })?;
        for (cell, &delta) in row.iter_mut().zip(self.relaxation) {
            *cell += delta;
        }
        Ok(perturbed)
    }
}

/// Computes `dLoss/d(relaxation)` for a surrogate model.
///
/// Implementations must evaluate a fresh forward pass per call and must not
/// accumulate state between calls: two calls with equal queries return equal
/// gradients. The returned vector has one entry per node.
///
/// # Examples
/// ```
/// use gradflip_core::{GradientOracle, GradientQuery, OracleError};
///
/// struct Constant(Vec<f32>);
///
/// impl GradientOracle for Constant {
///     fn name(&self) -> &str { "constant" }
///     fn relaxation_gradient(&self, _: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
///         Ok(self.0.clone())
///     }
/// }
///
/// let oracle = Constant(vec![0.0, 1.0]);
/// assert_eq!(oracle.name(), "constant");
/// ```
pub trait GradientOracle {
    /// Returns a human-readable name.
    fn name(&self) -> &str;

    /// Returns the gradient of the training loss with respect to the
    /// relaxation vector in `query`.
    ///
    /// # Errors
    /// Returns an [`OracleError`] when the model cannot be evaluated for the
    /// supplied inputs.
    fn relaxation_gradient(&self, query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError>;
}

impl<O: GradientOracle + ?Sized> GradientOracle for &O {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn relaxation_gradient(&self, query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        (**self).relaxation_gradient(query)
    }
}

impl<O: GradientOracle + ?Sized> GradientOracle for Box<O> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn relaxation_gradient(&self, query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        (**self).relaxation_gradient(query)
    }
}
