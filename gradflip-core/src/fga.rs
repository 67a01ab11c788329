//! Fast gradient attack orchestration.
//!
//! Provides the [`Fga`] runtime entry point: input validation, the fixed-count
//! greedy flip loop, and post-attack validation of the perturbed graph.

use std::{num::NonZeroUsize, sync::Arc};

use tracing::{debug, info, instrument, warn};

use crate::{
    Result,
    builder::FlipPolicy,
    error::{AttackError, MatrixError},
    matrix::DenseMatrix,
    oracle::{GradientOracle, GradientQuery},
    report::{AttackReport, EdgeFlip},
    selector::{GreedySelector, PerturbationState},
    sparse::CsrMatrix,
    validate::validate_adjacency,
};

/// Targeted structure attack driven by a [`GradientOracle`].
///
/// Each step asks the oracle for the loss gradient with respect to a zero
/// relaxation of the target row, flips the single column with the highest
/// sign-corrected score, and mirrors the flip so the graph stays symmetric.
/// The loop always runs exactly `n_perturbations` steps.
///
/// Under the default [`FlipPolicy::Accumulate`] the flip delta is added
/// without clamping. For binary input this toggles the cell; re-selecting a
/// column toggles it back. Entries that were not `0` or `1` to begin with can
/// leave that range, in which case post-attack validation rejects the result.
/// [`FlipPolicy::Clamp`] and [`FlipPolicy::SkipFlipped`] opt into stricter
/// behaviour.
///
/// # Examples
/// ```
/// use gradflip_core::{CsrMatrix, DenseMatrix, FgaBuilder, LinearGcn};
///
/// let model = LinearGcn::new(DenseMatrix::from_rows(&[
///     vec![1.0, -1.0],
///     vec![-1.0, 1.0],
///     vec![0.5, 0.5],
///     vec![0.0, 1.0],
/// ])?)?;
/// let features = DenseMatrix::identity(4);
/// let adjacency = CsrMatrix::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])?;
/// let labels = [0, 1, 0, 1];
///
/// let mut fga = FgaBuilder::new(model, 4).build()?;
/// let report = fga.attack(&features, &adjacency, &labels, &[0, 1, 2, 3], 0, 2)?;
/// assert_eq!(report.flips().len(), 2);
///
/// let modified = fga.modified_adjacency().expect("attack stored its result");
/// assert_eq!(modified.get(0, 0), 0.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Fga<O> {
    oracle: O,
    node_count: NonZeroUsize,
    feature_shape: Option<(usize, usize)>,
    flip_policy: FlipPolicy,
    modified_adjacency: Option<CsrMatrix>,
}

impl<O: GradientOracle> Fga<O> {
    pub(crate) fn new(
        oracle: O,
        node_count: NonZeroUsize,
        feature_shape: Option<(usize, usize)>,
        flip_policy: FlipPolicy,
    ) -> Self {
        Self {
            oracle,
            node_count,
            feature_shape,
            flip_policy,
            modified_adjacency: None,
        }
    }

    /// Returns the node count configured for this instance.
    #[must_use]
    pub const fn node_count(&self) -> NonZeroUsize {
        self.node_count
    }

    /// Returns the expected feature shape, if one was configured.
    #[must_use]
    pub const fn feature_shape(&self) -> Option<(usize, usize)> {
        self.feature_shape
    }

    /// Returns the flip policy.
    #[must_use]
    pub const fn flip_policy(&self) -> FlipPolicy {
        self.flip_policy
    }

    /// Borrows the gradient oracle.
    #[must_use]
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Returns the adjacency produced by the most recent successful
    /// [`Self::attack`], or `None` before the first success and after a
    /// failed call.
    #[must_use]
    pub const fn modified_adjacency(&self) -> Option<&CsrMatrix> {
        self.modified_adjacency.as_ref()
    }

    /// Runs the attack against `target` with a budget of `n_perturbations`
    /// flips and stores the perturbed adjacency.
    ///
    /// The relaxation vector is recreated at zero on every call, so an
    /// instance can be reused across targets.
    ///
    /// # Errors
    /// Returns [`AttackError::EmptyTrainingSet`] before querying the oracle
    /// when `train_indices` is empty; [`AttackError::NodeCountMismatch`],
    /// [`AttackError::FeatureDimensionMismatch`], [`AttackError::TargetOutOfBounds`],
    /// [`AttackError::TrainIndexOutOfBounds`], [`AttackError::Matrix`] or
    /// [`AttackError::BudgetExceedsCandidates`] for malformed input;
    /// [`AttackError::Oracle`], [`AttackError::GradientLength`] or
    /// [`AttackError::NonFiniteGradient`] when the oracle fails, which aborts
    /// the remaining steps; and [`AttackError::InvalidAdjacency`] when the
    /// perturbed graph fails validation. No result is stored on error.
    #[instrument(
        name = "attack.run",
        err,
        skip(self, features, adjacency, labels, train_indices),
        fields(
            oracle = %self.oracle.name(),
            nodes = self.node_count.get(),
            target = target,
            n_perturbations = n_perturbations,
            policy = self.flip_policy.as_str(),
        ),
    )]
    pub fn attack(
        &mut self,
        features: &DenseMatrix,
        adjacency: &CsrMatrix,
        labels: &[usize],
        train_indices: &[usize],
        target: usize,
        n_perturbations: usize,
    ) -> Result<AttackReport> {
        self.modified_adjacency = None;
        self.validate_inputs(features, adjacency, labels, train_indices, target)?;
        self.check_budget(n_perturbations)?;
        info!(n_perturbations, "starting structure attack");

        let mut working = adjacency.to_dense();
        let mut state = PerturbationState::new(self.node_count.get(), n_perturbations);
        let selector = GreedySelector::new(self.flip_policy);
        let skip_flipped = matches!(self.flip_policy, FlipPolicy::SkipFlipped);
        let mut flips = Vec::with_capacity(n_perturbations);

        for step in 0..n_perturbations {
            let gradient = self.gradient(
                &GradientQuery {
                    features,
                    adjacency: &working,
                    relaxation: state.relaxation(),
                    labels,
                    train_indices,
                    target,
                },
                step,
            )?;
            let row = working.row(target).unwrap_or_default();
            let selection = selector
                .select(row, &gradient, target, |column| {
                    skip_flipped && state.was_flipped(column)
                })
                .ok_or(AttackError::BudgetExceedsCandidates {
                    requested: n_perturbations,
                    available: step,
                })?;
            let kind = selector
                .apply(&mut working, target, selection.column)
                .map_err(|error| AttackError::Matrix {
                    input: "adjacency",
                    error,
                })?;
            let reverted = state.record_flip(selection.column);
            if reverted {
                warn!(
                    step,
                    column = selection.column,
                    "column re-selected; flip reverts an earlier perturbation"
                );
            }
            debug!(
                step,
                column = selection.column,
                kind = kind.as_str(),
                score = selection.score,
                remaining = state.remaining(),
                "applied edge flip"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("gradflip_flips_total", "kind" => kind.as_str()).increment(1);
            flips.push(EdgeFlip {
                step,
                column: selection.column,
                kind,
                score: selection.score,
                reverted,
            });
        }

        let modified = CsrMatrix::from_dense(&working);
        if let Err(violation) = validate_adjacency(&modified) {
            warn!(%violation, "perturbed adjacency failed validation");
            return Err(AttackError::InvalidAdjacency { violation });
        }
        let report = AttackReport::new(target, flips);
        info!(
            flips = report.flips().len(),
            reverted = report.reverted_count(),
            edges = modified.nnz() / 2,
            "attack completed"
        );
        #[cfg(feature = "metrics")]
        metrics::counter!("gradflip_attacks_total").increment(1);
        self.modified_adjacency = Some(modified);
        Ok(report)
    }

    fn gradient(&self, query: &GradientQuery<'_>, step: usize) -> Result<Vec<f32>> {
        let gradient =
            self.oracle
                .relaxation_gradient(query)
                .map_err(|error| AttackError::Oracle {
                    oracle: Arc::from(self.oracle.name()),
                    error,
                })?;
        if gradient.len() != query.nodes() {
            return Err(AttackError::GradientLength {
                expected: query.nodes(),
                actual: gradient.len(),
            });
        }
        if let Some(column) = gradient.iter().position(|value| !value.is_finite()) {
            return Err(AttackError::NonFiniteGradient { step, column });
        }
        Ok(gradient)
    }

    fn validate_inputs(
        &self,
        features: &DenseMatrix,
        adjacency: &CsrMatrix,
        labels: &[usize],
        train_indices: &[usize],
        target: usize,
    ) -> Result<()> {
        let nodes = self.node_count.get();
        if train_indices.is_empty() {
            warn!("training index set is empty, returning error");
            return Err(AttackError::EmptyTrainingSet);
        }
        if adjacency.rows() != adjacency.cols() {
            return Err(AttackError::Matrix {
                input: "adjacency",
                error: MatrixError::NotSquare {
                    rows: adjacency.rows(),
                    cols: adjacency.cols(),
                },
            });
        }
        let counts = [
            ("adjacency", adjacency.rows()),
            ("features", features.rows()),
            ("labels", labels.len()),
        ];
        if let Some(&(input, actual)) = counts.iter().find(|&&(_, actual)| actual != nodes) {
            return Err(AttackError::NodeCountMismatch {
                input,
                expected: nodes,
                actual,
            });
        }
        if let Some((_, cols)) = self.feature_shape
            && features.cols() != cols
        {
            return Err(AttackError::FeatureDimensionMismatch {
                expected: cols,
                actual: features.cols(),
            });
        }
        if target >= nodes {
            return Err(AttackError::TargetOutOfBounds { target, nodes });
        }
        if let Some(&index) = train_indices.iter().find(|&&index| index >= nodes) {
            return Err(AttackError::TrainIndexOutOfBounds { index, nodes });
        }
        if let Some((row, col, _)) = adjacency.entries().find(|(_, _, value)| !value.is_finite()) {
            return Err(AttackError::Matrix {
                input: "adjacency",
                error: MatrixError::NonFinite { row, col },
            });
        }
        if let Some((row, col)) = features.find_non_finite() {
            return Err(AttackError::Matrix {
                input: "features",
                error: MatrixError::NonFinite { row, col },
            });
        }
        Ok(())
    }

    fn check_budget(&self, n_perturbations: usize) -> Result<()> {
        let available = self.node_count.get() - 1;
        let limited = matches!(self.flip_policy, FlipPolicy::SkipFlipped) || available == 0;
        if limited && n_perturbations > available {
            return Err(AttackError::BudgetExceedsCandidates {
                requested: n_perturbations,
                available,
            });
        }
        Ok(())
    }
}
