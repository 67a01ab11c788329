//! Linearised two-layer GCN surrogate with analytic relaxation gradients.
//!
//! The surrogate computes `log_softmax(N · N · X · W)` where `N` is the
//! normalised adjacency and `W` is the product of the two layer weights.
//! Without a non-linearity or bias the two layers collapse into a single
//! weight matrix, which lets the gradient with respect to the target-row
//! relaxation be written in closed form.

use std::sync::Arc;

use tracing::{instrument, trace};

use crate::{
    error::{MatrixError, OracleError},
    matrix::DenseMatrix,
    normalize::{inverse_sqrt_degrees, normalize_adjacency},
    oracle::{GradientOracle, GradientQuery},
};

/// Two-layer GCN without activation or bias.
///
/// # Examples
/// ```
/// use gradflip_core::{CsrMatrix, DenseMatrix, LinearGcn};
///
/// let weights = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0]])?;
/// let model = LinearGcn::new(weights)?;
/// let features = DenseMatrix::identity(2);
/// let adjacency = CsrMatrix::from_undirected_edges(2, &[(0, 1)])?.to_dense();
/// let predictions = model.predict(&features, &adjacency)?;
/// assert_eq!(predictions.len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct LinearGcn {
    name: Arc<str>,
    weights: DenseMatrix,
}

impl LinearGcn {
    /// Wraps a collapsed `D x C` weight matrix.
    ///
    /// # Errors
    /// Returns [`OracleError::DimensionMismatch`] when the matrix has no
    /// classes and [`OracleError::Evaluation`] when a weight is not finite.
    pub fn new(weights: DenseMatrix) -> Result<Self, OracleError> {
        if weights.cols() == 0 {
            return Err(OracleError::DimensionMismatch {
                input: "weights",
                axis: "columns",
                expected: 1,
                actual: 0,
            });
        }
        if let Some((row, col)) = weights.find_non_finite() {
            return Err(OracleError::Evaluation {
                reason: Arc::from(format!("weight ({row}, {col}) is not finite")),
            });
        }
        Ok(Self {
            name: Arc::from("linear-gcn"),
            weights,
        })
    }

    /// Collapses hidden (`D x H`) and output (`H x C`) layer weights.
    ///
    /// # Errors
    /// Returns [`OracleError::DimensionMismatch`] when the layers do not
    /// chain, plus any error from [`Self::new`].
    pub fn from_layers(hidden: &DenseMatrix, output: &DenseMatrix) -> Result<Self, OracleError> {
        let weights = hidden.matmul(output).map_err(|error| match error {
            MatrixError::ProductMismatch {
                left_cols,
                right_rows,
                ..
            } => OracleError::DimensionMismatch {
                input: "output layer",
                axis: "rows",
                expected: left_cols,
                actual: right_rows,
            },
            other => OracleError::Evaluation {
                reason: Arc::from(other.to_string()),
            },
        })?;
        Self::new(weights)
    }

    /// Overrides the name reported through [`GradientOracle::name`].
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Feature dimension expected by the model.
    #[must_use]
    pub const fn input_dim(&self) -> usize {
        self.weights.rows()
    }

    /// Number of classes scored by the model.
    #[must_use]
    pub const fn classes(&self) -> usize {
        self.weights.cols()
    }

    /// Runs the forward pass against an already normalised adjacency.
    ///
    /// # Errors
    /// Returns [`OracleError::DimensionMismatch`] when shapes disagree.
    pub fn log_probabilities(
        &self,
        features: &DenseMatrix,
        normalized: &DenseMatrix,
    ) -> Result<DenseMatrix, OracleError> {
        let pass = self.forward(features, normalized)?;
        Ok(log_softmax_rows(&pass.logits))
    }

    /// Normalises `adjacency` and returns the arg-max class of every node.
    ///
    /// # Errors
    /// Returns [`OracleError::DimensionMismatch`] when shapes disagree.
    pub fn predict(
        &self,
        features: &DenseMatrix,
        adjacency: &DenseMatrix,
    ) -> Result<Vec<usize>, OracleError> {
        let normalized = normalize(adjacency)?;
        let log_probs = self.log_probabilities(features, &normalized)?;
        Ok(log_probs.iter_rows().map(first_argmax).collect())
    }

    fn forward(
        &self,
        features: &DenseMatrix,
        normalized: &DenseMatrix,
    ) -> Result<ForwardPass, OracleError> {
        if features.cols() != self.input_dim() {
            return Err(OracleError::DimensionMismatch {
                input: "features",
                axis: "columns",
                expected: self.input_dim(),
                actual: features.cols(),
            });
        }
        if features.rows() != normalized.rows() {
            return Err(OracleError::DimensionMismatch {
                input: "features",
                axis: "rows",
                expected: normalized.rows(),
                actual: features.rows(),
            });
        }
        let projected = features.matmul(&self.weights).map_err(shape_error)?;
        let propagated = normalized.matmul(&projected).map_err(shape_error)?;
        let logits = normalized.matmul(&propagated).map_err(shape_error)?;
        Ok(ForwardPass {
            projected,
            propagated,
            logits,
        })
    }

    fn check_labels(
        &self,
        labels: &[usize],
        train_indices: &[usize],
        nodes: usize,
    ) -> Result<(), OracleError> {
        if labels.len() != nodes {
            return Err(OracleError::DimensionMismatch {
                input: "labels",
                axis: "entries",
                expected: nodes,
                actual: labels.len(),
            });
        }
        if train_indices.is_empty() {
            return Err(OracleError::EmptyTrainingSet);
        }
        for &node in train_indices {
            let label = *labels
                .get(node)
                .ok_or(OracleError::NodeOutOfBounds { index: node, nodes })?;
            if label >= self.classes() {
                return Err(OracleError::LabelOutOfRange {
                    node,
                    label,
                    classes: self.classes(),
                });
            }
        }
        Ok(())
    }
}

struct ForwardPass {
    /// `X · W`
    projected: DenseMatrix,
    /// `N · X · W`
    propagated: DenseMatrix,
    /// `N · N · X · W`
    logits: DenseMatrix,
}

/// Mean negative log-likelihood of `labels` over `train_indices`.
///
/// Indices listed more than once contribute once per occurrence.
///
/// # Errors
/// Returns [`OracleError::EmptyTrainingSet`] for an empty index set,
/// [`OracleError::NodeOutOfBounds`] or [`OracleError::LabelOutOfRange`] for
/// invalid indices, and [`OracleError::NonFiniteLoss`] when the loss is NaN
/// or infinite.
///
/// # Examples
/// ```
/// use gradflip_core::{DenseMatrix, nll_loss};
///
/// let log_probs = DenseMatrix::from_rows(&[vec![-0.5, -1.0], vec![-2.0, -0.1]])?;
/// let loss = nll_loss(&log_probs, &[0, 1], &[0, 1])?;
/// assert!((loss - 0.3).abs() < 1e-6);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn nll_loss(
    log_probs: &DenseMatrix,
    labels: &[usize],
    train_indices: &[usize],
) -> Result<f32, OracleError> {
    if train_indices.is_empty() {
        return Err(OracleError::EmptyTrainingSet);
    }
    let nodes = log_probs.rows();
    let mut total = 0.0_f32;
    for &node in train_indices {
        let label = *labels
            .get(node)
            .ok_or(OracleError::NodeOutOfBounds { index: node, nodes })?;
        let value = log_probs
            .get(node, label)
            .ok_or(OracleError::LabelOutOfRange {
                node,
                label,
                classes: log_probs.cols(),
            })?;
        total -= value;
    }
    let loss = total / count_as_f32(train_indices.len());
    if loss.is_finite() {
        Ok(loss)
    } else {
        Err(OracleError::NonFiniteLoss)
    }
}

impl GradientOracle for LinearGcn {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "surrogate.gradient",
        err,
        skip(self, query),
        fields(nodes = query.nodes(), target = query.target),
    )]
    fn relaxation_gradient(&self, query: &GradientQuery<'_>) -> Result<Vec<f32>, OracleError> {
        let nodes = query.nodes();
        let target = query.target;
        self.check_labels(query.labels, query.train_indices, nodes)?;

        let perturbed = query.perturbed_adjacency()?;
        let normalized = normalize(&perturbed)?;
        let scale = inverse_sqrt_degrees(&perturbed).map_err(shape_error)?;
        let pass = self.forward(query.features, &normalized)?;

        // dL/dZ for the mean NLL of log_softmax(Z).
        let probabilities = softmax_rows(&pass.logits);
        let mut upstream = DenseMatrix::zeros(nodes, self.classes());
        let weight = count_as_f32(query.train_indices.len()).recip();
        for &node in query.train_indices {
            let label = query.labels.get(node).copied().unwrap_or_default();
            let (Some(probs), Some(row)) = (probabilities.row(node), upstream.row_mut(node)) else {
                continue;
            };
            for (class, (cell, &p)) in row.iter_mut().zip(probs).enumerate() {
                let indicator = if class == label { 1.0 } else { 0.0 };
                *cell += (p - indicator) * weight;
            }
        }

        // With Z = N·Q and Q = N·S, dL/dN = G·Qᵀ + Nᵀ·G·Sᵀ. Only row `target`
        // and column `target` of that matrix are needed.
        let g_qt = upstream
            .matmul_transpose(&pass.propagated)
            .map_err(shape_error)?;
        let g_st = upstream
            .matmul_transpose(&pass.projected)
            .map_err(shape_error)?;
        let mut grad_n_row = g_qt.row(target).map(<[f32]>::to_vec).unwrap_or_default();
        let mut grad_n_col: Vec<f32> = (0..nodes)
            .map(|j| g_qt.get(j, target).unwrap_or_default())
            .collect();
        for (n_row, g_row) in normalized.iter_rows().zip(g_st.iter_rows()) {
            let n_it = n_row.get(target).copied().unwrap_or_default();
            if n_it != 0.0 {
                for (acc, &m) in grad_n_row.iter_mut().zip(g_row) {
                    *acc += n_it * m;
                }
            }
            let m_it = g_row.get(target).copied().unwrap_or_default();
            if m_it != 0.0 {
                for (acc, &n_ij) in grad_n_col.iter_mut().zip(n_row) {
                    *acc += n_ij * m_it;
                }
            }
        }

        // Chain through N_ij = s_i (A'_ij + δ_ij) s_j; only row `target` of A'
        // depends on the relaxation, and d_target sums that row.
        let s_t = scale.get(target).copied().unwrap_or_default();
        let self_loop = |i: usize, j: usize| if i == j { 1.0 } else { 0.0 };
        let hat = |i: usize, j: usize| perturbed.get(i, j).unwrap_or_default() + self_loop(i, j);
        let mut grad_s_t = 0.0_f32;
        for (j, &s_j) in scale.iter().enumerate() {
            let row_term = grad_n_row.get(j).copied().unwrap_or_default() * hat(target, j);
            let col_term = grad_n_col.get(j).copied().unwrap_or_default() * hat(j, target);
            grad_s_t += (row_term + col_term) * s_j;
        }
        let degree_term = grad_s_t * -0.5 * s_t * s_t * s_t;
        trace!(grad_s_t, degree_term, "chained degree gradient");

        Ok(grad_n_row
            .iter()
            .zip(&scale)
            .map(|(&e_tc, &s_c)| e_tc * s_t * s_c + degree_term)
            .collect())
    }
}

fn normalize(adjacency: &DenseMatrix) -> Result<DenseMatrix, OracleError> {
    normalize_adjacency(adjacency).map_err(shape_error)
}

fn shape_error(error: MatrixError) -> OracleError {
    match error {
        MatrixError::NotSquare { rows, cols } => OracleError::DimensionMismatch {
            input: "adjacency",
            axis: "columns",
            expected: rows,
            actual: cols,
        },
        MatrixError::ProductMismatch {
            left_cols,
            right_rows,
            ..
        } => OracleError::DimensionMismatch {
            input: "product",
            axis: "rows",
            expected: left_cols,
            actual: right_rows,
        },
        other => OracleError::Evaluation {
            reason: Arc::from(other.to_string()),
        },
    }
}

fn softmax_rows(logits: &DenseMatrix) -> DenseMatrix {
    let mut out = logits.clone();
    for i in 0..out.rows() {
        let Some(row) = out.row_mut(i) else {
            continue;
        };
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0_f32;
        for value in row.iter_mut() {
            *value = (*value - max).exp();
            sum += *value;
        }
        for value in row.iter_mut() {
            *value /= sum;
        }
    }
    out
}

fn log_softmax_rows(logits: &DenseMatrix) -> DenseMatrix {
    let mut out = logits.clone();
    for i in 0..out.rows() {
        let Some(row) = out.row_mut(i) else {
            continue;
        };
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum = row.iter().map(|value| (value - max).exp()).sum::<f32>().ln() + max;
        for value in row.iter_mut() {
            *value -= log_sum;
        }
    }
    out
}

/// Index of the largest value; the first index wins ties.
fn first_argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best, best_value)
            }
        })
        .0
}

// Training set sizes are far below f32's exact integer range.
fn count_as_f32(count: usize) -> f32 {
    count as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::CsrMatrix;
    use rand::{Rng, SeedableRng, rngs::SmallRng};
    use rstest::{fixture, rstest};

    struct Scenario {
        model: LinearGcn,
        features: DenseMatrix,
        adjacency: DenseMatrix,
        labels: Vec<usize>,
        train: Vec<usize>,
    }

    #[fixture]
    fn scenario() -> Scenario {
        let mut rng = SmallRng::seed_from_u64(11);
        let nodes = 6;
        let dims = 3;
        let classes = 2;
        let features = DenseMatrix::from_vec(
            nodes,
            dims,
            (0..nodes * dims).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        )
        .expect("shape matches");
        let weights = DenseMatrix::from_vec(
            dims,
            classes,
            (0..dims * classes).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        )
        .expect("shape matches");
        let adjacency =
            CsrMatrix::from_undirected_edges(nodes, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (0, 3)])
                .expect("valid edges")
                .to_dense();
        Scenario {
            model: LinearGcn::new(weights).expect("finite weights"),
            features,
            adjacency,
            labels: vec![0, 1, 0, 1, 1, 0],
            train: vec![0, 2, 3, 5],
        }
    }

    fn loss_at(scenario: &Scenario, target: usize, relaxation: &[f32]) -> f32 {
        let query = GradientQuery {
            features: &scenario.features,
            adjacency: &scenario.adjacency,
            relaxation,
            labels: &scenario.labels,
            train_indices: &scenario.train,
            target,
        };
        let perturbed = query.perturbed_adjacency().expect("valid query");
        let normalized = normalize_adjacency(&perturbed).expect("square");
        let log_probs = scenario
            .model
            .log_probabilities(&scenario.features, &normalized)
            .expect("shapes agree");
        nll_loss(&log_probs, &scenario.labels, &scenario.train).expect("finite loss")
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(5)]
    fn analytic_gradient_matches_finite_differences(scenario: Scenario, #[case] target: usize) {
        let nodes = scenario.adjacency.rows();
        let zeros = vec![0.0; nodes];
        let query = GradientQuery {
            features: &scenario.features,
            adjacency: &scenario.adjacency,
            relaxation: &zeros,
            labels: &scenario.labels,
            train_indices: &scenario.train,
            target,
        };
        let analytic = scenario
            .model
            .relaxation_gradient(&query)
            .expect("gradient must evaluate");
        assert_eq!(analytic.len(), nodes);

        let step = 1e-2_f32;
        for (column, &value) in analytic.iter().enumerate() {
            let mut plus = zeros.clone();
            let mut minus = zeros.clone();
            plus[column] = step;
            minus[column] = -step;
            let numeric =
                (loss_at(&scenario, target, &plus) - loss_at(&scenario, target, &minus)) / (2.0 * step);
            assert!(
                (value - numeric).abs() <= 5e-3 + 0.05 * numeric.abs(),
                "column {column}: analytic {value} vs numeric {numeric}",
            );
        }
    }

    #[rstest]
    fn gradient_is_repeatable(scenario: Scenario) {
        let zeros = vec![0.0; scenario.adjacency.rows()];
        let query = GradientQuery {
            features: &scenario.features,
            adjacency: &scenario.adjacency,
            relaxation: &zeros,
            labels: &scenario.labels,
            train_indices: &scenario.train,
            target: 1,
        };
        let first = scenario.model.relaxation_gradient(&query).expect("gradient");
        let second = scenario.model.relaxation_gradient(&query).expect("gradient");
        assert_eq!(first, second);
    }

    #[rstest]
    fn gradient_rejects_empty_training_set(scenario: Scenario) {
        let zeros = vec![0.0; scenario.adjacency.rows()];
        let query = GradientQuery {
            features: &scenario.features,
            adjacency: &scenario.adjacency,
            relaxation: &zeros,
            labels: &scenario.labels,
            train_indices: &[],
            target: 1,
        };
        let err = scenario
            .model
            .relaxation_gradient(&query)
            .expect_err("empty training set must fail");
        assert_eq!(err, OracleError::EmptyTrainingSet);
    }

    #[rstest]
    fn gradient_rejects_out_of_range_labels(scenario: Scenario) {
        let zeros = vec![0.0; scenario.adjacency.rows()];
        let labels = vec![0, 1, 7, 1, 1, 0];
        let query = GradientQuery {
            features: &scenario.features,
            adjacency: &scenario.adjacency,
            relaxation: &zeros,
            labels: &labels,
            train_indices: &scenario.train,
            target: 1,
        };
        let err = scenario
            .model
            .relaxation_gradient(&query)
            .expect_err("label 7 is not a class");
        assert_eq!(
            err,
            OracleError::LabelOutOfRange {
                node: 2,
                label: 7,
                classes: 2,
            }
        );
    }

    #[test]
    fn from_layers_rejects_unchained_shapes() {
        let hidden = DenseMatrix::zeros(3, 4);
        let output = DenseMatrix::zeros(5, 2);
        let err = LinearGcn::from_layers(&hidden, &output).expect_err("4 != 5");
        assert_eq!(
            err,
            OracleError::DimensionMismatch {
                input: "output layer",
                axis: "rows",
                expected: 4,
                actual: 5,
            }
        );
    }

    #[test]
    fn new_rejects_non_finite_weights() {
        let weights =
            DenseMatrix::from_rows(&[vec![1.0, f32::INFINITY]]).expect("rectangular rows");
        assert!(matches!(
            LinearGcn::new(weights),
            Err(OracleError::Evaluation { .. })
        ));
    }

    #[test]
    fn log_probabilities_rows_sum_to_one() {
        let model = LinearGcn::new(
            DenseMatrix::from_rows(&[vec![1.0, -1.0, 0.5], vec![0.0, 2.0, -0.5]])
                .expect("rectangular rows"),
        )
        .expect("finite weights");
        let features = DenseMatrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .expect("rectangular rows");
        let adjacency = CsrMatrix::from_undirected_edges(3, &[(0, 1), (1, 2)])
            .expect("valid edges")
            .to_dense();
        let normalized = normalize_adjacency(&adjacency).expect("square");
        let log_probs = model
            .log_probabilities(&features, &normalized)
            .expect("shapes agree");
        for row in log_probs.iter_rows() {
            let total: f32 = row.iter().map(|value| value.exp()).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[rstest]
    #[case(&[1.0, 3.0, 3.0], 1)]
    #[case(&[-1.0, -1.0], 0)]
    #[case(&[0.5], 0)]
    fn first_argmax_prefers_lowest_index(#[case] values: &[f32], #[case] expected: usize) {
        assert_eq!(first_argmax(values), expected);
    }
}
