//! Symmetric GCN normalisation of adjacency matrices.

use crate::{error::MatrixError, matrix::DenseMatrix};

/// Inverse square roots of the row sums of `A + I`.
///
/// Rows whose sum is not strictly positive map to zero rather than infinity.
///
/// # Errors
/// Returns [`MatrixError::NotSquare`] for rectangular input.
pub fn inverse_sqrt_degrees(adjacency: &DenseMatrix) -> Result<Vec<f32>, MatrixError> {
    adjacency.ensure_square()?;
    Ok(adjacency
        .iter_rows()
        .map(|row| {
            let degree: f32 = row.iter().sum::<f32>() + 1.0;
            if degree > 0.0 {
                degree.sqrt().recip()
            } else {
                0.0
            }
        })
        .collect())
}

/// Computes `D^-1/2 (A + I) D^-1/2`, where `D` holds the row sums of `A + I`.
///
/// Row sums are used even when `A` is asymmetric, which is the case while the
/// attack relaxes a single row.
///
/// # Errors
/// Returns [`MatrixError::NotSquare`] for rectangular input.
///
/// # Examples
/// ```
/// use gradflip_core::{DenseMatrix, normalize_adjacency};
///
/// let pair = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]])?;
/// let norm = normalize_adjacency(&pair)?;
/// assert!((norm.get(0, 1).unwrap_or_default() - 0.5).abs() < 1e-6);
/// assert!((norm.get(0, 0).unwrap_or_default() - 0.5).abs() < 1e-6);
/// # Ok::<(), gradflip_core::MatrixError>(())
/// ```
pub fn normalize_adjacency(adjacency: &DenseMatrix) -> Result<DenseMatrix, MatrixError> {
    let scale = inverse_sqrt_degrees(adjacency)?;
    let n = adjacency.rows();
    let mut normalised = DenseMatrix::zeros(n, n);
    for (i, (row, &s_i)) in adjacency.iter_rows().zip(&scale).enumerate() {
        let Some(out) = normalised.row_mut(i) else {
            continue;
        };
        for (j, ((cell, &a_ij), &s_j)) in out.iter_mut().zip(row).zip(&scale).enumerate() {
            let self_loop = if i == j { 1.0 } else { 0.0 };
            *cell = s_i * (a_ij + self_loop) * s_j;
        }
    }
    Ok(normalised)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn isolated_node_keeps_unit_self_weight() {
        let norm = normalize_adjacency(&DenseMatrix::zeros(1, 1)).expect("square");
        assert!((norm.get(0, 0).unwrap_or_default() - 1.0).abs() < EPS);
    }

    #[test]
    fn path_graph_matches_hand_computed_weights() {
        let path = DenseMatrix::from_rows(&[
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
        ])
        .expect("rectangular rows");
        let norm = normalize_adjacency(&path).expect("square");
        let d0 = 2.0_f32;
        let d1 = 3.0_f32;
        let expected_01 = 1.0 / (d0 * d1).sqrt();
        assert!((norm.get(0, 1).unwrap_or_default() - expected_01).abs() < EPS);
        assert!((norm.get(1, 1).unwrap_or_default() - 1.0 / d1).abs() < EPS);
        assert_eq!(norm.get(0, 2), Some(0.0));
    }

    #[test]
    fn non_positive_degree_maps_to_zero_scale() {
        let odd = DenseMatrix::from_rows(&[vec![-1.0, 0.0], vec![0.0, 0.0]]).expect("rows");
        let scale = inverse_sqrt_degrees(&odd).expect("square");
        assert_eq!(scale.first().copied(), Some(0.0));
    }

    #[test]
    fn rejects_rectangular_input() {
        let err = normalize_adjacency(&DenseMatrix::zeros(2, 3)).expect_err("not square");
        assert_eq!(err, MatrixError::NotSquare { rows: 2, cols: 3 });
    }
}
