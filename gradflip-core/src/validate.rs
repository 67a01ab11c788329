//! Structural checks for perturbed adjacency matrices.

use crate::{error::AdjacencyViolation, sparse::CsrMatrix};

/// Checks that `adjacency` describes a simple undirected unweighted graph.
///
/// The matrix must be square and symmetric, every stored entry must equal
/// `1`, and the diagonal must be empty. The first violation found in
/// row-major order is reported. A graph with no edges is valid.
///
/// # Errors
/// Returns the first [`AdjacencyViolation`] encountered.
///
/// # Examples
/// ```
/// use gradflip_core::{AdjacencyViolation, CsrMatrix, validate_adjacency};
///
/// let ring = CsrMatrix::from_undirected_edges(3, &[(0, 1), (1, 2), (2, 0)])?;
/// assert!(validate_adjacency(&ring).is_ok());
///
/// let looped = CsrMatrix::from_undirected_edges(2, &[(1, 1)])?;
/// assert_eq!(
///     validate_adjacency(&looped),
///     Err(AdjacencyViolation::SelfLoop { node: 1 }),
/// );
/// # Ok::<(), gradflip_core::MatrixError>(())
/// ```
pub fn validate_adjacency(adjacency: &CsrMatrix) -> Result<(), AdjacencyViolation> {
    if adjacency.rows() != adjacency.cols() {
        return Err(AdjacencyViolation::NotSquare {
            rows: adjacency.rows(),
            cols: adjacency.cols(),
        });
    }
    for (row, col, value) in adjacency.entries() {
        if row == col {
            return Err(AdjacencyViolation::SelfLoop { node: row });
        }
        if value != 1.0 {
            return Err(AdjacencyViolation::NonBinary { row, col, value });
        }
        if adjacency.get(col, row) != value {
            return Err(AdjacencyViolation::Asymmetric { row, col });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::DenseMatrix;
    use rstest::rstest;

    fn csr(rows: &[Vec<f32>]) -> CsrMatrix {
        CsrMatrix::from_dense(&DenseMatrix::from_rows(rows).expect("rectangular rows"))
    }

    #[test]
    fn accepts_empty_graph() {
        assert_eq!(validate_adjacency(&CsrMatrix::empty(3, 3)), Ok(()));
    }

    #[rstest]
    #[case::asymmetric(
        vec![vec![0.0, 1.0], vec![0.0, 0.0]],
        AdjacencyViolation::Asymmetric { row: 0, col: 1 },
    )]
    #[case::overshoot(
        vec![vec![0.0, 2.0], vec![2.0, 0.0]],
        AdjacencyViolation::NonBinary { row: 0, col: 1, value: 2.0 },
    )]
    #[case::negative(
        vec![vec![0.0, -1.0], vec![-1.0, 0.0]],
        AdjacencyViolation::NonBinary { row: 0, col: 1, value: -1.0 },
    )]
    #[case::self_loop(
        vec![vec![0.0, 0.0], vec![0.0, 1.0]],
        AdjacencyViolation::SelfLoop { node: 1 },
    )]
    fn reports_first_violation(#[case] rows: Vec<Vec<f32>>, #[case] expected: AdjacencyViolation) {
        assert_eq!(validate_adjacency(&csr(&rows)), Err(expected));
    }

    #[test]
    fn rejects_rectangular_matrix() {
        let err = validate_adjacency(&CsrMatrix::empty(2, 3)).expect_err("not square");
        assert_eq!(err, AdjacencyViolation::NotSquare { rows: 2, cols: 3 });
    }
}
