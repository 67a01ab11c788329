//! Compressed sparse row storage for adjacency matrices.
//!
//! [`CsrMatrix`] is the interchange format for graphs entering and leaving an
//! attack. Only non-zero entries are stored and column indices are sorted
//! within each row, so lookups are a binary search.

use crate::{error::MatrixError, matrix::DenseMatrix};

/// A square or rectangular sparse matrix in CSR layout.
///
/// # Examples
/// ```
/// use gradflip_core::CsrMatrix;
///
/// let ring = CsrMatrix::from_undirected_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])?;
/// assert_eq!(ring.nnz(), 8);
/// assert_eq!(ring.get(0, 3), 1.0);
/// assert_eq!(ring.get(0, 2), 0.0);
/// # Ok::<(), gradflip_core::MatrixError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    row_offsets: Vec<usize>,
    col_indices: Vec<usize>,
    values: Vec<f32>,
}

impl CsrMatrix {
    /// Creates an empty `rows x cols` matrix.
    #[must_use]
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_offsets: vec![0; rows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Compresses a dense matrix, dropping exact zeros.
    #[must_use]
    pub fn from_dense(dense: &DenseMatrix) -> Self {
        let mut row_offsets = Vec::with_capacity(dense.rows() + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);
        for row in dense.iter_rows() {
            for (col, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    col_indices.push(col);
                    values.push(value);
                }
            }
            row_offsets.push(col_indices.len());
        }
        // Zero-column inputs yield no rows from `iter_rows`.
        row_offsets.resize(dense.rows() + 1, col_indices.len());
        Self {
            rows: dense.rows(),
            cols: dense.cols(),
            row_offsets,
            col_indices,
            values,
        }
    }

    /// Builds a symmetric unweighted adjacency matrix from an edge list.
    ///
    /// Each `(u, v)` pair sets both `A[u][v]` and `A[v][u]` to `1`. Duplicate
    /// edges collapse.
    ///
    /// # Errors
    /// Returns [`MatrixError::OutOfBounds`] when an endpoint is `>= nodes`.
    pub fn from_undirected_edges(
        nodes: usize,
        edges: &[(usize, usize)],
    ) -> Result<Self, MatrixError> {
        let mut dense = DenseMatrix::zeros(nodes, nodes);
        for &(u, v) in edges {
            dense.set(u, v, 1.0)?;
            dense.set(v, u, 1.0)?;
        }
        Ok(Self::from_dense(&dense))
    }

    /// Expands into a dense matrix.
    #[must_use]
    pub fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.rows, self.cols);
        for (row, col, value) in self.entries() {
            if let Some(cell) = dense.get_mut(row, col) {
                *cell = value;
            }
        }
        dense
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns the stored columns and values of `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> (&[usize], &[f32]) {
        let (Some(&start), Some(&end)) = (self.row_offsets.get(row), self.row_offsets.get(row + 1))
        else {
            return (&[], &[]);
        };
        (
            self.col_indices.get(start..end).unwrap_or_default(),
            self.values.get(start..end).unwrap_or_default(),
        )
    }

    /// Returns the value at (`row`, `col`); absent entries read as zero.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        let (cols, values) = self.row(row);
        cols.binary_search(&col)
            .ok()
            .and_then(|index| values.get(index).copied())
            .unwrap_or(0.0)
    }

    /// Iterates over stored entries as `(row, col, value)` in row-major order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.rows).flat_map(move |row| {
            let (cols, values) = self.row(row);
            cols.iter()
                .zip(values)
                .map(move |(&col, &value)| (row, col, value))
        })
    }

    /// Lists the undirected edges `(u, v)` with `u < v`.
    #[must_use]
    pub fn upper_edges(&self) -> Vec<(usize, usize)> {
        self.entries()
            .filter(|&(row, col, _)| row < col)
            .map(|(row, col, _)| (row, col))
            .collect()
    }

    /// Counts the cells whose values differ between `self` and `other`.
    ///
    /// Shapes are compared as well; a shape mismatch counts every cell of the
    /// larger matrix.
    #[must_use]
    pub fn diff_count(&self, other: &Self) -> usize {
        if self.rows != other.rows || self.cols != other.cols {
            return self.rows.max(other.rows) * self.cols.max(other.cols);
        }
        (0..self.rows)
            .map(|row| {
                let (left_cols, _) = self.row(row);
                let (right_cols, _) = other.row(row);
                let mut columns: Vec<usize> =
                    left_cols.iter().chain(right_cols).copied().collect();
                columns.sort_unstable();
                columns.dedup();
                columns
                    .into_iter()
                    .filter(|&col| self.get(row, col) != other.get(row, col))
                    .count()
            })
            .sum()
    }
}
