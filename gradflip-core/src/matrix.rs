//! Row-major dense `f32` matrices.
//!
//! [`DenseMatrix`] is the differentiable working representation used by the
//! attack loop and the surrogate model. Storage is a single contiguous buffer
//! so rows can be borrowed as slices.

use crate::error::MatrixError;

/// A row-major dense matrix of `f32` values.
///
/// # Examples
/// ```
/// use gradflip_core::DenseMatrix;
///
/// let m = DenseMatrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0])?;
/// assert_eq!(m.get(1, 0), Some(3.0));
/// assert_eq!(m.row(0), Some(&[1.0, 2.0][..]));
/// # Ok::<(), gradflip_core::MatrixError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    /// Creates a `rows x cols` matrix filled with zeros.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates an `n x n` identity matrix.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        let mut matrix = Self::zeros(n, n);
        for i in 0..n {
            matrix.data[i * n + i] = 1.0;
        }
        matrix
    }

    /// Wraps row-major `data` as a `rows x cols` matrix.
    ///
    /// # Errors
    /// Returns [`MatrixError::StorageLength`] when `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, MatrixError> {
        let expected = rows * cols;
        if data.len() != expected {
            return Err(MatrixError::StorageLength {
                rows,
                cols,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Builds a matrix from nested rows.
    ///
    /// # Errors
    /// Returns [`MatrixError::RaggedRow`] for the first row whose length
    /// differs from the first row's.
    ///
    /// # Examples
    /// ```
    /// use gradflip_core::DenseMatrix;
    ///
    /// let m = DenseMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 0.0]])?;
    /// assert_eq!((m.rows(), m.cols()), (2, 2));
    /// # Ok::<(), gradflip_core::MatrixError>(())
    /// ```
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, ragged)) = rows
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != cols)
        {
            return Err(MatrixError::RaggedRow {
                row,
                expected: cols,
                actual: ragged.len(),
            });
        }
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        Self::from_vec(rows.len(), cols, data)
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

    /// Whether the matrix has as many rows as columns.
    #[must_use]
    pub const fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Returns the row-major backing storage.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the entry at (`row`, `col`), or `None` when out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Returns a mutable reference to the entry at (`row`, `col`).
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get_mut(row * self.cols + col)
    }

    /// Overwrites the entry at (`row`, `col`).
    ///
    /// # Errors
    /// Returns [`MatrixError::OutOfBounds`] when the coordinate is invalid.
    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<(), MatrixError> {
        let (rows, cols) = (self.rows, self.cols);
        let cell = self.get_mut(row, col).ok_or(MatrixError::OutOfBounds {
            row,
            col,
            rows,
            cols,
        })?;
        *cell = value;
        Ok(())
    }

    /// Borrows row `row`.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.data.get(start..start + self.cols)
    }

    /// Mutably borrows row `row`.
    pub fn row_mut(&mut self, row: usize) -> Option<&mut [f32]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.data.get_mut(start..start + self.cols)
    }

    /// Iterates over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // `max(1)` keeps `chunks_exact` valid for zero-column matrices.
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Computes `self * rhs`.
    ///
    /// # Errors
    /// Returns [`MatrixError::ProductMismatch`] when `self.cols != rhs.rows`.
    pub fn matmul(&self, rhs: &Self) -> Result<Self, MatrixError> {
        if self.cols != rhs.rows {
            return Err(MatrixError::ProductMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: rhs.rows,
                right_cols: rhs.cols,
            });
        }
        let mut out = Self::zeros(self.rows, rhs.cols);
        for (lhs_row, out_row) in self
            .iter_rows()
            .zip(out.data.chunks_exact_mut(rhs.cols.max(1)))
        {
            for (&scale, rhs_row) in lhs_row.iter().zip(rhs.iter_rows()) {
                if scale == 0.0 {
                    continue;
                }
                for (acc, &value) in out_row.iter_mut().zip(rhs_row) {
                    *acc += scale * value;
                }
            }
        }
        Ok(out)
    }

    /// Computes `self * rhs^T` without materialising the transpose.
    ///
    /// # Errors
    /// Returns [`MatrixError::ProductMismatch`] when `self.cols != rhs.cols`.
    pub fn matmul_transpose(&self, rhs: &Self) -> Result<Self, MatrixError> {
        if self.cols != rhs.cols {
            return Err(MatrixError::ProductMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: rhs.cols,
                right_cols: rhs.rows,
            });
        }
        let mut out = Self::zeros(self.rows, rhs.rows);
        for (lhs_row, out_row) in self
            .iter_rows()
            .zip(out.data.chunks_exact_mut(rhs.rows.max(1)))
        {
            for (acc, rhs_row) in out_row.iter_mut().zip(rhs.iter_rows()) {
                *acc = lhs_row.iter().zip(rhs_row).map(|(a, b)| a * b).sum();
            }
        }
        Ok(out)
    }

    /// Returns the first non-finite coordinate, if any.
    #[must_use]
    pub fn find_non_finite(&self) -> Option<(usize, usize)> {
        self.data
            .iter()
            .position(|value| !value.is_finite())
            .map(|index| (index / self.cols.max(1), index % self.cols.max(1)))
    }

    /// Fails unless the matrix is square.
    ///
    /// # Errors
    /// Returns [`MatrixError::NotSquare`] for rectangular matrices.
    pub fn ensure_square(&self) -> Result<(), MatrixError> {
        if self.is_square() {
            Ok(())
        } else {
            Err(MatrixError::NotSquare {
                rows: self.rows,
                cols: self.cols,
            })
        }
    }
}
