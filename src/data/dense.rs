//! Dense row-major feature matrices and sparse-to-dense materialization.
//!
//! The engine consumes one contiguous `&[f32]` per example, all of the same
//! width. [`Materializer`] builds that layout from a [`FeatureBatch`]:
//!
//! - width = largest id in the batch + 1 (1 if the batch has no ids at all)
//! - unspecified cells are 0.0
//! - a repeated id within one vector keeps the last value
//!
//! Validation runs over the whole batch before anything is allocated, so a
//! malformed vector anywhere yields an error and never a partial matrix.
//!
//! # Example
//!
//! ```
//! use boosters_serving::data::{FeatureBatch, Materializer, SparseFeatureVector};
//!
//! let batch = FeatureBatch::new(vec![SparseFeatureVector::new(vec![2, 0], vec![5.0, 1.0])]);
//! let matrix = Materializer::default().materialize(&batch).unwrap();
//! assert_eq!(matrix.row(0), &[1.0, 0.0, 5.0]);
//! ```

use ndarray::{ArrayView2, ArrayViewMut2};

use super::sparse::FeatureBatch;
use crate::error::{Result, ServingError};
use crate::utils::try_zeroed;

/// Default cap on `rows * cols` for a single materialized batch (256M cells, 1 GiB of f32).
pub const DEFAULT_MAX_DENSE_CELLS: usize = 1 << 28;

// =============================================================================
// DenseMatrix
// =============================================================================

/// Row-major `f32` matrix built fresh for one request.
///
/// Backed by one contiguous buffer so rows can be handed to the engine as
/// plain slices.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    data: Vec<f32>,
    n_rows: usize,
    n_cols: usize,
}

impl DenseMatrix {
    /// Number of rows (batch size).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns (max id + 1).
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Borrow as an ndarray view `[n_rows, n_cols]`.
    pub fn view(&self) -> Result<ArrayView2<'_, f32>> {
        ArrayView2::from_shape((self.n_rows, self.n_cols), &self.data)
            .map_err(|e| ServingError::internal(format!("dense matrix shape: {e}")))
    }

    /// Contiguous backing buffer in row-major order.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Contiguous slice for row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= n_rows()`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// One slice per row, in row order: the base addresses for a batched engine call.
    pub fn row_slices(&self) -> Vec<&[f32]> {
        self.data.chunks_exact(self.n_cols).collect()
    }

    /// Consume into the backing buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

// =============================================================================
// Materializer
// =============================================================================

/// Converts sparse feature batches into [`DenseMatrix`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Materializer {
    max_cells: usize,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DENSE_CELLS)
    }
}

impl Materializer {
    /// Create a materializer refusing matrices with more than `max_cells` cells.
    pub fn new(max_cells: usize) -> Self {
        Self { max_cells }
    }

    /// Configured cell cap.
    #[inline]
    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    /// Build the dense matrix for `batch`.
    ///
    /// # Errors
    ///
    /// - [`ServingError::InvalidArgument`] if any vector has mismatched `ids` /
    ///   `scores` lengths.
    /// - [`ServingError::Internal`] if the matrix would exceed the cell cap or
    ///   cannot be allocated.
    pub fn materialize(&self, batch: &FeatureBatch) -> Result<DenseMatrix> {
        for (i, vector) in batch.iter().enumerate() {
            if !vector.is_consistent() {
                return Err(ServingError::invalid(format!(
                    "sizes of ids ({}) and scores ({}) must be the same (example {i})",
                    vector.ids.len(),
                    vector.scores.len()
                )));
            }
        }

        let n_rows = batch.batch_size();
        let n_cols = match batch.max_id() {
            None => 1,
            Some(max_id) => usize::try_from(max_id)
                .ok()
                .and_then(|m| m.checked_add(1))
                .ok_or_else(|| {
                    ServingError::internal(format!("feature id {max_id} exceeds addressable width"))
                })?,
        };

        let n_cells = n_rows
            .checked_mul(n_cols)
            .filter(|&cells| cells <= self.max_cells)
            .ok_or_else(|| {
                ServingError::internal(format!(
                    "dense matrix of {n_rows} x {n_cols} exceeds the limit of {} cells",
                    self.max_cells
                ))
            })?;

        let mut data = try_zeroed::<f32>(n_cells).map_err(|e| {
            ServingError::internal(format!("cannot allocate {n_rows} x {n_cols} matrix: {e}"))
        })?;
        {
            let mut cells = ArrayViewMut2::from_shape((n_rows, n_cols), &mut data)
                .map_err(|e| ServingError::internal(format!("dense matrix shape: {e}")))?;
            for (mut row, vector) in cells.rows_mut().into_iter().zip(batch.iter()) {
                // Later pairs overwrite earlier ones for repeated ids.
                for (id, score) in vector.pairs() {
                    row[id as usize] = score;
                }
            }
        }

        Ok(DenseMatrix {
            data,
            n_rows,
            n_cols,
        })
    }
}

/// Materialize with the default cell cap.
pub fn materialize(batch: &FeatureBatch) -> Result<DenseMatrix> {
    Materializer::default().materialize(batch)
}

// =============================================================================
// Tests
// =============================================================================
