//! Request feature data: sparse input vectors and their dense materialization.
//!
//! - [`SparseFeatureVector`] / [`FeatureBatch`]: request-scoped sparse input
//! - [`DenseMatrix`]: row-major matrix handed to the engine
//! - [`Materializer`]: sparse to dense conversion with validation

mod dense;
mod sparse;

pub use dense::{materialize, DenseMatrix, Materializer, DEFAULT_MAX_DENSE_CELLS};
pub use sparse::{FeatureBatch, SparseFeatureVector};
