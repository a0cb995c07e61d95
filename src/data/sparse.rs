//! Sparse per-example feature vectors as they arrive in a request.

use serde::{Deserialize, Serialize};

/// One example's features as parallel `ids` / `scores` sequences.
///
/// Zero-valued features are omitted. The two sequences are expected to have
/// equal length; this is not enforced on construction because the value may
/// come straight off the wire, and is checked by the materializer instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseFeatureVector {
    /// Feature indices (column positions in the dense layout).
    #[serde(default)]
    pub ids: Vec<u64>,
    /// Feature values, aligned with `ids`.
    #[serde(default)]
    pub scores: Vec<f32>,
}

impl SparseFeatureVector {
    /// Create a vector from parallel id and score sequences.
    pub fn new(ids: Vec<u64>, scores: Vec<f32>) -> Self {
        Self { ids, scores }
    }

    /// Build a vector from `(id, score)` pairs, keeping insertion order.
    pub fn from_pairs<I: IntoIterator<Item = (u64, f32)>>(pairs: I) -> Self {
        let (ids, scores) = pairs.into_iter().unzip();
        Self { ids, scores }
    }

    /// Whether `ids` and `scores` have the same length.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.ids.len() == self.scores.len()
    }

    /// Iterate `(id, score)` pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (u64, f32)> + '_ {
        self.ids.iter().copied().zip(self.scores.iter().copied())
    }

    /// Largest feature id, or `None` if the vector holds no ids.
    pub fn max_id(&self) -> Option<u64> {
        self.ids.iter().copied().max()
    }
}

/// Ordered batch of sparse vectors, one per example.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureBatch {
    vectors: Vec<SparseFeatureVector>,
}

impl FeatureBatch {
    pub fn new(vectors: Vec<SparseFeatureVector>) -> Self {
        Self { vectors }
    }

    /// Number of examples in the batch.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[SparseFeatureVector] {
        &self.vectors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SparseFeatureVector> {
        self.vectors.iter()
    }

    /// Largest feature id across the whole batch.
    pub fn max_id(&self) -> Option<u64> {
        self.vectors.iter().filter_map(SparseFeatureVector::max_id).max()
    }
}

impl From<Vec<SparseFeatureVector>> for FeatureBatch {
    fn from(vectors: Vec<SparseFeatureVector>) -> Self {
        Self::new(vectors)
    }
}

impl FromIterator<SparseFeatureVector> for FeatureBatch {
    fn from_iter<I: IntoIterator<Item = SparseFeatureVector>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FeatureBatch {
    type Item = &'a SparseFeatureVector;
    type IntoIter = std::slice::Iter<'a, SparseFeatureVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.vectors.iter()
    }
}
