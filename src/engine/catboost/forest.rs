//! Evaluation layout for symmetric (oblivious) tree ensembles.

use std::collections::HashMap;

use super::json::{CatBoostJsonModel, NanValueTreatment, FLOAT_FEATURE_SPLIT};
use crate::engine::EngineError;
use crate::utils::Parallelism;

/// Largest supported tree depth (CatBoost's own limit).
pub const MAX_DEPTH: usize = 16;

/// Default number of rows scored together.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Errors raised while converting a JSON export into an [`ObliviousForest`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatBoostJsonError {
    #[error("tree {tree}: unsupported split type `{split_type}`")]
    UnsupportedSplit { tree: usize, split_type: String },
    #[error("tree {tree}: split {split} is missing `{field}`")]
    IncompleteSplit {
        tree: usize,
        split: usize,
        field: &'static str,
    },
    #[error("tree {tree}: split references unknown float feature {feature}")]
    UnknownFeature { tree: usize, feature: u32 },
    #[error("tree {tree}: depth {depth} exceeds the supported maximum of {}", MAX_DEPTH)]
    TooDeep { tree: usize, depth: usize },
    #[error("tree {tree}: {actual} leaf values do not fit 2^{depth} leaves")]
    LeafCount {
        tree: usize,
        depth: usize,
        actual: usize,
    },
    #[error("tree {tree}: output dimension {actual} differs from {expected}")]
    DimensionMismatch {
        tree: usize,
        actual: usize,
        expected: usize,
    },
    #[error("bias has {actual} values for output dimension {expected}")]
    BiasMismatch { actual: usize, expected: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Split {
    column: usize,
    border: f32,
    nan_is_greater: bool,
}

impl Split {
    #[inline]
    fn goes_right(&self, value: f32) -> bool {
        if value.is_nan() {
            self.nan_is_greater
        } else {
            value > self.border
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ObliviousTree {
    splits: Box<[Split]>,
    leaf_values: Box<[f64]>,
}

impl ObliviousTree {
    /// Level `d` contributes bit `d` of the leaf index.
    #[inline]
    fn leaf_index(&self, row: &[f32]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0usize, |idx, (depth, split)| {
                idx | (usize::from(split.goes_right(row[split.column])) << depth)
            })
    }
}

/// Symmetric tree ensemble ready for batched scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ObliviousForest {
    trees: Vec<ObliviousTree>,
    n_features: usize,
    dimension: usize,
    scale: f64,
    bias: Vec<f64>,
}

impl ObliviousForest {
    /// Convert and validate a parsed JSON export.
    pub fn from_json(model: &CatBoostJsonModel) -> Result<Self, CatBoostJsonError> {
        let features: HashMap<u32, (usize, NanValueTreatment)> = model
            .features_info
            .float_features
            .iter()
            .map(|f| {
                (
                    f.feature_index,
                    (f.flat_feature_index as usize, f.nan_value_treatment),
                )
            })
            .collect();

        let (scale, bias) = match &model.scale_and_bias {
            Some(sb) => (sb.0, sb.1.to_vec()),
            None => (1.0, vec![0.0]),
        };

        let mut dimension: Option<usize> = None;
        let mut max_column: Option<usize> = None;
        let mut trees = Vec::with_capacity(model.oblivious_trees.len());

        for (tree_idx, tree) in model.oblivious_trees.iter().enumerate() {
            let depth = tree.splits.len();
            if depth > MAX_DEPTH {
                return Err(CatBoostJsonError::TooDeep {
                    tree: tree_idx,
                    depth,
                });
            }

            let mut splits = Vec::with_capacity(depth);
            for (split_idx, split) in tree.splits.iter().enumerate() {
                if let Some(kind) = split.split_type.as_deref() {
                    if kind != FLOAT_FEATURE_SPLIT {
                        return Err(CatBoostJsonError::UnsupportedSplit {
                            tree: tree_idx,
                            split_type: kind.to_owned(),
                        });
                    }
                }
                let feature = split.float_feature_index.ok_or(CatBoostJsonError::IncompleteSplit {
                    tree: tree_idx,
                    split: split_idx,
                    field: "float_feature_index",
                })?;
                let border = split.border.ok_or(CatBoostJsonError::IncompleteSplit {
                    tree: tree_idx,
                    split: split_idx,
                    field: "border",
                })?;

                // Exports without features_info address flat columns directly.
                let (column, nan) = if features.is_empty() {
                    (feature as usize, NanValueTreatment::AsIs)
                } else {
                    *features.get(&feature).ok_or(CatBoostJsonError::UnknownFeature {
                        tree: tree_idx,
                        feature,
                    })?
                };

                max_column = max_column.max(Some(column));
                splits.push(Split {
                    column,
                    border,
                    nan_is_greater: nan == NanValueTreatment::AsTrue,
                });
            }

            let n_leaves = 1usize << depth;
            let n_values = tree.leaf_values.len();
            if n_values == 0 || n_values % n_leaves != 0 {
                return Err(CatBoostJsonError::LeafCount {
                    tree: tree_idx,
                    depth,
                    actual: n_values,
                });
            }
            let tree_dim = n_values / n_leaves;
            match dimension {
                None => dimension = Some(tree_dim),
                Some(expected) if expected != tree_dim => {
                    return Err(CatBoostJsonError::DimensionMismatch {
                        tree: tree_idx,
                        actual: tree_dim,
                        expected,
                    });
                }
                Some(_) => {}
            }

            trees.push(ObliviousTree {
                splits: splits.into_boxed_slice(),
                leaf_values: tree.leaf_values.clone().into_boxed_slice(),
            });
        }

        let dimension = dimension.unwrap_or(bias.len().max(1));
        let bias = match bias.len() {
            1 if dimension > 1 => vec![bias[0]; dimension],
            n if n == dimension => bias,
            n => {
                return Err(CatBoostJsonError::BiasMismatch {
                    actual: n,
                    expected: dimension,
                })
            }
        };

        let declared = model
            .features_info
            .float_features
            .iter()
            .map(|f| f.flat_feature_index as usize + 1)
            .max();
        let n_features = declared
            .into_iter()
            .chain(max_column.map(|c| c + 1))
            .max()
            .unwrap_or(0);

        Ok(Self {
            trees,
            n_features,
            dimension,
            scale,
            bias,
        })
    }

    /// Minimum row width the model needs.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Values produced per row.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Score `rows` into `output` (`rows.len() * dimension` values, row-major).
    pub fn predict_into(
        &self,
        rows: &[&[f32]],
        n_features: usize,
        output: &mut [f64],
        parallelism: Parallelism,
        block_size: usize,
    ) -> Result<(), EngineError> {
        let expected = rows.len() * self.dimension;
        if output.len() != expected {
            return Err(EngineError::new(format!(
                "output buffer holds {} values, expected {expected} ({} rows x dimension {})",
                output.len(),
                rows.len(),
                self.dimension
            )));
        }
        if rows.is_empty() {
            return Ok(());
        }
        if n_features < self.n_features {
            return Err(EngineError::new(format!(
                "model expects at least {} float features, got {n_features}",
                self.n_features
            )));
        }
        if let Some(i) = rows.iter().position(|row| row.len() < n_features) {
            return Err(EngineError::new(format!(
                "row {i} holds {} values, expected {n_features}",
                rows[i].len()
            )));
        }

        let block_size = block_size.max(1);
        let blocks = output
            .chunks_mut(block_size * self.dimension)
            .zip(rows.chunks(block_size));
        parallelism.maybe_par_bridge_for_each(blocks, |(out, block)| {
            self.predict_block(block, out)
        });
        Ok(())
    }

    fn predict_block(&self, rows: &[&[f32]], output: &mut [f64]) {
        let dim = self.dimension;
        for (row, out) in rows.iter().zip(output.chunks_exact_mut(dim)) {
            out.fill(0.0);
            for tree in &self.trees {
                let leaf = tree.leaf_index(row);
                let values = &tree.leaf_values[leaf * dim..(leaf + 1) * dim];
                for (o, v) in out.iter_mut().zip(values) {
                    *o += v;
                }
            }
            for (o, b) in out.iter_mut().zip(&self.bias) {
                *o = self.scale * *o + b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ObliviousForest, CatBoostJsonError> {
        ObliviousForest::from_json(&serde_json::from_str(json).unwrap())
    }

    const TWO_LEVEL: &str = r#"{
        "features_info": {"float_features": [
            {"feature_index": 0, "flat_feature_index": 0, "borders": [0.5]},
            {"feature_index": 1, "flat_feature_index": 2, "borders": [1.5]}
        ]},
        "oblivious_trees": [
            {"splits": [
                {"float_feature_index": 0, "border": 0.5, "split_type": "FloatFeature"},
                {"float_feature_index": 1, "border": 1.5, "split_type": "FloatFeature"}
             ],
             "leaf_values": [0.0, 1.0, 10.0, 11.0]}
        ],
        "scale_and_bias": [1, [0.5]]
    }"#;

    #[test]
    fn leaf_index_uses_one_bit_per_level() {
        let forest = parse(TWO_LEVEL).unwrap();
        assert_eq!(forest.n_features(), 3);
        assert_eq!(forest.dimension(), 1);

        let rows: [&[f32]; 4] = [
            &[0.0, 0.0, 0.0],
            &[1.0, 0.0, 0.0],
            &[0.0, 0.0, 2.0],
            &[1.0, 0.0, 2.0],
        ];
        let mut out = [0.0; 4];
        forest
            .predict_into(&rows, 3, &mut out, Parallelism::Sequential, DEFAULT_BLOCK_SIZE)
            .unwrap();
        assert_eq!(out, [0.5, 1.5, 10.5, 11.5]);
    }

    #[test]
    fn border_comparison_is_strict() {
        let forest = parse(TWO_LEVEL).unwrap();
        let mut out = [0.0];
        forest
            .predict_into(&[&[0.5, 0.0, 1.5]], 3, &mut out, Parallelism::Sequential, 1)
            .unwrap();
        assert_eq!(out, [0.5]);
    }

    #[test]
    fn empty_batch_needs_no_columns() {
        let forest = parse(TWO_LEVEL).unwrap();
        let mut out: [f64; 0] = [];
        forest
            .predict_into(&[], 1, &mut out, Parallelism::Sequential, DEFAULT_BLOCK_SIZE)
            .unwrap();

        let mut stray = [0.0];
        let err = forest
            .predict_into(&[], 1, &mut stray, Parallelism::Sequential, DEFAULT_BLOCK_SIZE)
            .unwrap_err();
        assert!(err.diagnostic().contains("output buffer"));
    }

    #[test]
    fn narrow_rows_are_rejected() {
        let forest = parse(TWO_LEVEL).unwrap();
        let mut out = [0.0];
        let err = forest
            .predict_into(&[&[1.0, 0.0]], 2, &mut out, Parallelism::Sequential, 1)
            .unwrap_err();
        assert!(err.diagnostic().contains("at least 3"));
    }

    #[test]
    fn output_length_must_match_rows_times_dimension() {
        let forest = parse(TWO_LEVEL).unwrap();
        let mut out = [0.0; 2];
        let err = forest
            .predict_into(&[&[1.0, 0.0, 0.0]], 3, &mut out, Parallelism::Sequential, 1)
            .unwrap_err();
        assert!(err.diagnostic().contains("output buffer"));
    }

    #[test]
    fn nan_routing_follows_treatment() {
        let json = r#"{
            "features_info": {"float_features": [
                {"feature_index": 0, "flat_feature_index": 0, "borders": [0.0], "nan_value_treatment": "AsTrue"}
            ]},
            "oblivious_trees": [
                {"splits": [{"float_feature_index": 0, "border": 0.0}], "leaf_values": [-1.0, 1.0]}
            ]
        }"#;
        let forest = parse(json).unwrap();
        let mut out = [0.0];
        forest
            .predict_into(&[&[f32::NAN]], 1, &mut out, Parallelism::Sequential, 1)
            .unwrap();
        assert_eq!(out, [1.0]);
    }

    #[test]
    fn rejects_ctr_splits() {
        let json = r#"{"oblivious_trees": [
            {"splits": [{"split_type": "OnlineCtr"}], "leaf_values": [0.0, 1.0]}
        ]}"#;
        assert!(matches!(
            parse(json),
            Err(CatBoostJsonError::UnsupportedSplit { tree: 0, .. })
        ));
    }

    #[test]
    fn rejects_wrong_leaf_count() {
        let json = r#"{"oblivious_trees": [
            {"splits": [{"float_feature_index": 0, "border": 0.0}], "leaf_values": [0.0, 1.0, 2.0]}
        ]}"#;
        assert!(matches!(
            parse(json),
            Err(CatBoostJsonError::LeafCount { actual: 3, .. })
        ));
    }

    #[test]
    fn multi_dimension_layout_is_leaf_major() {
        let json = r#"{
            "oblivious_trees": [
                {"splits": [{"float_feature_index": 0, "border": 0.0}], "leaf_values": [1.0, 2.0, 3.0, 4.0]}
            ],
            "scale_and_bias": [1, [0, 0]]
        }"#;
        let forest = parse(json).unwrap();
        assert_eq!(forest.dimension(), 2);
        let mut out = [0.0; 4];
        forest
            .predict_into(&[&[-1.0], &[1.0]], 1, &mut out, Parallelism::Parallel, 1)
            .unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0]);
    }
}
