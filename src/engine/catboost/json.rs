//! CatBoost JSON model export.
//!
//! These are "foreign types" used only for parsing. See
//! [`ObliviousForest::from_json`](super::ObliviousForest::from_json) for the
//! conversion into the evaluation layout.
//!
//! Only the parts needed for float-feature symmetric trees are modeled:
//!
//! ```json
//! {
//!   "features_info": {
//!     "float_features": [
//!       {"feature_index": 0, "flat_feature_index": 0, "borders": [0.5], "nan_value_treatment": "AsIs"}
//!     ]
//!   },
//!   "oblivious_trees": [
//!     {"splits": [{"float_feature_index": 0, "border": 0.5, "split_type": "FloatFeature"}],
//!      "leaf_values": [-1.0, 1.0]}
//!   ],
//!   "scale_and_bias": [1, [0]]
//! }
//! ```

use serde::Deserialize;

/// Split type tag for float feature comparisons.
pub const FLOAT_FEATURE_SPLIT: &str = "FloatFeature";

/// Top-level CatBoost JSON export.
#[derive(Debug, Clone, Deserialize)]
pub struct CatBoostJsonModel {
    #[serde(default)]
    pub features_info: FeaturesInfo,
    pub oblivious_trees: Vec<JsonObliviousTree>,
    #[serde(default)]
    pub scale_and_bias: Option<ScaleAndBias>,
}

/// Declared input features.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeaturesInfo {
    #[serde(default)]
    pub float_features: Vec<FloatFeature>,
}

/// One float feature and where it lives in the flat input row.
#[derive(Debug, Clone, Deserialize)]
pub struct FloatFeature {
    /// Index among float features; referenced by splits.
    pub feature_index: u32,
    /// Column in the flat input row.
    pub flat_feature_index: u32,
    #[serde(default)]
    pub borders: Vec<f32>,
    #[serde(default)]
    pub nan_value_treatment: NanValueTreatment,
}

/// How a NaN input is routed at a split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum NanValueTreatment {
    /// Compared as-is; NaN never exceeds a border.
    #[default]
    AsIs,
    /// NaN always goes to the "not greater" side.
    AsFalse,
    /// NaN always goes to the "greater" side.
    AsTrue,
}

/// One symmetric tree: the same split at every node of a level.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonObliviousTree {
    #[serde(default)]
    pub splits: Vec<JsonSplit>,
    pub leaf_values: Vec<f64>,
    #[serde(default)]
    pub leaf_weights: Vec<f64>,
}

/// Split condition `feature > border`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonSplit {
    #[serde(default)]
    pub float_feature_index: Option<u32>,
    #[serde(default)]
    pub border: Option<f32>,
    #[serde(default)]
    pub split_type: Option<String>,
}

/// `[scale, bias]`, where bias is a scalar or one value per output dimension.
#[derive(Debug, Clone, Deserialize)]
pub struct ScaleAndBias(pub f64, pub Bias);

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Bias {
    Scalar(f64),
    PerDimension(Vec<f64>),
}

impl Bias {
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Bias::Scalar(b) => vec![*b],
            Bias::PerDimension(b) => b.clone(),
        }
    }
}
