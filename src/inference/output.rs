//! Prediction output and the versioned response built from it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// PredictionBatch
// =============================================================================

/// One f64 prediction per example, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionBatch {
    values: Vec<f64>,
}

impl PredictionBatch {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of predictions (the batch size).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for PredictionBatch {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

// =============================================================================
// Response types
// =============================================================================

/// Model identity on requests and responses.
///
/// On a request `version: None` selects the latest published version. On a
/// response the version is always the one that served the request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_name: Option<String>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            signature_name: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Element type of a [`TensorProto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Double,
}

/// Flat tensor with an explicit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorProto {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl TensorProto {
    /// 1-D f64 tensor of shape `[values.len()]`.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            dtype: DataType::Double,
            shape: vec![values.len()],
            values,
        }
    }
}

/// Predictions stamped with the identity of the model that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub model_spec: ModelSpec,
    pub outputs: HashMap<String, TensorProto>,
}

impl PredictResponse {
    /// Output tensor stored under `key`.
    pub fn output(&self, key: &str) -> Option<&TensorProto> {
        self.outputs.get(key)
    }
}

/// Package `predictions` under `output_key` and stamp model name and version.
///
/// The signature name is left unset.
pub fn build_response(
    predictions: PredictionBatch,
    model_name: &str,
    model_version: i64,
    output_key: &str,
) -> PredictResponse {
    let mut outputs = HashMap::with_capacity(1);
    outputs.insert(
        output_key.to_owned(),
        TensorProto::vector(predictions.into_vec()),
    );
    PredictResponse {
        model_spec: ModelSpec::new(model_name).with_version(model_version),
        outputs,
    }
}
