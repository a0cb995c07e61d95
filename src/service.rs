//! Request entry point tying registry, predictor and response builder together.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ServingConfig;
use crate::data::FeatureBatch;
use crate::engine::InferenceEngine;
use crate::error::{Result, ServingError};
use crate::inference::{build_response, ModelSpec, PredictResponse, Predictor};
use crate::registry::ServableRegistry;

/// Prediction request: which model to use and the named feature inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub model_spec: Option<ModelSpec>,
    #[serde(default)]
    pub inputs: HashMap<String, FeatureBatch>,
}

impl PredictRequest {
    /// Request for the latest version of `model` with one feature input.
    pub fn new(model: impl Into<String>, input_name: impl Into<String>, batch: FeatureBatch) -> Self {
        let mut inputs = HashMap::with_capacity(1);
        inputs.insert(input_name.into(), batch);
        Self {
            model_spec: Some(ModelSpec::new(model)),
            inputs,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        if let Some(spec) = self.model_spec.as_mut() {
            spec.version = Some(version);
        }
        self
    }
}

/// Serves [`PredictRequest`]s against a shared [`ServableRegistry`].
pub struct PredictionService<E: InferenceEngine> {
    registry: Arc<ServableRegistry<E>>,
    predictor: Predictor,
    config: ServingConfig,
}

impl<E: InferenceEngine> PredictionService<E> {
    pub fn new(registry: Arc<ServableRegistry<E>>, predictor: Predictor, config: ServingConfig) -> Self {
        Self {
            registry,
            predictor,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ServableRegistry<E>> {
        &self.registry
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    /// Resolve the requested model, score the feature input and build the
    /// response stamped with the version that served it.
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictResponse> {
        let spec = request
            .model_spec
            .as_ref()
            .ok_or_else(|| ServingError::invalid("missing model spec"))?;
        let servable = self.registry.handle(&spec.name, spec.version)?;

        let input = &self.config.feature_input_name;
        let batch = request
            .inputs
            .get(input)
            .ok_or_else(|| ServingError::invalid(format!("no {input} input found")))?;

        let predictions = self.predictor.predict(servable.artifact(), batch)?;
        Ok(build_response(
            predictions,
            servable.name(),
            servable.version(),
            &self.config.output_key,
        ))
    }
}

impl<E: InferenceEngine> std::fmt::Debug for PredictionService<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
