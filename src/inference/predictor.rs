//! Batched prediction against a loaded artifact.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::output::PredictionBatch;
use crate::config::ServingConfig;
use crate::data::{FeatureBatch, Materializer};
use crate::engine::InferenceEngine;
use crate::error::{Result, ServingError};
use crate::metrics::{LatencySink, NoopLatencySink};
use crate::model::ModelArtifact;
use crate::utils::try_zeroed;

/// Runs one batched engine call per request.
///
/// Stateless apart from the injected latency sink and the materialization
/// limit, so a single predictor can be shared across request threads.
#[derive(Clone)]
pub struct Predictor {
    latency: Arc<dyn LatencySink>,
    materializer: Materializer,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(Arc::new(NoopLatencySink))
    }
}

impl Predictor {
    /// Predictor recording engine latency into `latency`.
    pub fn new(latency: Arc<dyn LatencySink>) -> Self {
        Self {
            latency,
            materializer: Materializer::default(),
        }
    }

    /// Predictor using the cell limit from `config`.
    pub fn from_config(latency: Arc<dyn LatencySink>, config: &ServingConfig) -> Self {
        Self::new(latency).with_materializer(Materializer::new(config.max_dense_cells))
    }

    pub fn with_materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = materializer;
        self
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    /// Score `batch` with the model held by `artifact`.
    ///
    /// Only the engine call is timed; one sample is recorded per engine call,
    /// including failed ones. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - [`ServingError::FailedPrecondition`] if the artifact is not loaded.
    /// - [`ServingError::InvalidArgument`] on an ids/scores length mismatch.
    /// - [`ServingError::Internal`] if the dense matrix or output cannot be allocated.
    /// - [`ServingError::InferenceFailure`] with the engine diagnostic.
    pub fn predict<E: InferenceEngine>(
        &self,
        artifact: &ModelArtifact<E>,
        batch: &FeatureBatch,
    ) -> Result<PredictionBatch> {
        let handle = artifact.handle().ok_or_else(|| {
            ServingError::FailedPrecondition(format!(
                "model version {} is {}, expected loaded",
                artifact.version(),
                artifact.state()
            ))
        })?;

        let matrix = self.materializer.materialize(batch)?;
        let rows = matrix.row_slices();
        let mut output: Vec<f64> = try_zeroed(rows.len()).map_err(|e| {
            ServingError::internal(format!("cannot allocate {} predictions: {e}", rows.len()))
        })?;

        let start = Instant::now();
        let result = handle.predict_flat(&rows, matrix.n_cols(), &mut output);
        let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.latency.record_micros(micros);

        match result {
            Ok(()) => {
                debug!(
                    version = artifact.version(),
                    batch_size = rows.len(),
                    width = matrix.n_cols(),
                    latency_us = micros,
                    "predicted batch"
                );
                Ok(PredictionBatch::new(output))
            }
            Err(e) => {
                warn!(
                    version = artifact.version(),
                    batch_size = rows.len(),
                    error = %e,
                    "engine prediction failed"
                );
                Err(ServingError::InferenceFailure(e.diagnostic().to_owned()))
            }
        }
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("materializer", &self.materializer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MODEL_FILE_NAME;
    use crate::data::SparseFeatureVector;
    use crate::error::ErrorCategory;
    use crate::metrics::LatencyRecorder;
    use crate::model::ModelLoader;
    use crate::testing::{write_model_dir, CountingEngine};

    fn loaded(bias: &str) -> (tempfile::TempDir, Arc<CountingEngine>, ModelArtifact<CountingEngine>) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = write_model_dir(tmp.path(), 1, DEFAULT_MODEL_FILE_NAME, bias);
        let engine = Arc::new(CountingEngine::new());
        let artifact = ModelLoader::new(Arc::clone(&engine)).load(&dir, 1).unwrap();
        (tmp, engine, artifact)
    }

    fn batch() -> FeatureBatch {
        FeatureBatch::new(vec![
            SparseFeatureVector::new(vec![2, 0], vec![5.0, 1.0]),
            SparseFeatureVector::new(vec![1], vec![0.5]),
        ])
    }

    #[test]
    fn predicts_one_value_per_example() {
        let (_tmp, _engine, artifact) = loaded("0.5");
        let predictions = Predictor::default().predict(&artifact, &batch()).unwrap();
        assert_eq!(predictions.as_slice(), &[6.5, 1.0]);
    }

    #[test]
    fn unloaded_artifact_fails_fast() {
        let (_tmp, engine, mut artifact) = loaded("0.0");
        artifact.unload();
        let err = Predictor::default().predict(&artifact, &batch()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::FailedPrecondition);
        assert_eq!(engine.predict_calls(), 0);
    }

    #[test]
    fn invalid_batch_never_reaches_engine() {
        let (_tmp, engine, artifact) = loaded("0.0");
        let recorder = Arc::new(LatencyRecorder::new("invalid_batch_us").unwrap());
        let predictor = Predictor::new(recorder.clone());
        let bad = FeatureBatch::new(vec![SparseFeatureVector::new(vec![0, 1], vec![1.0])]);

        let err = predictor.predict(&artifact, &bad).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidArgument);
        assert_eq!(engine.predict_calls(), 0);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn failure_keeps_handle_usable_and_is_timed() {
        let (_tmp, engine, artifact) = loaded("1.0");
        let recorder = Arc::new(LatencyRecorder::new("failure_us").unwrap());
        let predictor = Predictor::new(recorder.clone());
        engine.fail_next_predicts(1);

        let err = predictor.predict(&artifact, &batch()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InferenceFailure);
        assert!(err.message().contains("injected"));

        let predictions = predictor.predict(&artifact, &batch()).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn silent_engine_failure_reports_unknown_error() {
        let (_tmp, engine, artifact) = loaded("1.0");
        engine.silent_failures(true);
        engine.fail_next_predicts(1);
        let err = Predictor::default().predict(&artifact, &batch()).unwrap_err();
        assert_eq!(err, ServingError::InferenceFailure("unknown error".into()));
    }

    #[test]
    fn cell_limit_is_internal_error() {
        let (_tmp, engine, artifact) = loaded("0.0");
        let config = ServingConfig::builder().max_dense_cells(4).build().unwrap();
        let predictor = Predictor::from_config(Arc::new(NoopLatencySink), &config);
        let wide = FeatureBatch::new(vec![SparseFeatureVector::new(vec![10], vec![1.0])]);

        let err = predictor.predict(&artifact, &wide).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InternalError);
        assert_eq!(engine.predict_calls(), 0);
    }

    #[test]
    fn empty_batch_yields_empty_predictions() {
        let (_tmp, _engine, artifact) = loaded("3.0");
        let predictions = Predictor::default()
            .predict(&artifact, &FeatureBatch::default())
            .unwrap();
        assert!(predictions.is_empty());
    }
}
