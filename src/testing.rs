//! Testing utilities shared by unit and integration tests.
//!
//! - [`CountingEngine`]: engine double that counts handle allocations and can
//!   be told to fail at each stage of the lifecycle
//! - [`assert_predictions_eq`]: tolerance-based comparison of prediction slices
//! - [`write_model_dir`]: lay out a model version directory on disk

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use approx::AbsDiffEq;

use crate::engine::{EngineError, InferenceEngine};

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for comparing f64 predictions.
pub const DEFAULT_TOLERANCE_F64: f64 = 1e-6;

// =============================================================================
// Assertions
// =============================================================================

/// Assert two prediction slices match element-wise within `tolerance`.
///
/// # Panics
///
/// Panics on length mismatch or if any pair differs by more than `tolerance`.
pub fn assert_predictions_eq(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "length mismatch: got {}, expected {}",
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.abs_diff_eq(e, tolerance),
            "prediction {i}: got {a}, expected {e} (tolerance {tolerance})"
        );
    }
}

/// Write `contents` as `file_name` inside `root/<version>` and return that directory.
pub fn write_model_dir(root: &Path, version: i64, file_name: &str, contents: &str) -> PathBuf {
    let dir = root.join(version.to_string());
    fs::create_dir_all(&dir).expect("create model version dir");
    fs::write(dir.join(file_name), contents).expect("write model file");
    dir
}

// =============================================================================
// CountingEngine
// =============================================================================

/// Model held by [`CountingEngine`].
///
/// The serialized form is a single number: the bias added to every row sum.
#[derive(Debug, Default)]
pub struct CountingModel {
    bias: Option<f64>,
}

impl CountingModel {
    /// Bias parsed at load time, `None` before a successful load.
    pub fn bias(&self) -> Option<f64> {
        self.bias
    }
}

/// Resource-counting engine double.
///
/// Scores each row as `bias + sum(row[..n_features])`. Every allocation and
/// release is counted, so tests can assert that no handle outlives its owner.
#[derive(Debug, Default)]
pub struct CountingEngine {
    created: AtomicUsize,
    deleted: AtomicUsize,
    predict_calls: AtomicUsize,
    fail_create: AtomicBool,
    fail_load: AtomicBool,
    silent_failures: AtomicBool,
    failing_predicts: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create` fail.
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load_from_file` fail regardless of file contents.
    pub fn fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` predictions fail.
    pub fn fail_next_predicts(&self, n: usize) {
        self.failing_predicts.store(n, Ordering::SeqCst);
    }

    /// Report failures without a diagnostic message.
    pub fn silent_failures(&self, silent: bool) {
        self.silent_failures.store(silent, Ordering::SeqCst);
    }

    /// Handles allocated so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Handles released so far.
    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Handles currently allocated.
    pub fn live_handles(&self) -> usize {
        self.created() - self.deleted()
    }

    /// Number of `predict_flat` calls, failed ones included.
    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    fn error(&self, message: String) -> EngineError {
        if self.silent_failures.load(Ordering::SeqCst) {
            EngineError::unknown()
        } else {
            EngineError::new(message)
        }
    }

    fn take_predict_failure(&self) -> bool {
        self.failing_predicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl InferenceEngine for CountingEngine {
    type Model = CountingModel;

    fn create(&self) -> Result<CountingModel, EngineError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(self.error("cannot allocate model handle".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(CountingModel::default())
    }

    fn load_from_file(&self, model: &mut CountingModel, path: &Path) -> Result<(), EngineError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(self.error("load rejected".into()));
        }
        let text = fs::read_to_string(path)
            .map_err(|e| self.error(format!("cannot read {}: {e}", path.display())))?;
        let bias = text
            .trim()
            .parse::<f64>()
            .map_err(|e| self.error(format!("corrupt model {}: {e}", path.display())))?;
        model.bias = Some(bias);
        Ok(())
    }

    fn predict_flat(
        &self,
        model: &CountingModel,
        rows: &[&[f32]],
        n_features: usize,
        output: &mut [f64],
    ) -> Result<(), EngineError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_predict_failure() {
            return Err(self.error("injected prediction failure".into()));
        }
        let bias = model
            .bias
            .ok_or_else(|| self.error("model not loaded".into()))?;
        if output.len() != rows.len() {
            return Err(self.error(format!(
                "output holds {} values for {} rows",
                output.len(),
                rows.len()
            )));
        }
        for (row, out) in rows.iter().zip(output.iter_mut()) {
            *out = bias + row[..n_features].iter().map(|&v| f64::from(v)).sum::<f64>();
        }
        Ok(())
    }

    fn delete(&self, model: CountingModel) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        drop(model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failures_are_consumed() {
        let engine = CountingEngine::new();
        let model = CountingModel { bias: Some(1.0) };
        engine.fail_next_predicts(1);
        let mut out = [0.0];
        assert!(engine.predict_flat(&model, &[&[2.0]], 1, &mut out).is_err());
        engine.predict_flat(&model, &[&[2.0]], 1, &mut out).unwrap();
        assert_eq!(out, [3.0]);
        assert_eq!(engine.predict_calls(), 2);
    }

    #[test]
    #[should_panic(expected = "prediction 1")]
    fn assert_predictions_eq_reports_index() {
        assert_predictions_eq(&[1.0, 2.0], &[1.0, 2.5], DEFAULT_TOLERANCE_F64);
    }
}
