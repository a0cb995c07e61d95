//! Inference engine abstraction.
//!
//! The serving path treats the engine as an opaque capability with a native
//! handle lifecycle: allocate a handle, load a serialized model into it, run
//! batched prediction over row slices, release the handle. [`InferenceEngine`]
//! captures exactly that surface; [`NativeHandle`] owns one engine handle and
//! guarantees it is released on every exit path.
//!
//! [`catboost::CatBoostEngine`] is the bundled implementation for CatBoost
//! JSON model exports.

pub mod catboost;
mod handle;

use std::path::Path;

pub use handle::NativeHandle;

/// Diagnostic used when the engine reports a failure without a message.
pub const UNKNOWN_ERROR: &str = "unknown error";

// =============================================================================
// EngineError
// =============================================================================

/// Failure reported by an engine call, with an optional diagnostic string.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.diagnostic())]
pub struct EngineError {
    message: Option<String>,
}

impl EngineError {
    /// Failure with a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// Failure without any diagnostic.
    pub fn unknown() -> Self {
        Self { message: None }
    }

    /// Diagnostic string, or [`UNKNOWN_ERROR`] when the engine gave none.
    pub fn diagnostic(&self) -> &str {
        match self.message.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => UNKNOWN_ERROR,
        }
    }
}

// =============================================================================
// InferenceEngine
// =============================================================================

/// Native inference capability backing a servable.
///
/// Implementations must allow concurrent `predict_flat` calls against the same
/// loaded model from multiple threads; `load_from_file` and `delete` are only
/// ever called with exclusive access to the model.
pub trait InferenceEngine: Send + Sync + 'static {
    /// Engine-side model handle.
    type Model: Send + Sync;

    /// Allocate an empty model handle.
    fn create(&self) -> Result<Self::Model, EngineError>;

    /// Load a serialized model from `path` into `model`.
    fn load_from_file(&self, model: &mut Self::Model, path: &Path) -> Result<(), EngineError>;

    /// Score `rows` into `output`.
    ///
    /// Every row holds at least `n_features` values. `output` is sized by the
    /// caller: one value per row for single-dimension models.
    fn predict_flat(
        &self,
        model: &Self::Model,
        rows: &[&[f32]],
        n_features: usize,
        output: &mut [f64],
    ) -> Result<(), EngineError>;

    /// Release a model handle.
    fn delete(&self, model: Self::Model) {
        drop(model);
    }
}
