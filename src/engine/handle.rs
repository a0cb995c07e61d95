//! Scoped ownership of one engine model handle.

use std::path::Path;
use std::sync::Arc;

use super::{EngineError, InferenceEngine};

/// Owns one engine handle and releases it exactly once.
///
/// Release happens on [`release`](Self::release) or on drop, whichever comes
/// first, so a handle abandoned halfway through a failed load never outlives
/// the guard.
pub struct NativeHandle<E: InferenceEngine> {
    engine: Arc<E>,
    model: Option<E::Model>,
}

impl<E: InferenceEngine> NativeHandle<E> {
    /// Allocate a fresh handle from `engine`.
    pub fn create(engine: Arc<E>) -> Result<Self, EngineError> {
        let model = engine.create()?;
        Ok(Self {
            engine,
            model: Some(model),
        })
    }

    /// Load a serialized model into the handle.
    pub fn load(&mut self, path: &Path) -> Result<(), EngineError> {
        match self.model.as_mut() {
            Some(model) => self.engine.load_from_file(model, path),
            None => Err(EngineError::new("model handle already released")),
        }
    }

    /// Run batched prediction against the held model.
    pub fn predict_flat(
        &self,
        rows: &[&[f32]],
        n_features: usize,
        output: &mut [f64],
    ) -> Result<(), EngineError> {
        match self.model.as_ref() {
            Some(model) => self.engine.predict_flat(model, rows, n_features, output),
            None => Err(EngineError::new("model handle already released")),
        }
    }

    /// Borrow the engine-side model, if not yet released.
    pub fn model(&self) -> Option<&E::Model> {
        self.model.as_ref()
    }

    /// Whether the handle still holds engine memory.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.model.is_some()
    }

    /// Release the handle. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.model.take() {
            Some(model) => {
                self.engine.delete(model);
                true
            }
            None => false,
        }
    }
}

impl<E: InferenceEngine> Drop for NativeHandle<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: InferenceEngine> std::fmt::Debug for NativeHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHandle")
            .field("live", &self.is_live())
            .finish()
    }
}
