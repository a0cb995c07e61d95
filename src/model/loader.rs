//! Loading model versions from storage into engine handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::artifact::{ArtifactState, ModelArtifact};
use crate::config::{ServingConfig, DEFAULT_MODEL_FILE_NAME};
use crate::engine::{InferenceEngine, NativeHandle};
use crate::error::{Result, ServingError};

/// Factory turning a version directory into a loaded [`ModelArtifact`].
///
/// The host owns the loader and passes it to the registry explicitly.
#[derive(Debug)]
pub struct ModelLoader<E: InferenceEngine> {
    engine: Arc<E>,
    file_name: String,
}

impl<E: InferenceEngine> Clone for ModelLoader<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            file_name: self.file_name.clone(),
        }
    }
}

impl<E: InferenceEngine> ModelLoader<E> {
    /// Loader reading the default artifact file name.
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            file_name: DEFAULT_MODEL_FILE_NAME.to_owned(),
        }
    }

    /// Loader reading `config.model_file_name`.
    pub fn from_config(engine: Arc<E>, config: &ServingConfig) -> Self {
        Self::new(engine).with_file_name(config.model_file_name.clone())
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Full path of the artifact file inside `dir`.
    pub fn artifact_file(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }

    /// Load the version stored in `dir`.
    ///
    /// # Errors
    ///
    /// - [`ServingError::NotFound`] if the artifact file is missing.
    /// - [`ServingError::LoadFailure`] if the engine rejects the file.
    /// - [`ServingError::Internal`] if the engine cannot allocate a handle.
    pub fn load(&self, dir: impl Into<PathBuf>, version: i64) -> Result<ModelArtifact<E>> {
        let mut artifact = ModelArtifact::new(dir, version);
        self.load_into(&mut artifact)?;
        Ok(artifact)
    }

    /// Load into an existing artifact. Fails unless the artifact is unloaded.
    ///
    /// On any failure the artifact is left unloaded with no engine handle.
    pub fn load_into(&self, artifact: &mut ModelArtifact<E>) -> Result<()> {
        if artifact.state() != ArtifactState::Unloaded {
            return Err(ServingError::FailedPrecondition(format!(
                "model version {} is {}, expected unloaded",
                artifact.version(),
                artifact.state()
            )));
        }

        let file = self.artifact_file(artifact.path());
        if !file.is_file() {
            return Err(ServingError::NotFound(format!(
                "model artifact {} does not exist",
                file.display()
            )));
        }

        artifact.set_state(ArtifactState::Loading);
        match self.open(&file) {
            Ok(handle) => {
                artifact.install(handle);
                info!(path = %file.display(), version = artifact.version(), "loaded model");
                Ok(())
            }
            Err(err) => {
                artifact.set_state(ArtifactState::Unloaded);
                warn!(path = %file.display(), version = artifact.version(), error = %err, "model load failed");
                Err(err)
            }
        }
    }

    /// Release the artifact's engine handle. Idempotent.
    pub fn unload(&self, artifact: &mut ModelArtifact<E>) {
        if artifact.unload() {
            info!(path = %artifact.path().display(), version = artifact.version(), "unloaded model");
        }
    }

    // The handle guard releases engine memory if `load` fails below.
    fn open(&self, file: &Path) -> Result<NativeHandle<E>> {
        let mut handle = NativeHandle::create(Arc::clone(&self.engine)).map_err(|e| {
            ServingError::internal(format!("failed to allocate model handle: {}", e.diagnostic()))
        })?;
        handle
            .load(file)
            .map_err(|e| ServingError::LoadFailure(e.diagnostic().to_owned()))?;
        Ok(handle)
    }
}
