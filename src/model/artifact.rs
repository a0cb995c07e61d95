//! Loaded model artifact and its lifecycle state.

use std::path::{Path, PathBuf};

use crate::engine::{InferenceEngine, NativeHandle};

/// Lifecycle of a [`ModelArtifact`].
///
/// `Unloaded -> Loading -> Loaded -> Unloading -> Unloaded`. Prediction is
/// only allowed in [`Loaded`](ArtifactState::Loaded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

impl std::fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Unloading => "unloading",
        };
        f.write_str(name)
    }
}

/// One model version: a storage directory, a version number and the engine
/// handle loaded from it.
///
/// Immutable once loaded. Shared read-only across request threads (wrap in
/// `Arc`); [`unload`](Self::unload) needs exclusive access, so it cannot race
/// in-flight predictions.
pub struct ModelArtifact<E: InferenceEngine> {
    path: PathBuf,
    version: i64,
    state: ArtifactState,
    handle: Option<NativeHandle<E>>,
}

impl<E: InferenceEngine> ModelArtifact<E> {
    /// A never-loaded artifact for the version stored under `path`.
    pub fn new(path: impl Into<PathBuf>, version: i64) -> Self {
        Self {
            path: path.into(),
            version,
            state: ArtifactState::Unloaded,
            handle: None,
        }
    }

    /// Version directory the artifact was (or will be) loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.state == ArtifactState::Loaded
    }

    /// Engine handle, only while loaded.
    pub fn handle(&self) -> Option<&NativeHandle<E>> {
        match self.state {
            ArtifactState::Loaded => self.handle.as_ref(),
            _ => None,
        }
    }

    /// Engine-side model, only while loaded.
    pub fn model(&self) -> Option<&E::Model> {
        self.handle().and_then(NativeHandle::model)
    }

    /// Release the engine handle. No-op when nothing is loaded.
    pub fn unload(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            self.state = ArtifactState::Unloaded;
            return false;
        };
        self.state = ArtifactState::Unloading;
        let released = handle.release();
        self.state = ArtifactState::Unloaded;
        released
    }

    pub(crate) fn set_state(&mut self, state: ArtifactState) {
        self.state = state;
    }

    pub(crate) fn install(&mut self, handle: NativeHandle<E>) {
        self.handle = Some(handle);
        self.state = ArtifactState::Loaded;
    }
}

impl<E: InferenceEngine> std::fmt::Debug for ModelArtifact<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("state", &self.state)
            .finish()
    }
}
