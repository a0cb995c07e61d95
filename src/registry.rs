//! Host-owned registry of published model versions.
//!
//! The registry maps model name to version to a shared, loaded
//! [`ModelArtifact`]. Request threads take a [`ServableHandle`] (a reference
//! counted view of one version) and keep it for the duration of the call.
//! Retiring a version only removes it from the map; its engine handle is
//! released once the last outstanding `ServableHandle` is dropped.

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::engine::InferenceEngine;
use crate::error::{Result, ServingError};
use crate::model::{ModelArtifact, ModelLoader};

// =============================================================================
// ServableHandle
// =============================================================================

/// Shared reference to one published model version.
pub struct ServableHandle<E: InferenceEngine> {
    name: Arc<str>,
    artifact: Arc<ModelArtifact<E>>,
}

impl<E: InferenceEngine> ServableHandle<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i64 {
        self.artifact.version()
    }

    pub fn artifact(&self) -> &ModelArtifact<E> {
        &self.artifact
    }
}

impl<E: InferenceEngine> Clone for ServableHandle<E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            artifact: Arc::clone(&self.artifact),
        }
    }
}

impl<E: InferenceEngine> Deref for ServableHandle<E> {
    type Target = ModelArtifact<E>;

    fn deref(&self) -> &Self::Target {
        &self.artifact
    }
}

impl<E: InferenceEngine> std::fmt::Debug for ServableHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServableHandle")
            .field("name", &self.name)
            .field("version", &self.version())
            .finish()
    }
}

// =============================================================================
// ServableRegistry
// =============================================================================

type Versions<E> = BTreeMap<i64, Arc<ModelArtifact<E>>>;

/// Name -> version -> loaded artifact.
pub struct ServableRegistry<E: InferenceEngine> {
    models: RwLock<HashMap<Arc<str>, Versions<E>>>,
}

impl<E: InferenceEngine> Default for ServableRegistry<E> {
    fn default() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: InferenceEngine> ServableRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a loaded artifact under `name`.
    ///
    /// A version already published under the same name is replaced; it stays
    /// alive until its outstanding handles drop.
    ///
    /// # Errors
    ///
    /// [`ServingError::FailedPrecondition`] if the artifact is not loaded.
    pub fn publish(&self, name: &str, artifact: ModelArtifact<E>) -> Result<ServableHandle<E>> {
        if !artifact.is_loaded() {
            return Err(ServingError::FailedPrecondition(format!(
                "cannot publish {name} version {}: artifact is {}",
                artifact.version(),
                artifact.state()
            )));
        }

        let version = artifact.version();
        let artifact = Arc::new(artifact);
        let name: Arc<str> = {
            let mut models = self.models.write();
            let name = models
                .get_key_value(name)
                .map(|(k, _)| Arc::clone(k))
                .unwrap_or_else(|| Arc::from(name));
            let replaced = models
                .entry(Arc::clone(&name))
                .or_default()
                .insert(version, Arc::clone(&artifact));
            if replaced.is_some() {
                info!(model = %name, version, "replaced published version");
            }
            name
        };

        info!(model = %name, version, path = %artifact.path().display(), "published model");
        Ok(ServableHandle { name, artifact })
    }

    /// Load the version stored in `dir` with `loader` and publish it.
    ///
    /// Loading happens outside the registry lock; the version becomes visible
    /// only after it is fully loaded.
    pub fn load_and_publish(
        &self,
        loader: &ModelLoader<E>,
        name: &str,
        dir: impl Into<PathBuf>,
        version: i64,
    ) -> Result<ServableHandle<E>> {
        let artifact = loader.load(dir, version)?;
        self.publish(name, artifact)
    }

    /// Resolve `version` of `name`, or its latest version when `None`.
    ///
    /// # Errors
    ///
    /// [`ServingError::NotFound`] for an unknown model or version.
    pub fn handle(&self, name: &str, version: Option<i64>) -> Result<ServableHandle<E>> {
        let models = self.models.read();
        let (key, versions) = models
            .get_key_value(name)
            .ok_or_else(|| ServingError::NotFound(format!("model {name} is not published")))?;

        let artifact = match version {
            Some(v) => versions.get(&v).ok_or_else(|| {
                ServingError::NotFound(format!("model {name} has no version {v}"))
            })?,
            None => versions
                .values()
                .next_back()
                .ok_or_else(|| ServingError::NotFound(format!("model {name} has no versions")))?,
        };

        Ok(ServableHandle {
            name: Arc::clone(key),
            artifact: Arc::clone(artifact),
        })
    }

    /// Remove `version` of `name` from the registry.
    ///
    /// Returns `true` if the version was published. In-flight requests keep
    /// their handle; the engine handle is released after the last one drops.
    pub fn retire(&self, name: &str, version: i64) -> bool {
        let removed = {
            let mut models = self.models.write();
            let Some(versions) = models.get_mut(name) else {
                return false;
            };
            let removed = versions.remove(&version);
            if versions.is_empty() {
                models.remove(name);
            }
            removed
        };

        match removed {
            Some(artifact) => {
                info!(
                    model = name,
                    version,
                    in_flight = Arc::strong_count(&artifact) - 1,
                    "retired model version"
                );
                true
            }
            None => false,
        }
    }

    /// Published versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Vec<i64> {
        self.models
            .read()
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Names with at least one published version, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().map(|k| k.to_string()).collect();
        names.sort_unstable();
        names
    }
}

impl<E: InferenceEngine> std::fmt::Debug for ServableRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServableRegistry")
            .field("models", &self.model_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MODEL_FILE_NAME;
    use crate::error::ErrorCategory;
    use crate::testing::{write_model_dir, CountingEngine};

    struct Fixture {
        tmp: tempfile::TempDir,
        engine: Arc<CountingEngine>,
        loader: ModelLoader<CountingEngine>,
        registry: ServableRegistry<CountingEngine>,
    }

    impl Fixture {
        fn new() -> Self {
            let engine = Arc::new(CountingEngine::new());
            Self {
                tmp: tempfile::tempdir().unwrap(),
                loader: ModelLoader::new(Arc::clone(&engine)),
                engine,
                registry: ServableRegistry::new(),
            }
        }

        fn publish(&self, name: &str, version: i64) -> ServableHandle<CountingEngine> {
            let root = self.tmp.path().join(name);
            let dir = write_model_dir(&root, version, DEFAULT_MODEL_FILE_NAME, "0.0");
            self.registry
                .load_and_publish(&self.loader, name, dir, version)
                .unwrap()
        }
    }

    #[test]
    fn latest_version_is_default() {
        let fx = Fixture::new();
        fx.publish("ctr", 1);
        fx.publish("ctr", 3);
        fx.publish("ctr", 2);

        assert_eq!(fx.registry.versions("ctr"), vec![1, 2, 3]);
        assert_eq!(fx.registry.handle("ctr", None).unwrap().version(), 3);
        assert_eq!(fx.registry.handle("ctr", Some(2)).unwrap().version(), 2);
    }

    #[test]
    fn unknown_model_or_version_is_not_found() {
        let fx = Fixture::new();
        fx.publish("ctr", 1);

        let err = fx.registry.handle("cvr", None).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
        let err = fx.registry.handle("ctr", Some(5)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn unloaded_artifact_cannot_be_published() {
        let fx = Fixture::new();
        let artifact = ModelArtifact::new(fx.tmp.path(), 1);
        let err = fx.registry.publish("ctr", artifact).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::FailedPrecondition);
        assert!(fx.registry.model_names().is_empty());
    }

    #[test]
    fn retire_waits_for_in_flight_handles() {
        let fx = Fixture::new();
        let in_flight = fx.publish("ctr", 1);
        assert_eq!(fx.engine.live_handles(), 1);

        assert!(fx.registry.retire("ctr", 1));
        assert!(!fx.registry.retire("ctr", 1));
        assert!(fx.registry.model_names().is_empty());
        assert!(in_flight.is_loaded());
        assert_eq!(fx.engine.live_handles(), 1);

        drop(in_flight);
        assert_eq!(fx.engine.live_handles(), 0);
    }

    #[test]
    fn republishing_version_replaces_it() {
        let fx = Fixture::new();
        let old = fx.publish("ctr", 1);
        let new = fx.publish("ctr", 1);
        assert_eq!(fx.registry.versions("ctr"), vec![1]);
        assert_eq!(fx.engine.live_handles(), 2);

        drop(old);
        assert_eq!(fx.engine.live_handles(), 1);
        assert_eq!(new.name(), "ctr");
    }

    #[test]
    fn failed_load_publishes_nothing() {
        let fx = Fixture::new();
        let err = fx
            .registry
            .load_and_publish(&fx.loader, "ctr", fx.tmp.path().join("missing"), 1)
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(fx.registry.versions("ctr").is_empty());
    }

    #[test]
    fn model_names_are_sorted() {
        let fx = Fixture::new();
        fx.publish("zeta", 1);
        fx.publish("alpha", 1);
        assert_eq!(fx.registry.model_names(), vec!["alpha", "zeta"]);
    }
}
