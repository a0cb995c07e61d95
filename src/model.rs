//! Model artifacts and their loader.
//!
//! A [`ModelArtifact`] is one model version held in engine memory.
//! [`ModelLoader`] produces artifacts from version directories and releases
//! them again. Handles are scoped: whichever way a load or an artifact ends,
//! the engine handle is released exactly once.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use boosters_serving::engine::catboost::CatBoostEngine;
//! use boosters_serving::model::ModelLoader;
//!
//! let loader = ModelLoader::new(Arc::new(CatBoostEngine::default()));
//! let mut artifact = loader.load("/models/ctr/7", 7)?;
//! assert!(artifact.is_loaded());
//! loader.unload(&mut artifact);
//! ```

mod artifact;
mod loader;

pub use artifact::{ArtifactState, ModelArtifact};
pub use loader::ModelLoader;
