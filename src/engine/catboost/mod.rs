//! Bundled engine for CatBoost JSON model exports.
//!
//! Supports symmetric trees over float features, which is what CatBoost
//! produces for numeric-only training data. Categorical and CTR splits are
//! rejected at load time.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use boosters_serving::engine::catboost::CatBoostEngine;
//! use boosters_serving::model::ModelLoader;
//!
//! let loader = ModelLoader::new(Arc::new(CatBoostEngine::default()));
//! let artifact = loader.load("/models/ctr/3", 3)?;
//! ```

mod forest;
mod json;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rayon::ThreadPool;

pub use forest::{CatBoostJsonError, ObliviousForest, DEFAULT_BLOCK_SIZE, MAX_DEPTH};
pub use json::{CatBoostJsonModel, NanValueTreatment};

use super::{EngineError, InferenceEngine};
use crate::utils::{thread_pool, Parallelism};

/// Engine handle: empty until a model file is loaded into it.
#[derive(Debug, Default)]
pub struct CatBoostModel {
    forest: Option<ObliviousForest>,
}

impl CatBoostModel {
    /// Loaded forest, if any.
    pub fn forest(&self) -> Option<&ObliviousForest> {
        self.forest.as_ref()
    }
}

/// Pure-Rust scorer for CatBoost JSON exports.
#[derive(Debug, Clone)]
pub struct CatBoostEngine {
    parallelism: Parallelism,
    block_size: usize,
    /// Set when an explicit thread count asked for its own pool.
    pool: Option<Arc<ThreadPool>>,
}

impl Default for CatBoostEngine {
    fn default() -> Self {
        Self::new(Parallelism::Sequential)
    }
}

impl CatBoostEngine {
    pub fn new(parallelism: Parallelism) -> Self {
        Self {
            parallelism,
            block_size: DEFAULT_BLOCK_SIZE,
            pool: None,
        }
    }

    /// Engine for a configured thread count.
    ///
    /// - 0 = auto (global rayon pool)
    /// - 1 = sequential
    /// - >1 = dedicated pool of exactly `n_threads` workers
    pub fn from_threads(n_threads: usize) -> Result<Self, EngineError> {
        let pool = thread_pool(n_threads)
            .map_err(|e| EngineError::new(format!("cannot build {n_threads}-thread pool: {e}")))?;
        Ok(Self {
            pool,
            ..Self::new(Parallelism::from_threads(n_threads))
        })
    }

    /// Rows scored together per work item. Default is 64.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    #[inline]
    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Workers available to one batch.
    pub fn n_threads(&self) -> usize {
        match (&self.pool, self.parallelism) {
            (Some(pool), _) => pool.current_num_threads(),
            (None, Parallelism::Sequential) => 1,
            (None, Parallelism::Parallel) => rayon::current_num_threads(),
        }
    }
}

impl InferenceEngine for CatBoostEngine {
    type Model = CatBoostModel;

    fn create(&self) -> Result<CatBoostModel, EngineError> {
        Ok(CatBoostModel::default())
    }

    fn load_from_file(&self, model: &mut CatBoostModel, path: &Path) -> Result<(), EngineError> {
        let file = File::open(path)
            .map_err(|e| EngineError::new(format!("cannot open {}: {e}", path.display())))?;
        let raw: CatBoostJsonModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EngineError::new(format!("malformed model JSON: {e}")))?;
        let forest = ObliviousForest::from_json(&raw).map_err(|e| EngineError::new(e.to_string()))?;
        model.forest = Some(forest);
        Ok(())
    }

    fn predict_flat(
        &self,
        model: &CatBoostModel,
        rows: &[&[f32]],
        n_features: usize,
        output: &mut [f64],
    ) -> Result<(), EngineError> {
        let forest = model
            .forest
            .as_ref()
            .ok_or_else(|| EngineError::new("no model loaded into handle"))?;
        let (parallelism, block_size) = (self.parallelism, self.block_size);
        match &self.pool {
            Some(pool) => pool.install(|| forest.predict_into(rows, n_features, output, parallelism, block_size)),
            None => forest.predict_into(rows, n_features, output, parallelism, block_size),
        }
    }
}
