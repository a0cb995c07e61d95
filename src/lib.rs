//! boosters-serving: request-path core for serving gradient-boosted tree models.
//!
//! A request carries sparse feature vectors. They are materialized into a
//! dense row-major matrix, scored by an [`InferenceEngine`](engine::InferenceEngine)
//! in one batched call, and returned stamped with the model name and the
//! version that served them.
//!
//! # Module Structure
//!
//! - [`model`]: model artifacts, their lifecycle and the [`ModelLoader`]
//! - [`data`]: sparse request features and dense materialization
//! - [`inference`]: [`Predictor`] and the response builder
//! - [`engine`]: engine abstraction and the bundled CatBoost JSON engine
//! - [`registry`]: host-owned map of published model versions
//! - [`service`]: request entry point over the registry
//! - [`config`], [`metrics`], [`error`]: configuration, latency recording, errors
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use boosters_serving::{
//!     CatBoostEngine, LatencyRecorder, ModelLoader, PredictRequest, PredictionService,
//!     Predictor, ServableRegistry, ServingConfig,
//! };
//!
//! let config = ServingConfig::default();
//! let loader = ModelLoader::from_config(Arc::new(CatBoostEngine::default()), &config);
//! let registry = Arc::new(ServableRegistry::new());
//! registry.load_and_publish(&loader, "ctr", "/models/ctr/7", 7)?;
//!
//! let latency = Arc::new(LatencyRecorder::new("gbdt_predict_latency_us")?);
//! let service = PredictionService::new(registry, Predictor::from_config(latency, &config), config);
//! let response = service.predict(&request)?;
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod service;
pub mod testing;
pub mod utils;

pub use config::ServingConfig;
pub use data::{DenseMatrix, FeatureBatch, Materializer, SparseFeatureVector};
pub use engine::catboost::CatBoostEngine;
pub use engine::{EngineError, InferenceEngine, NativeHandle};
pub use error::{ErrorCategory, Result, ServingError, Status};
pub use inference::{build_response, ModelSpec, PredictResponse, PredictionBatch, Predictor};
pub use metrics::{LatencyRecorder, LatencySink, NoopLatencySink};
pub use model::{ArtifactState, ModelArtifact, ModelLoader};
pub use registry::{ServableHandle, ServableRegistry};
pub use service::{PredictRequest, PredictionService};
pub use utils::Parallelism;
