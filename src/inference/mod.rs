//! Request-path inference: predictor and response builder.
//!
//! - [`Predictor`]: materializes a [`FeatureBatch`](crate::data::FeatureBatch),
//!   makes one batched engine call and times it
//! - [`build_response`]: stamps predictions with model name and version

mod output;
mod predictor;

pub use output::{
    build_response, DataType, ModelSpec, PredictResponse, PredictionBatch, TensorProto,
};
pub use predictor::Predictor;
