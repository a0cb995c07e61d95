//! Serving configuration with builder pattern.
//!
//! [`ServingConfig`] collects the fixed names and limits of the serving path.
//! It uses the `bon` crate for builder generation, validates on `build()`, and
//! can also be read from JSON where every field is optional.
//!
//! # Example
//!
//! ```
//! use boosters_serving::config::ServingConfig;
//!
//! let config = ServingConfig::builder()
//!     .model_file_name("model.json")
//!     .max_dense_cells(1 << 20)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.output_key, "predictions");
//! ```

use std::io::Read;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::data::DEFAULT_MAX_DENSE_CELLS;
use crate::utils::Parallelism;

/// File name of the model inside each version directory.
pub const DEFAULT_MODEL_FILE_NAME: &str = "catboost.json";

/// Request input carrying the sparse features.
pub const DEFAULT_FEATURE_INPUT_NAME: &str = "catboost_features";

/// Response output carrying the prediction tensor.
pub const DEFAULT_OUTPUT_KEY: &str = "predictions";

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A name field is empty.
    EmptyName(&'static str),
    /// The model file name contains a path separator.
    InvalidFileName(String),
    /// The dense cell cap must be at least 1.
    InvalidMaxDenseCells,
    /// The JSON source could not be parsed.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(field) => write!(f, "{} must not be empty", field),
            Self::InvalidFileName(name) => {
                write!(f, "model_file_name must be a bare file name, got {:?}", name)
            }
            Self::InvalidMaxDenseCells => write!(f, "max_dense_cells must be at least 1"),
            Self::Parse(msg) => write!(f, "invalid serving config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// ServingConfig
// =============================================================================

/// Names and limits used by the loader, predictor and response builder.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
#[serde(default)]
pub struct ServingConfig {
    /// Artifact file inside each version directory. Default: `catboost.json`.
    #[builder(into, default = DEFAULT_MODEL_FILE_NAME.to_owned())]
    pub model_file_name: String,

    /// Request input holding the sparse features. Default: `catboost_features`.
    #[builder(into, default = DEFAULT_FEATURE_INPUT_NAME.to_owned())]
    pub feature_input_name: String,

    /// Response output key for the prediction tensor. Default: `predictions`.
    #[builder(into, default = DEFAULT_OUTPUT_KEY.to_owned())]
    pub output_key: String,

    /// Largest `rows * cols` a single request may materialize. Default: 2^28.
    #[builder(default = DEFAULT_MAX_DENSE_CELLS)]
    pub max_dense_cells: usize,

    /// Engine threads: 0 = auto (global rayon pool), 1 = sequential,
    /// >1 = dedicated pool of that many threads. Default: 0.
    #[builder(default)]
    pub n_threads: usize,
}

/// Custom finishing function that validates the config.
impl<S: serving_config_builder::IsComplete> ServingConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a name is empty, the model file name is not
    /// a bare file name, or `max_dense_cells == 0`.
    pub fn build(self) -> Result<ServingConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ServingConfig {
    /// Read and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parallelism resolved from `n_threads`.
    pub fn parallelism(&self) -> Parallelism {
        Parallelism::from_threads(self.n_threads)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("model_file_name", &self.model_file_name),
            ("feature_input_name", &self.feature_input_name),
            ("output_key", &self.output_key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::EmptyName(field));
            }
        }

        if self.model_file_name.contains(['/', '\\']) || self.model_file_name == ".." {
            return Err(ConfigError::InvalidFileName(self.model_file_name.clone()));
        }

        if self.max_dense_cells == 0 {
            return Err(ConfigError::InvalidMaxDenseCells);
        }

        Ok(())
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config is valid")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServingConfig::default();
        assert_eq!(config.model_file_name, DEFAULT_MODEL_FILE_NAME);
        assert_eq!(config.feature_input_name, DEFAULT_FEATURE_INPUT_NAME);
        assert_eq!(config.output_key, DEFAULT_OUTPUT_KEY);
        assert_eq!(config.max_dense_cells, DEFAULT_MAX_DENSE_CELLS);
    }

    #[test]
    fn test_empty_output_key_rejected() {
        let result = ServingConfig::builder().output_key("").build();
        assert_eq!(result, Err(ConfigError::EmptyName("output_key")));
    }

    #[test]
    fn test_nested_file_name_rejected() {
        let result = ServingConfig::builder().model_file_name("sub/model.json").build();
        assert!(matches!(result, Err(ConfigError::InvalidFileName(_))));
    }

    #[test]
    fn test_zero_cell_cap_rejected() {
        let result = ServingConfig::builder().max_dense_cells(0).build();
        assert_eq!(result, Err(ConfigError::InvalidMaxDenseCells));
    }

    #[test]
    fn test_json_fills_missing_fields() {
        let config = ServingConfig::from_json_reader(r#"{"n_threads": 1}"#.as_bytes()).unwrap();
        assert_eq!(config.n_threads, 1);
        assert_eq!(config.parallelism(), Parallelism::Sequential);
        assert_eq!(config.output_key, DEFAULT_OUTPUT_KEY);
    }

    #[test]
    fn test_json_is_validated() {
        let result = ServingConfig::from_json_reader(r#"{"feature_input_name": ""}"#.as_bytes());
        assert_eq!(result, Err(ConfigError::EmptyName("feature_input_name")));
    }
}
