//! Test case loading utilities for integration tests.
//!
//! For assertion helpers and the engine double, use `boosters_serving::testing`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use boosters_serving::config::DEFAULT_MODEL_FILE_NAME;
use boosters_serving::testing::write_model_dir;

// =============================================================================
// Test Case Loading
// =============================================================================

/// Base directory for test cases.
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

/// Directory for CatBoost JSON test cases.
pub fn catboost_test_cases_dir() -> PathBuf {
    test_cases_dir().join("catboost")
}

/// Load a JSON file and deserialize it.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> T {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

/// Expected predictions for a test case.
#[derive(Debug, Deserialize)]
pub struct Expected {
    pub predictions: Vec<f64>,
}

/// Raw model JSON of test case `name`.
pub fn model_text(name: &str) -> String {
    let path = catboost_test_cases_dir().join(format!("{name}.model.json"));
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

/// Lay out test case `name` as version `version` under `root`.
pub fn install_case(root: &Path, name: &str, version: i64) -> PathBuf {
    write_model_dir(root, version, DEFAULT_MODEL_FILE_NAME, &model_text(name))
}

pub fn load_request<T: DeserializeOwned>(name: &str) -> T {
    load_json(&catboost_test_cases_dir().join(format!("{name}.request.json")))
}

pub fn load_expected(name: &str) -> Expected {
    load_json(&catboost_test_cases_dir().join(format!("{name}.expected.json")))
}
