//! Error taxonomy for the serving path.
//!
//! Every failure surfaces as a [`ServingError`] carrying one [`ErrorCategory`]
//! and a human readable message. At the host boundary the error is flattened
//! into a [`Status`], which has no numeric codes beyond the category tag.

use serde::{Deserialize, Serialize};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ServingError>;

// =============================================================================
// ErrorCategory
// =============================================================================

/// Category tag attached to every error that leaves the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Artifact file or requested servable does not exist.
    NotFound,
    /// The engine rejected the artifact.
    LoadFailure,
    /// Malformed request.
    InvalidArgument,
    /// The artifact is not in a state that allows the operation.
    FailedPrecondition,
    /// The engine failed on a well-formed batch.
    InferenceFailure,
    /// Resource exhaustion or allocation failure.
    InternalError,
}

impl ErrorCategory {
    /// Stable snake_case name of the category.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::LoadFailure => "load_failure",
            Self::InvalidArgument => "invalid_argument",
            Self::FailedPrecondition => "failed_precondition",
            Self::InferenceFailure => "inference_failure",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ServingError
// =============================================================================

/// Errors produced by loading, materialization and prediction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServingError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to load model: {0}")]
    LoadFailure(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("prediction failed: {0}")]
    InferenceFailure(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServingError {
    /// Category tag of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::LoadFailure(_) => ErrorCategory::LoadFailure,
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::FailedPrecondition(_) => ErrorCategory::FailedPrecondition,
            Self::InferenceFailure(_) => ErrorCategory::InferenceFailure,
            Self::Internal(_) => ErrorCategory::InternalError,
        }
    }

    /// Message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(m)
            | Self::LoadFailure(m)
            | Self::InvalidArgument(m)
            | Self::FailedPrecondition(m)
            | Self::InferenceFailure(m)
            | Self::Internal(m) => m,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

// =============================================================================
// Status
// =============================================================================

/// Boundary representation of an error: category tag plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&ServingError> for Status {
    fn from(err: &ServingError) -> Self {
        Self {
            category: err.category(),
            message: err.message().to_owned(),
        }
    }
}

impl From<ServingError> for Status {
    fn from(err: ServingError) -> Self {
        Status::from(&err)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}
