//! Error types for mangrove analysis services.

use thiserror::Error;

/// Result type alias using AtlasError.
pub type AtlasResult<T> = Result<T, AtlasError>;

/// Primary error type at the analysis boundary.
#[derive(Debug, Error)]
pub enum AtlasError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid histogram specification: {0}")]
    InvalidHistogramSpec(String),

    // === Data Errors ===
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Failed to read data: {0}")]
    DataReadError(String),

    // === Result Assembly Errors ===
    #[error("Duplicate result short_name: {0}")]
    DuplicateResult(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AtlasError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidHistogramSpec error.
    pub fn invalid_histogram(msg: impl Into<String>) -> Self {
        Self::InvalidHistogramSpec(msg.into())
    }

    /// Whether the error was caused by the request rather than the data or the engine.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            AtlasError::MissingParameter(_)
                | AtlasError::InvalidParameter { .. }
                | AtlasError::InvalidTime(_)
                | AtlasError::InvalidGeometry(_)
                | AtlasError::FeatureNotFound(_)
        )
    }
}

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::DataReadError(err.to_string())
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::DataReadError(format!("JSON error: {}", err))
    }
}
