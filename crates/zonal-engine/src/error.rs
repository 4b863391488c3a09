//! Error types for zonal reductions.

use mangrove_common::AtlasError;
use thiserror::Error;

/// Faults a single reduction cell (one metric at one timestamp) can raise.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReductionFault {
    /// No raster in the series for the requested date.
    #[error("no raster available for {0}")]
    MissingTimestamp(String),

    /// The geometry contains no unmasked samples at the requested scale.
    #[error("reduction produced no samples")]
    EmptyReduction,

    /// The geometry needs more samples than the pixel budget allows.
    #[error("region too large: {pixels} pixels exceeds budget of {max_pixels}")]
    RegionTooLarge { pixels: u64, max_pixels: u64 },

    /// Any other failure reported by the raster backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ReductionFault {
    /// Create a Backend fault.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingTimestamp(_) => "missing_timestamp",
            Self::EmptyReduction => "empty_reduction",
            Self::RegionTooLarge { .. } => "region_too_large",
            Self::Backend(_) => "backend",
        }
    }

    /// Fatal faults abort the metric instead of resolving to a fallback value.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RegionTooLarge { .. })
    }
}

/// Errors that abort a metric, a catalog lookup or engine setup.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A fatal reduction fault.
    #[error("reduction failed: {0}")]
    Reduction(#[from] ReductionFault),

    /// A metric could not be computed because one of its inputs failed.
    #[error("'{metric}' depends on a failed input: {message}")]
    Dependency { metric: String, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catalog lookup or manifest error.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Dataset not found.
    #[error("dataset not found: {0}")]
    NotFound(String),

    /// Malformed raster data.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Request validation and result assembly errors.
    #[error(transparent)]
    Atlas(#[from] AtlasError),
}

impl EngineError {
    /// Create a Catalog error.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create an InvalidRaster error.
    pub fn invalid_raster(msg: impl Into<String>) -> Self {
        Self::InvalidRaster(msg.into())
    }

    /// Create a Dependency error.
    pub fn dependency(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dependency {
            metric: metric.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Catalog(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Catalog(format!("YAML error: {}", err))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
