//! Configuration for the zonal engine.

use mangrove_common::{AtlasError, AtlasResult};
use serde::{Deserialize, Serialize};

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Nominal reduction scale in metres when a request does not give one.
    pub default_scale: f64,

    /// Whether requests may coarsen the scale to stay within the pixel budget.
    pub default_best_effort: bool,

    /// Coast-to-mangrove buffer distance in metres.
    pub default_buffer_distance_m: f64,

    /// Pixel budget per reduction.
    pub max_pixels: u64,

    /// Upper bound on reductions in flight at once.
    pub max_concurrent_reductions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_scale: 30.0,
            default_best_effort: false,
            default_buffer_distance_m: 200.0,
            max_pixels: 10_000_000_000_000,
            max_concurrent_reductions: 8,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ANALYSIS_SCALE") {
            if let Ok(scale) = val.parse() {
                config.default_scale = scale;
            }
        }

        if let Ok(val) = std::env::var("ANALYSIS_BEST_EFFORT") {
            config.default_best_effort = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("ANALYSIS_BUFFER_DISTANCE_M") {
            if let Ok(distance) = val.parse() {
                config.default_buffer_distance_m = distance;
            }
        }

        // Accepts scientific notation such as "1e13"
        if let Ok(val) = std::env::var("ANALYSIS_MAX_PIXELS") {
            if let Ok(pixels) = val.parse::<f64>() {
                if pixels.is_finite() && pixels >= 1.0 {
                    config.max_pixels = pixels as u64;
                }
            }
        }

        if let Ok(val) = std::env::var("ANALYSIS_MAX_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.max_concurrent_reductions = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.default_scale > 0.0) {
            return Err("default_scale must be > 0".to_string());
        }

        if !(self.default_buffer_distance_m >= 0.0) {
            return Err("default_buffer_distance_m must be >= 0".to_string());
        }

        if self.max_pixels == 0 {
            return Err("max_pixels must be > 0".to_string());
        }

        if self.max_concurrent_reductions == 0 {
            return Err("max_concurrent_reductions must be > 0".to_string());
        }

        Ok(())
    }
}

/// Request-scoped parameters threaded through every analysis entry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Nominal scale of the reductions in metres.
    pub scale: f64,

    /// Allow a coarser effective scale instead of failing on large regions.
    pub best_effort: bool,

    /// Distance from mangrove pixels within which coast counts as covered.
    pub buffer_distance_m: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AnalysisParams {
    /// Parameters with the configured defaults.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            scale: config.default_scale,
            best_effort: config.default_best_effort,
            buffer_distance_m: config.default_buffer_distance_m,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn with_buffer_distance(mut self, buffer_distance_m: f64) -> Self {
        self.buffer_distance_m = buffer_distance_m;
        self
    }

    /// Reject parameters no reduction could honour.
    pub fn validate(&self) -> AtlasResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(AtlasError::invalid_parameter(
                "scale",
                format!("{} is not a positive number of metres", self.scale),
            ));
        }

        if !(self.buffer_distance_m.is_finite() && self.buffer_distance_m >= 0.0) {
            return Err(AtlasError::invalid_parameter(
                "buffer_distance_m",
                format!("{} must be a non-negative distance", self.buffer_distance_m),
            ));
        }

        Ok(())
    }
}
