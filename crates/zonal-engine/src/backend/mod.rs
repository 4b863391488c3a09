//! Raster backend trait and reduction request types.
//!
//! The engine never evaluates rasters itself. It builds a
//! [`ReductionRequest`] describing the image, the geometry and the reducer,
//! and submits it to a [`RasterBackend`]. Swapping the backend (an in-memory
//! store for tests and small catalogs, a remote processing service in
//! production) leaves every analysis untouched.

mod memory;

pub use memory::InMemoryBackend;

use std::sync::Arc;

use async_trait::async_trait;
use geo::MultiLineString;
use serde::{Deserialize, Serialize};

use crate::error::ReductionFault;
use crate::expr::RasterExpr;
use crate::types::Aoi;

/// What to compute over the sampled pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Reducer {
    /// Sum of value x pixel area (m²).
    AreaSum,
    /// Mean, population std-dev, min, p1, p25, median, p75, p99 and max.
    SummaryStats,
    /// Pixel counts in `steps` equal buckets over `[min, max)`.
    FixedHistogram { min: f64, max: f64, steps: usize },
    /// Geodesic length of the parts of `lines` whose underlying value is
    /// at most `max_value`.
    MaskedLength {
        lines: Arc<MultiLineString<f64>>,
        max_value: f64,
    },
}

impl Reducer {
    /// Label used in metrics and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::AreaSum => "area_sum",
            Reducer::SummaryStats => "summary_stats",
            Reducer::FixedHistogram { .. } => "fixed_histogram",
            Reducer::MaskedLength { .. } => "masked_length",
        }
    }
}

/// A fully described reduction, ready to submit.
#[derive(Debug, Clone)]
pub struct ReductionRequest {
    pub image: RasterExpr,
    pub geometry: Aoi,
    pub reducer: Reducer,
    /// Nominal scale in metres.
    pub scale: f64,
    pub best_effort: bool,
    pub max_pixels: u64,
}

/// Summary statistics of one sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub p1: f64,
    pub p25: f64,
    pub p75: f64,
    pub p99: f64,
    pub std: f64,
}

/// The value produced by a reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedValue {
    Sum(f64),
    Stats(SummaryStats),
    /// `(bucket_lower, count)` pairs in ascending order.
    Histogram(Vec<(f64, u64)>),
    /// Length in metres.
    Length(f64),
}

/// Outcome of a successful reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    pub value: ReducedValue,
    /// Scale actually used; coarser than requested under best effort.
    pub effective_scale: f64,
    /// Number of samples that contributed.
    pub pixel_count: u64,
}

impl Reduction {
    pub fn into_sum(self) -> Result<f64, ReductionFault> {
        match self.value {
            ReducedValue::Sum(v) => Ok(v),
            other => Err(unexpected("sum", &other)),
        }
    }

    pub fn into_stats(self) -> Result<SummaryStats, ReductionFault> {
        match self.value {
            ReducedValue::Stats(s) => Ok(s),
            other => Err(unexpected("stats", &other)),
        }
    }

    pub fn into_histogram(self) -> Result<Vec<(f64, u64)>, ReductionFault> {
        match self.value {
            ReducedValue::Histogram(h) => Ok(h),
            other => Err(unexpected("histogram", &other)),
        }
    }

    pub fn into_length(self) -> Result<f64, ReductionFault> {
        match self.value {
            ReducedValue::Length(l) => Ok(l),
            other => Err(unexpected("length", &other)),
        }
    }
}

fn unexpected(wanted: &str, got: &ReducedValue) -> ReductionFault {
    ReductionFault::backend(format!("expected a {} reduction, got {:?}", wanted, got))
}

/// Trait for services that evaluate reduction requests.
#[async_trait]
pub trait RasterBackend: Send + Sync {
    /// Evaluate one reduction.
    ///
    /// # Arguments
    /// * `request` - Image, geometry, reducer and resource policy
    ///
    /// # Returns
    /// * `Reduction` on success
    /// * `ReductionFault::EmptyReduction` when no unmasked sample falls in the geometry
    /// * `ReductionFault::RegionTooLarge` when the pixel budget is exceeded without best effort
    async fn reduce(&self, request: &ReductionRequest) -> Result<Reduction, ReductionFault>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}
