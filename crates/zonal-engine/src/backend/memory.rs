//! In-memory raster backend.
//!
//! Samples a regular lon/lat grid aligned to multiples of the sample cell
//! (`scale / 111 320` degrees). A sample counts when its centre lies inside
//! the geometry and the expression is unmasked there. Rows are sampled in
//! parallel on the rayon pool inside a blocking tokio task.

use std::sync::Arc;

use async_trait::async_trait;
use geo::{BoundingRect, Contains, Coord, HaversineLength, Line, LineString, Point, Rect};
use rayon::prelude::*;
use tracing::debug;

use super::{RasterBackend, ReducedValue, Reducer, Reduction, ReductionRequest, SummaryStats};
use crate::error::ReductionFault;
use crate::expr::BoundExpr;
use crate::types::{cell_area_m2, Aoi, RasterStore, METERS_PER_DEGREE};

/// Backend evaluating requests against rasters held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    store: Arc<RasterStore>,
}

impl InMemoryBackend {
    pub fn new(store: Arc<RasterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RasterStore {
        &self.store
    }
}

#[async_trait]
impl RasterBackend for InMemoryBackend {
    async fn reduce(&self, request: &ReductionRequest) -> Result<Reduction, ReductionFault> {
        let store = Arc::clone(&self.store);
        let request = request.clone();

        tokio::task::spawn_blocking(move || reduce_blocking(&store, &request))
            .await
            .map_err(|e| ReductionFault::backend(format!("reduction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

fn reduce_blocking(store: &RasterStore, request: &ReductionRequest) -> Result<Reduction, ReductionFault> {
    let expr = request.image.bind(store)?;
    let bounds = request
        .geometry
        .bounding_rect()
        .ok_or(ReductionFault::EmptyReduction)?;
    let grid = SampleGrid::fit(bounds, request.scale, request.max_pixels, request.best_effort)?;

    debug!(
        reducer = request.reducer.name(),
        requested_scale = request.scale,
        effective_scale = grid.scale,
        cells = grid.cell_count(),
        "Sampling geometry"
    );

    let (value, pixel_count) = match &request.reducer {
        Reducer::MaskedLength { lines, max_value } => {
            let (length, pieces) =
                masked_length(&expr, &request.geometry, &grid, &lines.0, *max_value);
            if pieces == 0 {
                return Err(ReductionFault::EmptyReduction);
            }
            (ReducedValue::Length(length), pieces)
        }
        Reducer::AreaSum => {
            let samples = grid.non_empty_samples(&expr, &request.geometry)?;
            let sum = samples.iter().map(|s| s.value * s.area).sum();
            (ReducedValue::Sum(sum), samples.len() as u64)
        }
        Reducer::SummaryStats => {
            let samples = grid.non_empty_samples(&expr, &request.geometry)?;
            let n = samples.len() as u64;
            let values = samples.into_iter().map(|s| s.value).collect();
            (ReducedValue::Stats(summarize(values)), n)
        }
        Reducer::FixedHistogram { min, max, steps } => {
            let samples = grid.non_empty_samples(&expr, &request.geometry)?;
            let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
            let counts = bucket_counts(&values, *min, *max, *steps)?;
            (ReducedValue::Histogram(counts), samples.len() as u64)
        }
    };

    Ok(Reduction {
        value,
        effective_scale: grid.scale,
        pixel_count,
    })
}

/// One included sample.
#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    /// Ground area of the sample cell in m².
    area: f64,
}

/// Sample cells covering a bounding box.
#[derive(Debug, Clone, Copy)]
struct SampleGrid {
    /// Effective scale in metres.
    scale: f64,
    /// Cell size in degrees.
    cell: f64,
    col0: i64,
    col1: i64,
    row0: i64,
    row1: i64,
}

impl SampleGrid {
    /// Fit a grid over `bounds`, coarsening under best effort until it fits the budget.
    fn fit(bounds: Rect<f64>, scale: f64, max_pixels: u64, best_effort: bool) -> Result<Self, ReductionFault> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ReductionFault::backend(format!("invalid scale {}", scale)));
        }
        if max_pixels == 0 {
            return Err(ReductionFault::backend("pixel budget is zero"));
        }

        let mut scale = scale;
        loop {
            let grid = Self::covering(bounds, scale);
            let pixels = grid.cell_count();
            if pixels <= max_pixels {
                return Ok(grid);
            }
            if !best_effort {
                return Err(ReductionFault::RegionTooLarge { pixels, max_pixels });
            }
            scale *= 2.0;
        }
    }

    fn covering(bounds: Rect<f64>, scale: f64) -> Self {
        let cell = scale / METERS_PER_DEGREE;
        let col0 = (bounds.min().x / cell).floor() as i64;
        let row0 = (bounds.min().y / cell).floor() as i64;
        let col1 = ((bounds.max().x / cell).ceil() as i64).max(col0 + 1);
        let row1 = ((bounds.max().y / cell).ceil() as i64).max(row0 + 1);

        Self {
            scale,
            cell,
            col0,
            col1,
            row0,
            row1,
        }
    }

    fn cell_count(&self) -> u64 {
        ((self.col1 - self.col0) as u64).saturating_mul((self.row1 - self.row0) as u64)
    }

    /// Included samples, or `EmptyReduction` when there are none.
    fn non_empty_samples(&self, expr: &BoundExpr<'_>, aoi: &Aoi) -> Result<Vec<Sample>, ReductionFault> {
        let samples = self.collect_samples(expr, aoi);
        if samples.is_empty() {
            return Err(ReductionFault::EmptyReduction);
        }
        Ok(samples)
    }

    fn collect_samples(&self, expr: &BoundExpr<'_>, aoi: &Aoi) -> Vec<Sample> {
        let cell = self.cell;
        let (col0, col1) = (self.col0, self.col1);
        let aoi = aoi.as_ref();

        (self.row0..self.row1)
            .into_par_iter()
            .flat_map_iter(|row| {
                let south = row as f64 * cell;
                let lat = south + cell / 2.0;
                let area = cell_area_m2(south, south + cell, cell);

                (col0..col1).filter_map(move |col| {
                    let lon = (col as f64 + 0.5) * cell;
                    if !aoi.contains(&Point::new(lon, lat)) {
                        return None;
                    }
                    expr.sample(lon, lat).map(|value| Sample { value, area })
                })
            })
            .collect()
    }
}

/// Length of line pieces inside the geometry whose value is at most `max_value`.
///
/// Returns the length in metres and the number of sampled (unmasked) pieces.
fn masked_length(
    expr: &BoundExpr<'_>,
    aoi: &Aoi,
    grid: &SampleGrid,
    lines: &[LineString<f64>],
    max_value: f64,
) -> (f64, u64) {
    let aoi = aoi.as_ref();

    lines
        .par_iter()
        .map(|line| {
            let mut length = 0.0;
            let mut pieces = 0u64;

            for segment in line.lines() {
                let dx = segment.end.x - segment.start.x;
                let dy = segment.end.y - segment.start.y;
                let n = ((dx.hypot(dy) / grid.cell).ceil() as usize).max(1);

                for k in 0..n {
                    let at = |t: f64| Coord {
                        x: segment.start.x + dx * t,
                        y: segment.start.y + dy * t,
                    };
                    let a = at(k as f64 / n as f64);
                    let b = at((k + 1) as f64 / n as f64);
                    let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);

                    if !aoi.contains(&mid) {
                        continue;
                    }
                    if let Some(value) = expr.sample(mid.x(), mid.y()) {
                        pieces += 1;
                        if value <= max_value {
                            length += Line::new(a, b).haversine_length();
                        }
                    }
                }
            }

            (length, pieces)
        })
        .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
}

/// Summary statistics over one sample set; `values` must not be empty.
fn summarize(mut values: Vec<f64>) -> SummaryStats {
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

    SummaryStats {
        max: values[values.len() - 1],
        mean,
        median: percentile(&values, 50.0),
        min: values[0],
        p1: percentile(&values, 1.0),
        p25: percentile(&values, 25.0),
        p75: percentile(&values, 75.0),
        p99: percentile(&values, 99.0),
        std: variance.sqrt(),
    }
}

/// Linear-interpolated percentile of sorted, non-empty values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Counts per bucket over `[min, max)`; values outside are ignored.
fn bucket_counts(values: &[f64], min: f64, max: f64, steps: usize) -> Result<Vec<(f64, u64)>, ReductionFault> {
    if steps == 0 || !(max > min) {
        return Err(ReductionFault::backend(format!(
            "invalid histogram: min={} max={} steps={}",
            min, max, steps
        )));
    }

    let width = (max - min) / steps as f64;
    let mut counts = vec![0u64; steps];
    for &v in values {
        if v >= min && v < max {
            let idx = (((v - min) / width).floor() as usize).min(steps - 1);
            counts[idx] += 1;
        }
    }

    Ok(counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + i as f64 * width, count))
        .collect())
}
