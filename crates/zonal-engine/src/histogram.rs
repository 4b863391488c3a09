//! Fixed-width histograms with legend-group regrouping.
//!
//! A [`HistogramSpec`] fixes the bucket layout (`min`, `max`, `step`) and the
//! coarser legend groups used for display. Reductions that yield no samples
//! resolve to [`HistogramSpec::null_histogram`], a zero-filled histogram of
//! identical shape, so partial raster coverage never breaks a combined
//! request. All break, count and group arithmetic stays in plain numeric
//! vectors.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use mangrove_common::{format_timestamp, AtlasError, AtlasResult, ColorMapEntry, HexColor, StyleRamp};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::backend::Reducer;
use crate::collection::ImageCollection;
use crate::config::AnalysisParams;
use crate::error::{ReductionFault, Result};
use crate::executor::{or_fallback, ReductionExecutor};
use crate::legend::Legend;
use crate::results::{MetricResult, Props};
use crate::types::Aoi;

/// Separator between the bounds in a group label ("700--1400").
pub const GROUP_LABEL_SEPARATOR: &str = "--";

// Relative tolerance when checking that step divides the range
const DIVISIBILITY_TOLERANCE: f64 = 1e-9;

/// Bucket layout and legend groups of a fixed histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSpec {
    min: f64,
    max: f64,
    step: f64,
    n_breaks: usize,
    group_lower: Vec<f64>,
    group_upper: Vec<f64>,
    group_colors: Vec<HexColor>,
}

impl HistogramSpec {
    /// Build and validate a spec.
    ///
    /// # Errors
    /// `InvalidHistogramSpec` when `step` does not divide `max - min`, when
    /// the group vectors differ in length or are empty, when a group is empty
    /// (`lower >= upper`), or when the groups overlap, leave gaps between one
    /// another, or start above `min`. Groups may end short of or beyond `max`.
    pub fn new(
        min: f64,
        max: f64,
        step: f64,
        group_lower: Vec<f64>,
        group_upper: Vec<f64>,
        group_colors: Vec<HexColor>,
    ) -> AtlasResult<Self> {
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(AtlasError::invalid_histogram(format!(
                "max ({}) must be greater than min ({})",
                max, min
            )));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(AtlasError::invalid_histogram(format!("step {} must be positive", step)));
        }

        let buckets = (max - min) / step;
        let n_breaks = buckets.round();
        if n_breaks < 1.0 || (buckets - n_breaks).abs() > DIVISIBILITY_TOLERANCE * n_breaks.max(1.0) {
            return Err(AtlasError::invalid_histogram(format!(
                "step {} does not divide the range [{}, {}]",
                step, min, max
            )));
        }

        if group_lower.is_empty() {
            return Err(AtlasError::invalid_histogram("at least one legend group is required"));
        }
        if group_lower.len() != group_upper.len() || group_lower.len() != group_colors.len() {
            return Err(AtlasError::invalid_histogram(format!(
                "group_lower ({}), group_upper ({}) and group_colors ({}) must have equal lengths",
                group_lower.len(),
                group_upper.len(),
                group_colors.len()
            )));
        }

        let mut bounds: Vec<(f64, f64)> = group_lower
            .iter()
            .copied()
            .zip(group_upper.iter().copied())
            .collect();
        if let Some((lower, upper)) = bounds.iter().find(|(l, u)| !(l < u)) {
            return Err(AtlasError::invalid_histogram(format!(
                "group [{}, {}) is empty",
                lower, upper
            )));
        }

        bounds.sort_by(|a, b| a.0.total_cmp(&b.0));
        if bounds[0].0 > min {
            return Err(AtlasError::invalid_histogram(format!(
                "groups start at {} and do not cover min {}",
                bounds[0].0, min
            )));
        }
        for pair in bounds.windows(2) {
            let (prev_upper, next_lower) = (pair[0].1, pair[1].0);
            if (prev_upper - next_lower).abs() > DIVISIBILITY_TOLERANCE * step {
                return Err(AtlasError::invalid_histogram(format!(
                    "groups ending at {} and starting at {} {}",
                    prev_upper,
                    next_lower,
                    if prev_upper > next_lower { "overlap" } else { "leave a gap" }
                )));
            }
        }

        Ok(Self {
            min,
            max,
            step,
            n_breaks: n_breaks as usize,
            group_lower,
            group_upper,
            group_colors,
        })
    }

    /// Spec using a legend's groups.
    pub fn from_legend(min: f64, max: f64, step: f64, legend: &Legend) -> AtlasResult<Self> {
        Self::new(
            min,
            max,
            step,
            legend.group_lower.clone(),
            legend.group_upper.clone(),
            legend.group_colors.clone(),
        )
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn n_breaks(&self) -> usize {
        self.n_breaks
    }

    /// Lower edge of every bucket.
    pub fn breaks_lower(&self) -> Vec<f64> {
        (0..self.n_breaks)
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }

    /// `"lower--upper"` label per group.
    pub fn group_labels(&self) -> Vec<String> {
        self.group_lower
            .iter()
            .zip(&self.group_upper)
            .map(|(l, u)| format!("{}{}{}", format_bound(*l), GROUP_LABEL_SEPARATOR, format_bound(*u)))
            .collect()
    }

    /// Group bounds as `(lower, upper)` pairs in declaration order.
    pub fn group_bounds(&self) -> Vec<(f64, f64)> {
        self.group_lower
            .iter()
            .copied()
            .zip(self.group_upper.iter().copied())
            .collect()
    }

    /// The reducer that produces this spec's buckets.
    pub fn reducer(&self) -> Reducer {
        Reducer::FixedHistogram {
            min: self.min,
            max: self.max,
            steps: self.n_breaks,
        }
    }

    /// Zero-filled histogram of this spec's shape.
    pub fn null_histogram(&self) -> FixedHistogram {
        FixedHistogram {
            breaks_lower: self.breaks_lower(),
            values: vec![0; self.n_breaks],
            n_breaks: self.n_breaks,
            min: self.min,
            max: self.max,
            step: self.step,
            group_lower: self.group_lower.clone(),
            group_upper: self.group_upper.clone(),
            group_colors: self.group_colors.clone(),
            group_labels: self.group_labels(),
            group_values: vec![0; self.group_lower.len()],
        }
    }

    /// Histogram filled from reducer `(bucket_lower, count)` pairs.
    ///
    /// Counts are placed by the bucket their lower edge falls in; pairs
    /// outside the layout are dropped. Group values are recomputed from the
    /// filled buckets.
    pub fn histogram_from_counts(&self, counts: &[(f64, u64)]) -> FixedHistogram {
        let mut hist = self.null_histogram();

        for &(lower, count) in counts {
            let idx = ((lower - self.min) / self.step).round();
            if idx >= 0.0 && (idx as usize) < self.n_breaks {
                hist.values[idx as usize] += count;
            }
        }

        hist.group_values = group_sums(&hist.breaks_lower, &hist.values, &self.group_bounds());
        hist
    }
}

/// Integral bounds print without a fractional part.
fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Sum bucket values per group over half-open `[lower, upper)` break ranges.
///
/// ```
/// use zonal_engine::histogram::group_sums;
///
/// let sums = group_sums(&[0.0, 10.0, 20.0, 30.0], &[1, 2, 3, 4], &[(0.0, 20.0), (20.0, 40.0)]);
/// assert_eq!(sums, vec![3, 7]);
/// ```
pub fn group_sums(breaks: &[f64], values: &[u64], bounds: &[(f64, f64)]) -> Vec<u64> {
    bounds
        .iter()
        .map(|&(lower, upper)| {
            breaks
                .iter()
                .zip(values)
                .filter(|(b, _)| lower <= **b && **b < upper)
                .map(|(_, v)| *v)
                .sum()
        })
        .collect()
}

/// A fixed histogram with its legend groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedHistogram {
    pub breaks_lower: Vec<f64>,
    pub values: Vec<u64>,
    pub n_breaks: usize,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub group_lower: Vec<f64>,
    pub group_upper: Vec<f64>,
    pub group_colors: Vec<HexColor>,
    pub group_labels: Vec<String>,
    pub group_values: Vec<u64>,
}

impl FixedHistogram {
    /// Total count over all buckets.
    pub fn total(&self) -> u64 {
        self.values.iter().sum()
    }

    /// Whether every bucket is empty.
    pub fn is_null(&self) -> bool {
        self.values.iter().all(|v| *v == 0)
    }

    /// Colour ramp with one entry per legend group, ordered by group_lower.
    pub fn to_style_ramp(&self) -> StyleRamp {
        StyleRamp::new(
            self.group_lower
                .iter()
                .zip(&self.group_labels)
                .zip(&self.group_colors)
                .map(|((lower, label), color)| ColorMapEntry {
                    quantity: *lower,
                    label: label.clone(),
                    color: color.clone(),
                })
                .collect(),
        )
    }
}

/// Render a histogram's legend groups as an SLD colour-map style string.
pub fn to_style_ramp(histogram: &FixedHistogram) -> String {
    histogram.to_style_ramp().to_sld()
}

/// Per-timestamp fixed histograms of the first band over `aoi`.
///
/// Timestamps without a raster, or whose reduction has no samples, resolve to
/// the zero-filled histogram of `spec`. A region too large for the pixel budget fails
/// the whole metric.
#[instrument(skip_all, fields(short_name = %props.short_name))]
pub async fn fixed_histogram(
    executor: &ReductionExecutor,
    series: &ImageCollection,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    props: Props,
    spec: &HistogramSpec,
    params: &AnalysisParams,
) -> Result<MetricResult<FixedHistogram>> {
    let short_name = props.short_name.as_str();

    let cells = timestamps.iter().map(|timestamp| async move {
        let label = format_timestamp(timestamp);
        let outcome = executor
            .reduce_image(series.first_on(timestamp), &label, aoi, spec.reducer(), params)
            .await
            .and_then(|reduction| reduction.into_histogram())
            .map(|counts| spec.histogram_from_counts(&counts));
        or_fallback(outcome, short_name, &label, || spec.null_histogram())
    });

    let values = join_all(cells)
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, ReductionFault>>()?;

    info!(timestamps = values.len(), "Fixed histogram complete");
    Ok(MetricResult::new(props, values, timestamps.to_vec(), params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors(hex: &[&str]) -> Vec<HexColor> {
        hex.iter().map(|h| HexColor::parse(h).unwrap()).collect()
    }

    fn example_spec() -> HistogramSpec {
        HistogramSpec::new(
            0.0,
            100.0,
            10.0,
            vec![0.0, 50.0],
            vec![50.0, 100.0],
            colors(&["#aaa", "#bbb"]),
        )
        .unwrap()
    }

    #[test]
    fn test_null_histogram_shape() {
        let hist = example_spec().null_histogram();
        assert_eq!(
            hist.breaks_lower,
            vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]
        );
        assert_eq!(hist.values, vec![0; 10]);
        assert_eq!(hist.n_breaks, 10);
        assert_eq!(hist.group_labels, vec!["0--50", "50--100"]);
        assert_eq!(hist.group_values, vec![0, 0]);
        assert!(hist.is_null());
    }

    #[test]
    fn test_null_histogram_length_matches_bucket_count() {
        for (min, max, step) in [(0.0, 1000.0, 10.0), (0.0, 100.0, 1.0), (0.0, 5000.0, 50.0), (-1.0, 1.0, 0.1)] {
            let spec = HistogramSpec::new(min, max, step, vec![min], vec![max], colors(&["#000"])).unwrap();
            let hist = spec.null_histogram();
            let expected = ((max - min) / step).round() as usize;
            assert_eq!(hist.breaks_lower.len(), expected);
            assert_eq!(hist.values.len(), expected);
            assert!(hist.values.iter().all(|v| *v == 0));
        }
    }

    #[test]
    fn test_group_sums_half_open() {
        let sums = group_sums(&[0.0, 10.0, 20.0, 30.0], &[1, 2, 3, 4], &[(0.0, 20.0), (20.0, 40.0)]);
        assert_eq!(sums, vec![3, 7]);
    }

    #[test]
    fn test_group_values_bounded_by_total() {
        // groups end at 65 while buckets run to 100
        let spec = HistogramSpec::new(
            0.0,
            100.0,
            1.0,
            vec![0.0, 13.0, 26.0, 39.0, 52.0],
            vec![13.0, 26.0, 39.0, 52.0, 65.0],
            colors(&["#C9BB42", "#8BA205", "#428710", "#0A6624", "#103C1F"]),
        )
        .unwrap();
        let counts: Vec<(f64, u64)> = (0..100).map(|i| (i as f64, 1)).collect();
        let hist = spec.histogram_from_counts(&counts);

        assert_eq!(hist.total(), 100);
        assert_eq!(hist.group_values, vec![13; 5]);
        assert!(hist.group_values.iter().sum::<u64>() <= hist.total());
    }

    #[test]
    fn test_group_values_equal_total_when_tiling() {
        let hist = example_spec().histogram_from_counts(&[(0.0, 4), (40.0, 1), (50.0, 2), (90.0, 3)]);
        assert_eq!(hist.values, vec![4, 0, 0, 0, 1, 2, 0, 0, 0, 3]);
        assert_eq!(hist.group_values, vec![5, 5]);
        assert_eq!(hist.group_values.iter().sum::<u64>(), hist.total());
    }

    #[test]
    fn test_counts_outside_layout_dropped() {
        let hist = example_spec().histogram_from_counts(&[(-10.0, 7), (100.0, 7), (10.0, 1)]);
        assert_eq!(hist.total(), 1);
    }

    #[test]
    fn test_invalid_specs() {
        let c = || colors(&["#aaa", "#bbb"]);
        // step does not divide range
        assert!(HistogramSpec::new(0.0, 100.0, 30.0, vec![0.0, 50.0], vec![50.0, 100.0], c()).is_err());
        // zero step
        assert!(HistogramSpec::new(0.0, 100.0, 0.0, vec![0.0, 50.0], vec![50.0, 100.0], c()).is_err());
        // max <= min
        assert!(HistogramSpec::new(10.0, 10.0, 1.0, vec![0.0, 50.0], vec![50.0, 100.0], c()).is_err());
        // mismatched lengths
        assert!(HistogramSpec::new(0.0, 100.0, 10.0, vec![0.0], vec![50.0, 100.0], c()).is_err());
        // gap between groups
        assert!(HistogramSpec::new(0.0, 100.0, 10.0, vec![0.0, 60.0], vec![50.0, 100.0], c()).is_err());
        // overlapping groups
        assert!(HistogramSpec::new(0.0, 100.0, 10.0, vec![0.0, 40.0], vec![50.0, 100.0], c()).is_err());
        // groups start above min
        assert!(HistogramSpec::new(0.0, 100.0, 10.0, vec![10.0, 50.0], vec![50.0, 100.0], c()).is_err());
        // empty group
        assert!(HistogramSpec::new(0.0, 100.0, 10.0, vec![0.0, 50.0], vec![50.0, 50.0], c()).is_err());
    }

    #[test]
    fn test_style_ramp_sorted_by_lower() {
        let spec = HistogramSpec::new(
            0.0,
            3500.0,
            700.0,
            vec![2800.0, 2100.0, 1400.0, 700.0, 0.0],
            vec![3500.0, 2800.0, 2100.0, 1400.0, 700.0],
            colors(&["#5c4a3d", "#933a06", "#b84e17", "#e68518", "#eeb66b"]),
        )
        .unwrap();
        let ramp = spec.null_histogram().to_style_ramp();

        let quantities: Vec<f64> = ramp.entries.iter().map(|e| e.quantity).collect();
        assert_eq!(quantities, vec![0.0, 700.0, 1400.0, 2100.0, 2800.0]);
        assert_eq!(ramp.entries[0].color.as_str(), "#eeb66b");
        assert_eq!(ramp.entries[4].label, "2800--3500");

        let sld = to_style_ramp(&spec.null_histogram());
        assert!(sld.starts_with("<RasterSymbolizer><ColorMap type=\"ramp\" extended=\"false\" >"));
        assert_eq!(sld.matches("<ColorMapEntry ").count(), 5);
    }

    #[test]
    fn test_fractional_bounds_in_labels() {
        let spec = HistogramSpec::new(0.0, 1.0, 0.5, vec![0.0, 0.5], vec![0.5, 1.0], colors(&["#aaa", "#bbb"])).unwrap();
        assert_eq!(spec.group_labels(), vec!["0--0.5", "0.5--1"]);
    }
}
