//! Per-timestamp area-weighted sums and summary statistics.
//!
//! The two reductions deliberately differ in how a missing raster is
//! reported: an area sum treats it as zero extent, while summary statistics
//! report `None` because there is no data to describe.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use mangrove_common::format_timestamp;
use tracing::{info, instrument};

use crate::backend::{Reducer, SummaryStats};
use crate::collection::ImageCollection;
use crate::config::AnalysisParams;
use crate::error::{ReductionFault, Result};
use crate::executor::{or_fallback, ReductionExecutor};
use crate::results::{MetricResult, Props};
use crate::types::Aoi;

/// Area-weighted sum of the first band per timestamp; missing data sums to 0.
#[instrument(skip_all, fields(short_name = %props.short_name))]
pub async fn area_sum(
    executor: &ReductionExecutor,
    series: &ImageCollection,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    props: Props,
    params: &AnalysisParams,
) -> Result<MetricResult<Option<f64>>> {
    let values = reduce_sums(executor, series, aoi, timestamps, &props.short_name, params, Some(0.0)).await?;
    info!(timestamps = values.len(), "Area sum complete");
    Ok(MetricResult::new(props, values, timestamps.to_vec(), params))
}

/// Area-weighted sum where missing data is reported as `None`.
///
/// Used for carbon stocks, where a missing layer must not read as zero carbon.
#[instrument(skip_all, fields(short_name = %props.short_name))]
pub async fn area_sum_or_null(
    executor: &ReductionExecutor,
    series: &ImageCollection,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    props: Props,
    params: &AnalysisParams,
) -> Result<MetricResult<Option<f64>>> {
    let values = reduce_sums(executor, series, aoi, timestamps, &props.short_name, params, None).await?;
    info!(timestamps = values.len(), "Area sum complete");
    Ok(MetricResult::new(props, values, timestamps.to_vec(), params))
}

async fn reduce_sums(
    executor: &ReductionExecutor,
    series: &ImageCollection,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    short_name: &str,
    params: &AnalysisParams,
    fallback: Option<f64>,
) -> Result<Vec<Option<f64>>> {
    let cells = timestamps.iter().map(|timestamp| async move {
        let label = format_timestamp(timestamp);
        let outcome = executor
            .reduce_image(series.first_on(timestamp), &label, aoi, Reducer::AreaSum, params)
            .await
            .and_then(|reduction| reduction.into_sum())
            .map(Some);
        or_fallback(outcome, short_name, &label, || fallback)
    });

    Ok(join_all(cells)
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, ReductionFault>>()?)
}

/// Summary statistics of the first band per timestamp, computed from one
/// sample set; missing data is `None`.
#[instrument(skip_all, fields(short_name = %props.short_name))]
pub async fn area_summary_stats(
    executor: &ReductionExecutor,
    series: &ImageCollection,
    aoi: &Aoi,
    timestamps: &[DateTime<Utc>],
    props: Props,
    params: &AnalysisParams,
) -> Result<MetricResult<Option<SummaryStats>>> {
    let short_name = props.short_name.as_str();

    let cells = timestamps.iter().map(|timestamp| async move {
        let label = format_timestamp(timestamp);
        let outcome = executor
            .reduce_image(series.first_on(timestamp), &label, aoi, Reducer::SummaryStats, params)
            .await
            .and_then(|reduction| reduction.into_stats())
            .map(Some);
        or_fallback(outcome, short_name, &label, || None)
    });

    let values = join_all(cells)
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, ReductionFault>>()?;

    info!(timestamps = values.len(), "Summary statistics complete");
    Ok(MetricResult::new(props, values, timestamps.to_vec(), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::collection::Image;
    use crate::config::EngineConfig;
    use crate::expr::RasterExpr;
    use crate::types::{GeoTransform, Raster, RasterStore};
    use mangrove_common::parse_timestamp;
    use std::sync::Arc;
    use test_utils::{assert_approx_eq, constant_grid, gradient_grid, square_aoi};

    // One 0.01 degree pixel
    const SCALE: f64 = 1113.2;

    fn executor(store: RasterStore) -> ReductionExecutor {
        ReductionExecutor::new(Arc::new(InMemoryBackend::new(Arc::new(store))), &EngineConfig::default())
    }

    fn raster(data: Vec<f32>) -> Raster {
        Raster::single_band("b1", 100, 100, GeoTransform::new(0.0, 1.0, 0.01, 0.01), data).unwrap()
    }

    fn series(id: &str, date: &str) -> ImageCollection {
        ImageCollection::new(
            id,
            vec![Image::new(RasterExpr::source(id), "b1", parse_timestamp(date).unwrap(), "1")],
        )
    }

    fn props() -> Props {
        Props::new("area_mangrove_m2", "total_area_of_mangroves", "Mangrove extent", "m<sup>2</sup>")
    }

    fn params() -> AnalysisParams {
        AnalysisParams::default().with_scale(SCALE)
    }

    #[tokio::test]
    async fn test_zero_raster_sums_to_zero_not_null() {
        let mut store = RasterStore::new();
        store.insert("zeros", raster(constant_grid(100, 100, 0.0)));
        let exec = executor(store);
        let aoi: Aoi = Arc::new(square_aoi(0.2, 0.2, 0.5));
        let ts = vec![parse_timestamp("2016-01-01").unwrap()];

        let result = area_sum(&exec, &series("zeros", "2016-01-01"), &aoi, &ts, props(), &params())
            .await
            .unwrap();
        assert_eq!(result.values, vec![Some(0.0)]);
    }

    #[tokio::test]
    async fn test_missing_timestamp_asymmetry() {
        let mut store = RasterStore::new();
        store.insert("ones", raster(constant_grid(100, 100, 1.0)));
        let exec = executor(store);
        let aoi: Aoi = Arc::new(square_aoi(0.2, 0.2, 0.5));
        let ts = vec![parse_timestamp("2020-01-01").unwrap()];
        let s = series("ones", "2016-01-01");

        let sums = area_sum(&exec, &s, &aoi, &ts, props(), &params()).await.unwrap();
        let stats = area_summary_stats(&exec, &s, &aoi, &ts, props(), &params()).await.unwrap();
        let nullable = area_sum_or_null(&exec, &s, &aoi, &ts, props(), &params()).await.unwrap();

        assert_eq!(sums.values, vec![Some(0.0)]);
        assert_eq!(stats.values, vec![None]);
        assert_eq!(nullable.values, vec![None]);
        assert_eq!(sums.timestamps, ts);
    }

    #[tokio::test]
    async fn test_area_sum_of_ones_is_aoi_area() {
        let mut store = RasterStore::new();
        store.insert("ones", raster(constant_grid(100, 100, 1.0)));
        let exec = executor(store);
        let aoi: Aoi = Arc::new(square_aoi(0.2, 0.2, 0.5));
        let ts = vec![parse_timestamp("2016-01-01").unwrap()];

        let result = area_sum(&exec, &series("ones", "2016-01-01"), &aoi, &ts, props(), &params())
            .await
            .unwrap();
        let area = result.values[0].unwrap();
        // 0.5 x 0.5 degrees near the equator
        let expected = 0.5 * 0.5 * 111_195.0 * 111_195.0;
        assert!((area - expected).abs() / expected < 0.01, "area {} vs {}", area, expected);
    }

    #[tokio::test]
    async fn test_summary_stats_from_one_sample() {
        let mut store = RasterStore::new();
        store.insert("grad", raster(gradient_grid(100, 100, 0.0, 1.0)));
        let exec = executor(store);
        let aoi: Aoi = Arc::new(square_aoi(0.0, 0.0, 1.0));
        let ts = vec![parse_timestamp("2016-01-01").unwrap()];

        let result = area_summary_stats(&exec, &series("grad", "2016-01-01"), &aoi, &ts, props(), &params())
            .await
            .unwrap();
        let stats = result.values[0].unwrap();
        assert_approx_eq!(stats.min, 0.0, 1e-9);
        assert_approx_eq!(stats.max, 9999.0, 1e-9);
        assert_approx_eq!(stats.mean, 4999.5, 1e-6);
        assert!(stats.p1 <= stats.p25 && stats.p25 <= stats.median && stats.median <= stats.p75);
        assert!(stats.p75 <= stats.p99 && stats.p99 <= stats.max);
    }

    #[tokio::test]
    async fn test_region_too_large_is_fatal() {
        let mut store = RasterStore::new();
        store.insert("ones", raster(constant_grid(100, 100, 1.0)));
        let config = EngineConfig {
            max_pixels: 10,
            ..Default::default()
        };
        let exec = ReductionExecutor::new(Arc::new(InMemoryBackend::new(Arc::new(store))), &config);
        let aoi: Aoi = Arc::new(square_aoi(0.0, 0.0, 1.0));
        let ts = vec![parse_timestamp("2016-01-01").unwrap()];
        let s = series("ones", "2016-01-01");

        let err = area_sum(&exec, &s, &aoi, &ts, props(), &params()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::Reduction(ReductionFault::RegionTooLarge { .. })
        ));

        let relaxed = area_sum(&exec, &s, &aoi, &ts, props(), &params().with_best_effort(true))
            .await
            .unwrap();
        assert!(relaxed.values[0].unwrap() > 0.0);
        assert!(relaxed.best_effort);
    }
}
