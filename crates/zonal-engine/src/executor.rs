//! Bounded, instrumented submission of reduction requests.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::backend::{RasterBackend, Reducer, Reduction, ReductionRequest};
use crate::collection::Image;
use crate::config::{AnalysisParams, EngineConfig};
use crate::error::ReductionFault;
use crate::types::Aoi;

/// Submits reductions to a backend, at most `max_concurrent_reductions` at a time.
#[derive(Clone)]
pub struct ReductionExecutor {
    backend: Arc<dyn RasterBackend>,
    permits: Arc<Semaphore>,
    max_pixels: u64,
}

impl ReductionExecutor {
    pub fn new(backend: Arc<dyn RasterBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(config.max_concurrent_reductions.max(1))),
            max_pixels: config.max_pixels,
        }
    }

    /// Build a request for reducing the first band of `image` over `aoi`.
    pub fn request(
        &self,
        image: &Image,
        aoi: &Aoi,
        reducer: Reducer,
        params: &AnalysisParams,
    ) -> ReductionRequest {
        ReductionRequest {
            image: image.expr.clone(),
            geometry: Arc::clone(aoi),
            reducer,
            scale: params.scale,
            best_effort: params.best_effort,
            max_pixels: self.max_pixels,
        }
    }

    /// Submit one reduction and record its outcome.
    pub async fn reduce(&self, request: &ReductionRequest) -> Result<Reduction, ReductionFault> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ReductionFault::backend("reduction executor is shut down"))?;

        let reducer = request.reducer.name();
        let start = Instant::now();
        let outcome = self.backend.reduce(request).await;
        let elapsed = start.elapsed();

        counter!("zonal_reductions_total", "reducer" => reducer).increment(1);
        histogram!("zonal_reduction_duration_seconds", "reducer" => reducer)
            .record(elapsed.as_secs_f64());

        match &outcome {
            Ok(reduction) => debug!(
                backend = self.backend.name(),
                reducer,
                pixels = reduction.pixel_count,
                effective_scale = reduction.effective_scale,
                elapsed_ms = elapsed.as_millis() as u64,
                "Reduction complete"
            ),
            Err(fault) => {
                counter!("zonal_reduction_faults_total", "kind" => fault.kind()).increment(1);
                debug!(backend = self.backend.name(), reducer, error = %fault, "Reduction fault");
            }
        }

        outcome
    }

    /// Reduce `image` if present, reporting `MissingTimestamp` otherwise.
    pub async fn reduce_image(
        &self,
        image: Option<&Image>,
        timestamp: &str,
        aoi: &Aoi,
        reducer: Reducer,
        params: &AnalysisParams,
    ) -> Result<Reduction, ReductionFault> {
        let image = image.ok_or_else(|| ReductionFault::MissingTimestamp(timestamp.to_string()))?;
        let request = self.request(image, aoi, reducer, params);
        self.reduce(&request).await
    }
}

/// Resolve a cell outcome to its fallback value unless the fault is fatal.
///
/// Every analysis funnels its per-timestamp results through here, so the
/// missing/empty/transient policy is applied the same way everywhere.
pub fn or_fallback<T>(
    outcome: Result<T, ReductionFault>,
    short_name: &str,
    timestamp: &str,
    fallback: impl FnOnce() -> T,
) -> Result<T, ReductionFault> {
    match outcome {
        Ok(value) => Ok(value),
        Err(fault) if fault.is_fatal() => Err(fault),
        Err(ReductionFault::Backend(msg)) => {
            warn!(short_name, timestamp, error = %msg, "Backend fault, using fallback value");
            Ok(fallback())
        }
        Err(fault) => {
            debug!(short_name, timestamp, kind = fault.kind(), "Using fallback value");
            Ok(fallback())
        }
    }
}
