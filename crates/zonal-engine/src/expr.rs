//! Declarative raster expressions.
//!
//! Analyses describe the image they want reduced as a [`RasterExpr`] tree
//! and hand it to a backend. Nothing is evaluated until the backend binds the
//! expression against its raster store and samples it.

use serde::{Deserialize, Serialize};

use crate::error::ReductionFault;
use crate::types::{Raster, RasterStore};

/// A per-pixel raster computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterExpr {
    /// First band of a stored raster.
    Source { raster_id: String },
    /// Keep strictly positive values, mask everything else.
    MaskPositive(Box<RasterExpr>),
    /// Multiply by a constant.
    Multiply(Box<RasterExpr>, f64),
    /// Pixel-wise sum; masked where either side is masked.
    Add(Box<RasterExpr>, Box<RasterExpr>),
}

impl RasterExpr {
    pub fn source(raster_id: impl Into<String>) -> Self {
        Self::Source {
            raster_id: raster_id.into(),
        }
    }

    pub fn mask_positive(self) -> Self {
        Self::MaskPositive(Box::new(self))
    }

    pub fn multiply(self, factor: f64) -> Self {
        Self::Multiply(Box::new(self), factor)
    }

    pub fn add(self, other: RasterExpr) -> Self {
        Self::Add(Box::new(self), Box::new(other))
    }

    /// Raster ids the expression reads.
    pub fn source_ids(&self) -> Vec<&str> {
        match self {
            Self::Source { raster_id } => vec![raster_id.as_str()],
            Self::MaskPositive(inner) | Self::Multiply(inner, _) => inner.source_ids(),
            Self::Add(a, b) => {
                let mut ids = a.source_ids();
                ids.extend(b.source_ids());
                ids
            }
        }
    }

    /// Resolve raster ids against a store.
    pub fn bind<'a>(&self, store: &'a RasterStore) -> Result<BoundExpr<'a>, ReductionFault> {
        Ok(match self {
            Self::Source { raster_id } => BoundExpr::Source(
                store
                    .get(raster_id)
                    .ok_or_else(|| ReductionFault::backend(format!("unknown raster '{}'", raster_id)))?,
            ),
            Self::MaskPositive(inner) => BoundExpr::MaskPositive(Box::new(inner.bind(store)?)),
            Self::Multiply(inner, factor) => {
                BoundExpr::Multiply(Box::new(inner.bind(store)?), *factor)
            }
            Self::Add(a, b) => BoundExpr::Add(Box::new(a.bind(store)?), Box::new(b.bind(store)?)),
        })
    }
}

/// A [`RasterExpr`] with its sources resolved, ready for sampling.
#[derive(Debug)]
pub enum BoundExpr<'a> {
    Source(&'a Raster),
    MaskPositive(Box<BoundExpr<'a>>),
    Multiply(Box<BoundExpr<'a>>, f64),
    Add(Box<BoundExpr<'a>>, Box<BoundExpr<'a>>),
}

impl BoundExpr<'_> {
    /// Value at a point, `None` where masked or outside the data.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<f64> {
        match self {
            Self::Source(raster) => raster.value_at(0, lon, lat).map(f64::from),
            Self::MaskPositive(inner) => inner.sample(lon, lat).filter(|v| *v > 0.0),
            Self::Multiply(inner, factor) => inner.sample(lon, lat).map(|v| v * factor),
            Self::Add(a, b) => Some(a.sample(lon, lat)? + b.sample(lon, lat)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoTransform;

    fn store() -> RasterStore {
        let t = GeoTransform::new(0.0, 1.0, 0.5, 1.0);
        let mut store = RasterStore::new();
        store.insert(
            "a",
            Raster::single_band("a", 2, 1, t, vec![2.0, -1.0]).unwrap(),
        );
        store.insert(
            "b",
            Raster::single_band("b", 2, 1, t, vec![3.0, f32::NAN]).unwrap(),
        );
        store
    }

    #[test]
    fn test_mask_positive() {
        let store = store();
        let expr = RasterExpr::source("a").mask_positive().bind(&store).unwrap();
        assert_eq!(expr.sample(0.25, 0.5), Some(2.0));
        assert_eq!(expr.sample(0.75, 0.5), None);
    }

    #[test]
    fn test_add_propagates_mask() {
        let store = store();
        let expr = RasterExpr::source("a")
            .add(RasterExpr::source("b"))
            .bind(&store)
            .unwrap();
        assert_eq!(expr.sample(0.25, 0.5), Some(5.0));
        assert_eq!(expr.sample(0.75, 0.5), None);
    }

    #[test]
    fn test_multiply() {
        let store = store();
        let expr = RasterExpr::source("b").multiply(10.0).bind(&store).unwrap();
        assert_eq!(expr.sample(0.25, 0.5), Some(30.0));
    }

    #[test]
    fn test_unknown_source_is_backend_fault() {
        let store = store();
        let err = RasterExpr::source("missing").bind(&store).unwrap_err();
        assert!(matches!(err, ReductionFault::Backend(_)));
    }

    #[test]
    fn test_source_ids() {
        let expr = RasterExpr::source("a").multiply(2.0).add(RasterExpr::source("b"));
        assert_eq!(expr.source_ids(), vec!["a", "b"]);
    }
}
