//! Timestamped images and image collections.

use chrono::{DateTime, Utc};
use mangrove_common::same_date;

use crate::expr::RasterExpr;

/// A single-band image expression tagged with one timestamp and unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub expr: RasterExpr,
    pub band_name: String,
    pub timestamp: DateTime<Utc>,
    pub units: String,
}

impl Image {
    pub fn new(
        expr: RasterExpr,
        band_name: impl Into<String>,
        timestamp: DateTime<Utc>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            expr,
            band_name: band_name.into(),
            timestamp,
            units: units.into(),
        }
    }

    /// Mask out non-positive values.
    pub fn mask_positive(mut self) -> Self {
        self.expr = self.expr.mask_positive();
        self
    }

    /// Multiply every pixel by a constant; timestamp and band name carry over.
    pub fn multiply(mut self, factor: f64) -> Self {
        self.expr = self.expr.multiply(factor);
        self
    }

    /// Pixel-wise sum with another image; keeps this image's timestamp.
    pub fn add(mut self, other: &Image) -> Self {
        self.expr = self.expr.add(other.expr.clone());
        self
    }

    pub fn rename(mut self, band_name: impl Into<String>) -> Self {
        self.band_name = band_name.into();
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }
}

/// An ordered time series of images.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageCollection {
    pub name: String,
    images: Vec<Image>,
}

impl ImageCollection {
    /// Build a collection; images are ordered by timestamp.
    pub fn new(name: impl Into<String>, mut images: Vec<Image>) -> Self {
        images.sort_by_key(|image| image.timestamp);
        Self {
            name: name.into(),
            images,
        }
    }

    /// First image acquired on the same date as `timestamp`.
    pub fn first_on(&self, timestamp: &DateTime<Utc>) -> Option<&Image> {
        self.images
            .iter()
            .find(|image| same_date(&image.timestamp, timestamp))
    }

    /// Acquisition timestamps in ascending order.
    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.images.iter().map(|image| image.timestamp).collect()
    }

    /// Apply a transformation to every image.
    pub fn map_images<F>(&self, f: F) -> ImageCollection
    where
        F: Fn(Image) -> Image,
    {
        ImageCollection::new(
            self.name.clone(),
            self.images.iter().cloned().map(f).collect(),
        )
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_common::parse_timestamp;

    fn image(id: &str, ts: &str) -> Image {
        Image::new(RasterExpr::source(id), "b1", parse_timestamp(ts).unwrap(), "1")
    }

    #[test]
    fn test_images_sorted_by_timestamp() {
        let ic = ImageCollection::new(
            "extent",
            vec![image("c", "2016-01-01"), image("a", "1996-01-01"), image("b", "2007-01-01")],
        );
        let years: Vec<String> = ic.dates().iter().map(|d| d.format("%Y").to_string()).collect();
        assert_eq!(years, vec!["1996", "2007", "2016"]);
    }

    #[test]
    fn test_first_on_matches_whole_date() {
        let ic = ImageCollection::new("extent", vec![image("a", "2016-01-01T00:00:00Z")]);
        let noon = parse_timestamp("2016-01-01T12:00:00Z").unwrap();
        let next_day = parse_timestamp("2016-01-02").unwrap();
        assert!(ic.first_on(&noon).is_some());
        assert!(ic.first_on(&next_day).is_none());
    }

    #[test]
    fn test_map_images_preserves_timestamps() {
        let ic = ImageCollection::new("agb", vec![image("a", "2016-01-01")]);
        let scaled = ic.map_images(|i| i.multiply(10_000.0).rename("agb_tha"));
        assert_eq!(scaled.dates(), ic.dates());
        assert_eq!(scaled.images()[0].band_name, "agb_tha");
        assert_eq!(
            scaled.images()[0].expr,
            RasterExpr::source("a").multiply(10_000.0)
        );
    }
}
