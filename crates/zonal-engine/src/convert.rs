//! Biomass and carbon unit conversions.
//!
//! Each conversion masks the input to strictly positive cells, multiplies by a
//! fixed factor and renames the band to reflect the new unit. Timestamps carry
//! over unchanged.

use std::fmt;
use std::str::FromStr;

use mangrove_common::AtlasError;

use crate::collection::ImageCollection;

/// Below-ground biomass as a fraction of above-ground biomass.
pub const AGB_TO_BGB: f64 = 0.49;

/// Organic carbon fraction of biomass.
pub const BIO_TO_OC: f64 = 0.451;

/// Mass of CO2 per unit mass of carbon (44/12).
pub const OC_TO_CO2E: f64 = 11.0 / 3.0;

/// Square metres per hectare.
pub const M2_PER_HA: f64 = 10_000.0;

/// A named scalar conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitConversion {
    /// Above-ground to below-ground biomass.
    AgbToBgb,
    /// Biomass to organic carbon.
    BioToOc,
    /// Organic carbon to CO2 equivalent.
    OcToCo2e,
    /// Biomass to organic carbon expressed as CO2 equivalent.
    BioToCo2e,
}

impl UnitConversion {
    /// Multiplier applied to every unmasked pixel.
    pub fn factor(&self) -> f64 {
        match self {
            Self::AgbToBgb => AGB_TO_BGB,
            Self::BioToOc => BIO_TO_OC,
            Self::OcToCo2e => OC_TO_CO2E,
            Self::BioToCo2e => BIO_TO_OC * OC_TO_CO2E,
        }
    }

    /// Band name after conversion.
    pub fn output_band(&self, band: &str) -> String {
        match self {
            Self::AgbToBgb => "bgb".to_string(),
            Self::BioToOc => format!("{}_oc", band),
            Self::OcToCo2e => format!("{}_co2e", band),
            Self::BioToCo2e => format!("{}_oc_co2e", band),
        }
    }

    /// Keyword naming the conversion.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgbToBgb => "agb_to_bgb",
            Self::BioToOc => "bio_to_OC",
            Self::OcToCo2e => "OC_to_CO2e",
            Self::BioToCo2e => "bio_to_CO2e",
        }
    }

    /// Mask non-positive cells, scale, and rename every image of a series.
    pub fn apply(&self, collection: &ImageCollection) -> ImageCollection {
        collection.map_images(|image| {
            let band = self.output_band(&image.band_name);
            image.mask_positive().multiply(self.factor()).rename(band)
        })
    }
}

impl FromStr for UnitConversion {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agb_to_bgb" => Ok(Self::AgbToBgb),
            "bio_to_OC" => Ok(Self::BioToOc),
            "OC_to_CO2e" => Ok(Self::OcToCo2e),
            "bio_to_CO2e" => Ok(Self::BioToCo2e),
            other => Err(AtlasError::invalid_parameter(
                "conversion",
                format!("unknown conversion '{}'", other),
            )),
        }
    }
}

impl fmt::Display for UnitConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Above-ground to below-ground biomass.
pub fn agb_to_bgb(collection: &ImageCollection) -> ImageCollection {
    UnitConversion::AgbToBgb.apply(collection)
}

/// Biomass to organic carbon.
pub fn bio_to_oc(collection: &ImageCollection) -> ImageCollection {
    UnitConversion::BioToOc.apply(collection)
}

/// Organic carbon to CO2 equivalent.
pub fn oc_to_co2e(collection: &ImageCollection) -> ImageCollection {
    UnitConversion::OcToCo2e.apply(collection)
}

/// Biomass to organic carbon as CO2 equivalent.
pub fn bio_to_co2e(collection: &ImageCollection) -> ImageCollection {
    UnitConversion::BioToCo2e.apply(collection)
}

/// Rescale a per-m² density series to per hectare; nothing is masked.
pub fn per_hectare(collection: &ImageCollection) -> ImageCollection {
    collection.map_images(|image| image.multiply(M2_PER_HA))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Image;
    use crate::expr::RasterExpr;
    use crate::types::{GeoTransform, Raster, RasterStore};
    use mangrove_common::parse_timestamp;

    fn agb_collection() -> ImageCollection {
        ImageCollection::new(
            "mangrove-agb",
            vec![Image::new(
                RasterExpr::source("agb"),
                "agb",
                parse_timestamp("2016-01-01").unwrap(),
                "t / m2",
            )],
        )
    }

    #[test]
    fn test_factors() {
        assert!((UnitConversion::BioToCo2e.factor() - 0.451 * 11.0 / 3.0).abs() < 1e-12);
        assert!((UnitConversion::AgbToBgb.factor() - 0.49).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!("bio_to_OC".parse::<UnitConversion>().unwrap(), UnitConversion::BioToOc);
        assert_eq!("OC_to_CO2e".parse::<UnitConversion>().unwrap(), UnitConversion::OcToCo2e);
        assert!("bio_to_oc".parse::<UnitConversion>().is_err());
    }

    #[test]
    fn test_renames_band() {
        let converted = bio_to_co2e(&agb_collection());
        assert_eq!(converted.images()[0].band_name, "agb_oc_co2e");
        assert_eq!(agb_to_bgb(&agb_collection()).images()[0].band_name, "bgb");
        assert_eq!(oc_to_co2e(&agb_collection()).images()[0].band_name, "agb_co2e");
        assert_eq!(converted.dates(), agb_collection().dates());
    }

    #[test]
    fn test_per_hectare_keeps_band() {
        let scaled = per_hectare(&agb_collection());
        assert_eq!(scaled.images()[0].band_name, "agb");
        assert_eq!(scaled.images()[0].expr, RasterExpr::source("agb").multiply(M2_PER_HA));
    }

    #[test]
    fn test_bio_to_oc_inverts_where_positive() {
        let values = vec![10.0, 0.0, -5.0, 250.5];
        let mut store = RasterStore::new();
        store.insert(
            "agb",
            Raster::single_band("agb", 4, 1, GeoTransform::new(0.0, 1.0, 1.0, 1.0), values.clone())
                .unwrap(),
        );

        let converted = bio_to_oc(&agb_collection());
        let expr = converted.images()[0].expr.bind(&store).unwrap();

        for (col, original) in values.iter().enumerate() {
            let sampled = expr.sample(col as f64 + 0.5, 0.5);
            if *original > 0.0 {
                let recovered = sampled.unwrap() / BIO_TO_OC;
                assert!((recovered - *original as f64).abs() < 1e-9);
            } else {
                assert!(sampled.is_none());
            }
        }
    }
}
