//! Common types and utilities shared across the mangrove analysis workspace.

pub mod bbox;
pub mod error;
pub mod geojson;
pub mod style;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{AtlasError, AtlasResult};
pub use geojson::{Feature, FeatureCollection, GeoJsonGeometry};
pub use style::{ColorMapEntry, HexColor, StyleRamp};
pub use time::{format_timestamp, parse_timestamp, parse_timestamp_list, same_date};
