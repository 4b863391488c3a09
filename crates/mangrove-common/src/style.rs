//! Colour-ramp style payloads for histogram legends.
//!
//! A [`StyleRamp`] is an ordered list of colour map entries rendered as an
//! SLD `RasterSymbolizer` fragment that map clients apply to the raster.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AtlasError, AtlasResult};

/// A validated `#rgb`, `#rrggbb` or `#rrggbbaa` colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    /// Parse and validate a hex colour string.
    pub fn parse(s: &str) -> AtlasResult<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix('#')
            .ok_or_else(|| AtlasError::invalid_parameter("color", format!("'{}' must start with '#'", s)))?;

        let valid_len = matches!(digits.len(), 3 | 6 | 8);
        if !valid_len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AtlasError::invalid_parameter(
                "color",
                format!("'{}' is not a hex colour", s),
            ));
        }

        Ok(Self(s.to_string()))
    }

    /// The colour as written, including the leading '#'.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to RGBA components. Short forms are expanded (`#abc` -> `#aabbcc`).
    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        let s = self.0.trim_start_matches('#');
        let channel = |hex: &str| u8::from_str_radix(hex, 16).unwrap_or(0);

        match s.len() {
            3 => {
                let expand = |i: usize| channel(&s[i..i + 1].repeat(2));
                (expand(0), expand(1), expand(2), 255)
            }
            6 => (channel(&s[0..2]), channel(&s[2..4]), channel(&s[4..6]), 255),
            _ => (
                channel(&s[0..2]),
                channel(&s[2..4]),
                channel(&s[4..6]),
                channel(&s[6..8]),
            ),
        }
    }
}

impl TryFrom<String> for HexColor {
    type Error = AtlasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HexColor::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a colour ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorMapEntry {
    /// Lower bound of the legend group the colour applies from.
    pub quantity: f64,
    pub label: String,
    pub color: HexColor,
}

/// An ordered colour ramp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleRamp {
    pub entries: Vec<ColorMapEntry>,
}

impl StyleRamp {
    /// Build a ramp, ordering entries by ascending quantity.
    pub fn new(mut entries: Vec<ColorMapEntry>) -> Self {
        entries.sort_by(|a, b| a.quantity.total_cmp(&b.quantity));
        Self { entries }
    }

    /// Render as an SLD `RasterSymbolizer` fragment.
    ///
    /// Quantities are written as integers, matching how legend bounds are
    /// published.
    pub fn to_sld(&self) -> String {
        let ramp = self
            .entries
            .iter()
            .map(|e| {
                format!(
                    "<ColorMapEntry  color=\"{}\" quantity=\"{}\" label=\"{}\"/>",
                    e.color,
                    e.quantity.trunc() as i64,
                    e.label
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "<RasterSymbolizer><ColorMap type=\"ramp\" extended=\"false\" >{}</ColorMap></RasterSymbolizer>",
            ramp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_lengths() {
        assert!(HexColor::parse("#aaa").is_ok());
        assert!(HexColor::parse("#01C4BE").is_ok());
        assert!(HexColor::parse("#01C4BEFF").is_ok());
        assert!(HexColor::parse("01C4BE").is_err());
        assert!(HexColor::parse("#01C4B").is_err());
        assert!(HexColor::parse("#zzzzzz").is_err());
    }

    #[test]
    fn test_to_rgba() {
        assert_eq!(HexColor::parse("#aaa").unwrap().to_rgba(), (170, 170, 170, 255));
        assert_eq!(HexColor::parse("#eb6240").unwrap().to_rgba(), (235, 98, 64, 255));
        assert_eq!(HexColor::parse("#00000080").unwrap().to_rgba(), (0, 0, 0, 128));
    }

    #[test]
    fn test_serde_validates() {
        let ok: HexColor = serde_json::from_str("\"#a6cb10\"").unwrap();
        assert_eq!(ok.as_str(), "#a6cb10");
        assert!(serde_json::from_str::<HexColor>("\"red\"").is_err());
    }

    #[test]
    fn test_sld_orders_by_quantity() {
        let entry = |q: f64, label: &str, color: &str| ColorMapEntry {
            quantity: q,
            label: label.to_string(),
            color: HexColor::parse(color).unwrap(),
        };
        let ramp = StyleRamp::new(vec![
            entry(700.0, "700--1400", "#e68518"),
            entry(0.0, "0--700", "#eeb66b"),
        ]);

        assert_eq!(
            ramp.to_sld(),
            "<RasterSymbolizer><ColorMap type=\"ramp\" extended=\"false\" >\
             <ColorMapEntry  color=\"#eeb66b\" quantity=\"0\" label=\"0--700\"/> \
             <ColorMapEntry  color=\"#e68518\" quantity=\"700\" label=\"700--1400\"/>\
             </ColorMap></RasterSymbolizer>"
        );
    }
}
