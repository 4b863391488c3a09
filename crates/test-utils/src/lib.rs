//! Shared test utilities for the mangrove analysis workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster grid generators
//! - Area-of-interest geometry fixtures and GeoJSON documents
//! - Temporary directories populated with catalog files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, constant_grid, square_aoi};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of two optional values.
///
/// Both sides must be `None`, or both `Some` and within epsilon.
#[macro_export]
macro_rules! assert_opt_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        match ($left, $right) {
            (Some(l), Some(r)) => $crate::assert_approx_eq!(l, r, $epsilon),
            (None, None) => {}
            (l, r) => panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`",
                l, r
            ),
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails_on_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_assert_opt_approx_eq() {
        assert_opt_approx_eq!(Some(1.0001), Some(1.0), 0.001);
        assert_opt_approx_eq!(None::<f64>, None::<f64>, 0.001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_opt_approx_eq_mismatch() {
        assert_opt_approx_eq!(Some(1.0), None::<f64>, 0.001);
    }
}
