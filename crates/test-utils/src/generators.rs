//! Test data generators for synthetic raster grids.
//!
//! These generators create predictable, verifiable value patterns that can be
//! used across the test suite. All grids are row-major starting at the top
//! (northernmost) row.

/// Creates a grid where every cell holds the same value.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
/// * `value` - Value of every cell (may be NaN for an all-masked grid)
pub fn constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid whose values increase by `step` per cell in row-major order.
///
/// Cell `(row, col)` holds `start + (row * width + col) * step`, which makes
/// percentiles and bucket counts easy to derive by hand.
///
/// # Example
///
/// ```
/// use test_utils::gradient_grid;
///
/// let grid = gradient_grid(3, 2, 10.0, 1.0);
/// assert_eq!(grid, vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
/// ```
pub fn gradient_grid(width: usize, height: usize, start: f32, step: f32) -> Vec<f32> {
    (0..width * height)
        .map(|i| start + i as f32 * step)
        .collect()
}

/// Creates a checkerboard of `value` and NaN holes.
///
/// Cells where `(row + col)` is even hold `value`; the others are NaN, so
/// exactly half of an even-sized grid is masked.
pub fn checkerboard_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(if (row + col) % 2 == 0 { value } else { f32::NAN });
        }
    }
    data
}

/// Creates a grid split into a west half and an east half.
///
/// Columns `< width / 2` hold `west`, the rest hold `east`. Useful for
/// distance rasters where only part of a line should count.
pub fn split_grid(width: usize, height: usize, west: f32, east: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(if col < width / 2 { west } else { east });
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_grid() {
        let grid = constant_grid(4, 3, 2.5);
        assert_eq!(grid.len(), 12);
        assert!(grid.iter().all(|v| *v == 2.5));
    }

    #[test]
    fn test_checkerboard_masks_half() {
        let grid = checkerboard_grid(4, 4, 1.0);
        assert_eq!(grid.iter().filter(|v| v.is_nan()).count(), 8);
        assert_eq!(grid[0], 1.0);
        assert!(grid[1].is_nan());
        assert!(grid[4].is_nan());
    }

    #[test]
    fn test_split_grid() {
        let grid = split_grid(4, 2, 0.0, 9.0);
        assert_eq!(grid, vec![0.0, 0.0, 9.0, 9.0, 0.0, 0.0, 9.0, 9.0]);
    }
}
