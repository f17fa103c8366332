//! Test data generators for creating synthetic precipitation grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates a cumulative precipitation grid (kg m-2) for a forecast hour.
///
/// Each cell accumulates at its own constant hourly rate of
/// `0.25 * (col + 1) + 0.5 * row`, so the value at hour `h` is `h * rate`.
/// Differencing consecutive hours therefore yields exactly `rate`.
///
/// ```
/// use test_utils::{create_precipitation_grid, hourly_rate};
///
/// let h2 = create_precipitation_grid(3, 2, 2);
/// assert_eq!(h2[0], 2.0 * hourly_rate(0, 0));
/// ```
pub fn create_precipitation_grid(width: usize, height: usize, hour: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(hour as f32 * hourly_rate(row, col));
        }
    }
    data
}

/// Hourly rate used by [`create_precipitation_grid`] for one cell.
pub fn hourly_rate(row: usize, col: usize) -> f32 {
    0.25 * (col as f32 + 1.0) + 0.5 * row as f32
}

/// Replaces every `every`-th cell (starting at index 0) with NaN.
pub fn with_missing_cells(mut values: Vec<f32>, every: usize) -> Vec<f32> {
    if every == 0 {
        return values;
    }
    for value in values.iter_mut().step_by(every) {
        *value = f32::NAN;
    }
    values
}

/// Evenly spaced axis values: `start, start + step, ...` (`count` values).
pub fn regular_axis(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + i as f64 * step).collect()
}
