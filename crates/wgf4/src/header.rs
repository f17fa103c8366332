//! WGF4 header: grid bounds and spacing as fixed-point integers.

use crate::error::{Result, Wgf4Error};

/// Scale factor applied to every coordinate field.
pub const DEFAULT_MULTIPLIER: i32 = 1_000_000;

/// Size of the seven-integer header in bytes.
pub const HEADER_LEN: usize = 7 * 4;

/// Spatial header of a WGF4 file.
///
/// Every coordinate is stored as `round(degrees * multiplier)`. The step
/// fields are the *average* spacing `(max - min) / count`, not the exact
/// per-cell increment. Consumers rely on that approximation, so it is kept
/// as is even though it drifts from the true increment by one cell's worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wgf4Header {
    pub latitude_min: i32,
    pub latitude_max: i32,
    pub longitude_min: i32,
    pub longitude_max: i32,
    pub latitude_step: i32,
    pub longitude_step: i32,
    pub multiplier: i32,
}

impl Wgf4Header {
    /// Compute the header from latitude and longitude axes.
    ///
    /// Axes may be in any order; only their extrema and length matter.
    pub fn from_axes(latitudes: &[f64], longitudes: &[f64], multiplier: i32) -> Result<Self> {
        if multiplier <= 0 {
            return Err(Wgf4Error::InvalidMultiplier(multiplier));
        }

        let (lat_min, lat_max) = axis_extent(latitudes, "latitude")?;
        let (lon_min, lon_max) = axis_extent(longitudes, "longitude")?;

        Ok(Self {
            latitude_min: scale(lat_min, multiplier)?,
            latitude_max: scale(lat_max, multiplier)?,
            longitude_min: scale(lon_min, multiplier)?,
            longitude_max: scale(lon_max, multiplier)?,
            latitude_step: scale((lat_max - lat_min) / latitudes.len() as f64, multiplier)?,
            longitude_step: scale((lon_max - lon_min) / longitudes.len() as f64, multiplier)?,
            multiplier,
        })
    }

    /// Header fields in their on-disk order.
    pub fn fields(&self) -> [i32; 7] {
        [
            self.latitude_min,
            self.latitude_max,
            self.longitude_min,
            self.longitude_max,
            self.latitude_step,
            self.longitude_step,
            self.multiplier,
        ]
    }

    /// Build a header from fields in on-disk order.
    pub fn from_fields(fields: [i32; 7]) -> Self {
        let [latitude_min, latitude_max, longitude_min, longitude_max, latitude_step, longitude_step, multiplier] =
            fields;
        Self {
            latitude_min,
            latitude_max,
            longitude_min,
            longitude_max,
            latitude_step,
            longitude_step,
            multiplier,
        }
    }

    /// Convert a scaled header value back to degrees.
    pub fn to_degrees(&self, value: i32) -> f64 {
        value as f64 / self.multiplier as f64
    }

    /// Estimate `(rows, cols)` from bounds and steps.
    ///
    /// The file itself carries no dimensions; this inverts the step formula.
    /// An axis with a zero step is treated as a single row or column.
    pub fn grid_dims(&self) -> (usize, usize) {
        (
            axis_count(self.latitude_min, self.latitude_max, self.latitude_step),
            axis_count(self.longitude_min, self.longitude_max, self.longitude_step),
        )
    }
}

fn axis_count(min: i32, max: i32, step: i32) -> usize {
    if step <= 0 {
        return 1;
    }
    ((max as f64 - min as f64) / step as f64).round().max(1.0) as usize
}

fn axis_extent(values: &[f64], axis: &'static str) -> Result<(f64, f64)> {
    if values.is_empty() {
        return Err(Wgf4Error::EmptyAxis { axis });
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        if !value.is_finite() {
            return Err(Wgf4Error::NonFiniteCoordinate { axis, value });
        }
        min = min.min(value);
        max = max.max(value);
    }
    Ok((min, max))
}

fn scale(value: f64, multiplier: i32) -> Result<i32> {
    let scaled = (value * multiplier as f64).round();
    if scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(Wgf4Error::ScaleOverflow { value: scaled });
    }
    Ok(scaled as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_from_regular_axes() {
        let lats = [47.0, 47.5, 48.0, 48.5];
        let lons = [10.0, 9.0, 8.0];

        let header = Wgf4Header::from_axes(&lats, &lons, DEFAULT_MULTIPLIER).unwrap();

        assert_eq!(header.latitude_min, 47_000_000);
        assert_eq!(header.latitude_max, 48_500_000);
        assert_eq!(header.longitude_min, 8_000_000);
        assert_eq!(header.longitude_max, 10_000_000);
        // (48.5 - 47.0) / 4 and (10 - 8) / 3
        assert_eq!(header.latitude_step, 375_000);
        assert_eq!(header.longitude_step, 666_667);
        assert_eq!(header.multiplier, DEFAULT_MULTIPLIER);
    }

    #[test]
    fn test_step_keeps_average_spacing_approximation() {
        // ICON-D2 style coordinates with float noise: the true increment is
        // 0.02, but the header stores (max - min) / count.
        let lons: Vec<f64> = (0..244).map(|i| -3.9399999999999977 + i as f64 * 0.02).collect();
        let lats = [43.18, 43.2];

        let header = Wgf4Header::from_axes(&lats, &lons, DEFAULT_MULTIPLIER).unwrap();

        assert_eq!(header.longitude_min, -3_940_000);
        assert_eq!(header.longitude_step, 19_918);
        assert_ne!(header.longitude_step, 20_000);
    }

    #[test]
    fn test_bounds_are_ordered() {
        let axes: [&[f64]; 5] = [
            &[0.0],
            &[5.0, -5.0],
            &[-90.0, 0.0, 90.0],
            &[12.34, 12.33, 12.35, 12.32],
            &[-0.000001, 0.000001],
        ];

        for lats in axes {
            for lons in axes {
                let header = Wgf4Header::from_axes(lats, lons, DEFAULT_MULTIPLIER).unwrap();
                assert!(header.latitude_min <= header.latitude_max, "{:?}", header);
                assert!(header.longitude_min <= header.longitude_max, "{:?}", header);
                assert!(header.latitude_step >= 0);
                assert!(header.longitude_step >= 0);
            }
        }
    }

    #[test]
    fn test_empty_axis_rejected() {
        let err = Wgf4Header::from_axes(&[], &[1.0], DEFAULT_MULTIPLIER).unwrap_err();
        assert!(matches!(err, Wgf4Error::EmptyAxis { axis: "latitude" }));
    }

    #[test]
    fn test_nan_coordinate_rejected() {
        let err = Wgf4Header::from_axes(&[1.0], &[f64::NAN], DEFAULT_MULTIPLIER).unwrap_err();
        assert!(matches!(err, Wgf4Error::NonFiniteCoordinate { axis: "longitude", .. }));
    }

    #[test]
    fn test_overflow_rejected() {
        let err = Wgf4Header::from_axes(&[3000.0], &[1.0], DEFAULT_MULTIPLIER).unwrap_err();
        assert!(matches!(err, Wgf4Error::ScaleOverflow { .. }));
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let err = Wgf4Header::from_axes(&[1.0], &[1.0], 0).unwrap_err();
        assert!(matches!(err, Wgf4Error::InvalidMultiplier(0)));
    }

    #[test]
    fn test_grid_dims_inverts_step_formula() {
        let lats = [47.0, 47.5, 48.0, 48.5];
        let lons = [10.0, 9.0, 8.0];
        let header = Wgf4Header::from_axes(&lats, &lons, DEFAULT_MULTIPLIER).unwrap();

        assert_eq!(header.grid_dims(), (4, 3));
    }

    #[test]
    fn test_grid_dims_single_point() {
        let header = Wgf4Header::from_axes(&[50.0], &[7.0], DEFAULT_MULTIPLIER).unwrap();
        assert_eq!(header.latitude_step, 0);
        assert_eq!(header.grid_dims(), (1, 1));
    }

    #[test]
    fn test_fields_order() {
        let header = Wgf4Header::from_fields([1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(header.latitude_min, 1);
        assert_eq!(header.longitude_step, 6);
        assert_eq!(header.fields(), [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(header.to_degrees(3_500_000), 500_000.0);
    }
}
