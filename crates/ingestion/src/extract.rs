//! Grid extraction from staged GRIB2 files.
//!
//! A TOT_PREC file normally holds several intra-hour time steps; the last
//! one is the reading for the full hour. The final forecast hour is
//! published with a single field.

use std::fs::File;
use std::io::BufReader;
use std::num::ParseFloatError;
use std::path::Path;

use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::fetch::StagedFile;
use crate::field::PrecipField;
use crate::metadata::ForecastFileName;

/// Precipitation values exactly as stored, with their dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    /// `[rows, cols]` or `[steps, rows, cols]`
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// Coordinate axes and raw values read from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGrid {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub field: RawField,
}

/// Reads coordinate axes and the precipitation array from a grid file.
pub trait GridReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<RawGrid>;
}

/// Layout of the raw precipitation array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    Stacked { steps: usize, rows: usize, cols: usize },
    Single { rows: usize, cols: usize },
}

impl FieldShape {
    pub fn classify(dims: &[usize]) -> Option<Self> {
        match *dims {
            [rows, cols] => Some(Self::Single { rows, cols }),
            [steps, rows, cols] if steps > 0 => Some(Self::Stacked { steps, rows, cols }),
            _ => None,
        }
    }

    pub fn grid(&self) -> (usize, usize) {
        match *self {
            Self::Stacked { rows, cols, .. } | Self::Single { rows, cols } => (rows, cols),
        }
    }

    fn value_count(&self) -> Option<usize> {
        match *self {
            Self::Stacked { steps, rows, cols } => steps.checked_mul(rows)?.checked_mul(cols),
            Self::Single { rows, cols } => rows.checked_mul(cols),
        }
    }
}

/// Axes plus the single 2D field selected for one forecast hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedGrid {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub field: PrecipField,
}

/// Reads staged files and selects the field to convert.
pub struct GridExtractor<R> {
    reader: R,
    single_field_offsets: Vec<u32>,
}

impl<R: GridReader> GridExtractor<R> {
    pub fn new(reader: R, single_field_offsets: Vec<u32>) -> Self {
        Self {
            reader,
            single_field_offsets,
        }
    }

    /// Extract the axes and the cumulative field for the full hour.
    pub fn extract(&self, staged: &StagedFile, forecast: &ForecastFileName) -> Result<ExtractedGrid> {
        let path = staged.path.as_path();
        let grid = self.reader.read(path)?;

        let shape = FieldShape::classify(&grid.field.dims).ok_or_else(|| {
            IngestionError::format(path, format!("unsupported field dimensions {:?}", grid.field.dims))
        })?;

        if shape.value_count() != Some(grid.field.values.len()) {
            return Err(IngestionError::format(
                path,
                format!(
                    "{} values do not fill dimensions {:?}",
                    grid.field.values.len(),
                    grid.field.dims
                ),
            ));
        }

        let (rows, cols) = shape.grid();
        if grid.latitudes.len() != rows || grid.longitudes.len() != cols {
            return Err(IngestionError::format(
                path,
                format!(
                    "axes {}x{} do not match field {}x{}",
                    grid.latitudes.len(),
                    grid.longitudes.len(),
                    rows,
                    cols
                ),
            ));
        }

        let mut values = grid.field.values;
        match shape {
            FieldShape::Stacked { steps, .. } => {
                let cells = rows * cols;
                values.drain(..(steps - 1) * cells);
            }
            FieldShape::Single { .. } => {
                if !self.single_field_offsets.contains(&forecast.offset_hours) {
                    return Err(IngestionError::format(
                        path,
                        format!(
                            "single field at offset {:03} where a time-step stack is expected",
                            forecast.offset_hours
                        ),
                    ));
                }
            }
        }

        debug!(path = %path.display(), ?shape, "Extracted field");

        let field = PrecipField::new(rows, cols, values)
            .ok_or_else(|| IngestionError::format(path, "field size mismatch"))?;

        Ok(ExtractedGrid {
            latitudes: grid.latitudes,
            longitudes: grid.longitudes,
            field,
        })
    }
}

/// [`GridReader`] for GRIB2 files on regular latitude/longitude grids.
///
/// Each submessage is one time step.
#[derive(Debug, Clone, Copy, Default)]
pub struct GribReader;

impl GridReader for GribReader {
    fn read(&self, path: &Path) -> Result<RawGrid> {
        let format_err = |reason: String| IngestionError::format(path, reason);

        let file = File::open(path)?;
        let grib2 = grib::from_reader(BufReader::new(file))
            .map_err(|e| format_err(format!("not a GRIB2 file: {}", e)))?;

        let mut latitudes = Vec::new();
        let mut longitudes = Vec::new();
        let mut shape: Option<(usize, usize)> = None;
        let mut steps = 0usize;
        let mut values = Vec::new();

        for (index, submsg) in grib2.iter() {
            let (ni, nj) = submsg
                .grid_shape()
                .map_err(|e| format_err(format!("submessage {:?} has no regular grid: {}", index, e)))?;

            match shape {
                None => {
                    let points: Vec<(f32, f32)> = submsg
                        .latlons()
                        .map_err(|e| format_err(format!("cannot compute grid points: {}", e)))?
                        .collect();
                    if points.len() != ni * nj {
                        return Err(format_err(format!(
                            "{} grid points for a {}x{} grid",
                            points.len(),
                            ni,
                            nj
                        )));
                    }
                    let widen = |value: f32| {
                        widen_coordinate(value)
                            .map_err(|e| format_err(format!("unreadable grid coordinate {}: {}", value, e)))
                    };
                    latitudes = (0..nj).map(|j| widen(points[j * ni].0)).collect::<Result<_>>()?;
                    longitudes = (0..ni).map(|i| widen(points[i].1)).collect::<Result<_>>()?;
                    shape = Some((ni, nj));
                }
                Some(first) if first != (ni, nj) => {
                    return Err(format_err(format!(
                        "submessage {:?} grid {}x{} differs from {}x{}",
                        index, ni, nj, first.0, first.1
                    )));
                }
                Some(_) => {}
            }

            let decoder = grib::Grib2SubmessageDecoder::from(submsg)
                .map_err(|e| format_err(format!("cannot decode submessage {:?}: {}", index, e)))?;
            let decoded = decoder
                .dispatch()
                .map_err(|e| format_err(format!("cannot unpack submessage {:?}: {:?}", index, e)))?;

            let before = values.len();
            values.extend(decoded);
            if values.len() - before != ni * nj {
                return Err(format_err(format!(
                    "submessage {:?} unpacked {} values for a {}x{} grid",
                    index,
                    values.len() - before,
                    ni,
                    nj
                )));
            }
            steps += 1;
        }

        let (ni, nj) = shape.ok_or_else(|| format_err("file contains no GRIB2 messages".to_string()))?;
        let dims = if steps == 1 { vec![nj, ni] } else { vec![steps, nj, ni] };

        Ok(RawGrid {
            latitudes,
            longitudes,
            field: RawField { dims, values },
        })
    }
}

/// Widen a grid coordinate to the shortest decimal that round-trips
/// through `f32`, so `47.06` stays `47.06` rather than `47.060001373...`.
fn widen_coordinate(value: f32) -> std::result::Result<f64, ParseFloatError> {
    value.to_string().parse()
}
