//! Precipitation forecast ingestion library.
//!
//! Converts ICON-D2 total-precipitation GRIB2 files into per-hour WGF4
//! grids.
//!
//! # Architecture
//!
//! One run of the [`Pipeline`] moves through these stages:
//!
//! - Listing resolution: HTML directory index to forecast file URLs
//! - Fetch and decompress: concurrent streaming downloads into staging
//! - Grid extraction: axes and the full-hour field from each GRIB2 file
//! - Delta computation: cumulative totals to per-hour increments
//! - Serialization: one `PRATE.wgf4` per validity hour
//!
//! Fetches run concurrently; conversion is sequential because each hour's
//! delta depends on the previous hour.

pub mod config;
mod decode;
pub mod delta;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod field;
pub mod listing;
pub mod metadata;
pub mod output;
mod pipeline;

// Re-exports
pub use config::{ExistingOutputPolicy, PipelineConfig, DIRECTORY_URL_VAR};
pub use decode::StreamDecoder;
pub use delta::{apply_delta, DeltaEngine};
pub use error::{IngestionError, Result};
pub use extract::{ExtractedGrid, FieldShape, GribReader, GridExtractor, GridReader, RawField, RawGrid};
pub use fetch::{Fetcher, StagedFile};
pub use field::PrecipField;
pub use listing::{extract_locators, LinkFilter, ListingResolver};
pub use metadata::{Compression, ForecastFileName, ForecastLocator};
pub use output::{ensure_output_dir, resolve_output_dir, OutputKey, OUTPUT_FILE_NAME};
pub use pipeline::{FailureSummary, LocatorFailure, Pipeline, RunReport, RunSummary};
