//! Metadata extraction from forecast file names and locators.
//!
//! Provider file names embed issuance time and forecast offset, e.g.
//! `icon-d2_germany_regular-lat-lon_single-level_2024030100_005_2d_tot_prec.grib2.bz2`.

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IngestionError, Result};

/// `YYYYMMDDHH_OOO_2d`; the greedy prefix selects the last occurrence.
static FORECAST_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*(\d{4})(\d{2})(\d{2})(\d{2})_(\d{3})_2d").expect("valid regex"));

/// Compression applied to a published file, detected from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Bzip2,
    Gzip,
    None,
}

impl Compression {
    /// Detect compression from a file name or URL.
    pub fn detect(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".bz2") {
            Self::Bzip2
        } else if lower.ends_with(".gz") {
            Self::Gzip
        } else {
            Self::None
        }
    }

    /// File suffix including the dot, empty for uncompressed files.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Bzip2 => ".bz2",
            Self::Gzip => ".gz",
            Self::None => "",
        }
    }
}

/// Absolute URL of one compressed forecast file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForecastLocator {
    url: String,
}

impl ForecastLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Trailing path segment of the URL, without query or fragment.
    pub fn file_name(&self) -> &str {
        let path = self
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }

    pub fn compression(&self) -> Compression {
        Compression::detect(self.file_name())
    }

    /// Name of the decompressed file in the staging directory.
    pub fn staged_name(&self) -> Option<&str> {
        let name = self.file_name();
        let suffix = self.compression().suffix();
        let staged = &name[..name.len() - suffix.len()];
        (!staged.is_empty()).then_some(staged)
    }
}

impl fmt::Display for ForecastLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Issuance and forecast offset parsed from a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastFileName {
    pub issuance: NaiveDateTime,
    pub offset_hours: u32,
}

impl ForecastFileName {
    /// Parse a file name (or path) carrying `YYYYMMDDHH_OOO_2d`.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || IngestionError::InvalidFileName(name.to_string());

        let caps = FORECAST_NAME_PATTERN.captures(name).ok_or_else(invalid)?;
        let field = |i: usize| -> Result<u32> {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(invalid)
        };

        let issuance = NaiveDate::from_ymd_opt(field(1)? as i32, field(2)?, field(3)?)
            .and_then(|date| date.and_hms_opt(field(4).ok()?, 0, 0))
            .ok_or_else(invalid)?;

        Ok(Self {
            issuance,
            offset_hours: field(5)?,
        })
    }

    /// The real-world time this forecast hour represents.
    pub fn validity(&self) -> NaiveDateTime {
        self.issuance + Duration::hours(self.offset_hours as i64)
    }
}
