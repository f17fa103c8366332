//! Output directory layout.
//!
//! One directory per forecast validity hour under the output root, named
//! `DD.MM.YYYY_HH:MM_<unix seconds>`, holding a single `PRATE.wgf4`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeZone, Utc};
use tokio::fs;

use crate::error::Result;
use crate::metadata::ForecastFileName;

/// Name of the file written into each output directory.
pub const OUTPUT_FILE_NAME: &str = "PRATE.wgf4";

/// Directory name for one forecast validity hour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey(String);

impl OutputKey {
    /// Key for a validity time, interpreted as UTC.
    pub fn for_validity(validity: NaiveDateTime) -> Self {
        let utc = Utc.from_utc_datetime(&validity);
        Self(format!(
            "{}_{}",
            utc.format("%d.%m.%Y_%H:%M"),
            utc.timestamp()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the output file for this key under `root`.
    pub fn output_file(&self, root: &Path) -> PathBuf {
        root.join(&self.0).join(OUTPUT_FILE_NAME)
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the output key from a forecast file name.
pub fn resolve_output_dir(file_name: &str) -> Result<OutputKey> {
    let forecast = ForecastFileName::parse(file_name)?;
    Ok(OutputKey::for_validity(forecast.validity()))
}

/// Create `<root>/<key>` if missing and return its path.
pub async fn ensure_output_dir(root: &Path, key: &OutputKey) -> Result<PathBuf> {
    let dir = root.join(key.as_str());
    fs::create_dir_all(&dir).await?;
    Ok(dir)
}
