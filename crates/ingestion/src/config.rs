//! Pipeline configuration.
//!
//! Built once at process start and passed by reference to every stage;
//! read-only afterwards.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// Environment variable holding the directory listing URL.
pub const DIRECTORY_URL_VAR: &str = "GRIB2_FILES_DIRECTORY_URL";

/// What to do when the output file for a forecast hour already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingOutputPolicy {
    /// Reprocess and replace the existing file.
    #[default]
    Overwrite,
    /// Keep the existing file. The delta state still advances.
    Skip,
}

impl FromStr for ExistingOutputPolicy {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            other => Err(IngestionError::InvalidConfig(format!(
                "unknown existing-output policy '{}' (expected 'overwrite' or 'skip')",
                other
            ))),
        }
    }
}

impl fmt::Display for ExistingOutputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Skip => f.write_str("skip"),
        }
    }
}

/// Configuration for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// URL of the HTML directory index listing forecast files
    pub directory_url: String,
    /// Root under which one directory per forecast validity hour is created
    pub output_root: PathBuf,
    /// Directory for decompressed files; a temporary directory when unset
    pub staging_dir: Option<PathBuf>,
    /// Maximum concurrent downloads
    pub max_concurrent_downloads: usize,
    /// Suffix a listing link must end with
    pub link_suffix: String,
    /// Token a listing link must contain (projection variant)
    pub variant_token: String,
    /// Fixed-point scale for header coordinates
    pub multiplier: i32,
    /// Value written for missing cells
    pub sentinel: f32,
    /// Forecast offsets whose files legitimately carry a single field
    pub single_field_offsets: Vec<u32>,
    /// Behavior when an output file already exists
    pub existing_output: ExistingOutputPolicy,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl PipelineConfig {
    /// Configuration with defaults for the given listing URL.
    pub fn new(directory_url: impl Into<String>) -> Self {
        Self {
            directory_url: directory_url.into(),
            output_root: PathBuf::from("result/icon_d2"),
            staging_dir: None,
            max_concurrent_downloads: 4,
            link_suffix: "grib2.bz2".to_string(),
            variant_token: "regular-lat-lon".to_string(),
            multiplier: wgf4::DEFAULT_MULTIPLIER,
            sentinel: wgf4::EMPTY_VALUE,
            single_field_offsets: vec![48],
            existing_output: ExistingOutputPolicy::Overwrite,
            request_timeout_secs: 600,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `GRIB2_FILES_DIRECTORY_URL` provides the listing URL; `PRATE_*`
    /// variables override the defaults. Call [`validate`](Self::validate)
    /// before use.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(get(DIRECTORY_URL_VAR).unwrap_or_default());

        if let Some(root) = get("PRATE_OUTPUT_ROOT") {
            config.output_root = PathBuf::from(root);
        }
        if let Some(dir) = get("PRATE_STAGING_DIR") {
            config.staging_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = get("PRATE_MAX_CONCURRENT_DOWNLOADS") {
            config.max_concurrent_downloads = parse_var("PRATE_MAX_CONCURRENT_DOWNLOADS", &n)?;
        }
        if let Some(policy) = get("PRATE_EXISTING_OUTPUT") {
            config.existing_output = policy.parse()?;
        }
        if let Some(secs) = get("PRATE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_var("PRATE_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.directory_url.trim().is_empty() {
            return Err(IngestionError::InvalidConfig(format!(
                "directory URL is empty (set {})",
                DIRECTORY_URL_VAR
            )));
        }
        if !self.directory_url.starts_with("http://") && !self.directory_url.starts_with("https://") {
            return Err(IngestionError::InvalidConfig(format!(
                "directory URL must be http(s): {}",
                self.directory_url
            )));
        }
        if self.max_concurrent_downloads == 0 {
            return Err(IngestionError::InvalidConfig(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        if self.multiplier <= 0 {
            return Err(IngestionError::InvalidConfig(format!(
                "multiplier must be positive, got {}",
                self.multiplier
            )));
        }
        if self.link_suffix.is_empty() {
            return Err(IngestionError::InvalidConfig("link_suffix is empty".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IngestionError::InvalidConfig(format!("{} has invalid value '{}'", key, value)))
}
