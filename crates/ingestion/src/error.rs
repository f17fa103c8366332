//! Error types for the ingestion crate.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use reqwest::StatusCode;
use thiserror::Error;
use wgf4::Wgf4Error;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// The directory listing could not be fetched or read. Fatal for a run.
    #[error("failed to discover forecast files at {url}: {reason}")]
    Discovery { url: String, reason: String },

    /// A file fetch returned a non-success status. Recorded per locator.
    #[error("HTTP {status} fetching {url}")]
    Transport { url: String, status: StatusCode },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decompression failed for {url}: {reason}")]
    Decompression { url: String, reason: String },

    /// The grid file cannot be opened or has an unrecognized field shape.
    #[error("invalid grid file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Writing the WGF4 output failed.
    #[error("failed to write {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: Wgf4Error,
    },

    #[error("forecast valid at {validity} is not after the previous forecast valid at {previous}")]
    OutOfOrder {
        previous: NaiveDateTime,
        validity: NaiveDateTime,
    },

    #[error("field shape {actual:?} does not match previous field shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Two locators decompress to the same staging path.
    #[error("staging name {name} is already claimed by {claimed_by}")]
    DuplicateTarget { name: String, claimed_by: String },

    #[error("cannot parse forecast metadata from file name: {0}")]
    InvalidFileName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestionError {
    /// Create a Format error.
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a Discovery error.
    pub fn discovery(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Discovery {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
