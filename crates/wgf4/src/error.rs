//! Error types for the WGF4 format.

use thiserror::Error;

/// Errors that can occur while building, writing or reading WGF4 data.
#[derive(Error, Debug)]
pub enum Wgf4Error {
    /// A coordinate axis had no values.
    #[error("{axis} axis is empty")]
    EmptyAxis { axis: &'static str },

    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate on {axis} axis: {value}")]
    NonFiniteCoordinate { axis: &'static str, value: f64 },

    /// A scaled coordinate does not fit in a signed 32-bit integer.
    #[error("scaled value {value} does not fit in i32")]
    ScaleOverflow { value: f64 },

    /// The multiplier must be strictly positive.
    #[error("invalid multiplier: {0}")]
    InvalidMultiplier(i32),

    /// Input bytes are shorter than the layout requires, or misaligned.
    #[error("truncated WGF4 data: {0}")]
    Truncated(String),

    /// Storage/IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for WGF4 operations.
pub type Result<T> = std::result::Result<T, Wgf4Error>;
