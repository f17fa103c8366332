//! WGF4 binary grid format.
//!
//! A WGF4 file is a fixed seven-integer header describing a regular
//! latitude/longitude grid in fixed-point degrees, the sentinel used for
//! missing cells, and the row-major field as 32-bit floats.
//!
//! ```text
//!  0        28       32                               32 + 4*rows*cols
//!  ├────────┼────────┼────────────────────────────────┤
//!  │ header │sentinel│ f32 field (row-major)          │
//!  └────────┴────────┴────────────────────────────────┘
//! ```
//!
//! Grid dimensions are not stored; consumers recover them from the bounds
//! and steps (see [`Wgf4Header::grid_dims`]).
//!
//! # Example
//!
//! ```ignore
//! use wgf4::{Wgf4Header, write_file, EMPTY_VALUE, DEFAULT_MULTIPLIER};
//!
//! let header = Wgf4Header::from_axes(&lats, &lons, DEFAULT_MULTIPLIER)?;
//! write_file(&out_dir.join("PRATE.wgf4"), &header, &field, EMPTY_VALUE)?;
//! ```

pub mod error;
pub mod header;
pub mod reader;
pub mod writer;

pub use error::{Result, Wgf4Error};
pub use header::{Wgf4Header, DEFAULT_MULTIPLIER, HEADER_LEN};
pub use reader::Wgf4File;
pub use writer::{encode, write_file, EMPTY_VALUE};
