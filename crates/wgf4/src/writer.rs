//! WGF4 serialization.
//!
//! Layout (little-endian, no padding, no length prefix):
//!
//! ```text
//! i32 latitude_min | i32 latitude_max | i32 longitude_min | i32 longitude_max
//! i32 latitude_step | i32 longitude_step | i32 multiplier
//! f32 sentinel
//! f32 × rows*cols   (row-major)
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::Result;
use crate::header::{Wgf4Header, HEADER_LEN};

/// Placeholder written for cells with no data.
pub const EMPTY_VALUE: f32 = -100500.00;

/// Encode a header and a row-major field into WGF4 bytes.
///
/// NaN cells are replaced with `sentinel`.
pub fn encode(header: &Wgf4Header, values: &[f32], sentinel: f32) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + 4 + values.len() * 4);

    for field in header.fields() {
        buf.put_i32_le(field);
    }
    buf.put_f32_le(sentinel);

    for &value in values {
        buf.put_f32_le(if value.is_nan() { sentinel } else { value });
    }

    buf.freeze()
}

/// Write a WGF4 file.
///
/// Bytes go to a sibling temporary file which is synced and renamed over
/// `path` only once fully written, so readers never see a partial file.
pub fn write_file(path: &Path, header: &Wgf4Header, values: &[f32], sentinel: f32) -> Result<()> {
    let data = encode(header, values, sentinel);
    let temp_path = partial_path(path);

    if let Err(e) = write_and_sync(&temp_path, &data) {
        fs::remove_file(&temp_path).ok();
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        fs::remove_file(&temp_path).ok();
        return Err(e.into());
    }

    debug!(
        path = %path.display(),
        bytes = data.len(),
        cells = values.len(),
        "Wrote WGF4 file"
    );
    Ok(())
}

fn write_and_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Wgf4Header {
        Wgf4Header::from_fields([47_000_000, 48_500_000, 8_000_000, 10_000_000, 375_000, 666_667, 1_000_000])
    }

    #[test]
    fn test_encode_layout() {
        let data = encode(&header(), &[1.5, 2.5], EMPTY_VALUE);

        assert_eq!(data.len(), 7 * 4 + 4 + 2 * 4);
        assert_eq!(&data[0..4], &47_000_000i32.to_le_bytes());
        assert_eq!(&data[24..28], &1_000_000i32.to_le_bytes());
        assert_eq!(&data[28..32], &EMPTY_VALUE.to_le_bytes());
        assert_eq!(&data[32..36], &1.5f32.to_le_bytes());
        assert_eq!(&data[36..40], &2.5f32.to_le_bytes());
    }

    #[test]
    fn test_nan_replaced_with_sentinel() {
        let values = [f32::NAN, 3.0, f32::NAN];
        let data = encode(&header(), &values, EMPTY_VALUE);

        let cells: Vec<f32> = data[32..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        assert_eq!(cells, vec![EMPTY_VALUE, 3.0, EMPTY_VALUE]);
        assert!(cells.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_write_file_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PRATE.wgf4");

        write_file(&path, &header(), &[0.0; 12], EMPTY_VALUE).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 32 + 48);
        assert!(!dir.path().join("PRATE.wgf4.partial").exists());
    }

    #[test]
    fn test_write_file_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PRATE.wgf4");

        write_file(&path, &header(), &[1.0; 4], EMPTY_VALUE).unwrap();
        write_file(&path, &header(), &[2.0; 2], EMPTY_VALUE).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 32 + 8);
    }

    #[test]
    fn test_write_file_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("PRATE.wgf4");

        assert!(write_file(&path, &header(), &[1.0], EMPTY_VALUE).is_err());
        assert!(!path.exists());
    }
}
