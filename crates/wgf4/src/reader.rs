//! WGF4 decoding.

use std::path::Path;

use bytes::Buf;

use crate::error::{Result, Wgf4Error};
use crate::header::{Wgf4Header, HEADER_LEN};

/// A decoded WGF4 file.
#[derive(Debug, Clone, PartialEq)]
pub struct Wgf4File {
    pub header: Wgf4Header,
    pub sentinel: f32,
    /// Row-major cell values, sentinel included where data was missing.
    pub values: Vec<f32>,
}

impl Wgf4File {
    /// Decode WGF4 bytes.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN + 4 {
            return Err(Wgf4Error::Truncated(format!(
                "{} bytes is shorter than the {}-byte header",
                data.len(),
                HEADER_LEN + 4
            )));
        }

        let body_len = data.len() - HEADER_LEN - 4;
        if body_len % 4 != 0 {
            return Err(Wgf4Error::Truncated(format!(
                "field section of {} bytes is not a whole number of f32 cells",
                body_len
            )));
        }

        let mut fields = [0i32; 7];
        for field in fields.iter_mut() {
            *field = data.get_i32_le();
        }
        let sentinel = data.get_f32_le();

        let mut values = Vec::with_capacity(body_len / 4);
        while data.has_remaining() {
            values.push(data.get_f32_le());
        }

        Ok(Self {
            header: Wgf4Header::from_fields(fields),
            sentinel,
            values,
        })
    }

    /// Read and decode a WGF4 file from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::decode(&data)
    }

    /// Number of cells holding the sentinel.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|&&v| v == self.sentinel).count()
    }

    /// Value at `(row, col)` given the number of columns.
    pub fn value_at(&self, row: usize, col: usize, cols: usize) -> Option<f32> {
        if col >= cols {
            return None;
        }
        self.values.get(row * cols + col).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{encode, EMPTY_VALUE};

    #[test]
    fn test_decode_truncated_header() {
        let err = Wgf4File::decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, Wgf4Error::Truncated(_)));
    }

    #[test]
    fn test_decode_misaligned_body() {
        let err = Wgf4File::decode(&[0u8; 34]).unwrap_err();
        assert!(matches!(err, Wgf4Error::Truncated(_)));
    }

    #[test]
    fn test_decode_header_only() {
        let header = Wgf4Header::from_fields([0, 0, 0, 0, 0, 0, 1_000_000]);
        let file = Wgf4File::decode(&encode(&header, &[], EMPTY_VALUE)).unwrap();

        assert_eq!(file.header, header);
        assert_eq!(file.sentinel, EMPTY_VALUE);
        assert!(file.values.is_empty());
    }

    #[test]
    fn test_value_at_and_missing_count() {
        let header = Wgf4Header::from_fields([0, 1, 0, 2, 1, 1, 1]);
        let values = [1.0, f32::NAN, 3.0, 4.0, 5.0, f32::NAN];
        let file = Wgf4File::decode(&encode(&header, &values, EMPTY_VALUE)).unwrap();

        assert_eq!(file.value_at(1, 0, 3), Some(4.0));
        assert_eq!(file.value_at(0, 1, 3), Some(EMPTY_VALUE));
        assert_eq!(file.value_at(0, 3, 3), None);
        assert_eq!(file.value_at(2, 0, 3), None);
        assert_eq!(file.missing_count(), 2);
    }
}
