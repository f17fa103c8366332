//! Incremental decompression of downloaded bodies.
//!
//! Compressed bytes are pushed in as they arrive from the network and
//! decoded output is pulled back out in bounded pieces, so neither the
//! body nor a single chunk's expansion is ever held whole in memory.

use std::io::{self, Write};

use bzip2::{Decompress, Status};
use flate2::write::GzDecoder;

use crate::metadata::Compression;

/// Largest piece returned for bzip2 and uncompressed bodies.
///
/// Gzip pieces are bounded by the deflate window held inside `flate2`.
pub const MAX_PIECE_LEN: usize = 64 * 1024;

/// Incremental decoder selected from the file's compression.
///
/// Call [`feed`](Self::feed) with each network chunk, then drain
/// [`next_piece`](Self::next_piece) until it returns `None`. After the last
/// chunk call [`finish`](Self::finish) and drain once more; the final drain
/// fails if the compressed stream is incomplete.
pub struct StreamDecoder {
    inner: Inner,
    pending: Vec<u8>,
    offset: usize,
    input_done: bool,
    piece: Vec<u8>,
}

enum Inner {
    Bzip2(Bzip2Stream),
    Gzip(GzipStream),
    Passthrough,
}

impl StreamDecoder {
    pub fn new(compression: Compression) -> Self {
        let (inner, piece) = match compression {
            Compression::Bzip2 => (Inner::Bzip2(Bzip2Stream::new()), vec![0; MAX_PIECE_LEN]),
            Compression::Gzip => (Inner::Gzip(GzipStream::new()), Vec::new()),
            Compression::None => (Inner::Passthrough, Vec::new()),
        };
        Self {
            inner,
            pending: Vec::new(),
            offset: 0,
            input_done: false,
            piece,
        }
    }

    /// Queue one chunk of compressed input.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.offset == self.pending.len() {
            self.pending.clear();
        } else {
            self.pending.drain(..self.offset);
        }
        self.offset = 0;
        self.pending.extend_from_slice(chunk);
    }

    /// Mark the end of input.
    pub fn finish(&mut self) {
        self.input_done = true;
    }

    /// Decode the next piece of output, or `None` once the queued input
    /// is used up.
    pub fn next_piece(&mut self) -> io::Result<Option<&[u8]>> {
        match &mut self.inner {
            Inner::Bzip2(stream) => {
                let available = &self.pending[self.offset..];
                let (consumed, produced) = stream.decode(available, &mut self.piece, self.input_done)?;
                self.offset += consumed;
                Ok((produced > 0).then(|| &self.piece[..produced]))
            }
            Inner::Gzip(stream) => loop {
                let out = std::mem::take(stream.decoder.get_mut());
                if !out.is_empty() {
                    self.piece = out;
                    return Ok(Some(&self.piece));
                }

                let available = &self.pending[self.offset..];
                if !available.is_empty() {
                    // A finished member accepts nothing more; trailing bytes are dropped
                    let consumed = stream.decoder.write(available)?;
                    self.offset += if consumed == 0 { available.len() } else { consumed };
                    continue;
                }

                if self.input_done && !stream.finished {
                    stream.decoder.try_finish()?;
                    stream.finished = true;
                    continue;
                }
                return Ok(None);
            },
            Inner::Passthrough => {
                let start = self.offset;
                let len = (self.pending.len() - start).min(MAX_PIECE_LEN);
                if len == 0 {
                    return Ok(None);
                }
                self.offset += len;
                Ok(Some(&self.pending[start..start + len]))
            }
        }
    }
}

struct GzipStream {
    decoder: GzDecoder<Vec<u8>>,
    finished: bool,
}

impl GzipStream {
    fn new() -> Self {
        Self {
            decoder: GzDecoder::new(Vec::new()),
            finished: false,
        }
    }
}

/// bzip2 state machine that accepts concatenated streams.
struct Bzip2Stream {
    decompress: Decompress,
    /// True once at least one stream ended and no later stream has started
    stream_ended: bool,
}

impl Bzip2Stream {
    fn new() -> Self {
        Self {
            decompress: Decompress::new(false),
            stream_ended: false,
        }
    }

    /// Decode into `out`, returning bytes consumed and bytes produced.
    /// Produces nothing only when `input` is used up.
    fn decode(&mut self, input: &[u8], out: &mut [u8], input_done: bool) -> io::Result<(usize, usize)> {
        let mut consumed_total = 0;

        loop {
            let remaining = &input[consumed_total..];
            if self.stream_ended {
                if remaining.is_empty() {
                    return Ok((consumed_total, 0));
                }
                self.decompress = Decompress::new(false);
                self.stream_ended = false;
            }

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let status = self
                .decompress
                .decompress(remaining, out)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let consumed = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            consumed_total += consumed;

            match status {
                Status::StreamEnd => self.stream_ended = true,
                Status::MemNeeded => {
                    return Err(io::Error::new(io::ErrorKind::OutOfMemory, "bzip2 needs more memory"))
                }
                _ => {}
            }

            if produced > 0 {
                return Ok((consumed_total, produced));
            }
            if consumed == 0 && !self.stream_ended {
                if !remaining.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "bzip2 decoder made no progress",
                    ));
                }
                if input_done {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "bzip2 stream ended before its end-of-stream marker",
                    ));
                }
                return Ok((consumed_total, 0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{bzip2_compress, gzip_compress, patterned_payload};

    /// Decode `data` fed in `chunk`-sized slices, returning the output and
    /// the largest piece seen.
    fn decode_with_largest_piece(
        compression: Compression,
        data: &[u8],
        chunk: usize,
    ) -> io::Result<(Vec<u8>, usize)> {
        let mut decoder = StreamDecoder::new(compression);
        let mut out = Vec::new();
        let mut largest = 0;
        let mut drain = |decoder: &mut StreamDecoder, out: &mut Vec<u8>| -> io::Result<()> {
            while let Some(piece) = decoder.next_piece()? {
                largest = largest.max(piece.len());
                out.extend_from_slice(piece);
            }
            Ok(())
        };

        for slice in data.chunks(chunk) {
            decoder.feed(slice);
            drain(&mut decoder, &mut out)?;
        }
        decoder.finish();
        drain(&mut decoder, &mut out)?;
        Ok((out, largest))
    }

    fn decode_in_chunks(compression: Compression, data: &[u8], chunk: usize) -> io::Result<Vec<u8>> {
        decode_with_largest_piece(compression, data, chunk).map(|(out, _)| out)
    }

    #[test]
    fn test_bzip2_chunked() {
        let payload = patterned_payload(200_000);
        let compressed = bzip2_compress(&payload);

        for chunk in [1, 7, 1024, compressed.len()] {
            assert_eq!(decode_in_chunks(Compression::Bzip2, &compressed, chunk).unwrap(), payload);
        }
    }

    #[test]
    fn test_bzip2_concatenated_streams() {
        let mut compressed = bzip2_compress(b"first ");
        compressed.extend(bzip2_compress(b"second"));

        let out = decode_in_chunks(Compression::Bzip2, &compressed, 5).unwrap();
        assert_eq!(out, b"first second");
    }

    #[test]
    fn test_bzip2_truncated_fails() {
        let compressed = bzip2_compress(&patterned_payload(50_000));
        let truncated = &compressed[..compressed.len() / 2];

        assert!(decode_in_chunks(Compression::Bzip2, truncated, 512).is_err());
    }

    #[test]
    fn test_bzip2_empty_body_fails() {
        let mut decoder = StreamDecoder::new(Compression::Bzip2);
        decoder.finish();
        assert!(decoder.next_piece().is_err());
    }

    #[test]
    fn test_bzip2_highly_compressible_chunk_is_split_into_bounded_pieces() {
        let payload = vec![0u8; 16 * 1024 * 1024];
        let compressed = bzip2_compress(&payload);
        assert!(compressed.len() < MAX_PIECE_LEN);

        // Whole body in one network chunk
        let (out, largest) = decode_with_largest_piece(Compression::Bzip2, &compressed, compressed.len()).unwrap();

        assert_eq!(out.len(), payload.len());
        assert!(out.iter().all(|&b| b == 0));
        assert!(largest <= MAX_PIECE_LEN, "piece of {} bytes", largest);
    }

    #[test]
    fn test_gzip_highly_compressible_chunk_is_split_into_bounded_pieces() {
        let payload = vec![0u8; 16 * 1024 * 1024];
        let compressed = gzip_compress(&payload);

        let (out, largest) = decode_with_largest_piece(Compression::Gzip, &compressed, compressed.len()).unwrap();

        assert_eq!(out.len(), payload.len());
        assert!(largest <= 4 * MAX_PIECE_LEN, "piece of {} bytes", largest);
    }

    #[test]
    fn test_undrained_input_is_kept_across_feeds() {
        let payload = patterned_payload(20_000);
        let compressed = bzip2_compress(&payload);
        let (head, tail) = compressed.split_at(compressed.len() / 2);

        let mut decoder = StreamDecoder::new(Compression::Bzip2);
        decoder.feed(head);
        decoder.feed(tail);
        decoder.finish();

        let mut out = Vec::new();
        while let Some(piece) = decoder.next_piece().unwrap() {
            out.extend_from_slice(piece);
        }
        assert_eq!(out, payload);
    }

    #[test]
    fn test_bzip2_garbage_fails() {
        assert!(decode_in_chunks(Compression::Bzip2, b"this is not bzip2 data", 4).is_err());
    }

    #[test]
    fn test_gzip_chunked() {
        let payload = patterned_payload(100_000);
        let compressed = gzip_compress(&payload);

        assert_eq!(decode_in_chunks(Compression::Gzip, &compressed, 333).unwrap(), payload);
    }

    #[test]
    fn test_gzip_truncated_fails() {
        let compressed = gzip_compress(&patterned_payload(10_000));
        assert!(decode_in_chunks(Compression::Gzip, &compressed[..compressed.len() - 4], 64).is_err());
    }

    #[test]
    fn test_passthrough() {
        let payload = patterned_payload(4096);
        assert_eq!(decode_in_chunks(Compression::None, &payload, 100).unwrap(), payload);
    }

    #[test]
    fn test_passthrough_splits_large_chunks() {
        let payload = patterned_payload(3 * MAX_PIECE_LEN + 10);
        let (out, largest) = decode_with_largest_piece(Compression::None, &payload, payload.len()).unwrap();

        assert_eq!(out, payload);
        assert_eq!(largest, MAX_PIECE_LEN);
    }
}
