//! rowpack - Byte-oriented columnar compression for integer time series
//!
//! Compresses a row-major stream of fixed-width records whose fields are
//! single bytes. Successive records in sampled data tend to differ
//! little, so per-dimension deltas are narrow and stretches of identical
//! records are common; the codec bit-packs each dimension at its own
//! width and can replace all-zero stretches with run lengths.
//!
//! Three modes share the same block/group framing:
//!
//! - [`encode_rowmajor`]: variable-width bit packing only
//! - [`encode_rowmajor_delta`]: per-dimension delta + zig-zag, then packing
//! - [`encode_rowmajor_delta_rle`]: as above, with run-length encoding of
//!   blocks whose deltas are all zero
//!
//! # Example
//! ```
//! use rowpack::{decode_rowmajor_delta_rle, encode_rowmajor_delta_rle, max_compressed_len};
//!
//! // a steady sensor: 1024 records of 4 one-byte channels
//! let samples = vec![7u8; 4096];
//!
//! let mut compressed = vec![0u8; max_compressed_len(samples.len(), 4)];
//! let written = encode_rowmajor_delta_rle(&samples, &mut compressed, 4, true)
//!     .expect("compression failed");
//! assert!(written < samples.len() / 10);
//!
//! let mut decompressed = vec![0u8; samples.len()];
//! let produced = decode_rowmajor_delta_rle(&compressed[..written], &mut decompressed)
//!     .expect("decompression failed");
//! assert_eq!(produced, samples.len());
//! assert_eq!(decompressed, samples);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod bits;
mod delta;
mod header;
mod stripe;

pub mod error;
pub mod rowmajor;
pub mod rowmajor_delta;
pub mod rowmajor_delta_rle;

pub use error::{CodecError, CodecResult};
pub use rowmajor::{decode_rowmajor, encode_rowmajor};
pub use rowmajor_delta::{decode_rowmajor_delta, encode_rowmajor_delta};
pub use rowmajor_delta_rle::{decode_rowmajor_delta_rle, encode_rowmajor_delta_rle};

use header::{group_header_bytes, RleHeader, SizeHeader};

/// Records per block; a block is the unit of width analysis and packing.
pub const BLOCK_SZ: usize = 8;

/// Dimensions per stripe; a stripe shares one 64-bit pack mask.
pub const STRIPE_SZ: usize = 8;

/// Blocks per group; a group's width headers precede its block bodies.
pub const GROUP_SZ_BLOCKS: usize = 2;

/// Header bits per dimension per block (width 7 doubles as 8).
pub const NBITS_SZ_BITS: usize = 3;

/// Run-length cap; the field is a 15-bit counter.
pub const MAX_RUN_NBLOCKS: u16 = 0x7fff;

/// Compression mode identifier, for embedding in container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    /// Bit packing only
    RowMajor = 0x00,
    /// Delta + zig-zag, then bit packing
    RowMajorDelta = 0x01,
    /// Delta + zig-zag with run-length encoding
    RowMajorDeltaRle = 0x02,
}

impl Mode {
    /// Convert u8 to Mode
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Mode::RowMajor),
            0x01 => Some(Mode::RowMajorDelta),
            0x02 => Some(Mode::RowMajorDeltaRle),
            _ => None,
        }
    }

    /// Compress `src` with this mode; see the mode's `encode_*` function.
    pub fn encode(
        self,
        src: &[u8],
        dest: &mut [u8],
        ndims: u16,
        write_size: bool,
    ) -> CodecResult<usize> {
        match self {
            Mode::RowMajor => encode_rowmajor(src, dest, ndims, write_size),
            Mode::RowMajorDelta => encode_rowmajor_delta(src, dest, ndims, write_size),
            Mode::RowMajorDeltaRle => encode_rowmajor_delta_rle(src, dest, ndims, write_size),
        }
    }

    /// Decompress `src` with this mode; see the mode's `decode_*` function.
    pub fn decode(self, src: &[u8], dest: &mut [u8]) -> CodecResult<usize> {
        match self {
            Mode::RowMajor => decode_rowmajor(src, dest),
            Mode::RowMajorDelta => decode_rowmajor_delta(src, dest),
            Mode::RowMajorDeltaRle => decode_rowmajor_delta_rle(src, dest),
        }
    }
}

/// Worst-case compressed size for an input of `len` bytes at `ndims`
/// dimensions, across all modes: the metadata prefix, one width header
/// and up to two run-length fields per group, the bodies (never wider
/// than the raw group), and slack for the packers' 8-byte writes.
///
/// Encoders require `dest` to be at least this large.
pub fn max_compressed_len(len: usize, ndims: u16) -> usize {
    let nd = (ndims as usize).max(1);
    let group_sz = nd * BLOCK_SZ * GROUP_SZ_BLOCKS;
    let per_group = group_header_bytes(nd) + 4;
    8 + len + (len / group_sz + 2) * per_group + 16
}

/// Read the decoded size from a stream's metadata prefix without
/// decoding.
///
/// Returns `None` for [`Mode::RowMajorDeltaRle`]: run-length streams
/// record a group count rather than a length, so their decoded size is
/// only discovered by decoding.
pub fn decoded_len(src: &[u8], mode: Mode) -> CodecResult<Option<usize>> {
    match mode {
        Mode::RowMajor | Mode::RowMajorDelta => {
            let header = SizeHeader::read(src)?;
            Ok(Some(header.orig_len as usize))
        }
        Mode::RowMajorDeltaRle => {
            RleHeader::read(src)?;
            Ok(None)
        }
    }
}
