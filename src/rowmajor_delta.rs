//! Row-major mode with a first-order delta stage
//!
//! Each dimension is differenced against its value in the previous record
//! (zero for the first), zig-zag mapped, and bit-packed exactly as in the
//! plain mode. The decoder unpacks into a padded scratch buffer and
//! reconstructs running values 32 lanes at a time.

use alloc::vec;

use crate::delta::{analyze_block_delta, padded_ndims, undo_block};
use crate::error::{CodecError, CodecResult};
use crate::header::{group_header_bytes, write_block_widths, GroupWidths, SizeHeader};
use crate::rowmajor::MIN_PACKED_LEN;
use crate::stripe::{pack_block, row_layout, unpack_block, BlockPlan};
use crate::{max_compressed_len, BLOCK_SZ, GROUP_SZ_BLOCKS, STRIPE_SZ};

/// Compress `src` as records of `ndims` byte-wide dimensions, delta
/// coding each dimension before packing.
///
/// Returns the number of bytes written to `dest`. When `write_size` is
/// set, an 8-byte metadata prefix records the original length and
/// dimensionality for the decoder.
pub fn encode_rowmajor_delta(
    src: &[u8],
    dest: &mut [u8],
    ndims: u16,
    write_size: bool,
) -> CodecResult<usize> {
    let len = src.len();
    if ndims == 0 {
        return Err(CodecError::InvalidDimensions { ndims });
    }
    if (len as u64) >= (1u64 << 48) {
        return Err(CodecError::InputTooLarge { len: len as u64 });
    }
    let bound = max_compressed_len(len, ndims);
    if dest.len() < bound {
        return Err(CodecError::BufferTooSmall { required: bound });
    }

    let mut out_pos = 0;
    if write_size {
        SizeHeader {
            orig_len: len as u64,
            ndims,
        }
        .write(dest)?;
        out_pos = SizeHeader::SIZE;
    }
    if len < MIN_PACKED_LEN {
        dest[out_pos..out_pos + len].copy_from_slice(src);
        return Ok(out_pos + len);
    }

    let ndims = ndims as usize;
    let header_bytes = group_header_bytes(ndims);
    let group_sz = ndims * BLOCK_SZ * GROUP_SZ_BLOCKS;
    let ngroups = len / group_sz;
    let block_bytes = BLOCK_SZ * ndims;

    let mut plan = BlockPlan::new(ndims);
    // final row carries previous values across blocks
    let mut delta_buf = vec![0u8; (BLOCK_SZ + 1) * ndims];
    let mut src_pos = 0;

    for _ in 0..ngroups {
        let header_base = out_pos;
        out_pos += header_bytes;
        dest[header_base..header_base + header_bytes].fill(0);
        let mut header_bit_offset = 0u32;

        for _ in 0..GROUP_SZ_BLOCKS {
            let (deltas, prev_vals) = delta_buf.split_at_mut(block_bytes);
            analyze_block_delta(src, src_pos, ndims, prev_vals, deltas, &mut plan);
            write_block_widths(dest, header_base, &mut header_bit_offset, &plan, ndims);

            let body = plan.row_bytes * BLOCK_SZ;
            dest[out_pos..out_pos + body].fill(0);
            pack_block(&delta_buf, 0, ndims, &plan, dest, out_pos);

            src_pos += block_bytes;
            out_pos += body;
        }
    }

    let remaining = len - src_pos;
    dest[out_pos..out_pos + remaining].copy_from_slice(&src[src_pos..]);
    Ok(out_pos + remaining)
}

/// Decompress a stream produced by [`encode_rowmajor_delta`] with
/// `write_size = true`. Returns the number of bytes decoded.
pub fn decode_rowmajor_delta(src: &[u8], dest: &mut [u8]) -> CodecResult<usize> {
    let header = SizeHeader::read(src)?;
    let orig_len = header.orig_len as usize;
    let mut src_pos = SizeHeader::SIZE;

    if dest.len() < orig_len {
        return Err(CodecError::BufferTooSmall { required: orig_len });
    }
    if orig_len < MIN_PACKED_LEN {
        dest[..orig_len].copy_from_slice(&src[src_pos..src_pos + orig_len]);
        return Ok(orig_len);
    }
    if header.ndims == 0 {
        return Err(CodecError::InvalidDimensions { ndims: 0 });
    }

    let ndims = header.ndims as usize;
    let group_sz = ndims * BLOCK_SZ * GROUP_SZ_BLOCKS;
    let ngroups = orig_len / group_sz;
    let padded = padded_ndims(ndims);

    let mut widths = GroupWidths::new(ndims);
    let mut bitoffsets = vec![0u32; (ndims + STRIPE_SZ - 1) / STRIPE_SZ];
    // final row carries previous values across blocks
    let mut scratch = vec![0u8; (BLOCK_SZ + 1) * padded];
    let mut dest_pos = 0;

    for _ in 0..ngroups {
        widths.unpack(src, src_pos, ndims);
        src_pos += widths.header_bytes();

        for b in 0..GROUP_SZ_BLOCKS {
            let block_widths = widths.block_widths(b);
            let block_masks = widths.block_masks(b);
            let (_, row_bytes) = row_layout(block_widths, &mut bitoffsets);

            unpack_block(
                src,
                src_pos,
                row_bytes,
                block_masks,
                block_widths,
                &bitoffsets,
                &mut scratch,
                0,
                padded,
            );
            undo_block(&mut scratch, padded, ndims, dest, dest_pos);

            src_pos += BLOCK_SZ * row_bytes;
            dest_pos += BLOCK_SZ * ndims;
        }
    }

    let remaining = orig_len - dest_pos;
    dest[dest_pos..orig_len].copy_from_slice(&src[src_pos..src_pos + remaining]);
    Ok(orig_len)
}
