//! First-order delta and zig-zag stage
//!
//! Encode folds delta computation, zig-zag mapping, and width analysis
//! into one pass per dimension, carrying each dimension's previous value
//! across blocks (the stream deltas from an implicit all-zero record).
//! Decode reconstructs 32 lanes at a time over a scratch buffer padded to
//! a whole number of chunks, with the carried previous values stored in
//! the scratch buffer's ninth row.

use crate::bits::{store_trunc, zigzag_decode, zigzag_encode};
use crate::stripe::BlockPlan;
use crate::BLOCK_SZ;

/// Lanes processed per reconstruction chunk
pub(crate) const VECTOR_SZ: usize = 32;

/// Round `ndims` up to a whole number of reconstruction chunks.
pub(crate) fn padded_ndims(ndims: usize) -> usize {
    (ndims + VECTOR_SZ - 1) / VECTOR_SZ * VECTOR_SZ
}

/// Delta, zig-zag, and analyze the eight records at `src[src_pos..]`.
///
/// Writes zig-zagged deltas into `deltas` at the same coordinates,
/// updates `prev_vals` for the next block, and folds each dimension's
/// OR-reduction into `plan`.
pub(crate) fn analyze_block_delta(
    src: &[u8],
    src_pos: usize,
    ndims: usize,
    prev_vals: &mut [u8],
    deltas: &mut [u8],
    plan: &mut BlockPlan,
) {
    plan.reset();
    for dim in 0..ndims {
        let mut or_reduction = 0u8;
        let mut prev = prev_vals[dim];
        for row in 0..BLOCK_SZ {
            let offset = row * ndims + dim;
            let val = src[src_pos + offset];
            let delta = val.wrapping_sub(prev) as i8;
            let bits = zigzag_encode(delta);
            or_reduction |= bits;
            deltas[offset] = bits;
            prev = val;
        }
        prev_vals[dim] = prev;
        plan.add_dim(dim, or_reduction);
    }
    plan.finish();
}

/// Reconstruct one block from the zig-zagged deltas in `scratch`.
///
/// `scratch` holds `BLOCK_SZ + 1` rows of `padded` bytes: rows 0..8 are
/// the block's unpacked deltas and the final row carries previous values
/// between blocks. Chunks run in descending order so that a chunk's
/// writes past `ndims` in one row are overwritten by the following
/// chunk's real data for the next row.
pub(crate) fn undo_block(
    scratch: &mut [u8],
    padded: usize,
    ndims: usize,
    dest: &mut [u8],
    dest_pos: usize,
) {
    let nvectors = padded / VECTOR_SZ;
    for v in (0..nvectors).rev() {
        let lane_base = v * VECTOR_SZ;
        let prev_offset = BLOCK_SZ * padded + lane_base;

        let mut prev = [0u8; VECTOR_SZ];
        prev.copy_from_slice(&scratch[prev_offset..prev_offset + VECTOR_SZ]);

        for row in 0..BLOCK_SZ {
            let in_offset = row * padded + lane_base;
            let mut vals = [0u8; VECTOR_SZ];
            for lane in 0..VECTOR_SZ {
                let delta = zigzag_decode(scratch[in_offset + lane]);
                vals[lane] = prev[lane].wrapping_add(delta as u8);
            }
            store_trunc(dest, dest_pos + row * ndims + lane_base, &vals);
            prev = vals;
        }

        scratch[prev_offset..prev_offset + VECTOR_SZ].copy_from_slice(&prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn roundtrip_blocks(records: &[u8], ndims: usize) -> Vec<u8> {
        let padded = padded_ndims(ndims);
        let block_bytes = BLOCK_SZ * ndims;
        let nblocks = records.len() / block_bytes;

        let mut prev_vals = vec![0u8; ndims];
        let mut deltas = vec![0u8; block_bytes];
        let mut plan = BlockPlan::new(ndims);
        let mut scratch = vec![0u8; (BLOCK_SZ + 1) * padded];
        let mut out = vec![0u8; records.len()];

        for blk in 0..nblocks {
            analyze_block_delta(
                records,
                blk * block_bytes,
                ndims,
                &mut prev_vals,
                &mut deltas,
                &mut plan,
            );
            // stage the deltas the way the stripe unpacker would
            for row in 0..BLOCK_SZ {
                scratch[row * padded..row * padded + ndims]
                    .copy_from_slice(&deltas[row * ndims..(row + 1) * ndims]);
            }
            undo_block(&mut scratch, padded, ndims, &mut out, blk * block_bytes);
        }
        out
    }

    #[test]
    fn test_first_block_deltas_from_zero() {
        let ndims = 3;
        let mut records = vec![0u8; BLOCK_SZ * ndims];
        for (i, r) in records.iter_mut().enumerate() {
            *r = i as u8;
        }
        let mut prev_vals = vec![0u8; ndims];
        let mut deltas = vec![0u8; BLOCK_SZ * ndims];
        let mut plan = BlockPlan::new(ndims);
        analyze_block_delta(&records, 0, ndims, &mut prev_vals, &mut deltas, &mut plan);

        // row 0 deltas from the implicit zero record: 0, 1, 2
        assert_eq!(deltas[0], zigzag_encode(0));
        assert_eq!(deltas[1], zigzag_encode(1));
        assert_eq!(deltas[2], zigzag_encode(2));
        // later rows step by ndims per dimension
        for offset in ndims..BLOCK_SZ * ndims {
            assert_eq!(deltas[offset], zigzag_encode(3));
        }
        assert_eq!(&prev_vals[..], &records[(BLOCK_SZ - 1) * ndims..]);
    }

    #[test]
    fn test_undo_inverts_analyze() {
        let ndims = 5;
        let mut records = vec![0u8; BLOCK_SZ * ndims * 3];
        for (i, r) in records.iter_mut().enumerate() {
            *r = ((i * 89) % 256) as u8;
        }
        assert_eq!(roundtrip_blocks(&records, ndims), records);
    }

    #[test]
    fn test_undo_multi_chunk() {
        // more than one 32-lane chunk per row
        let ndims = 33;
        let mut records = vec![0u8; BLOCK_SZ * ndims * 2];
        for (i, r) in records.iter_mut().enumerate() {
            *r = ((i * 7 + 3) % 251) as u8;
        }
        assert_eq!(roundtrip_blocks(&records, ndims), records);
    }

    #[test]
    fn test_padded_ndims() {
        assert_eq!(padded_ndims(1), 32);
        assert_eq!(padded_ndims(32), 32);
        assert_eq!(padded_ndims(33), 64);
        assert_eq!(padded_ndims(128), 128);
    }
}
