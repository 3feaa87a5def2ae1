//! Row-major delta mode with run-length encoding of all-zero blocks
//!
//! A run is a maximal sequence of blocks whose every dimension packs at
//! width zero, i.e. every record repeats its predecessor. Run blocks
//! leave their header width fields zero and replace their bodies with a
//! one- or two-byte length field. Runs may span group boundaries; closing
//! a run on the last slot of a group opens a fresh group for the block
//! that ended it. The group count is discovered while encoding and stored
//! in the metadata prefix together with the size of the verbatim tail.

use alloc::vec;

use crate::bits::replicate;
use crate::delta::{analyze_block_delta, padded_ndims, undo_block};
use crate::error::{CodecError, CodecResult};
use crate::header::{group_header_bytes, write_block_widths, GroupWidths, RleHeader};
use crate::rowmajor::MIN_PACKED_LEN;
use crate::stripe::{pack_block, row_layout, unpack_block, BlockPlan};
use crate::{
    max_compressed_len, BLOCK_SZ, GROUP_SZ_BLOCKS, MAX_RUN_NBLOCKS, NBITS_SZ_BITS, STRIPE_SZ,
};

/// Record dimensionalities at or above this cannot guarantee that a
/// partial group's trailing bytes fit the 16-bit remainder field.
const MAX_RLE_NDIMS: u16 = 1024;

/// Append the run length as one byte for lengths up to 0x7F, else two
/// bytes with the low byte's MSB set and the high bits following.
fn write_run_len(dest: &mut [u8], pos: usize, run_len: u16) -> usize {
    dest[pos] = (run_len & 0x7f) as u8;
    if run_len > 0x7f {
        dest[pos] |= 0x80;
        dest[pos + 1] = (run_len >> 7) as u8;
        2
    } else {
        1
    }
}

/// Read a run length field; the second byte is consumed only when the
/// low byte's MSB is set and the masked high byte is non-zero.
fn read_run_len(src: &[u8], pos: usize) -> (u16, usize) {
    let low = src[pos];
    let high = if low & 0x80 != 0 { src[pos + 1] } else { 0 };
    let run_len = ((low & 0x7f) as u16) | ((high as u16) << 7);
    (run_len, 1 + (high > 0) as usize)
}

/// Compress `src` as records of `ndims` byte-wide dimensions with delta
/// coding and run-length encoding of constant stretches.
///
/// Returns the number of bytes written to `dest`. When `write_size` is
/// set, an 8-byte metadata prefix records the group count, tail size, and
/// dimensionality for the decoder.
pub fn encode_rowmajor_delta_rle(
    src: &[u8],
    dest: &mut [u8],
    ndims: u16,
    write_size: bool,
) -> CodecResult<usize> {
    let len = src.len();
    if ndims == 0 || ndims >= MAX_RLE_NDIMS {
        return Err(CodecError::InvalidDimensions { ndims });
    }
    let bound = max_compressed_len(len, ndims);
    if dest.len() < bound {
        return Err(CodecError::BufferTooSmall { required: bound });
    }

    if len < MIN_PACKED_LEN {
        let mut out_pos = 0;
        if write_size {
            RleHeader {
                ngroups: 0,
                remaining_len: len as u16,
                ndims,
            }
            .write(dest)?;
            out_pos = RleHeader::SIZE;
        }
        dest[out_pos..out_pos + len].copy_from_slice(src);
        return Ok(out_pos + len);
    }

    let mut out_pos = if write_size { RleHeader::SIZE } else { 0 };

    let nd = ndims as usize;
    let header_bytes = group_header_bytes(nd);
    let group_sz = nd * BLOCK_SZ * GROUP_SZ_BLOCKS;
    let block_bytes = BLOCK_SZ * nd;

    let mut plan = BlockPlan::new(nd);
    // final row carries previous values across blocks
    let mut delta_buf = vec![0u8; (BLOCK_SZ + 1) * nd];

    let mut run_len: u16 = 0;
    let mut ngroups: u32 = 0;
    let mut src_pos = 0usize;

    if let Some(last_group_start) = len.checked_sub(group_sz) {
        'groups: while src_pos <= last_group_start {
            // groups are only started when they can be finished
            ngroups += 1;
            let mut header_base = out_pos;
            out_pos += header_bytes;
            dest[header_base..header_base + header_bytes].fill(0);
            let mut header_bit_offset = 0u32;
            let mut b = 0;

            'blocks: while b < GROUP_SZ_BLOCKS {
                let (deltas, prev_vals) = delta_buf.split_at_mut(block_bytes);
                analyze_block_delta(src, src_pos, nd, prev_vals, deltas, &mut plan);

                'emit: loop {
                    if plan.row_bits == 0 && run_len < MAX_RUN_NBLOCKS {
                        run_len += 1;
                        src_pos += block_bytes;
                        if src_pos < last_group_start {
                            // enough data left to finish this group
                            continue 'blocks;
                        }
                        // close the run and pad out the group's remaining
                        // slots with empty length fields, leaving their
                        // header bits zero; the rest of the input becomes
                        // the verbatim tail
                        b += 1;
                        out_pos += write_run_len(dest, out_pos, run_len);
                        while b < GROUP_SZ_BLOCKS {
                            dest[out_pos] = 0;
                            out_pos += 1;
                            b += 1;
                        }
                        break 'groups;
                    }

                    if run_len > 0 {
                        // the current block ends an open run
                        b += 1;
                        out_pos += write_run_len(dest, out_pos, run_len);
                        run_len = 0;
                        // run slots keep their pre-zeroed header bits
                        header_bit_offset += (nd * NBITS_SZ_BITS) as u32;

                        if b == GROUP_SZ_BLOCKS {
                            // closing the run exhausted the group; the
                            // block just analyzed becomes the first slot
                            // of a fresh group
                            ngroups += 1;
                            header_bit_offset = 0;
                            b = 0;
                            header_base = out_pos;
                            out_pos += header_bytes;
                            dest[header_base..header_base + header_bytes].fill(0);
                            continue 'emit;
                        }
                        if plan.row_bits == 0 {
                            // only reachable when the run hit the length
                            // cap; restart the counter on this block
                            continue 'emit;
                        }
                    }

                    write_block_widths(dest, header_base, &mut header_bit_offset, &plan, nd);

                    let body = plan.row_bytes * BLOCK_SZ;
                    dest[out_pos..out_pos + body].fill(0);
                    pack_block(&delta_buf, 0, nd, &plan, dest, out_pos);

                    src_pos += block_bytes;
                    out_pos += body;
                    b += 1;
                    break 'emit;
                }
            }
        }
    }

    let remaining = len - src_pos;
    if write_size {
        RleHeader {
            ngroups,
            remaining_len: remaining as u16,
            ndims,
        }
        .write(dest)?;
    }
    dest[out_pos..out_pos + remaining].copy_from_slice(&src[src_pos..]);
    Ok(out_pos + remaining)
}

/// Decompress a stream produced by [`encode_rowmajor_delta_rle`] with
/// `write_size = true`. Returns the number of bytes decoded.
pub fn decode_rowmajor_delta_rle(src: &[u8], dest: &mut [u8]) -> CodecResult<usize> {
    let header = RleHeader::read(src)?;
    let mut src_pos = RleHeader::SIZE;
    let remaining_len = header.remaining_len as usize;

    if header.ngroups == 0 && remaining_len < MIN_PACKED_LEN {
        if dest.len() < remaining_len {
            return Err(CodecError::BufferTooSmall {
                required: remaining_len,
            });
        }
        dest[..remaining_len].copy_from_slice(&src[src_pos..src_pos + remaining_len]);
        return Ok(remaining_len);
    }
    if header.ndims == 0 {
        return Err(CodecError::InvalidDimensions { ndims: 0 });
    }

    let nd = header.ndims as usize;
    let padded = padded_ndims(nd);
    let block_bytes = BLOCK_SZ * nd;

    let mut widths = GroupWidths::new(nd);
    let mut bitoffsets = vec![0u32; (nd + STRIPE_SZ - 1) / STRIPE_SZ];
    // final row carries previous values across blocks
    let mut scratch = vec![0u8; (BLOCK_SZ + 1) * padded];
    let mut dest_pos = 0usize;

    for g in 0..header.ngroups {
        widths.unpack(src, src_pos, nd);
        src_pos += widths.header_bytes();

        for b in 0..GROUP_SZ_BLOCKS {
            let block_widths = widths.block_widths(b);
            let block_masks = widths.block_masks(b);
            let (row_bits, row_bytes) = row_layout(block_widths, &mut bitoffsets);

            if row_bits == 0 {
                let (nblocks, field_bytes) = read_run_len(src, src_pos);
                src_pos += field_bytes;
                let nrecords = nblocks as usize * BLOCK_SZ;
                let run_bytes = nrecords * nd;
                if dest.len() < dest_pos + run_bytes {
                    return Err(CodecError::BufferTooSmall {
                        required: dest_pos + run_bytes,
                    });
                }
                if g > 0 || b > 0 {
                    // every record in the run repeats the last one emitted
                    replicate(dest, dest_pos, nd, nrecords);
                } else {
                    // a run at the very start of the stream is all zeros
                    dest[dest_pos..dest_pos + run_bytes].fill(0);
                }
                dest_pos += run_bytes;
                continue;
            }

            if dest.len() < dest_pos + block_bytes {
                return Err(CodecError::BufferTooSmall {
                    required: dest_pos + block_bytes,
                });
            }
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
            undo_block(&mut scratch, padded, nd, dest, dest_pos);

            src_pos += BLOCK_SZ * row_bytes;
            dest_pos += block_bytes;
        }
    }

    if dest.len() < dest_pos + remaining_len {
        return Err(CodecError::BufferTooSmall {
            required: dest_pos + remaining_len,
        });
    }
    dest[dest_pos..dest_pos + remaining_len]
        .copy_from_slice(&src[src_pos..src_pos + remaining_len]);
    Ok(dest_pos + remaining_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn roundtrip(data: &[u8], ndims: u16) -> (usize, Vec<u8>) {
        let mut encoded = vec![0u8; max_compressed_len(data.len(), ndims)];
        let written = encode_rowmajor_delta_rle(data, &mut encoded, ndims, true).unwrap();
        let mut decoded = vec![0u8; data.len()];
        let produced = decode_rowmajor_delta_rle(&encoded[..written], &mut decoded).unwrap();
        assert_eq!(produced, data.len());
        (written, decoded)
    }

    #[test]
    fn test_run_len_field_one_byte() {
        let mut buf = [0u8; 2];
        assert_eq!(write_run_len(&mut buf, 0, 0x7f), 1);
        assert_eq!(buf[0], 0x7f);
        assert_eq!(read_run_len(&buf, 0), (0x7f, 1));
    }

    #[test]
    fn test_run_len_field_two_bytes() {
        let mut buf = [0u8; 2];
        assert_eq!(write_run_len(&mut buf, 0, 0x80), 2);
        assert_eq!(buf[0], 0x80);
        assert_eq!(buf[1], 0x01);
        assert_eq!(read_run_len(&buf, 0), (0x80, 2));

        assert_eq!(write_run_len(&mut buf, 0, MAX_RUN_NBLOCKS), 2);
        assert_eq!(read_run_len(&buf, 0), (MAX_RUN_NBLOCKS, 2));
    }

    #[test]
    fn test_constant_input_compresses_to_runs() {
        // 2048 constant records: one literal block for the initial step
        // from zero, then runs
        let data = vec![17u8; 2048 * 8];
        let (written, decoded) = roundtrip(&data, 8);
        assert_eq!(decoded, data);
        let group_sz = 8 * BLOCK_SZ * GROUP_SZ_BLOCKS;
        let bound = RleHeader::SIZE
            + (data.len() / group_sz + 2) * (group_header_bytes(8) + 4)
            + 8 * 8
            + 16;
        assert!(written <= bound, "written = {}, bound = {}", written, bound);
    }

    #[test]
    fn test_all_zero_input() {
        // everything before the final group joins one run; the last
        // group's worth of bytes rides along as the verbatim tail
        let data = vec![0u8; 4096];
        let (written, decoded) = roundtrip(&data, 4);
        assert_eq!(decoded, data);
        let group_sz = 4 * BLOCK_SZ * GROUP_SZ_BLOCKS;
        assert!(written < 32 + group_sz, "written = {}", written);
    }

    #[test]
    fn test_zero_stretch_inside_noise() {
        // records 100..300 constant-zero inside otherwise varying data
        let ndims = 3;
        let mut data = Vec::with_capacity(400 * ndims);
        for rec in 0..400u32 {
            for d in 0..ndims {
                let v = if (100..300).contains(&rec) {
                    0
                } else {
                    (rec * 3 + d as u32 * 7) as u8
                };
                data.push(v);
            }
        }
        let (_, decoded) = roundtrip(&data, ndims as u16);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_run_cap_saturation() {
        // longer than MAX_RUN_NBLOCKS blocks of constant data forces a
        // saturated run to close and a fresh one to start
        let ndims = 1usize;
        let nrecords = (MAX_RUN_NBLOCKS as usize + 64) * BLOCK_SZ;
        let data = vec![9u8; nrecords * ndims];
        let (_, decoded) = roundtrip(&data, ndims as u16);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_alternating_runs_and_noise() {
        let ndims = 5usize;
        let mut data = Vec::new();
        for chunk in 0..40u32 {
            if chunk % 2 == 0 {
                // one block of varying records
                for i in 0..BLOCK_SZ * ndims {
                    data.push((chunk * 31 + i as u32) as u8);
                }
            } else {
                // three blocks repeating the last record
                let last: Vec<u8> = data[data.len() - ndims..].to_vec();
                for _ in 0..3 * BLOCK_SZ {
                    data.extend_from_slice(&last);
                }
            }
        }
        let (_, decoded) = roundtrip(&data, ndims as u16);
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_small_input_passthrough() {
        let data: Vec<u8> = (0..100).collect();
        let mut encoded = vec![0u8; max_compressed_len(data.len(), 5)];
        let written = encode_rowmajor_delta_rle(&data, &mut encoded, 5, true).unwrap();
        assert_eq!(written, RleHeader::SIZE + data.len());
        assert_eq!(&encoded[RleHeader::SIZE..written], &data[..]);

        let mut decoded = vec![0u8; data.len()];
        let produced = decode_rowmajor_delta_rle(&encoded[..written], &mut decoded).unwrap();
        assert_eq!(produced, data.len());
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_wide_dims_rejected() {
        let data = [0u8; 256];
        let mut out = vec![0u8; 4096];
        assert_eq!(
            encode_rowmajor_delta_rle(&data, &mut out, 1024, true),
            Err(CodecError::InvalidDimensions { ndims: 1024 })
        );
        assert_eq!(
            encode_rowmajor_delta_rle(&data, &mut out, 0, true),
            Err(CodecError::InvalidDimensions { ndims: 0 })
        );
    }

    #[test]
    fn test_random_data_roundtrip() {
        // incompressible data still round-trips, one literal block at a time
        let mut state = 0x12345678u32;
        let mut data = Vec::with_capacity(7 * 500);
        for _ in 0..7 * 500 {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            data.push((state >> 24) as u8);
        }
        let (_, decoded) = roundtrip(&data, 7);
        assert_eq!(decoded, data);
    }
}
