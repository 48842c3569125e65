//! Bit-level marshalling for packed components.
//!
//! Packed records and arrays store components at arbitrary bit offsets.
//! [`unpack`] copies such a component into a byte-aligned buffer and
//! [`pack`] writes one back. Both walk the bytes one at a time through an
//! accumulator; the loops are deliberately plain and covered by property
//! tests in `tests/bits.rs`.
//!
//! ## Bit numbering
//!
//! With little-endian bit order, bit offset 0 is the least significant bit
//! of the first byte. With big-endian bit order it is the most significant
//! bit. The endianness only changes the direction in which bytes are
//! traversed, not the meaning of the result.
//!
//! ## Scalars and aggregates
//!
//! A scalar result is right-justified in the destination (for big-endian,
//! it ends at the last byte) and its sign bit is replicated into the unused
//! high bits. An aggregate result is left-justified at the start of the
//! destination with zero padding and no sign semantics, so that its
//! components can later be read at their own bit offsets.

use gimli::{Endianity, RunTimeEndian};

use crate::error::{GnatError, GnatResult};

/// How [`unpack`] should lay out its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackMode
{
    pub signed: bool,
    pub scalar: bool,
    pub endian: RunTimeEndian,
}

impl UnpackMode
{
    /// A right-justified scalar, optionally sign extended.
    pub fn scalar(signed: bool, endian: RunTimeEndian) -> Self
    {
        Self {
            signed,
            scalar: true,
            endian,
        }
    }

    /// A left-justified aggregate.
    pub fn aggregate(endian: RunTimeEndian) -> Self
    {
        Self {
            signed: false,
            scalar: false,
            endian,
        }
    }
}

/// Extract `bit_size` bits at `bit_offset` into a new buffer of
/// `ceil(bit_size / 8)` bytes.
///
/// ## Errors
///
/// Returns [`GnatError::InvalidArgument`] when `src` is too short to hold the
/// requested bits. This is checked before the result is allocated.
///
/// ```rust
/// use gimli::RunTimeEndian;
/// use gnatfix_core::layout::bits::{unpack, UnpackMode};
///
/// // 0b1110_1000: three bits at offset 3 are 0b101, i.e. -3 when signed.
/// let mode = UnpackMode::scalar(true, RunTimeEndian::Little);
/// assert_eq!(unpack(&[0b1110_1000], 3, 3, mode).unwrap(), vec![0xfd]);
/// ```
pub fn unpack(src: &[u8], bit_offset: usize, bit_size: usize, mode: UnpackMode) -> GnatResult<Vec<u8>>
{
    source_span(src, bit_offset, bit_size)?;
    let mut unpacked = vec![0; bit_size.div_ceil(8)];
    unpack_into(src, bit_offset, bit_size, &mut unpacked, mode)?;
    Ok(unpacked)
}

/// Extract `bit_size` bits at `bit_offset` into `unpacked`.
///
/// `unpacked` may be longer than needed: scalars are then sign/zero
/// extended over the whole buffer and aggregates padded with zeroes.
/// `bit_offset` may exceed 7; whole bytes are skipped first.
///
/// ## Errors
///
/// - [`GnatError::BufferTooSmall`] when `unpacked` cannot hold `bit_size` bits
/// - [`GnatError::InvalidArgument`] when `src` is too short
pub fn unpack_into(src: &[u8], bit_offset: usize, bit_size: usize, unpacked: &mut [u8], mode: UnpackMode) -> GnatResult<()>
{
    let unpacked_len = unpacked.len();
    if bit_size.div_ceil(8) > unpacked_len {
        return Err(GnatError::BufferTooSmall {
            bits: bit_size,
            bytes: unpacked_len,
        });
    }
    unpacked.fill(0);
    if bit_size == 0 {
        return Ok(());
    }

    let src = source_span(src, bit_offset, bit_size)?;
    let bit_offset = bit_offset % 8;
    let src_len = src.len();

    let big_endian = mode.endian.is_big_endian();
    let signed = mode.signed && mode.scalar;
    let delta: isize = if big_endian { -1 } else { 1 };

    let mut sign: u64 = 0;
    let mut unused_ls: usize;
    let mut accum_size: usize;
    let mut src_idx: isize;
    let mut unpacked_idx: isize;
    let mut unpacked_bytes_left = unpacked_len;

    if big_endian {
        src_idx = to_isize(src_len) - 1;
        if signed && (src[0] << bit_offset) & 0x80 != 0 {
            sign = 0xff;
        }
        unused_ls = (8 - (bit_size + bit_offset) % 8) % 8;
        if mode.scalar {
            accum_size = 0;
            unpacked_idx = to_isize(unpacked_len) - 1;
        } else {
            // Aggregates start at the most significant end of the target.
            accum_size = (8 - bit_size % 8) % 8;
            unpacked_bytes_left = bit_size.div_ceil(8);
            unpacked_idx = to_isize(unpacked_bytes_left) - 1;
        }
    } else {
        let sign_bit_offset = (bit_size + bit_offset - 1) % 8;
        src_idx = 0;
        unpacked_idx = 0;
        unused_ls = bit_offset;
        accum_size = 0;
        if signed && src[src_len - 1] & (1 << sign_bit_offset) != 0 {
            sign = 0xff;
        }
    }

    let mut accum: u64 = 0;
    let mut src_bits_left = bit_size;
    let mut src_bytes_left = src_len;
    while src_bytes_left > 0 {
        // Mask off source bits that are not part of the value.
        let unused_ms_mask: u64 = (1 << src_bits_left.min(8)) - 1;
        let sign_mask = sign & !unused_ms_mask;

        let byte = u64::from(src[to_usize(src_idx)]);
        accum |= (((byte >> unused_ls) & unused_ms_mask) | sign_mask) << accum_size;
        accum_size += 8 - unused_ls;
        if accum_size >= 8 {
            unpacked[to_usize(unpacked_idx)] = (accum & 0xff) as u8;
            accum_size -= 8;
            accum >>= 8;
            unpacked_bytes_left -= 1;
            unpacked_idx += delta;
        }
        src_bits_left = src_bits_left.saturating_sub(8 - unused_ls);
        unused_ls = 0;
        src_bytes_left -= 1;
        src_idx += delta;
    }

    while unpacked_bytes_left > 0 {
        accum |= sign << accum_size;
        unpacked[to_usize(unpacked_idx)] = (accum & 0xff) as u8;
        accum_size = accum_size.saturating_sub(8);
        accum >>= 8;
        unpacked_bytes_left -= 1;
        unpacked_idx += delta;
    }

    Ok(())
}

/// Copy `n` bits from `source` at bit `src_offset` into `target` at bit
/// `targ_offset`, leaving the surrounding target bits untouched.
///
/// `source` and `target` must not alias, which the borrow rules already
/// guarantee.
///
/// ## Errors
///
/// Returns [`GnatError::BufferTooSmall`] when either buffer does not cover
/// its bit range.
pub fn pack(target: &mut [u8], targ_offset: usize, source: &[u8], src_offset: usize, n: usize, endian: RunTimeEndian) -> GnatResult<()>
{
    if n == 0 {
        return Ok(());
    }
    if (targ_offset + n).div_ceil(8) > target.len() {
        return Err(GnatError::BufferTooSmall {
            bits: targ_offset + n,
            bytes: target.len(),
        });
    }
    if (src_offset + n).div_ceil(8) > source.len() {
        return Err(GnatError::BufferTooSmall {
            bits: src_offset + n,
            bytes: source.len(),
        });
    }

    let byte_at = |index: usize| source.get(index).copied().map_or(0, u64::from);
    let mut t = targ_offset / 8;
    let mut targ_off = targ_offset % 8;
    let mut s = src_offset / 8;
    let src_off = src_offset % 8;
    let mut n = n;

    if endian.is_big_endian() {
        let mut accum = byte_at(s);
        s += 1;
        let mut accum_bits = 8 - src_off;

        while n > 0 {
            accum = (accum << 8) | byte_at(s);
            accum_bits += 8;
            s += 1;
            let chunk_size = (8 - targ_off).min(n);
            let unused_right = 8 - (chunk_size + targ_off);
            let mask: u64 = ((1 << chunk_size) - 1) << unused_right;
            let bits = (accum >> (accum_bits - chunk_size - unused_right)) & mask;
            target[t] = ((u64::from(target[t]) & !mask) | bits) as u8;
            n -= chunk_size;
            accum_bits -= chunk_size;
            t += 1;
            targ_off = 0;
        }
    } else {
        let mut accum = byte_at(s) >> src_off;
        s += 1;
        let mut accum_bits = 8 - src_off;

        while n > 0 {
            accum |= byte_at(s) << accum_bits;
            accum_bits += 8;
            s += 1;
            let chunk_size = (8 - targ_off).min(n);
            let mask: u64 = ((1 << chunk_size) - 1) << targ_off;
            target[t] = ((u64::from(target[t]) & !mask) | ((accum << targ_off) & mask)) as u8;
            n -= chunk_size;
            accum_bits -= chunk_size;
            accum >>= chunk_size;
            t += 1;
            targ_off = 0;
        }
    }

    Ok(())
}

/// The bytes of `src` holding `bit_size` bits at `bit_offset`.
fn source_span(src: &[u8], bit_offset: usize, bit_size: usize) -> GnatResult<&[u8]>
{
    let first = bit_offset / 8;
    bit_size
        .checked_add(bit_offset % 8)
        .and_then(|bits| first.checked_add(bits.div_ceil(8)))
        .and_then(|end| src.get(first..end))
        .ok_or_else(|| {
            GnatError::InvalidArgument(format!(
                "{bit_size} bits at bit offset {bit_offset} do not fit in {} source bytes",
                src.len()
            ))
        })
}

/// Interpret up to eight bytes as an integer.
///
/// Longer buffers contribute their eight least significant bytes.
pub fn read_integer(bytes: &[u8], signed: bool, endian: RunTimeEndian) -> i64
{
    let len = bytes.len().min(8);
    let significant = if endian.is_big_endian() {
        &bytes[bytes.len() - len..]
    } else {
        &bytes[..len]
    };

    let mut value: u64 = 0;
    if endian.is_big_endian() {
        for byte in significant {
            value = (value << 8) | u64::from(*byte);
        }
    } else {
        for byte in significant.iter().rev() {
            value = (value << 8) | u64::from(*byte);
        }
    }

    if signed && len > 0 && len < 8 {
        let shift = 64 - 8 * len as u32;
        ((value << shift) as i64) >> shift
    } else {
        value as i64
    }
}

/// Store `value` in `size` bytes (two's complement, truncated).
pub fn write_integer(value: i64, size: usize, endian: RunTimeEndian) -> Vec<u8>
{
    let mut bytes: Vec<u8> = (0..size)
        .map(|i| if i < 8 { (value >> (8 * i)) as u8 } else if value < 0 { 0xff } else { 0 })
        .collect();
    if endian.is_big_endian() {
        bytes.reverse();
    }
    bytes
}

fn to_isize(value: usize) -> isize
{
    isize::try_from(value).unwrap_or(isize::MAX)
}

fn to_usize(value: isize) -> usize
{
    usize::try_from(value).unwrap_or(usize::MAX)
}
