//! Tests for the packed-bit marshaller

use gimli::RunTimeEndian;
use gnatfix_core::error::GnatError;
use gnatfix_core::layout::bits::{pack, read_integer, unpack, unpack_into, write_integer, UnpackMode};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const LITTLE: RunTimeEndian = RunTimeEndian::Little;
const BIG: RunTimeEndian = RunTimeEndian::Big;

#[test]
fn test_unpack_little_endian_signed_scalar()
{
    let mode = UnpackMode::scalar(true, LITTLE);
    assert_eq!(unpack(&[0b1110_1000], 3, 3, mode).unwrap(), vec![0xfd]);

    let unsigned = UnpackMode::scalar(false, LITTLE);
    assert_eq!(unpack(&[0b1110_1000], 3, 3, unsigned).unwrap(), vec![0x05]);
}

#[test]
fn test_unpack_sign_extends_across_bytes()
{
    let mut out = [0u8; 2];
    unpack_into(&[0x00, 0x80], 4, 12, &mut out, UnpackMode::scalar(true, LITTLE)).unwrap();
    assert_eq!(out, [0x00, 0xf8]);
    assert_eq!(read_integer(&out, true, LITTLE), -2048);
}

#[test]
fn test_unpack_big_endian_scalar_is_right_justified()
{
    let mode = UnpackMode::scalar(false, BIG);
    assert_eq!(unpack(&[0b0001_0110], 3, 3, mode).unwrap(), vec![0x05]);

    let mut wide = [0xaa; 4];
    unpack_into(&[0b0001_0110], 3, 3, &mut wide, mode).unwrap();
    assert_eq!(wide, [0, 0, 0, 0x05]);
}

#[test]
fn test_unpack_big_endian_aggregate_is_left_justified()
{
    let mode = UnpackMode::aggregate(BIG);
    assert_eq!(unpack(&[0xab, 0xcd, 0xef], 4, 12, mode).unwrap(), vec![0xbc, 0xd0]);
}

#[test]
fn test_unpack_little_endian_aggregate()
{
    let mode = UnpackMode::aggregate(LITTLE);
    assert_eq!(unpack(&[0xab, 0xcd, 0xef], 4, 12, mode).unwrap(), vec![0xda, 0x0c]);
}

#[test]
fn test_unpack_skips_whole_bytes_of_offset()
{
    let mode = UnpackMode::scalar(false, LITTLE);
    assert_eq!(unpack(&[0xff, 0xff, 0x34], 16, 8, mode).unwrap(), vec![0x34]);
}

#[test]
fn test_unpack_rejects_short_buffers()
{
    let mode = UnpackMode::scalar(false, LITTLE);
    let mut empty: [u8; 0] = [];
    assert!(matches!(
        unpack_into(&[0xff], 0, 8, &mut empty, mode),
        Err(GnatError::BufferTooSmall { bits: 8, bytes: 0 })
    ));
    assert!(matches!(unpack(&[0xff], 4, 8, mode), Err(GnatError::InvalidArgument(_))));
}

#[test]
fn test_unpack_rejects_oversized_requests_before_allocating()
{
    let mode = UnpackMode::scalar(false, LITTLE);
    assert!(matches!(unpack(&[0xff], 0, usize::MAX, mode), Err(GnatError::InvalidArgument(_))));
    assert!(matches!(unpack(&[0xff], usize::MAX, 8, mode), Err(GnatError::InvalidArgument(_))));
    assert!(matches!(unpack(&[0xff], 7, usize::MAX - 3, mode), Err(GnatError::InvalidArgument(_))));

    let mut wide = [0u8; 2];
    assert!(matches!(
        unpack_into(&[0xff], usize::MAX - 1, 9, &mut wide, mode),
        Err(GnatError::InvalidArgument(_))
    ));
}

#[test]
fn test_pack_preserves_surrounding_bits()
{
    let mut target = [0xff, 0xff];
    pack(&mut target, 4, &[0x00], 0, 8, LITTLE).unwrap();
    assert_eq!(target, [0x0f, 0xf0]);

    let mut target = [0x00];
    pack(&mut target, 3, &[0b1010_0000], 0, 3, BIG).unwrap();
    assert_eq!(target, [0b0001_0100]);
}

#[test]
fn test_pack_rejects_short_target()
{
    let mut target = [0u8; 1];
    assert!(matches!(
        pack(&mut target, 4, &[0xff, 0xff], 0, 8, LITTLE),
        Err(GnatError::BufferTooSmall { .. })
    ));
}

#[test]
fn test_write_integer_little_endian()
{
    assert_eq!(write_integer(0x0102, 2, LITTLE), vec![0x02, 0x01]);
    assert_eq!(write_integer(-1, 10, LITTLE), vec![0xff; 10]);
}

fn endian_strategy() -> impl Strategy<Value = RunTimeEndian>
{
    prop_oneof![Just(LITTLE), Just(BIG)]
}

proptest! {
    #[test]
    fn prop_pack_inverts_unpack(
        buf in proptest::collection::vec(any::<u8>(), 10),
        offset in 0usize..8,
        n in 1usize..=64,
        endian in endian_strategy(),
    ) {
        let unpacked = unpack(&buf, offset, n, UnpackMode::aggregate(endian)).unwrap();

        // Writing the bits back over the original changes nothing.
        let mut same = buf.clone();
        pack(&mut same, offset, &unpacked, 0, n, endian).unwrap();
        prop_assert_eq!(&same, &buf);

        // Writing them into a blank buffer reproduces exactly those bits.
        let mut blank = vec![0u8; buf.len()];
        pack(&mut blank, offset, &unpacked, 0, n, endian).unwrap();
        let again = unpack(&blank, offset, n, UnpackMode::aggregate(endian)).unwrap();
        prop_assert_eq!(again, unpacked);
    }

    #[test]
    fn prop_signed_scalar_matches_arithmetic(value in -128i64..128, offset in 0usize..8)
    {
        // An 8-bit two's complement value placed at `offset`.
        let mut buf = [0u8; 2];
        pack(&mut buf, offset, &[value as u8], 0, 8, LITTLE).unwrap();
        let unpacked = unpack(&buf, offset, 8, UnpackMode::scalar(true, LITTLE)).unwrap();
        prop_assert_eq!(read_integer(&unpacked, true, LITTLE), value);
    }
}
