//! Helpers for explicit network byte-order conversions.
//!
//! Identifier fields use widths that do not line up with Rust's integer
//! types (48-bit timestamps, 24-bit fragment counters), so these helpers read
//! and write an unsigned value across an arbitrary 1..=8 byte window. Clippy
//! expectations stay scoped to the conversion points.

/// Largest value representable in `width` bytes.
///
/// # Examples
///
/// ```
/// use udpfrag::byte_order::max_for_width;
///
/// assert_eq!(max_for_width(3), 0x00FF_FFFF);
/// assert_eq!(max_for_width(8), u64::MAX);
/// ```
#[must_use]
pub const fn max_for_width(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1_u64 << (width * 8)) - 1
    }
}

/// Serialise `value` in network byte order (big-endian) into all of `dst`.
///
/// Bits above `dst.len() * 8` are discarded; callers check ranges first.
///
/// # Panics
///
/// Panics if `dst` is longer than eight bytes.
///
/// # Examples
///
/// ```
/// use udpfrag::byte_order::write_network_uint;
///
/// let mut buf = [0_u8; 3];
/// write_network_uint(&mut buf, 0x0012_3456);
/// assert_eq!(buf, [0x12, 0x34, 0x56]);
/// ```
pub fn write_network_uint(dst: &mut [u8], value: u64) {
    assert!(dst.len() <= 8, "network integers are at most eight bytes wide");
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    let bytes = value.to_be_bytes();
    let start = bytes.len() - dst.len();
    dst.copy_from_slice(&bytes[start..]);
}

/// Parse a network-order unsigned integer spanning all of `src`.
///
/// # Panics
///
/// Panics if `src` is longer than eight bytes.
///
/// # Examples
///
/// ```
/// use udpfrag::byte_order::read_network_uint;
///
/// assert_eq!(read_network_uint(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]), 0x0102_0304_0506);
/// ```
#[must_use]
pub fn read_network_uint(src: &[u8]) -> u64 {
    assert!(src.len() <= 8, "network integers are at most eight bytes wide");
    let mut bytes = [0_u8; 8];
    bytes[8 - src.len()..].copy_from_slice(src);
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u64::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    //! Tests for variable-width network byte-order helpers.

    use rstest::rstest;

    use super::{max_for_width, read_network_uint, write_network_uint};

    #[rstest]
    #[case::u24(3, 0x00AB_CDEF, &[0xAB, 0xCD, 0xEF])]
    #[case::u48(6, 0x0102_0304_0506, &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06])]
    #[case::single_byte(1, 0x7F, &[0x7F])]
    fn writes_and_reads_fixed_widths(
        #[case] width: usize,
        #[case] value: u64,
        #[case] expected: &[u8],
    ) {
        let mut buf = vec![0_u8; width];
        write_network_uint(&mut buf, value);
        assert_eq!(buf, expected);
        assert_eq!(read_network_uint(&buf), value);
    }

    #[test]
    fn write_truncates_high_bits() {
        let mut buf = [0_u8; 3];
        write_network_uint(&mut buf, 0x0100_0001);
        assert_eq!(buf, [0x00, 0x00, 0x01]);
    }

    #[test]
    fn max_values_match_widths() {
        assert_eq!(max_for_width(1), 0xFF);
        assert_eq!(max_for_width(6), 0xFFFF_FFFF_FFFF);
    }
}
