//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Big-endian fixed-width integer parsing shared by the header, offset
//! table, trailer and object parsers. Every size field in a `bplist00`
//! document (offsets, reference widths, packed lengths) bottoms out here.

use std::convert::TryFrom;

use nom::bytes::complete::take;
use nom::combinator::map_res;
use nom::IResult;

/// Reads exactly `width` bytes (1 to 8, inclusive) as an unsigned big-endian
/// integer. A `width` of 8 also accepts the bit pattern of a signed value;
/// reinterpreting the result as `i64` is the caller's job.
pub fn be_uint(width: usize) -> impl Fn(&[u8]) -> IResult<&[u8], u64> {
    assert!((1..=8).contains(&width), "width must be between 1 and 8 bytes");
    move |input: &[u8]| {
        let (rest, bytes) = take(width)(input)?;
        let value = bytes.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        Ok((rest, value))
    }
}

/// As [`be_uint`], narrowed to `usize`. Fails if the value does not fit the
/// platform's pointer width, which only matters for `width == 8` on 32-bit
/// targets.
pub fn be_size(width: usize) -> impl Fn(&[u8]) -> IResult<&[u8], usize> {
    move |input: &[u8]| map_res(be_uint(width), usize::try_from)(input)
}

#[cfg(test)]
mod tests {
    use super::{be_size, be_uint};

    #[test]
    fn single_byte_round_trips_to_its_own_value() {
        let (rest, value) = be_size(1)(&[0x2A]).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, 42);
    }

    #[test]
    fn three_bytes_reads_most_significant_byte_first() {
        let (rest, value) = be_size(3)(&[0x01, 0x00, 0x00]).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, 65536);
    }

    #[test]
    fn eight_bytes_preserves_the_full_u64_range() {
        let bytes = [0xFF; 8];
        let (rest, value) = be_uint(8)(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(value, u64::MAX);
    }

    #[test]
    fn leaves_trailing_bytes_untouched() {
        let (rest, value) = be_size(2)(&[0x00, 0x0A, 0xEE]).unwrap();
        assert_eq!(rest, &[0xEE]);
        assert_eq!(value, 10);
    }

    #[test]
    fn short_input_fails_rather_than_reading_past_the_end() {
        assert!(be_size(4)(&[0x01, 0x02]).is_err());
    }
}
