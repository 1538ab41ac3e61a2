//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Object-table parsers: recognizing a marker byte, reading the scalar or
//! variable-length payload that follows it, and resolving the embedded or
//! escaped length field shared by every variable-length format.

use ascii::{AsAsciiStrError, AsciiStr};
use nom::{
    branch::alt,
    bytes::complete::take,
    combinator::{map, map_res, verify},
    multi::many_m_n,
    number::complete::{be_f32, be_f64, be_i64, be_u16, be_u32, be_u8},
    sequence::tuple,
    IResult,
};

use std::convert::TryFrom;
use std::string::FromUtf16Error;

use crate::binary::format::ObjectFormat;
use crate::binary::parser::utils::be_size;

/// Matches a single marker byte against `format`'s tag bits, yielding the
/// format back (so callers composing several alternatives via [`alt`] know
/// which one fired) alongside whatever value bits the marker carries.
fn marker(format: ObjectFormat) -> impl Fn(&[u8]) -> IResult<&[u8], (ObjectFormat, u8)> {
    move |input: &[u8]| {
        let (rest, byte) = verify(take(1usize), move |b: &[u8]| b[0] & format.tag_mask() == format.tag_bits())(input)?;
        Ok((rest, (format, byte[0] & format.value_mask())))
    }
}

/// Recognizes any marker byte and reports which [`ObjectFormat`] it matched.
pub fn any_marker(input: &[u8]) -> IResult<&[u8], (ObjectFormat, u8)> {
    alt((
        marker(ObjectFormat::Null),
        marker(ObjectFormat::Boolean),
        marker(ObjectFormat::Fill),
        marker(ObjectFormat::UInt8),
        marker(ObjectFormat::UInt16),
        marker(ObjectFormat::UInt32),
        marker(ObjectFormat::SInt64),
        marker(ObjectFormat::Float32),
        marker(ObjectFormat::Float64),
        marker(ObjectFormat::Date),
        marker(ObjectFormat::Data),
        marker(ObjectFormat::AsciiString),
        marker(ObjectFormat::Utf16String),
        marker(ObjectFormat::Uid),
        marker(ObjectFormat::Array),
        marker(ObjectFormat::Set),
        marker(ObjectFormat::Dictionary),
    ))(input)
}

pub fn null(input: &[u8]) -> IResult<&[u8], ()> {
    map(marker(ObjectFormat::Null), |_| ())(input)
}

pub fn boolean(input: &[u8]) -> IResult<&[u8], bool> {
    map(marker(ObjectFormat::Boolean), |(_, value)| value == 1)(input)
}

pub fn fill(input: &[u8]) -> IResult<&[u8], ()> {
    map(marker(ObjectFormat::Fill), |_| ())(input)
}

/// Generates a parser for a fixed-width scalar: a marker of `$format`
/// immediately followed by a big-endian value read with `$read`. Every
/// fixed-width object (`UInt8`..`Date`) follows this exact shape, so the
/// shape is written once here instead of once per type.
macro_rules! fixed_width_object {
    ($(#[$doc:meta])* $name:ident, $format:expr, $read:expr, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(input: &[u8]) -> IResult<&[u8], $ty> {
            map(tuple((marker($format), $read)), |(_, value)| value)(input)
        }
    };
}

fixed_width_object!(uint8, ObjectFormat::UInt8, be_u8, u8);
fixed_width_object!(uint16, ObjectFormat::UInt16, be_u16, u16);
fixed_width_object!(uint32, ObjectFormat::UInt32, be_u32, u32);
fixed_width_object!(sint64, ObjectFormat::SInt64, be_i64, i64);
fixed_width_object!(float32, ObjectFormat::Float32, be_f32, f32);
fixed_width_object!(float64, ObjectFormat::Float64, be_f64, f64);
/// A `CFAbsoluteTime`: an `f64` of seconds relative to the Mac epoch.
fixed_width_object!(date, ObjectFormat::Date, be_f64, f64);

/// Resolves the payload length that follows a variable-length marker.
///
/// `encoded_value` is the marker's embedded 4-bit value. Values `0x0`
/// through `0xE` carry the length directly; `0xF` means the real length is
/// itself an integer object (`UInt8`/`UInt16`/`UInt32`/`SInt64`) immediately
/// following the marker, which this function parses and consumes.
fn read_length(encoded_value: u8) -> impl Fn(&[u8]) -> IResult<&[u8], usize> {
    assert!(encoded_value & 0b1111_0000 == 0, "encoded length must fit in 4 bits");
    move |input: &[u8]| {
        if encoded_value != 0b0000_1111 {
            return Ok((input, encoded_value as usize));
        }
        map_res(
            alt((
                map(uint8, u64::from),
                map(uint16, u64::from),
                map(uint32, u64::from),
                map(sint64, |value| value as u64),
            )),
            usize::try_from,
        )(input)
    }
}

/// Parses a `marker + length-prefixed payload` object, handing the raw
/// payload bytes to `body` once the length is known. Shared by every
/// variable-length scalar and container format.
fn length_prefixed<'a, T>(
    format: ObjectFormat,
    body: impl Fn(&'a [u8], usize) -> IResult<&'a [u8], T>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], T> {
    move |input: &'a [u8]| {
        let (input, (_, encoded_value)) = marker(format)(input)?;
        let (input, count) = read_length(encoded_value)(input)?;
        body(input, count)
    }
}

/// An opaque byte sequence (token `0x40`).
pub fn data(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_prefixed(ObjectFormat::Data, |input, count| take(count)(input))(input)
}

/// The raw bytes of an ASCII string payload, without validating that every
/// byte is actually 7-bit ASCII. Callers that need to distinguish "not an
/// ASCII string marker" from "marker was right but the bytes aren't ASCII"
/// (see `binary::decode`) should validate the returned slice themselves.
pub fn ascii_payload(input: &[u8]) -> IResult<&[u8], &[u8]> {
    length_prefixed(ObjectFormat::AsciiString, |input, count| take(count)(input))(input)
}

/// A 7-bit ASCII string (token `0x50`), validated and borrowed zero-copy
/// from the input.
pub fn ascii_string(input: &[u8]) -> IResult<&[u8], &str> {
    map_res(ascii_payload, |bytes| -> Result<&str, AsAsciiStrError> {
        AsciiStr::from_ascii(bytes).map(AsciiStr::as_str)
    })(input)
}

/// The UTF-16BE code units of a string payload (token `0x60`), without
/// validating that they form well-formed UTF-16.
pub fn utf16_units(input: &[u8]) -> IResult<&[u8], Vec<u16>> {
    length_prefixed(ObjectFormat::Utf16String, |input, count| many_m_n(count, count, be_u16)(input))(input)
}

/// A UTF-16BE string (token `0x60`), validated and copied into an owned `String`.
pub fn utf16_string(input: &[u8]) -> IResult<&[u8], String> {
    map_res(utf16_units, |units| -> Result<String, FromUtf16Error> {
        String::from_utf16(&units)
    })(input)
}

/// A UID payload (token `0x80`): the low nibble is the literal byte count
/// of the big-endian value, not `1 << L` as for the other variable-length
/// formats (see `spec.md` §4.1).
pub fn uid(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, (_, byte_count)) = marker(ObjectFormat::Uid)(input)?;
    take(byte_count)(input)
}

/// An ordered sequence of `object_reference_size`-wide object references (token `0xA0`).
pub fn array(object_reference_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<usize>> {
    assert!(object_reference_size <= 8, "object references are at most 8 bytes wide");
    move |input: &[u8]| {
        length_prefixed(ObjectFormat::Array, |input, count| {
            many_m_n(count, count, be_size(object_reference_size))(input)
        })(input)
    }
}

/// A collection of `object_reference_size`-wide object references (token
/// `0xC0`). The wire shape is identical to [`array`]; sets are rare in
/// practice and callers are free to treat the result as an array.
pub fn set(object_reference_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<usize>> {
    assert!(object_reference_size <= 8, "object references are at most 8 bytes wide");
    move |input: &[u8]| {
        length_prefixed(ObjectFormat::Set, |input, count| {
            many_m_n(count, count, be_size(object_reference_size))(input)
        })(input)
    }
}

/// A mapping of `object_reference_size`-wide key references to value
/// references (token `0xD0`): all keys first, then all values, the same
/// order the encoder writes them in.
pub fn dictionary(object_reference_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<(usize, usize)>> {
    assert!(object_reference_size <= 8, "object references are at most 8 bytes wide");
    move |input: &[u8]| {
        length_prefixed(ObjectFormat::Dictionary, |input, count| {
            let (input, keys) = many_m_n(count, count, be_size(object_reference_size))(input)?;
            let (input, values) = many_m_n(count, count, be_size(object_reference_size))(input)?;
            Ok((input, keys.into_iter().zip(values).collect()))
        })(input)
    }
}
