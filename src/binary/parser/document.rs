//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Parsers for the fixed-layout framing around the object table: the
//! 8-byte header, the offset table, and the 32-byte trailer.

use nom::{
    IResult,
    bytes::complete::{tag, take},
    combinator::map,
    multi::many_m_n,
    number::complete::be_u8,
    sequence::tuple,
};

use crate::binary::format::{
    Header, OffsetTable, Trailer, HEADER_MAGIC_NUMBER, TRAILER_PREAMBLE_UNUSED_SIZE,
};
use crate::binary::parser::utils::be_size;

/// Parses the 8-byte `bplist00` header: the 6-byte magic followed by a
/// major/minor version digit pair.
pub fn header(input: &[u8]) -> IResult<&[u8], Header> {
    let (rest, (_, major, minor)) = tuple((tag(HEADER_MAGIC_NUMBER), be_u8, be_u8))(input)?;
    Ok((rest, Header { version: (major, minor) }))
}

/// Builds a parser for an offset table of `entries` entries, each
/// `entry_size` bytes wide (1 to 8, per the trailer's declared width).
pub fn offset_table(entries: usize, entry_size: usize) -> impl Fn(&[u8]) -> IResult<&[u8], OffsetTable> {
    move |input: &[u8]| many_m_n(entries, entries, be_size(entry_size))(input)
}

/// Parses the fixed 32-byte trailer: 5 reserved bytes, a sort version byte,
/// the two declared widths, then three 8-byte counters.
pub fn trailer(input: &[u8]) -> IResult<&[u8], Trailer> {
    map(
        tuple((
            take(TRAILER_PREAMBLE_UNUSED_SIZE),
            be_u8,
            be_size(1),
            be_size(1),
            be_size(8),
            be_size(8),
            be_size(8),
        )),
        |(_, sort_version, offset_table_entry_size, object_reference_size, number_of_objects, root_object, offset_table_offset)| {
            Trailer {
                sort_version,
                offset_table_entry_size,
                object_reference_size,
                number_of_objects,
                root_object,
                offset_table_offset,
            }
        },
    )(input)
}

#[cfg(test)]
mod tests {
    use super::{header, offset_table, trailer, Header, Trailer};
    use crate::binary::format::HEADER_VERSION_00;

    #[test]
    fn header_reads_magic_and_version() {
        let bytes = b"bplist00";
        let (rest, parsed) = header(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, Header { version: HEADER_VERSION_00 });
    }

    #[test]
    fn header_rejects_wrong_magic() {
        assert!(header(b"notaplst").is_err());
    }

    #[test]
    fn offset_table_with_single_byte_entries() {
        let (rest, offsets) = offset_table(4, 1)(&[0x08, 0x0A, 0x0C, 0x20]).unwrap();
        assert!(rest.is_empty());
        assert_eq!(offsets, vec![8, 10, 12, 32]);
    }

    #[test]
    fn offset_table_with_eight_byte_entries() {
        let bytes = &[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        ];
        let (rest, offsets) = offset_table(2, 8)(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(offsets, vec![8, 256]);
    }

    #[test]
    fn trailer_reads_every_field_in_order() {
        let bytes = &[
            0x00, 0x00, 0x00, 0x00, 0x00, // reserved
            0x00, // sort_version
            0x01, // offset_table_entry_size
            0x02, // object_reference_size
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, // number_of_objects
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // root_object
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14, // offset_table_offset
        ];
        let (rest, parsed) = trailer(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            parsed,
            Trailer {
                sort_version: 0,
                offset_table_entry_size: 1,
                object_reference_size: 2,
                number_of_objects: 3,
                root_object: 0,
                offset_table_offset: 20,
            }
        );
    }
}
