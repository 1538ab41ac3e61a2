//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Decodes a `bplist00` byte buffer into a [`Value`] tree.
//!
//! The object table is read lazily and memoized by index, mirroring the
//! teacher's `ObjectDeserializer`, but objects are materialized directly as
//! [`Value`] rather than routed through a generic `serde::Visitor`.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use ascii::AsciiStr;
use ordered_float::OrderedFloat;

use crate::binary::format::{
    ObjectFormat, HEADER_SIZE, HEADER_VERSION_00, TRAILER_SIZE,
};
use crate::binary::parser;
use crate::error::{Error, Result};
use crate::value::{Array, Date, Dict, Document, Uid, Value};

#[derive(Debug)]
struct Metadata {
    offset_table: Vec<usize>,
    object_reference_size: usize,
    root_object: usize,
    object_table_range: Range<usize>,
}

impl Metadata {
    fn offset_of(&self, object: usize) -> Result<usize> {
        self.offset_table
            .get(object)
            .copied()
            .ok_or(Error::Truncated)
    }
}

struct ObjectTable<'a> {
    input: &'a [u8],
    metadata: Metadata,
}

macro_rules! define_parser {
    ($name:ident, $parser:expr, $type:ty) => {
        fn $name(&self, object: usize) -> Result<$type> {
            let data = self.data_for(object)?;
            $parser(data).map(|(_, value)| value).map_err(|_| Error::BadToken)
        }
    };
}

impl<'a> ObjectTable<'a> {
    fn data_for(&self, object: usize) -> Result<&'a [u8]> {
        let offset = self.metadata.offset_of(object)?;
        if !self.metadata.object_table_range.contains(&offset) {
            return Err(Error::Truncated);
        }
        Ok(&self.input[offset..])
    }

    fn kind_of(&self, object: usize) -> Result<ObjectFormat> {
        let data = self.data_for(object)?;
        parser::object::any_marker(data)
            .map(|(_, (format, _))| format)
            .map_err(|_| Error::BadToken)
    }

    define_parser!(parse_boolean, parser::object::boolean, bool);
    define_parser!(parse_uint8, parser::object::uint8, u8);
    define_parser!(parse_uint16, parser::object::uint16, u16);
    define_parser!(parse_uint32, parser::object::uint32, u32);
    define_parser!(parse_sint64, parser::object::sint64, i64);
    define_parser!(parse_float32, parser::object::float32, f32);
    define_parser!(parse_float64, parser::object::float64, f64);
    define_parser!(parse_date, parser::object::date, f64);
    define_parser!(parse_data, parser::object::data, &'a [u8]);
    define_parser!(parse_uid, parser::object::uid, &'a [u8]);

    /// Unlike the other `define_parser!`-generated methods, ASCII decoding
    /// has two distinct ways to fail: the marker/length framing (a
    /// structural `BadToken`) and the payload containing a non-ASCII byte
    /// (an `EncodingError`, per spec.md §7). The two are kept apart by
    /// parsing the raw payload first and validating it separately.
    fn parse_ascii_string(&self, object: usize) -> Result<&'a str> {
        let data = self.data_for(object)?;
        let (_, bytes) = parser::object::ascii_payload(data).map_err(|_| Error::BadToken)?;
        AsciiStr::from_ascii(bytes).map(AsciiStr::as_str).map_err(|_| Error::EncodingError)
    }

    /// See [`Self::parse_ascii_string`]: malformed UTF-16 (an odd length or
    /// an unpaired surrogate) is an `EncodingError`, not a `BadToken`.
    fn parse_utf16_string(&self, object: usize) -> Result<String> {
        let data = self.data_for(object)?;
        let (_, units) = parser::object::utf16_units(data).map_err(|_| Error::BadToken)?;
        String::from_utf16(&units).map_err(|_| Error::EncodingError)
    }

    fn parse_array(&self, object: usize) -> Result<Vec<usize>> {
        let data = self.data_for(object)?;
        parser::object::array(self.metadata.object_reference_size)(data)
            .map(|(_, objects)| objects)
            .map_err(|_| Error::BadToken)
    }

    fn parse_set(&self, object: usize) -> Result<Vec<usize>> {
        let data = self.data_for(object)?;
        parser::object::set(self.metadata.object_reference_size)(data)
            .map(|(_, objects)| objects)
            .map_err(|_| Error::BadToken)
    }

    fn parse_dictionary(&self, object: usize) -> Result<Vec<(usize, usize)>> {
        let data = self.data_for(object)?;
        parser::object::dictionary(self.metadata.object_reference_size)(data)
            .map(|(_, pairs)| pairs)
            .map_err(|_| Error::BadToken)
    }
}

fn parse_metadata(input: &[u8]) -> Result<Metadata> {
    if input.len() < HEADER_SIZE + 2 + TRAILER_SIZE {
        return Err(Error::Truncated);
    }

    let header_slice = &input[0..HEADER_SIZE];
    let (_, header) = parser::document::header(header_slice).map_err(|_| Error::InvalidHeader)?;
    if header.version != HEADER_VERSION_00 {
        return Err(Error::InvalidHeader);
    }

    let trailer_slice = &input[input.len() - TRAILER_SIZE..];
    let (_, trailer) = parser::document::trailer(trailer_slice).map_err(|_| Error::Truncated)?;
    if trailer.root_object >= trailer.number_of_objects {
        return Err(Error::Truncated);
    }

    let offset_table_start = trailer.offset_table_offset;
    let offset_table_length = trailer.number_of_objects * trailer.offset_table_entry_size;
    if (offset_table_start + offset_table_length) > (input.len() - TRAILER_SIZE) {
        return Err(Error::Truncated);
    }

    let offset_table_slice = &input[offset_table_start..offset_table_start + offset_table_length];
    let (_, offset_table) = parser::document::offset_table(
        trailer.number_of_objects,
        trailer.offset_table_entry_size,
    )(offset_table_slice)
    .map_err(|_| Error::Truncated)?;

    Ok(Metadata {
        offset_table,
        object_reference_size: trailer.object_reference_size,
        root_object: trailer.root_object,
        object_table_range: HEADER_SIZE..offset_table_start,
    })
}

struct Decoder<'a> {
    object_table: ObjectTable<'a>,
    cache: HashMap<usize, Value>,
    in_progress: BTreeSet<usize>,
}

impl<'a> Decoder<'a> {
    /// Decodes the members of an array or set, guarding against the index
    /// re-entering itself while its own members are still being resolved.
    fn decode_reference_list(&mut self, object: usize, indices: Vec<usize>) -> Result<Array> {
        if !self.in_progress.insert(object) {
            return Err(Error::CycleDetected);
        }
        let mut items = Array::with_capacity(indices.len());
        for index in indices {
            items.push(self.decode_object(index)?);
        }
        self.in_progress.remove(&object);
        Ok(items)
    }

    fn decode_object(&mut self, object: usize) -> Result<Value> {
        if let Some(value) = self.cache.get(&object) {
            return Ok(value.clone());
        }

        let format = self.object_table.kind_of(object)?;
        let value = match format {
            ObjectFormat::Null => Value::Null,
            ObjectFormat::Boolean => Value::Boolean(self.object_table.parse_boolean(object)?),
            // The empty-string singleton shares its marker byte with the
            // padding fill byte; an empty string is always written this way
            // (see binary/encode.rs), so this is never actually padding.
            ObjectFormat::Fill => Value::String(String::new()),
            ObjectFormat::UInt8 => Value::Int(self.object_table.parse_uint8(object)? as i64),
            ObjectFormat::UInt16 => Value::Int(self.object_table.parse_uint16(object)? as i64),
            ObjectFormat::UInt32 => Value::Int(self.object_table.parse_uint32(object)? as i64),
            ObjectFormat::SInt64 => Value::Int(self.object_table.parse_sint64(object)?),
            ObjectFormat::Float32 => {
                Value::Real(OrderedFloat(self.object_table.parse_float32(object)? as f64))
            }
            ObjectFormat::Float64 => {
                Value::Real(OrderedFloat(self.object_table.parse_float64(object)?))
            }
            ObjectFormat::Date => {
                let seconds = self.object_table.parse_date(object)?;
                Value::Date(Date::from_seconds_since_epoch(seconds))
            }
            ObjectFormat::Data => Value::Data(self.object_table.parse_data(object)?.to_vec()),
            ObjectFormat::AsciiString => {
                Value::String(self.object_table.parse_ascii_string(object)?.to_owned())
            }
            ObjectFormat::Utf16String => {
                Value::String(self.object_table.parse_utf16_string(object)?)
            }
            ObjectFormat::Uid => {
                let bytes = self.object_table.parse_uid(object)?;
                if bytes.is_empty() || bytes.len() > 8 {
                    return Err(Error::ValueOutOfRange);
                }
                let value = bytes.iter().fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
                Value::Uid(Uid { value })
            }
            ObjectFormat::Array => {
                let indices = self.object_table.parse_array(object)?;
                Value::Array(self.decode_reference_list(object, indices)?)
            }
            // Sets share Array's wire shape (spec.md §4.1) and have no
            // distinct representation in this value model.
            ObjectFormat::Set => {
                let indices = self.object_table.parse_set(object)?;
                Value::Array(self.decode_reference_list(object, indices)?)
            }
            ObjectFormat::Dictionary => {
                if !self.in_progress.insert(object) {
                    return Err(Error::CycleDetected);
                }
                let pairs = self.object_table.parse_dictionary(object)?;
                let mut dict = Dict::with_capacity(pairs.len());
                for (key_index, value_index) in pairs {
                    let key = match self.decode_object(key_index)? {
                        Value::String(s) => s,
                        _ => return Err(Error::BadToken),
                    };
                    let value = self.decode_object(value_index)?;
                    dict.insert(key, value);
                }
                self.in_progress.remove(&object);
                Value::Dict(dict)
            }
        };

        self.cache.insert(object, value.clone());
        Ok(value)
    }
}

/// Decodes a complete `bplist00` document.
pub fn decode(input: &[u8]) -> Result<Document> {
    let metadata = parse_metadata(input)?;
    let ref_size = metadata.object_reference_size;
    let root_object = metadata.root_object;
    let object_table = ObjectTable { input, metadata };

    let mut decoder = Decoder {
        object_table,
        cache: HashMap::new(),
        in_progress: BTreeSet::new(),
    };
    let root = decoder.decode_object(root_object)?;
    Ok(Document { root, ref_size })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::encode::encode;

    #[test]
    fn decodes_empty_dict_document() {
        let doc = Document::from_value(Value::Dict(Dict::new()));
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.root, doc.root);
    }

    #[test]
    fn decodes_scalars_and_preserves_key_order() {
        let mut dict = Dict::new();
        dict.insert("CFBundleIdentifier".to_owned(), Value::String("com.guying.app.foo".to_owned()));
        dict.insert("CFBundleName".to_owned(), Value::String("FooApp".to_owned()));
        dict.insert("CFBundleExecutable".to_owned(), Value::String("FooApp".to_owned()));
        let doc = Document::from_value(Value::Dict(dict));
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.root, doc.root);
        assert_eq!(decoded.ref_size, 1);

        let keys: Vec<&String> = decoded.as_dict().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["CFBundleIdentifier", "CFBundleName", "CFBundleExecutable"]
        );
    }

    #[test]
    fn empty_string_and_empty_data_round_trip_distinctly() {
        let mut dict = Dict::new();
        dict.insert("s".to_owned(), Value::String(String::new()));
        dict.insert("d".to_owned(), Value::Data(Vec::new()));
        let doc = Document::from_value(Value::Dict(dict));
        let bytes = encode(&doc).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.root, doc.root);
    }

    /// Assembles a minimal document trailer by hand, for tests exercising
    /// wire shapes (Set, malformed encodings) the encoder never produces.
    fn trailer_bytes(offset_table_entry_size: u8, object_reference_size: u8, number_of_objects: u64, root_object: u64, offset_table_offset: u64) -> Vec<u8> {
        let mut out = vec![0u8; 5]; // reserved
        out.push(0); // sort_version
        out.push(offset_table_entry_size);
        out.push(object_reference_size);
        out.extend_from_slice(&number_of_objects.to_be_bytes());
        out.extend_from_slice(&root_object.to_be_bytes());
        out.extend_from_slice(&offset_table_offset.to_be_bytes());
        out
    }

    #[test]
    fn set_decodes_the_same_way_as_array() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"bplist00");
        bytes.extend_from_slice(&[0xC1, 0x01]); // object 0: Set, one reference to object 1
        bytes.extend_from_slice(&[0x10, 0x07]); // object 1: UInt8(7)
        bytes.extend_from_slice(&[0x08, 0x0A]); // offset table: [8, 10]
        bytes.extend(trailer_bytes(1, 1, 2, 0, 12));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.root, Value::Array(vec![Value::Int(7)]));
    }

    #[test]
    fn uid_with_zero_length_payload_is_out_of_range() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"bplist00");
        bytes.push(0x80); // object 0: Uid, zero-length payload
        bytes.push(0x08); // offset table: [8]
        bytes.extend(trailer_bytes(1, 1, 1, 0, 9));

        assert!(matches!(decode(&bytes), Err(Error::ValueOutOfRange)));
    }

    #[test]
    fn ascii_string_with_a_non_ascii_byte_is_an_encoding_error_not_a_bad_token() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"bplist00");
        bytes.extend_from_slice(&[0x51, 0xFF]); // object 0: AsciiString(length 1), non-ASCII byte
        bytes.push(0x08); // offset table: [8]
        bytes.extend(trailer_bytes(1, 1, 1, 0, 10));

        assert!(matches!(decode(&bytes), Err(Error::EncodingError)));
    }

    #[test]
    fn utf16_string_with_an_unpaired_surrogate_is_an_encoding_error() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"bplist00");
        bytes.extend_from_slice(&[0x61, 0xD8, 0x00]); // object 0: Utf16String(length 1), lone high surrogate
        bytes.push(0x08); // offset table: [8]
        bytes.extend(trailer_bytes(1, 1, 1, 0, 11));

        assert!(matches!(decode(&bytes), Err(Error::EncodingError)));
    }
}
