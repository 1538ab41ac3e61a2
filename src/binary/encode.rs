//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Encodes a [`Value`] tree as a `bplist00` byte buffer.
//!
//! Object numbering is depth-first in order of first encounter; scalar
//! values (everything but `Boolean`, `Array` and `Dict`) are deduplicated.
//! Both `ref_size` and `offset_int_size` are computed from the actual object
//! count and offsets, rather than hard-coded, which is a deliberate
//! departure from the reference implementation this format was distilled
//! from (see `DESIGN.md`).

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::binary::format::{HEADER_MAGIC_NUMBER, HEADER_VERSION_00};
use crate::error::Result;
use crate::value::{Dict, Document, Value};

/// A numbered object, with every nested reference already resolved to an
/// index into the same flat table.
enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Date(f64),
    Data(Vec<u8>),
    EmptyString,
    AsciiString(String),
    Utf16String(String),
    Uid(u64),
    Array(Vec<usize>),
    Dict(Vec<(usize, usize)>),
}

#[derive(PartialEq, Eq, Hash)]
enum ScalarKey {
    Null,
    Int(i64),
    Bits(u64),
    DateBits(u64),
    Data(Vec<u8>),
    String(String),
    Uid(u64),
}

struct Builder {
    nodes: Vec<Node>,
    dedup: HashMap<ScalarKey, usize>,
}

impl Builder {
    fn new() -> Self {
        Builder { nodes: Vec::new(), dedup: HashMap::new() }
    }

    fn add_scalar(&mut self, key: ScalarKey, node: Node) -> usize {
        if let Some(&index) = self.dedup.get(&key) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(node);
        self.dedup.insert(key, index);
        index
    }

    fn reserve(&mut self) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node::Null);
        index
    }

    fn number(&mut self, value: &Value) -> Result<usize> {
        match value {
            Value::Null => Ok(self.add_scalar(ScalarKey::Null, Node::Null)),
            Value::Boolean(b) => {
                let index = self.nodes.len();
                self.nodes.push(Node::Bool(*b));
                Ok(index)
            }
            Value::Int(i) => Ok(self.add_scalar(ScalarKey::Int(*i), Node::Int(*i))),
            Value::Real(r) => {
                let v = r.into_inner();
                Ok(self.add_scalar(ScalarKey::Bits(v.to_bits()), Node::Real(v)))
            }
            Value::Date(d) => {
                let seconds = d.seconds_since_epoch;
                Ok(self.add_scalar(ScalarKey::DateBits(seconds.to_bits()), Node::Date(seconds)))
            }
            Value::Data(bytes) => {
                Ok(self.add_scalar(ScalarKey::Data(bytes.clone()), Node::Data(bytes.clone())))
            }
            Value::String(s) if s.is_empty() => {
                Ok(self.add_scalar(ScalarKey::String(String::new()), Node::EmptyString))
            }
            Value::String(s) => {
                let is_ascii = s.bytes().all(|b| b <= 0x7F);
                let node = if is_ascii {
                    Node::AsciiString(s.clone())
                } else {
                    Node::Utf16String(s.clone())
                };
                Ok(self.add_scalar(ScalarKey::String(s.clone()), node))
            }
            Value::Uid(u) => Ok(self.add_scalar(ScalarKey::Uid(u.value), Node::Uid(u.value))),
            Value::Array(items) => {
                let index = self.reserve();
                let mut refs = Vec::with_capacity(items.len());
                for item in items {
                    refs.push(self.number(item)?);
                }
                self.nodes[index] = Node::Array(refs);
                Ok(index)
            }
            Value::Dict(map) => self.number_dict(map),
        }
    }

    fn number_dict(&mut self, map: &Dict) -> Result<usize> {
        let index = self.reserve();
        let mut key_refs = Vec::with_capacity(map.len());
        for key in map.keys() {
            key_refs.push(self.number(&Value::String(key.clone()))?);
        }
        let mut value_refs = Vec::with_capacity(map.len());
        for value in map.values() {
            value_refs.push(self.number(value)?);
        }
        self.nodes[index] = Node::Dict(key_refs.into_iter().zip(value_refs).collect());
        Ok(index)
    }
}

/// Smallest width that can hold `max_value` itself, used for `offset_int_size`.
fn width_for_max_value(max_value: usize) -> usize {
    if max_value <= 0xFF {
        1
    } else if max_value <= 0xFFFF {
        2
    } else if max_value <= 0xFFFF_FFFF {
        4
    } else {
        8
    }
}

/// Smallest width `w` such that `count` distinct object indices (`0..count`)
/// all fit in `w` bytes, i.e. `count <= 2^(8*w)`. Computed in `u64` so the
/// `1 << 32` boundary doesn't overflow `usize` on 32-bit targets.
fn ref_size_for_count(count: usize) -> usize {
    let count = count as u64;
    if count <= 1 << 8 {
        1
    } else if count <= 1 << 16 {
        2
    } else if count <= 1 << 32 {
        4
    } else {
        8
    }
}

fn push_be(out: &mut Vec<u8>, value: u64, width: usize) {
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[8 - width..]);
}

/// Appends a packed-int object (marker `0x1n` followed by the big-endian
/// value) used for escape-length size prefixes.
fn push_packed_length(out: &mut Vec<u8>, length: usize) {
    if length <= 0xFF {
        out.push(0x10);
        push_be(out, length as u64, 1);
    } else if length <= 0xFFFF {
        out.push(0x11);
        push_be(out, length as u64, 2);
    } else if length <= 0xFFFF_FFFF {
        out.push(0x12);
        push_be(out, length as u64, 4);
    } else {
        out.push(0x13);
        push_be(out, length as u64, 8);
    }
}

fn push_marker_and_length(out: &mut Vec<u8>, high_nibble: u8, length: usize) {
    if length < 0x0F {
        out.push(high_nibble | length as u8);
    } else {
        out.push(high_nibble | 0x0F);
        push_packed_length(out, length);
    }
}

fn pack_int(out: &mut Vec<u8>, value: i64) {
    if value >= 0 && value < (1 << 8) {
        out.push(0x10);
        push_be(out, value as u64, 1);
    } else if value >= 0 && value < (1 << 16) {
        out.push(0x11);
        push_be(out, value as u64, 2);
    } else if value >= 0 && value < (1i64 << 32) {
        out.push(0x12);
        push_be(out, value as u64, 4);
    } else {
        out.push(0x13);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

fn minimal_uid_bytes(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let full = value.to_be_bytes();
    let first_nonzero = full.iter().position(|b| *b != 0).unwrap();
    full[first_nonzero..].to_vec()
}

fn serialize_node(node: &Node, ref_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    match node {
        Node::Null => out.push(0x00),
        Node::Bool(false) => out.push(0x08),
        Node::Bool(true) => out.push(0x09),
        Node::Int(i) => pack_int(&mut out, *i),
        Node::Real(f) => {
            out.push(0x23);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Node::Date(seconds) => {
            out.push(0x33);
            out.extend_from_slice(&seconds.to_be_bytes());
        }
        Node::Data(bytes) => {
            push_marker_and_length(&mut out, 0x40, bytes.len());
            out.extend_from_slice(bytes);
        }
        Node::EmptyString => out.push(0x0F),
        Node::AsciiString(s) => {
            push_marker_and_length(&mut out, 0x50, s.len());
            out.extend_from_slice(s.as_bytes());
        }
        Node::Utf16String(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            push_marker_and_length(&mut out, 0x60, units.len());
            for unit in units {
                out.extend_from_slice(&unit.to_be_bytes());
            }
        }
        Node::Uid(value) => {
            let bytes = minimal_uid_bytes(*value);
            out.push(0x80 | bytes.len() as u8);
            out.extend_from_slice(&bytes);
        }
        Node::Array(refs) => {
            push_marker_and_length(&mut out, 0xA0, refs.len());
            for r in refs {
                push_be(&mut out, *r as u64, ref_size);
            }
        }
        Node::Dict(pairs) => {
            push_marker_and_length(&mut out, 0xD0, pairs.len());
            for (key, _) in pairs {
                push_be(&mut out, *key as u64, ref_size);
            }
            for (_, value) in pairs {
                push_be(&mut out, *value as u64, ref_size);
            }
        }
    }
    out
}

/// Encodes a document as a `bplist00` byte buffer.
pub fn encode(document: &Document) -> Result<Vec<u8>> {
    let mut builder = Builder::new();
    let root_index = builder.number(&document.root)?;
    debug_assert_eq!(root_index, 0);

    let num_objects = builder.nodes.len();
    let ref_size = ref_size_for_count(num_objects);

    let mut buf = Vec::new();
    buf.extend_from_slice(HEADER_MAGIC_NUMBER);
    buf.push(HEADER_VERSION_00.0);
    buf.push(HEADER_VERSION_00.1);

    let mut offsets = Vec::with_capacity(num_objects);
    for node in &builder.nodes {
        offsets.push(buf.len());
        let bytes = serialize_node(node, ref_size);
        buf.extend_from_slice(&bytes);
    }

    let offset_table_start = buf.len();
    let max_offset = offsets.iter().copied().max().unwrap_or(0) as u64;
    let offset_int_size = width_for_max_value(usize::try_from(max_offset).unwrap_or(usize::MAX));

    for offset in &offsets {
        push_be(&mut buf, *offset as u64, offset_int_size);
    }

    buf.extend_from_slice(&[0u8; 5]);
    buf.push(0); // sort_version
    buf.push(offset_int_size as u8);
    buf.push(ref_size as u8);
    buf.extend_from_slice(&(num_objects as u64).to_be_bytes());
    buf.extend_from_slice(&0u64.to_be_bytes()); // root_object is always index 0
    buf.extend_from_slice(&(offset_table_start as u64).to_be_bytes());

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Date, Uid};

    #[test]
    fn dedups_repeated_scalar_strings() {
        let mut dict = Dict::new();
        dict.insert("a".to_owned(), Value::String("FooApp".to_owned()));
        dict.insert("b".to_owned(), Value::String("FooApp".to_owned()));
        dict.insert("c".to_owned(), Value::String("FooApp".to_owned()));
        let document = Document::from_value(Value::Dict(dict));

        let mut builder = Builder::new();
        builder.number(&document.root).unwrap();
        let string_count = builder
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::AsciiString(s) if s == "FooApp"))
            .count();
        assert_eq!(string_count, 1);
    }

    #[test]
    fn ref_size_matches_object_count() {
        let mut array = Array::new();
        for i in 0..300 {
            array.push(Value::Int(i));
        }
        let document = Document::from_value(Value::Array(array));
        let bytes = encode(&document).unwrap();
        let trailer_start = bytes.len() - 32;
        assert_eq!(bytes[trailer_start + 7], 2); // object_reference_size byte in trailer
    }

    #[test]
    fn ref_size_stays_one_byte_at_exactly_256_objects() {
        // 256 objects means indices 0..=255, which still fit in one byte
        // (2^8 == 256), so ref_size must not bump to 2 until 257 objects.
        let mut array = Array::new();
        for i in 0..255 {
            array.push(Value::Int(i));
        }
        let document = Document::from_value(Value::Array(array));
        assert_eq!(ref_size_for_count(document_object_count(&document)), 1);
    }

    fn document_object_count(document: &Document) -> usize {
        let mut builder = Builder::new();
        builder.number(&document.root).unwrap();
        builder.nodes.len()
    }

    #[test]
    fn header_is_bplist00_magic() {
        let mut dict = Dict::new();
        dict.insert("when".to_owned(), Value::Date(Date::from_seconds_since_epoch(1.5)));
        dict.insert("uid".to_owned(), Value::Uid(Uid { value: 42 }));
        let document = Document::from_value(Value::Dict(dict));
        let bytes = encode(&document).unwrap();
        assert_eq!(&bytes[0..8], b"bplist00");
    }
}
