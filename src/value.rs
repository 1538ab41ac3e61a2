//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The plist value model.
//!
//! A [`Value`] is a tagged sum of every kind a property list can carry. It
//! is the representation shared by the binary and XML codecs, the mutation
//! API and the provisioning-profile adapter: every codec either produces a
//! `Value` tree or consumes one.
//!
//! Dictionaries are insertion-ordered (`indexmap::IndexMap`) rather than
//! sorted, because decode -> encode -> decode must reproduce the original
//! key order (see the crate's binary and XML codecs).

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Number of seconds from the Unix epoch to the Mac epoch (2001-01-01T00:00:00Z).
pub const MAC_EPOCH_UNIX_OFFSET: i64 = 978_307_200;

/// An ordered mapping from plist string keys to values.
pub type Dict = IndexMap<String, Value>;

/// An ordered sequence of plist values.
pub type Array = Vec<Value>;

/// A `CFAbsoluteTime`-equivalent timestamp: seconds since the Mac epoch.
///
/// The full double-precision offset is retained (see `DESIGN.md` for why
/// this implementation does not truncate to whole seconds the way the
/// reference implementation historically did).
#[derive(Copy, Clone, Debug)]
pub struct Date {
    pub seconds_since_epoch: f64,
}

impl Date {
    pub fn from_seconds_since_epoch(seconds: f64) -> Self {
        Date { seconds_since_epoch: seconds }
    }

    pub fn from_chrono(dt: NaiveDateTime) -> Self {
        let epoch = mac_epoch();
        let seconds = (dt - epoch).num_milliseconds() as f64 / 1000.0;
        Date { seconds_since_epoch: seconds }
    }

    pub fn to_chrono(self) -> NaiveDateTime {
        mac_epoch() + chrono::Duration::milliseconds((self.seconds_since_epoch * 1000.0).round() as i64)
    }

    pub fn now() -> Self {
        Date::from_chrono(Utc::now().naive_utc())
    }
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.seconds_since_epoch) == OrderedFloat(other.seconds_since_epoch)
    }
}
impl Eq for Date {}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Date {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        OrderedFloat(self.seconds_since_epoch).cmp(&OrderedFloat(other.seconds_since_epoch))
    }
}

fn mac_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd(2001, 1, 1).and_hms(0, 0, 0)
}

/// An unsigned, big-endian identifier used by `NSKeyedArchiver`-style object
/// graphs. Semantically distinct from [`Value::Int`] even when the numeric
/// value coincides (`spec.md` invariant 4).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Uid {
    pub value: u64,
}

/// Any value which can be encoded in a property list, in either the XML or
/// binary representation.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Real(OrderedFloat<f64>),
    Date(Date),
    Data(Vec<u8>),
    String(String),
    Uid(Uid),
    Array(Array),
    Dict(Dict),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Real(a), Real(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Data(a), Data(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Uid(a), Uid(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Dict(a), Dict(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y),
            _ => false,
        }
    }
}
impl Eq for Value {}

impl Value {
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Value::Data(d) => Some(d.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(OrderedFloat(v))
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl<'a> From<&'a str> for Value {
    fn from(v: &'a str) -> Self {
        Value::String(v.to_owned())
    }
}
impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Data(v)
    }
}
impl From<Date> for Value {
    fn from(v: Date) -> Self {
        Value::Date(v)
    }
}

/// The root of a decoded or hand-built property list document.
///
/// Alongside the value tree, a `Document` records the reference width
/// (`ref_size`, in bytes) observed during the most recent binary decode,
/// because callers and tests assert on it (`spec.md` §3).
#[derive(Clone, Debug)]
pub struct Document {
    pub root: Value,
    pub ref_size: usize,
}

impl Document {
    /// Wraps an arbitrary value as a document root, as produced by
    /// `from_mapping`-style construction in user code.
    pub fn from_value(root: Value) -> Self {
        Document { root, ref_size: 0 }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        self.root.as_dict()
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        self.root.as_dict_mut()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}
impl Eq for Document {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_and_data_are_distinguishable() {
        let s = Value::String(String::new());
        let d = Value::Data(Vec::new());
        assert_ne!(s, d);
    }

    #[test]
    fn uid_and_int_are_not_interchangeable() {
        let uid = Value::Uid(Uid { value: 7 });
        let int = Value::Int(7);
        assert_ne!(uid, int);
    }

    #[test]
    fn dict_equality_is_order_sensitive_by_content_not_by_slot() {
        let mut a = Dict::new();
        a.insert("x".to_owned(), Value::Int(1));
        a.insert("y".to_owned(), Value::Int(2));

        let mut b = Dict::new();
        b.insert("y".to_owned(), Value::Int(2));
        b.insert("x".to_owned(), Value::Int(1));

        // Same pairs, different insertion order: not structurally equal,
        // because round-tripping through the binary codec must preserve
        // the exact order (spec.md invariant 2).
        assert_ne!(Value::Dict(a), Value::Dict(b));
    }

    #[test]
    fn mac_epoch_round_trips_through_chrono() {
        let date = Date::from_seconds_since_epoch(0.0);
        let dt = date.to_chrono();
        assert_eq!(dt, NaiveDate::from_ymd(2001, 1, 1).and_hms(0, 0, 0));
        let back = Date::from_chrono(dt);
        assert_eq!(back, date);
    }
}
