//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! JSON shadow serialization for the CLI front-end.
//!
//! `Value` has no direct `serde::Serialize` impl of its own (its `Real` and
//! `Date` wrappers don't map onto JSON types without a decision), so this
//! module provides the CLI-facing rendering instead: dates as `Z`-suffixed
//! strings, `Data` as lowercase hex, and `Uid` as a plain JSON number, since
//! the CLI only ever reports values, never round-trips them.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::provision::Certificate;
use crate::value::{Document, Value};

pub struct JsonValue<'a>(pub &'a Value);

impl<'a> Serialize for JsonValue<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Real(r) => serializer.serialize_f64(r.into_inner()),
            Value::Date(d) => {
                let text = d.to_chrono().format("%Y-%m-%dT%H:%M:%SZ").to_string();
                serializer.serialize_str(&text)
            }
            Value::Data(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                serializer.serialize_str(&hex)
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Uid(u) => serializer.serialize_u64(u.value),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&JsonValue(item))?;
                }
                seq.end()
            }
            Value::Dict(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, &JsonValue(value))?;
                }
                out.end()
            }
        }
    }
}

pub struct JsonDocument<'a>(pub &'a Document);

impl<'a> Serialize for JsonDocument<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        JsonValue(&self.0.root).serialize(serializer)
    }
}

/// The `--cert` output shape: one entry per `DeveloperCertificates` member.
#[derive(serde::Serialize)]
pub struct CertificateSummary {
    pub serial: String,
    pub name: Option<String>,
    pub sha1: String,
}

impl From<&Certificate> for CertificateSummary {
    fn from(cert: &Certificate) -> Self {
        CertificateSummary { serial: cert.serial.clone(), name: cert.common_name.clone(), sha1: cert.sha1.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;

    #[test]
    fn dict_serializes_preserving_key_order() {
        let mut dict = Dict::new();
        dict.insert("b".to_owned(), Value::Int(2));
        dict.insert("a".to_owned(), Value::Int(1));
        let document = Document::from_value(Value::Dict(dict));
        let json = serde_json::to_string(&JsonDocument(&document)).unwrap();
        assert_eq!(json, r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn data_renders_as_lowercase_hex() {
        let value = Value::Data(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let json = serde_json::to_string(&JsonValue(&value)).unwrap();
        assert_eq!(json, "\"deadbeef\"");
    }
}
