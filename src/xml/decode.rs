//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Decodes an Apple PropertyList 1.0 XML document into a [`Value`] tree.
//!
//! Unlike the binary codec there is no object table to number: containers
//! nest directly, and dictionary keys keep the order they appear in the
//! source document (`IndexMap`, not `BTreeMap`).

use base64::decode as base64_decode;
use chrono::{TimeZone, Utc};
use ordered_float::OrderedFloat;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::value::{Array, Date, Dict, Document, Value};

fn xml_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Xml(err.to_string())
}

/// Reads text content up to and including the matching end tag for `tag`.
fn read_text_until_end(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &[u8]) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event(buf).map_err(xml_err)? {
            Event::Text(e) | Event::CData(e) => {
                text.push_str(&e.unescape_and_decode(reader).map_err(xml_err)?);
            }
            Event::End(ref e) if e.name() == tag => break,
            Event::Eof => return Err(Error::Xml("unexpected end of document".to_owned())),
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Skips to the matching end tag for `tag`, discarding any content. Used for
/// elements whose value is carried entirely by the tag name (`true`/`false`).
fn skip_to_end(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &[u8]) -> Result<()> {
    loop {
        match reader.read_event(buf).map_err(xml_err)? {
            Event::End(ref e) if e.name() == tag => return Ok(()),
            Event::Eof => return Err(Error::Xml("unexpected end of document".to_owned())),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_date(text: &str) -> Result<Date> {
    let parsed = Utc
        .datetime_from_str(text, "%Y-%m-%dT%H:%M:%SZ")
        .map_err(|e| Error::Xml(format!("invalid date `{}`: {}", text, e)))?;
    Ok(Date::from_chrono(parsed.naive_utc()))
}

/// Decodes the value rooted at the already-consumed start (or empty) tag
/// named `tag`.
fn decode_element(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &[u8], is_empty: bool) -> Result<Value> {
    match tag {
        b"true" => {
            if !is_empty {
                skip_to_end(reader, buf, tag)?;
            }
            Ok(Value::Boolean(true))
        }
        b"false" => {
            if !is_empty {
                skip_to_end(reader, buf, tag)?;
            }
            Ok(Value::Boolean(false))
        }
        b"string" => {
            if is_empty {
                Ok(Value::String(String::new()))
            } else {
                Ok(Value::String(read_text_until_end(reader, buf, tag)?))
            }
        }
        b"integer" => {
            let text = if is_empty { String::new() } else { read_text_until_end(reader, buf, tag)? };
            let value = text
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::Xml(format!("invalid integer `{}`", text)))?;
            Ok(Value::Int(value))
        }
        b"real" => {
            let text = if is_empty { String::new() } else { read_text_until_end(reader, buf, tag)? };
            let value = text
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::Xml(format!("invalid real `{}`", text)))?;
            Ok(Value::Real(OrderedFloat(value)))
        }
        b"data" => {
            let text = if is_empty { String::new() } else { read_text_until_end(reader, buf, tag)? };
            let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64_decode(&cleaned).map_err(|e| Error::Xml(e.to_string()))?;
            Ok(Value::Data(bytes))
        }
        b"date" => {
            let text = if is_empty { String::new() } else { read_text_until_end(reader, buf, tag)? };
            Ok(Value::Date(parse_date(text.trim())?))
        }
        b"array" => {
            if is_empty {
                return Ok(Value::Array(Array::new()));
            }
            decode_array(reader, buf)
        }
        b"dict" => {
            if is_empty {
                return Ok(Value::Dict(Dict::new()));
            }
            decode_dict(reader, buf)
        }
        other => Err(Error::Xml(format!(
            "unsupported plist element `{}`",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn decode_array(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<Value> {
    let mut items = Array::new();
    loop {
        match reader.read_event(buf).map_err(xml_err)? {
            Event::Start(ref e) => {
                let name = e.name().to_vec();
                items.push(decode_element(reader, buf, &name, false)?);
            }
            Event::Empty(ref e) => {
                let name = e.name().to_vec();
                items.push(decode_element(reader, buf, &name, true)?);
            }
            Event::End(ref e) if e.name() == b"array" => break,
            Event::Eof => return Err(Error::Xml("unexpected end of document".to_owned())),
            _ => {}
        }
        buf.clear();
    }
    Ok(Value::Array(items))
}

fn decode_dict(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<Value> {
    let mut dict = Dict::new();
    loop {
        match reader.read_event(buf).map_err(xml_err)? {
            Event::Start(ref e) if e.name() == b"key" => {
                let key = read_text_until_end(reader, buf, b"key")?;
                buf.clear();
                let value = loop {
                    match reader.read_event(buf).map_err(xml_err)? {
                        Event::Start(ref v) => {
                            let name = v.name().to_vec();
                            break decode_element(reader, buf, &name, false)?;
                        }
                        Event::Empty(ref v) => {
                            let name = v.name().to_vec();
                            break decode_element(reader, buf, &name, true)?;
                        }
                        Event::Eof => return Err(Error::Xml("missing value for key".to_owned())),
                        _ => buf.clear(),
                    }
                };
                dict.insert(key, value);
            }
            Event::End(ref e) if e.name() == b"dict" => break,
            Event::Eof => return Err(Error::Xml("unexpected end of document".to_owned())),
            _ => {}
        }
        buf.clear();
    }
    Ok(Value::Dict(dict))
}

fn local_name(start: &BytesStart) -> Vec<u8> {
    start.name().to_vec()
}

/// Decodes a complete XML property list document.
pub fn decode(input: &[u8]) -> Result<Document> {
    let text = std::str::from_utf8(input).map_err(|_| Error::Xml("document is not valid utf-8".to_owned()))?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event(&mut buf).map_err(xml_err)? {
            Event::Start(ref e) if e.name() == b"plist" => {
                buf.clear();
                continue;
            }
            Event::Start(ref e) => {
                let name = local_name(e);
                let value = decode_element(&mut reader, &mut buf, &name, false)?;
                return Ok(Document::from_value(value));
            }
            Event::Empty(ref e) if e.name() != b"plist" => {
                let name = local_name(e);
                let value = decode_element(&mut reader, &mut buf, &name, true)?;
                return Ok(Document::from_value(value));
            }
            Event::Eof => return Err(Error::Xml("document has no root element".to_owned())),
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flat_dict_preserving_key_order() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>com.guying.app.foo</string>
    <key>CFBundleVersion</key>
    <integer>42</integer>
    <key>LSRequiresIPhoneOS</key>
    <true/>
</dict>
</plist>"#;
        let doc = decode(xml).unwrap();
        let dict = doc.as_dict().unwrap();
        let keys: Vec<&String> = dict.keys().collect();
        assert_eq!(keys, vec!["CFBundleIdentifier", "CFBundleVersion", "LSRequiresIPhoneOS"]);
        assert_eq!(dict.get("CFBundleVersion").unwrap().as_int(), Some(42));
        assert_eq!(dict.get("LSRequiresIPhoneOS").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn decodes_empty_string_and_data() {
        let xml = br#"<?xml version="1.0"?>
<plist version="1.0">
<dict>
    <key>empty</key>
    <string></string>
    <key>blob</key>
    <data>aGVsbG8=</data>
</dict>
</plist>"#;
        let doc = decode(xml).unwrap();
        let dict = doc.as_dict().unwrap();
        assert_eq!(dict.get("empty").unwrap().as_str(), Some(""));
        assert_eq!(dict.get("blob").unwrap().as_data(), Some(b"hello".as_ref()));
    }

    #[test]
    fn decodes_array_of_dicts() {
        let xml = br#"<plist version="1.0">
<array>
    <dict><key>n</key><integer>1</integer></dict>
    <dict><key>n</key><integer>2</integer></dict>
</array>
</plist>"#;
        let doc = decode(xml).unwrap();
        let array = doc.root.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[1].as_dict().unwrap().get("n").unwrap().as_int(), Some(2));
    }
}
