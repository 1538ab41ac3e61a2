//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Encodes a [`Value`] tree as an Apple PropertyList 1.0 XML document.
//!
//! There is no object table here, containers are written inline and nested
//! values are written depth-first, mirroring `_to_dom_node`/`to_xml` in the
//! reference implementation this crate's XML support was distilled from.

use base64::encode as base64_encode;

use crate::error::{Error, Result};
use crate::value::{Dict, Document, Value};

/// Knobs for XML rendering. `pretty` controls indentation; everything else
/// about the document shape (DOCTYPE, root `plist` element, tag names) is
/// fixed by the format.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub pretty: bool,
    pub indent_width: usize,
    pub encoding: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions { pretty: true, indent_width: 2, encoding: "UTF-8".to_owned() }
    }
}

struct Writer {
    out: String,
    options: EncodeOptions,
    depth: usize,
}

impl Writer {
    fn newline_and_indent(&mut self) {
        if self.options.pretty {
            self.out.push('\n');
            for _ in 0..self.depth * self.options.indent_width {
                self.out.push(' ');
            }
        }
    }

    fn open(&mut self, tag: &str) {
        self.newline_and_indent();
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn leaf(&mut self, tag: &str, text: &str) {
        self.newline_and_indent();
        if text.is_empty() {
            self.out.push('<');
            self.out.push_str(tag);
            self.out.push_str("></");
            self.out.push_str(tag);
            self.out.push('>');
        } else {
            self.out.push('<');
            self.out.push_str(tag);
            self.out.push('>');
            self.out.push_str(&escape_text(text));
            self.out.push_str("</");
            self.out.push_str(tag);
            self.out.push('>');
        }
    }

    fn empty(&mut self, tag: &str) {
        self.newline_and_indent();
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str("/>");
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null | Value::Uid(_) => Err(Error::UnsupportedValue),
            Value::Boolean(true) => {
                self.empty("true");
                Ok(())
            }
            Value::Boolean(false) => {
                self.empty("false");
                Ok(())
            }
            Value::Int(i) => {
                self.leaf("integer", &i.to_string());
                Ok(())
            }
            Value::Real(r) => {
                self.leaf("real", &format_real(r.into_inner()));
                Ok(())
            }
            Value::Date(d) => {
                let dt = d.to_chrono();
                self.leaf("date", &dt.format("%Y-%m-%dT%H:%M:%SZ").to_string());
                Ok(())
            }
            Value::Data(bytes) => {
                self.leaf("data", &base64_encode(bytes));
                Ok(())
            }
            Value::String(s) => {
                self.leaf("string", s);
                Ok(())
            }
            Value::Array(items) => {
                if items.is_empty() {
                    self.empty("array");
                    return Ok(());
                }
                self.open_container("array");
                for item in items {
                    self.write_value(item)?;
                }
                self.close_container("array");
                Ok(())
            }
            Value::Dict(map) => self.write_dict(map),
        }
    }

    fn write_dict(&mut self, map: &Dict) -> Result<()> {
        if map.is_empty() {
            self.empty("dict");
            return Ok(());
        }
        self.open_container("dict");
        for (key, value) in map.iter() {
            self.leaf("key", key);
            self.write_value(value)?;
        }
        self.close_container("dict");
        Ok(())
    }

    fn open_container(&mut self, tag: &str) {
        self.open(tag);
        self.depth += 1;
    }

    fn close_container(&mut self, tag: &str) {
        self.depth -= 1;
        self.newline_and_indent();
        self.close(tag);
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Encodes a document as an XML property list using default options.
pub fn encode(document: &Document) -> Result<Vec<u8>> {
    encode_with_options(document, &EncodeOptions::default())
}

pub fn encode_with_options(document: &Document, options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut writer = Writer { out: String::new(), options: options.clone(), depth: 1 };

    writer.out.push_str("<?xml version=\"1.0\" encoding=\"");
    writer.out.push_str(&writer.options.encoding.clone());
    writer.out.push_str("\"?>");
    if writer.options.pretty {
        writer.out.push('\n');
    }
    writer.out.push_str(
        "<!DOCTYPE plist PUBLIC \"-//Apple Computer//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">",
    );
    if writer.options.pretty {
        writer.out.push('\n');
    }
    writer.out.push_str("<plist version=\"1.0\">");
    writer.depth = 1;

    writer.write_value(&document.root)?;

    writer.depth = 0;
    writer.newline_and_indent();
    writer.out.push_str("</plist>");
    if writer.options.pretty {
        writer.out.push('\n');
    }

    Ok(writer.out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Uid;
    use crate::xml::decode;

    #[test]
    fn round_trips_flat_dict_through_xml() {
        let mut dict = Dict::new();
        dict.insert("CFBundleIdentifier".to_owned(), Value::String("com.guying.app.foo".to_owned()));
        dict.insert("CFBundleVersion".to_owned(), Value::Int(42));
        dict.insert("LSRequiresIPhoneOS".to_owned(), Value::Boolean(true));
        let doc = Document::from_value(Value::Dict(dict));

        let bytes = encode(&doc).unwrap();
        let decoded = decode::decode(&bytes).unwrap();
        assert_eq!(decoded.root, doc.root);
    }

    #[test]
    fn encodes_canonical_doctype() {
        let doc = Document::from_value(Value::Dict(Dict::new()));
        let bytes = encode(&doc).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("-//Apple Computer//DTD PLIST 1.0//EN"));
        assert!(text.contains("<plist version=\"1.0\">"));
    }

    #[test]
    fn rejects_uid_as_unsupported() {
        let doc = Document::from_value(Value::Uid(Uid { value: 1 }));
        assert!(matches!(encode(&doc), Err(Error::UnsupportedValue)));
    }

    #[test]
    fn empty_string_round_trips_as_empty_element() {
        let mut dict = Dict::new();
        dict.insert("s".to_owned(), Value::String(String::new()));
        let doc = Document::from_value(Value::Dict(dict));
        let bytes = encode(&doc).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<string></string>"));
        let decoded = decode::decode(text.as_bytes()).unwrap();
        assert_eq!(decoded.root, doc.root);
    }
}
