//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Reads, mutates, and writes Apple property list documents (XML and binary
//! `bplist00`), with a narrow decoder for iOS mobile provisioning profiles.

pub mod app;
pub mod binary;
pub mod error;
pub mod json;
pub mod mutate;
pub mod provision;
pub mod value;
pub mod xml;

pub use error::{Error, Result};
pub use mutate::PathSegment;
pub use provision::{Certificate, MobileProvision};
pub use value::{Array, Dict, Document, Uid, Value};

/// Decodes `bytes` as whichever plist representation it's actually in,
/// sniffing the `bplist00` magic the way the binary and XML codecs both
/// expect a caller at the format boundary to.
pub fn decode_auto(bytes: &[u8]) -> Result<Document> {
    if bytes.starts_with(binary::format::HEADER_MAGIC_NUMBER) {
        binary::decode(bytes)
    } else {
        xml::decode(bytes)
    }
}

/// Wraps a value already built in memory as a document root, for callers
/// that construct plists programmatically instead of decoding one.
pub fn from_mapping(root: Value) -> Document {
    Document::from_value(root)
}
