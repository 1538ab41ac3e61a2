//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std;
use std::fmt::{self, Display};

pub type Result<T> = std::result::Result<T, Error>;

/// Property list parsing, encoding, mutation and provisioning error.
#[derive(Debug)]
pub enum Error {
    /// Neither `<?xml`/`<plist` nor `bplist00` magic was recognized.
    InvalidHeader,
    /// A read, offset, reference or length field addressed past the end of the input.
    Truncated,
    /// An unknown high/low nibble combination was encountered in a binary plist token.
    BadToken,
    /// A UTF-16 string had an odd byte length, or an ASCII string contained a non-ASCII byte.
    EncodingError,
    /// A UID or length value did not fit in its declared width.
    ValueOutOfRange,
    /// A mutation path dereferenced a missing key or index. Carries the
    /// unreachable suffix and the prefix that was successfully navigated.
    PathNotFound { tail: String, prefix: String },
    /// `add` targeted a path segment that already exists.
    PathExists(String),
    /// A mutation operation was called with an empty path.
    EmptyPath,
    /// The encoder was asked to serialize a value it cannot represent.
    UnsupportedValue,
    /// Binary property lists are acyclic; a repeated in-progress object index was found.
    CycleDetected,
    /// Filesystem or archive I/O failure.
    Io(String),
    /// The XML document could not be parsed as a plist.
    Xml(String),
    /// The `.ipa`/ZIP archive could not be read, or the expected member was missing.
    Zip(String),
    /// A DER-encoded certificate could not be parsed.
    Certificate(String),
}

impl Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidHeader => formatter.write_str("unrecognized plist header"),
            Error::Truncated => formatter.write_str("unexpected end of input"),
            Error::BadToken => formatter.write_str("unknown or unsupported object token"),
            Error::EncodingError => formatter.write_str("invalid string encoding"),
            Error::ValueOutOfRange => formatter.write_str("value does not fit its declared width"),
            Error::PathNotFound { tail, prefix } => {
                write!(formatter, "\"{}\" of \"{}\"", tail, prefix)
            }
            Error::PathExists(path) => write!(formatter, "\"{}\" already exists", path),
            Error::EmptyPath => formatter.write_str("mutation path must not be empty"),
            Error::UnsupportedValue => formatter.write_str("value cannot be encoded"),
            Error::CycleDetected => formatter.write_str("cycle detected in object graph"),
            Error::Io(msg) => write!(formatter, "i/o error: {}", msg),
            Error::Xml(msg) => write!(formatter, "xml error: {}", msg),
            Error::Zip(msg) => write!(formatter, "zip error: {}", msg),
            Error::Certificate(msg) => write!(formatter, "certificate error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<x509_parser::error::X509Error> for Error {
    fn from(err: x509_parser::error::X509Error) -> Self {
        Error::Certificate(err.to_string())
    }
}
