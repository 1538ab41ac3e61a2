//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Locates and decodes `Info.plist` inside an `.ipa` archive or an
//! already-unpacked `.app` bundle.
//!
//! The reference implementation this was distilled from unzips the member
//! to a scratch directory on disk before reading it back; the `zip` crate
//! lets us read an archive member directly out of memory, so no scratch
//! directory or cleanup step is needed here.

use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::value::Document;

/// Finds the single top-level `.app` directory entry inside an IPA archive.
fn find_app_entry_name<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        let name = entry.name().trim_end_matches('/');
        if name.ends_with(".app") {
            return Ok(entry.name().to_owned());
        }
    }
    Err(Error::Zip("no .app directory found in archive".to_owned()))
}

/// Reads the bytes of `Info.plist` out of an IPA archive without extracting
/// anything else.
pub fn read_info_plist_from_ipa<R: Read + Seek>(reader: R) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(reader)?;
    let app_entry = find_app_entry_name(&mut archive)?;
    let plist_member = format!("{}Info.plist", app_entry);
    let mut file = archive.by_name(&plist_member)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decodes the `Info.plist` of an IPA archive, sniffing binary vs. XML.
pub fn decode_ipa<R: Read + Seek>(reader: R) -> Result<Document> {
    let bytes = read_info_plist_from_ipa(reader)?;
    crate::decode_auto(&bytes)
}

/// Decodes the `Info.plist` of an already-unpacked `.app` bundle directory.
pub fn decode_app_dir(app_dir: &Path) -> Result<Document> {
    let bytes = std::fs::read(app_dir.join("Info.plist"))?;
    crate::decode_auto(&bytes)
}

/// Decodes `Info.plist` from either an `.ipa` file or an `.app` directory,
/// dispatching on the path's extension.
pub fn decode_app_path(path: &Path) -> Result<Document> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ipa") => {
            let file = std::fs::File::open(path)?;
            decode_ipa(file)
        }
        Some("app") => decode_app_dir(path),
        _ => Err(Error::Zip(format!(
            "{} is neither a *.ipa archive nor a *.app directory",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    fn sample_ipa_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = FileOptions::default();
            writer.start_file("Payload/FooApp.app/Info.plist", options).unwrap();
            let doc = Document::from_value(crate::value::Value::Dict({
                let mut d = crate::value::Dict::new();
                d.insert("CFBundleIdentifier".to_owned(), crate::value::Value::String("com.guying.app.foo".to_owned()));
                d
            }));
            let bytes = crate::binary::encode(&doc).unwrap();
            writer.write_all(&bytes).unwrap();
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn finds_info_plist_inside_app_directory_entry() {
        let bytes = sample_ipa_bytes();
        let document = decode_ipa(Cursor::new(bytes)).unwrap();
        assert_eq!(
            document.as_dict().unwrap().get("CFBundleIdentifier").unwrap().as_str(),
            Some("com.guying.app.foo")
        );
    }

    #[test]
    fn missing_app_directory_is_an_error() {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            writer.start_file("readme.txt", FileOptions::default()).unwrap();
            writer.write_all(b"no app here").unwrap();
            writer.finish().unwrap();
        }
        assert!(decode_ipa(Cursor::new(buf)).is_err());
    }
}
