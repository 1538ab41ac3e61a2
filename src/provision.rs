//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Decodes iOS mobile provisioning profiles.
//!
//! A `.mobileprovision` file is a CMS/PKCS#7 envelope whose payload is an
//! XML property list; this module slices the embedded plist out of the
//! envelope by locating the `<?xml ... </plist>` span directly, rather than
//! verifying or unwrapping the CMS signature, and decodes the DER-encoded
//! certificates carried in `DeveloperCertificates`.

use chrono::{DateTime, TimeZone, Utc};
use sha1::{Digest, Sha1};
use x509_parser::parse_x509_certificate;

use crate::error::{Error, Result};
use crate::value::{Date, Document, Value};

/// A single certificate from `DeveloperCertificates`, with the fields the
/// CLI's `--cert` output surfaces already extracted to owned values.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub sha1: String,
    pub serial: String,
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub organization_unit: Option<String>,
    pub country: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Certificate {
    fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) =
            parse_x509_certificate(der).map_err(|e| Error::Certificate(format!("{:?}", e)))?;

        let subject = cert.subject();
        let common_name = subject.iter_common_name().next().and_then(|a| a.as_str().ok()).map(str::to_owned);
        let organization = subject.iter_organization().next().and_then(|a| a.as_str().ok()).map(str::to_owned);
        let organization_unit = subject
            .iter_organizational_unit()
            .next()
            .and_then(|a| a.as_str().ok())
            .map(str::to_owned);
        let country = subject.iter_country().next().and_then(|a| a.as_str().ok()).map(str::to_owned);

        let validity = cert.validity();
        let not_before = Utc.timestamp(validity.not_before.timestamp(), 0);
        let not_after = Utc.timestamp(validity.not_after.timestamp(), 0);

        let serial = hex_upper(cert.raw_serial());

        let mut hasher = Sha1::new();
        hasher.update(der);
        let sha1 = hex_upper(hasher.finalize().as_slice());

        Ok(Certificate {
            sha1,
            serial,
            common_name,
            organization,
            organization_unit,
            country,
            not_before,
            not_after,
        })
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now();
        now < self.not_before || now > self.not_after
    }
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

const XML_DECL: &[u8] = b"<?xml";
const PLIST_CLOSE: &[u8] = b"</plist>";

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Slices the embedded XML plist out of a signed mobile-provision envelope.
pub fn extract_embedded_plist(content: &[u8]) -> Result<&[u8]> {
    let start = find_subslice(content, XML_DECL)
        .ok_or_else(|| Error::Xml("mobile provision has no embedded XML plist".to_owned()))?;
    let close_at = find_subslice(&content[start..], PLIST_CLOSE)
        .ok_or_else(|| Error::Xml("mobile provision XML plist is not terminated".to_owned()))?;
    let end = start + close_at + PLIST_CLOSE.len();
    Ok(&content[start..end])
}

/// A decoded mobile provisioning profile.
pub struct MobileProvision {
    pub document: Document,
}

impl MobileProvision {
    /// Strips the CMS envelope from `content` and decodes the embedded plist.
    pub fn from_bytes(content: &[u8]) -> Result<Self> {
        let plist_bytes = extract_embedded_plist(content)?;
        let document = crate::xml::decode(plist_bytes)?;
        Ok(MobileProvision { document })
    }

    fn root_dict(&self) -> Result<&crate::value::Dict> {
        self.document
            .as_dict()
            .ok_or_else(|| Error::Certificate("mobile provision root is not a dictionary".to_owned()))
    }

    pub fn is_expired(&self) -> Result<bool> {
        let expiration = self
            .root_dict()?
            .get("ExpirationDate")
            .and_then(Value::as_date)
            .ok_or_else(|| Error::Certificate("missing ExpirationDate".to_owned()))?;
        Ok(Date::now().seconds_since_epoch > expiration.seconds_since_epoch)
    }

    /// `true` unconditionally when `ProvisionsAllDevices` is set, otherwise
    /// membership of `udid` in `ProvisionedDevices`.
    pub fn has_udid(&self, udid: &str) -> Result<bool> {
        let dict = self.root_dict()?;
        if let Some(value) = dict.get("ProvisionsAllDevices") {
            return Ok(value.as_bool().unwrap_or(false));
        }
        let provisioned = dict
            .get("ProvisionedDevices")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Certificate("missing ProvisionedDevices".to_owned()))?;
        Ok(provisioned.iter().any(|v| v.as_str() == Some(udid)))
    }

    pub fn certificates(&self) -> Result<Vec<Certificate>> {
        let certs = self
            .root_dict()?
            .get("DeveloperCertificates")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Certificate("missing DeveloperCertificates".to_owned()))?;
        certs
            .iter()
            .map(|v| {
                let der = v
                    .as_data()
                    .ok_or_else(|| Error::Certificate("DeveloperCertificates entry is not Data".to_owned()))?;
                Certificate::from_der(der)
            })
            .collect()
    }
}
