//
// Copyright 2020 bplist Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use gplist::MobileProvision;

fn envelope(xml_body: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\x30\x82\x0f\x00cms-signature-garbage-not-parsed");
    bytes.extend_from_slice(xml_body.as_bytes());
    bytes.extend_from_slice(b"trailing-signature-bytes");
    bytes
}

#[test]
fn has_udid_yes_for_enrolled_device_no_otherwise() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>ProvisionedDevices</key>
    <array>
        <string>00008030-ABCDEF123456</string>
        <string>00008030-FEDCBA654321</string>
    </array>
</dict>
</plist>"#;
    let provision = MobileProvision::from_bytes(&envelope(xml)).unwrap();
    assert!(provision.has_udid("00008030-ABCDEF123456").unwrap());
    assert!(!provision.has_udid("xxx").unwrap());
}

#[test]
fn provisions_all_devices_overrides_device_list() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>ProvisionsAllDevices</key>
    <true/>
    <key>ProvisionedDevices</key>
    <array/>
</dict>
</plist>"#;
    let provision = MobileProvision::from_bytes(&envelope(xml)).unwrap();
    assert!(provision.has_udid("any-udid-at-all").unwrap());
}

#[test]
fn missing_xml_span_is_an_error() {
    let bytes = b"not a provisioning profile".to_vec();
    assert!(MobileProvision::from_bytes(&bytes).is_err());
}
