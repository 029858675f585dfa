//! Provisioning profile parsing
//!
//! A `.mobileprovision` file is a CMS-signed envelope whose payload is an XML
//! property list. The envelope itself is not a property list, so the payload
//! is cut out between the first `<plist` and the first `</plist>` that
//! follows it, then decoded on its own.

use std::collections::BTreeSet;
use std::time::SystemTime;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use cloud_build_protocol::ProvisionType;
use plist::{Dictionary, Value};

/// Opening tag of the embedded property list
pub const PLIST_HEADER: &[u8] = b"<plist";

/// Closing tag of the embedded property list
pub const PLIST_FOOTER: &[u8] = b"</plist>";

/// Errors decoding a provisioning profile
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("no embedded property list (missing {0} tag)")]
    MissingPayload(&'static str),

    #[error("invalid property list: {0}")]
    Plist(#[from] plist::Error),

    #[error("property list root is not a dictionary")]
    NotADictionary,

    #[error("missing or invalid key '{0}'")]
    MissingKey(&'static str),
}

/// Entitlements of a provisioning profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntitlements {
    /// `application-identifier`, e.g. `ABCDE12345.org.example.*`
    pub application_identifier: String,
    /// `get-task-allow`: development debugging allowed
    pub get_task_allow: bool,
    pub team_identifier: Option<String>,
    pub keychain_access_groups: Vec<String>,
}

/// Decoded provisioning profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningProfileInfo {
    pub name: String,
    pub uuid: String,
    pub application_identifier_prefixes: BTreeSet<String>,
    pub entitlements: ProfileEntitlements,
    pub expiration_date: DateTime<Utc>,
    /// Device UDIDs, in profile order
    pub provisioned_devices: Vec<String>,
    /// Base64 DER of each developer certificate the profile trusts
    pub developer_certificates_base64: BTreeSet<String>,
    pub provisions_all_devices: Option<bool>,
}

impl ProvisioningProfileInfo {
    /// Application-identifier pattern with the leading team prefix removed.
    ///
    /// `ABCDE12345.org.example.*` with prefix `ABCDE12345` yields
    /// `org.example.*`. The prefix is only stripped from the front.
    pub fn app_id_pattern(&self) -> String {
        let identifier = self.entitlements.application_identifier.as_str();
        self.application_identifier_prefixes
            .iter()
            .find_map(|prefix| {
                identifier
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix('.'))
            })
            .unwrap_or(identifier)
            .to_string()
    }

    /// Distribution type of the profile.
    ///
    /// Debuggable profiles are Development, others AdHoc, except that a
    /// profile without devices is Enterprise when it provisions all devices
    /// and App Store otherwise.
    pub fn provision_type(&self) -> ProvisionType {
        if self.provisioned_devices.is_empty() {
            if self.provisions_all_devices.unwrap_or(false) {
                return ProvisionType::Enterprise;
            }
            return ProvisionType::AppStore;
        }

        if self.entitlements.get_task_allow {
            ProvisionType::Development
        } else {
            ProvisionType::AdHoc
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    pub fn includes_certificate(&self, fingerprint: &str) -> bool {
        self.developer_certificates_base64.contains(fingerprint)
    }

    pub fn includes_device(&self, device_identifier: &str) -> bool {
        self.provisioned_devices.iter().any(|d| d == device_identifier)
    }
}

/// Slice out the embedded property list, tags included.
pub fn extract_plist_payload(data: &[u8]) -> Result<&[u8], ProfileError> {
    let start = find(data, PLIST_HEADER).ok_or(ProfileError::MissingPayload("<plist"))?;
    let end = find(&data[start..], PLIST_FOOTER)
        .map(|offset| start + offset + PLIST_FOOTER.len())
        .ok_or(ProfileError::MissingPayload("</plist>"))?;
    Ok(&data[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Decode a provisioning profile from the raw file bytes.
pub fn parse_profile(data: &[u8]) -> Result<ProvisioningProfileInfo, ProfileError> {
    let payload = extract_plist_payload(data)?;
    let root: Value = plist::from_bytes(payload)?;
    let dict = root.as_dictionary().ok_or(ProfileError::NotADictionary)?;

    let entitlements = dict
        .get("Entitlements")
        .and_then(Value::as_dictionary)
        .ok_or(ProfileError::MissingKey("Entitlements"))?;

    let expiration = dict
        .get("ExpirationDate")
        .and_then(Value::as_date)
        .ok_or(ProfileError::MissingKey("ExpirationDate"))?;

    let developer_certificates_base64 = dict
        .get("DeveloperCertificates")
        .and_then(Value::as_array)
        .map(|certs| {
            certs
                .iter()
                .filter_map(Value::as_data)
                .map(|der| STANDARD.encode(der))
                .collect()
        })
        .unwrap_or_default();

    Ok(ProvisioningProfileInfo {
        name: required_string(dict, "Name")?,
        uuid: required_string(dict, "UUID")?,
        application_identifier_prefixes: string_array(dict, "ApplicationIdentifierPrefix")
            .into_iter()
            .collect(),
        entitlements: ProfileEntitlements {
            application_identifier: required_string(entitlements, "application-identifier")?,
            get_task_allow: entitlements
                .get("get-task-allow")
                .and_then(Value::as_boolean)
                .unwrap_or(false),
            team_identifier: entitlements
                .get("com.apple.developer.team-identifier")
                .and_then(Value::as_string)
                .map(str::to_string),
            keychain_access_groups: string_array(entitlements, "keychain-access-groups"),
        },
        expiration_date: DateTime::<Utc>::from(SystemTime::from(expiration)),
        provisioned_devices: string_array(dict, "ProvisionedDevices"),
        developer_certificates_base64,
        provisions_all_devices: dict.get("ProvisionsAllDevices").and_then(Value::as_boolean),
    })
}

fn required_string(dict: &Dictionary, key: &'static str) -> Result<String, ProfileError> {
    dict.get(key)
        .and_then(Value::as_string)
        .map(str::to_string)
        .ok_or(ProfileError::MissingKey(key))
}

fn string_array(dict: &Dictionary, key: &str) -> Vec<String> {
    dict.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_string)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>ApplicationIdentifierPrefix</key>
    <array><string>TEAM123456</string></array>
    <key>DeveloperCertificates</key>
    <array><data>AQIDBA==</data></array>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>TEAM123456.com.acme.*</string>
        <key>get-task-allow</key>
        <false/>
    </dict>
    <key>ExpirationDate</key>
    <date>2031-03-04T05:06:07Z</date>
    <key>Name</key>
    <string>Acme Ad Hoc</string>
    <key>ProvisionedDevices</key>
    <array><string>device-1</string></array>
    <key>UUID</key>
    <string>11111111-2222-3333-4444-555555555555</string>
</dict>
</plist>"#;

    fn wrapped(xml: &str) -> Vec<u8> {
        let mut data = vec![0x30, 0x82, 0x1f, 0x00, 0x06, 0x09, 0x2a, 0x86];
        data.extend_from_slice(xml.as_bytes());
        data.extend_from_slice(&[0xa0, 0x82, 0x03, 0x00, 0x30, 0x00]);
        data
    }

    fn profile() -> ProvisioningProfileInfo {
        parse_profile(&wrapped(PROFILE_XML)).unwrap()
    }

    #[test]
    fn test_extract_payload_inclusive_of_tags() {
        let data = b"\x00\x01junk<plist version=\"1.0\"><dict/></plist>\xff\xfe</plist>";
        let payload = extract_plist_payload(data).unwrap();
        assert_eq!(payload, b"<plist version=\"1.0\"><dict/></plist>");
    }

    #[test]
    fn test_extract_payload_missing_tags() {
        assert!(matches!(
            extract_plist_payload(b"no payload here"),
            Err(ProfileError::MissingPayload("<plist"))
        ));
        assert!(matches!(
            extract_plist_payload(b"</plist> before <plist version=\"1.0\">"),
            Err(ProfileError::MissingPayload("</plist>"))
        ));
    }

    #[test]
    fn test_parse_wrapped_profile() {
        let info = profile();
        assert_eq!(info.name, "Acme Ad Hoc");
        assert_eq!(info.uuid, "11111111-2222-3333-4444-555555555555");
        assert!(info.application_identifier_prefixes.contains("TEAM123456"));
        assert_eq!(info.entitlements.application_identifier, "TEAM123456.com.acme.*");
        assert!(!info.entitlements.get_task_allow);
        assert_eq!(info.provisioned_devices, vec!["device-1".to_string()]);
        assert!(info.includes_certificate("AQIDBA=="));
        assert_eq!(
            info.expiration_date,
            "2031-03-04T05:06:07Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(info.provisions_all_devices, None);
    }

    #[test]
    fn test_app_id_pattern_strips_prefix() {
        assert_eq!(profile().app_id_pattern(), "com.acme.*");
    }

    #[test]
    fn test_app_id_pattern_keeps_inner_prefix_text() {
        let mut info = profile();
        let prefix = info.application_identifier_prefixes.iter().next().unwrap().clone();
        info.entitlements.application_identifier = format!("{0}.com.{0}.app", prefix);
        assert_eq!(info.app_id_pattern(), format!("com.{}.app", prefix));

        info.entitlements.application_identifier = "com.acme.app".to_string();
        assert_eq!(info.app_id_pattern(), "com.acme.app");
    }

    #[test]
    fn test_missing_required_key() {
        let xml = PROFILE_XML.replace("<key>UUID</key>", "<key>NotUUID</key>");
        assert!(matches!(
            parse_profile(&wrapped(&xml)),
            Err(ProfileError::MissingKey("UUID"))
        ));
    }

    #[test]
    fn test_provision_type_classification() {
        let mut info = profile();
        assert_eq!(info.provision_type(), ProvisionType::AdHoc);

        info.entitlements.get_task_allow = true;
        assert_eq!(info.provision_type(), ProvisionType::Development);

        info.entitlements.get_task_allow = false;
        info.provisioned_devices.clear();
        assert_eq!(info.provision_type(), ProvisionType::AppStore);

        info.provisions_all_devices = Some(true);
        assert_eq!(info.provision_type(), ProvisionType::Enterprise);
    }

    #[test]
    fn test_expiration_check() {
        let info = profile();
        assert!(!info.is_expired_at("2030-01-01T00:00:00Z".parse().unwrap()));
        assert!(info.is_expired_at("2032-01-01T00:00:00Z".parse().unwrap()));
    }
}
