//! PKCS#12 certificate container parsing
//!
//! Decrypts a `.p12` container and extracts the end-entity certificate: the
//! certificate bag carrying a local key identifier attribute, i.e. the one
//! paired with the private key. Intermediate and root certificates carry no
//! key identifier and are skipped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use p12::{CertBag, PKCS12Attribute, SafeBag, SafeBagKind, PFX};
use x509_certificate::X509Certificate;

/// PEM header with whitespace removed
pub const CERTIFICATE_HEADER: &str = "-----BEGINCERTIFICATE-----";

/// PEM footer with whitespace removed
pub const CERTIFICATE_FOOTER: &str = "-----ENDCERTIFICATE-----";

/// Errors decoding a certificate container
#[derive(Debug, thiserror::Error)]
pub enum Pkcs12Error {
    #[error("malformed PKCS#12 container: {0}")]
    Malformed(String),

    #[error("wrong password for PKCS#12 container")]
    WrongPassword,

    #[error("no certificate paired with a private key found in container")]
    NoCertificateBag,

    #[error("invalid X.509 certificate: {0}")]
    Certificate(String),
}

/// Identity fields of an end-entity signing certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject common name (CN)
    pub subject_common_name: Option<String>,
    /// Organization (O) of the *issuer*, used for trust-origin checks
    pub issuer_organization: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// PEM text of the certificate
    pub pem: String,
    /// `friendlyName` bag attribute, if the container has one
    pub friendly_name: Option<String>,
}

impl CertificateInfo {
    /// Base64 body of the certificate, comparable with the raw entries of a
    /// provisioning profile's developer-certificate list.
    pub fn fingerprint(&self) -> String {
        extract_certificate_fingerprint(&self.pem)
    }

    /// Whether `now` falls inside the validity window
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Keystore alias: the subject CN, else the friendly name
    pub fn key_alias(&self) -> Option<&str> {
        self.subject_common_name
            .as_deref()
            .or(self.friendly_name.as_deref())
            .filter(|alias| !alias.is_empty())
    }
}

/// Parse a PKCS#12 container and return its end-entity certificate.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<CertificateInfo, Pkcs12Error> {
    let pfx = PFX::parse(data).map_err(|e| Pkcs12Error::Malformed(format!("{:?}", e)))?;

    if !pfx.verify_mac(password) {
        return Err(Pkcs12Error::WrongPassword);
    }

    let bags = pfx
        .bags(password)
        .map_err(|e| Pkcs12Error::Malformed(format!("{:?}", e)))?;

    let (der, friendly_name) = bags
        .iter()
        .find_map(end_entity_certificate)
        .ok_or(Pkcs12Error::NoCertificateBag)?;

    let certificate = X509Certificate::from_der(der)
        .map_err(|e| Pkcs12Error::Certificate(e.to_string()))?;

    let issuer_organization = certificate
        .issuer_name()
        .iter_organization()
        .find_map(|atav| atav.to_string().ok());

    let pem = der_to_pem(der);

    Ok(CertificateInfo {
        subject_common_name: certificate.subject_common_name(),
        issuer_organization,
        not_before: certificate.validity_not_before(),
        not_after: certificate.validity_not_after(),
        pem,
        friendly_name,
    })
}

/// X.509 certificate bag carrying a local key id, with its friendly name.
fn end_entity_certificate(bag: &SafeBag) -> Option<(&[u8], Option<String>)> {
    let der = match &bag.bag {
        SafeBagKind::CertBag(CertBag::X509(der)) => der.as_slice(),
        _ => return None,
    };

    let has_key_id = bag
        .attributes
        .iter()
        .any(|attr| matches!(attr, PKCS12Attribute::LocalKeyId(_)));
    if !has_key_id {
        return None;
    }

    let friendly_name = bag.attributes.iter().find_map(|attr| match attr {
        PKCS12Attribute::FriendlyName(name) => Some(name.clone()),
        _ => None,
    });

    Some((der, friendly_name))
}

/// PEM text of the DER bytes exactly as stored in the container
fn der_to_pem(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE-----\n");
    pem
}

/// Reduce PEM text to its base64 body.
///
/// Whitespace is stripped first, so re-wrapping the PEM lines does not
/// change the result, and applying it to its own output is a no-op.
pub fn extract_certificate_fingerprint(pem: &str) -> String {
    let compact: String = pem.chars().filter(|c| !c.is_whitespace()).collect();
    let body = compact
        .strip_prefix(CERTIFICATE_HEADER)
        .unwrap_or(compact.as_str());
    let body = body.strip_suffix(CERTIFICATE_FOOTER).unwrap_or(body);
    body.to_string()
}
