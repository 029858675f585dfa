//! Signing Validator
//!
//! Applies signing policy to the parsed credentials before any remote work
//! starts. Presence checks run first; once both iOS credential files parse,
//! every remaining rule is evaluated and all violations are reported
//! together.

mod app_id;

pub use app_id::{app_id_matches, wildcard_to_regex, AppIdPattern, MATCH_ALL};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::credentials::{
    CertificateInfo, CredentialError, CredentialInspector, ProvisioningProfileInfo,
};
use crate::project::{BuildConfiguration, Platform};

/// Issuer organization every iOS signing certificate must carry
pub const TRUSTED_PUBLISHER: &str = "Apple Inc.";

/// Android signing input (a PKCS#12 keystore)
#[derive(Clone, Default)]
pub struct AndroidSigningInput {
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<String>,
}

impl fmt::Debug for AndroidSigningInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidSigningInput")
            .field("certificate_path", &self.certificate_path)
            .field("certificate_password", &redacted(&self.certificate_password))
            .finish()
    }
}

/// iOS signing input
#[derive(Clone, Default)]
pub struct IosSigningInput {
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<String>,
    pub provisioning_profile_path: Option<PathBuf>,
    /// Device build; simulator builds skip signing entirely
    pub build_for_device: bool,
    pub target_device_identifier: Option<String>,
}

impl fmt::Debug for IosSigningInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IosSigningInput")
            .field("certificate_path", &self.certificate_path)
            .field("certificate_password", &redacted(&self.certificate_password))
            .field("provisioning_profile_path", &self.provisioning_profile_path)
            .field("build_for_device", &self.build_for_device)
            .field("target_device_identifier", &self.target_device_identifier)
            .finish()
    }
}

fn redacted(password: &Option<String>) -> Option<&'static str> {
    password.as_ref().map(|_| "<redacted>")
}

/// Outcome of a successful validation, carrying the parsed credentials so
/// later stages never re-read them.
#[derive(Debug, Clone)]
pub enum ValidatedSigning {
    /// No signing required (Android debug)
    Unsigned,
    AndroidRelease {
        keystore_path: PathBuf,
        certificate: CertificateInfo,
    },
    IosDevice {
        certificate_path: PathBuf,
        certificate: CertificateInfo,
        profile_path: PathBuf,
        profile: ProvisioningProfileInfo,
    },
    IosSimulator,
}

/// Signing validation errors
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("{}", .0.join("\n"))]
    Violations(Vec<String>),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Signing policy validator
pub struct SigningValidator {
    inspector: Arc<dyn CredentialInspector>,
    trusted_publisher: String,
    now: Option<DateTime<Utc>>,
}

impl SigningValidator {
    pub fn new(inspector: Arc<dyn CredentialInspector>) -> Self {
        Self {
            inspector,
            trusted_publisher: TRUSTED_PUBLISHER.to_string(),
            now: None,
        }
    }

    /// Evaluate time-based rules at a fixed instant instead of the clock
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_trusted_publisher(mut self, organization: impl Into<String>) -> Self {
        self.trusted_publisher = organization.into();
        self
    }

    /// Decide whether a build of `app_id` for `platform` may proceed.
    pub fn validate(
        &self,
        platform: Platform,
        configuration: &BuildConfiguration,
        app_id: &str,
        android: Option<&AndroidSigningInput>,
        ios: Option<&IosSigningInput>,
    ) -> Result<ValidatedSigning, SigningError> {
        match platform {
            Platform::Android if configuration.is_release() => {
                self.validate_android_release(android.cloned().unwrap_or_default())
            }
            Platform::Android => Ok(ValidatedSigning::Unsigned),
            Platform::Ios => match ios {
                Some(input) if input.build_for_device => self.validate_ios_device(app_id, input),
                _ => Ok(ValidatedSigning::IosSimulator),
            },
        }
    }

    fn validate_android_release(
        &self,
        input: AndroidSigningInput,
    ) -> Result<ValidatedSigning, SigningError> {
        // A wrong or missing password surfaces when the keystore is parsed.
        let password = input.certificate_password.unwrap_or_default();
        let Some(path) = input.certificate_path else {
            return Err(SigningError::Violations(vec![
                "When building for Release configuration, you must specify a valid certificate."
                    .to_string(),
            ]));
        };

        if !path.is_file() {
            return Err(SigningError::Violations(vec![missing_file("certificate", &path)]));
        }

        let certificate = self.inspector.parse_certificate(&path, &password)?;
        if certificate.key_alias().is_none() {
            return Err(SigningError::Violations(vec![
                "The certificate has neither a common name nor a friendly name to use as the key alias."
                    .to_string(),
            ]));
        }

        Ok(ValidatedSigning::AndroidRelease {
            keystore_path: path,
            certificate,
        })
    }

    fn validate_ios_device(
        &self,
        app_id: &str,
        input: &IosSigningInput,
    ) -> Result<ValidatedSigning, SigningError> {
        let (certificate_path, password, profile_path) = match (
            &input.certificate_path,
            &input.certificate_password,
            &input.provisioning_profile_path,
        ) {
            (Some(cert), Some(password), Some(profile)) => (cert, password, profile),
            _ => {
                return Err(SigningError::Violations(vec![
                    "When building for iOS device you must specify a valid provisioning profile, certificate and its password."
                        .to_string(),
                ]))
            }
        };

        let mut violations = Vec::new();
        if !certificate_path.is_file() {
            violations.push(missing_file("certificate", certificate_path));
        }
        if !profile_path.is_file() {
            violations.push(missing_file("provisioning profile", profile_path));
        }
        if !violations.is_empty() {
            return Err(SigningError::Violations(violations));
        }

        let certificate = self.inspector.parse_certificate(certificate_path, password)?;
        let profile = self.inspector.parse_provisioning_profile(profile_path)?;

        let violations = self.check_ios_policy(
            app_id,
            &certificate,
            &profile,
            input.target_device_identifier.as_deref(),
        );
        if !violations.is_empty() {
            return Err(SigningError::Violations(violations));
        }

        tracing::debug!(
            profile = %profile.name,
            provision_type = %profile.provision_type(),
            "iOS signing credentials accepted"
        );

        Ok(ValidatedSigning::IosDevice {
            certificate_path: certificate_path.clone(),
            certificate,
            profile_path: profile_path.clone(),
            profile,
        })
    }

    /// Rules over parsed iOS credentials; every failing rule contributes.
    pub fn check_ios_policy(
        &self,
        app_id: &str,
        certificate: &CertificateInfo,
        profile: &ProvisioningProfileInfo,
        target_device: Option<&str>,
    ) -> Vec<String> {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut violations = Vec::new();

        let pattern = profile.app_id_pattern();
        if !app_id_matches(&pattern, app_id) {
            violations.push(format!(
                "The application identifier '{}' does not match the provisioning profile pattern '{}'.",
                app_id, pattern
            ));
        }

        if certificate.issuer_organization.as_deref() != Some(self.trusted_publisher.as_str()) {
            violations.push(format!(
                "The certificate is not issued by a trusted publisher (issuer organization: '{}').",
                certificate.issuer_organization.as_deref().unwrap_or("none")
            ));
        }

        if profile.is_expired_at(now) {
            violations.push(format!(
                "The provisioning profile '{}' expired on {}.",
                profile.name,
                profile.expiration_date.to_rfc3339()
            ));
        }

        if now > certificate.not_after {
            violations.push(format!(
                "The certificate expired on {}.",
                certificate.not_after.to_rfc3339()
            ));
        } else if now < certificate.not_before {
            violations.push(format!(
                "The certificate is not valid before {}.",
                certificate.not_before.to_rfc3339()
            ));
        }

        if !profile.includes_certificate(&certificate.fingerprint()) {
            violations.push(
                "The provisioning profile does not include the specified certificate. Specify a different provisioning profile or certificate."
                    .to_string(),
            );
        }

        if let Some(device) = target_device {
            if !profile.includes_device(device) {
                violations.push(format!(
                    "The provisioning profile '{}' does not include the device '{}'.",
                    profile.name, device
                ));
            }
        }

        violations
    }
}

fn missing_file(kind: &str, path: &std::path::Path) -> String {
    format!(
        "The specified {} '{}' does not exist. Verify the location is correct.",
        kind,
        path.display()
    )
}
