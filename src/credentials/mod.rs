//! Credential Inspector
//!
//! Parses signing credentials into structured data:
//! - PKCS#12 certificate containers ([`certificate`])
//! - signed-envelope provisioning profiles ([`profile`])
//!
//! Both parsers work on bytes; [`FileInspector`] adds the file reads and
//! attaches the offending path to every failure. The validator and the
//! orchestrator only see the [`CredentialInspector`] trait.

mod certificate;
mod profile;

pub use certificate::{
    extract_certificate_fingerprint, parse_pkcs12, CertificateInfo, Pkcs12Error,
    CERTIFICATE_FOOTER, CERTIFICATE_HEADER,
};
pub use profile::{
    extract_plist_payload, parse_profile, ProfileEntitlements, ProfileError,
    ProvisioningProfileInfo, PLIST_FOOTER, PLIST_HEADER,
};

use std::io;
use std::path::{Path, PathBuf};

/// A credential file could not be read or decoded
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("cannot read credential file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid certificate {}: {source}", path.display())]
    Certificate {
        path: PathBuf,
        #[source]
        source: Pkcs12Error,
    },

    #[error("invalid provisioning profile {}: {source}", path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: ProfileError,
    },
}

impl CredentialError {
    /// Path of the offending credential file
    pub fn path(&self) -> &Path {
        match self {
            CredentialError::Read { path, .. }
            | CredentialError::Certificate { path, .. }
            | CredentialError::Profile { path, .. } => path,
        }
    }
}

/// Parses credential files into structured data
pub trait CredentialInspector: Send + Sync {
    /// Decrypt a PKCS#12 container and return its end-entity certificate
    fn parse_certificate(&self, path: &Path, password: &str)
        -> Result<CertificateInfo, CredentialError>;

    /// Decode a provisioning profile
    fn parse_provisioning_profile(&self, path: &Path)
        -> Result<ProvisioningProfileInfo, CredentialError>;
}

/// Inspector reading credentials from the local file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileInspector;

impl FileInspector {
    pub fn new() -> Self {
        Self
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl CredentialInspector for FileInspector {
    fn parse_certificate(
        &self,
        path: &Path,
        password: &str,
    ) -> Result<CertificateInfo, CredentialError> {
        let data = read(path)?;
        parse_pkcs12(&data, password).map_err(|source| CredentialError::Certificate {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse_provisioning_profile(
        &self,
        path: &Path,
    ) -> Result<ProvisioningProfileInfo, CredentialError> {
        let data = read(path)?;
        parse_profile(&data).map_err(|source| CredentialError::Profile {
            path: path.to_path_buf(),
            source,
        })
    }
}
