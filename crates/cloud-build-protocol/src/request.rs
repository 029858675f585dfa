//! Build request types.

use serde::{Deserialize, Serialize};

/// Build request submitted to `POST api/apps/{appId}/build`.
///
/// Assembled once per invocation and never mutated after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Build configuration properties.
    #[serde(rename = "Properties")]
    pub properties: BuildProperties,
    /// Uploaded inputs, in insertion order (package first).
    #[serde(rename = "BuildFiles")]
    pub build_files: Vec<BuildFile>,
    /// Build targets. Always empty for this client.
    #[serde(rename = "Target", default)]
    pub targets: Vec<String>,
}

impl BuildRequest {
    /// Count build files with the given disposition.
    pub fn count_files(&self, disposition: Disposition) -> usize {
        self.build_files
            .iter()
            .filter(|f| f.disposition == disposition)
            .count()
    }
}

/// Properties block of a build request.
///
/// Optional keys are omitted from the JSON when unset so the remote service
/// sees exactly the keys relevant for the platform and configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildProperties {
    pub project_configuration: String,
    pub build_configuration: String,
    pub platform: String,
    pub app_identifier: String,
    pub framework_version: String,
    pub runtime_version: String,
    pub accept_results: String,
    pub session_key: String,
    pub template_app_name: String,
    pub framework: String,

    /// Storage name of the uploaded Android keystore.
    #[serde(rename = "keyStoreName", skip_serializing_if = "Option::is_none")]
    pub key_store_name: Option<String>,
    #[serde(rename = "keyStoreAlias", skip_serializing_if = "Option::is_none")]
    pub key_store_alias: Option<String>,
    #[serde(rename = "keyStorePassword", skip_serializing_if = "Option::is_none")]
    pub key_store_password: Option<String>,
    #[serde(rename = "keyStoreAliasPassword", skip_serializing_if = "Option::is_none")]
    pub key_store_alias_password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_signing_identity: Option<String>,
    /// JSON-encoded array of [`MobileProvisionIdentifier`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_provision_identifiers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_mobile_provision_identifier: Option<String>,

    /// Set for iOS simulator builds only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulator: Option<bool>,
}

/// A single build input referenced by storage URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFile {
    pub disposition: Disposition,
    #[serde(rename = "sourceUri")]
    pub source_uri: String,
}

impl BuildFile {
    /// Create a build file entry.
    pub fn new(disposition: Disposition, source_uri: impl Into<String>) -> Self {
        Self {
            disposition,
            source_uri: source_uri.into(),
        }
    }
}

/// Role of a build file or build result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    /// Zipped project sources.
    PackageZip,
    /// Android keystore.
    CryptoStore,
    /// iOS signing certificate container.
    Keychain,
    /// iOS provisioning profile.
    Provision,
    /// Primary build output.
    BuildResult,
    /// Any disposition this client does not consume.
    #[serde(other)]
    Other,
}

/// Provisioning profile distribution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisionType {
    Development,
    AdHoc,
    Enterprise,
    #[serde(rename = "App Store")]
    AppStore,
}

impl std::fmt::Display for ProvisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "Development"),
            Self::AdHoc => write!(f, "AdHoc"),
            Self::Enterprise => write!(f, "Enterprise"),
            Self::AppStore => write!(f, "App Store"),
        }
    }
}

/// Provisioning-identifier descriptor, serialized into
/// `MobileProvisionIdentifiers` as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MobileProvisionIdentifier {
    pub suffix_id: String,
    pub template_name: String,
    /// Profile UUID.
    pub identifier: String,
    pub is_default: bool,
    /// Storage name of the uploaded profile.
    pub file_name: String,
    pub app_groups: Vec<String>,
    pub provision_type: ProvisionType,
    pub name: String,
}
