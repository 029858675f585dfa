//! Build Request Assembler
//!
//! Builds the request submitted to the build API. The base request carries
//! the common properties and the project package; platform signing steps
//! then add their properties and build files. Build files keep insertion
//! order: package, then keystore or certificate, then profile.

pub mod version;

pub use version::{
    read_core_modules_version, resolve_framework_version, resolve_runtime_version,
    resolve_versions, CatalogError, RegistryCatalog, ResolvedVersions, VersionCatalog,
    DEFAULT_RUNTIME_VERSION,
};

use cloud_build_protocol::{
    BuildFile, BuildProperties, BuildRequest, Disposition, MobileProvisionIdentifier,
    ACCEPT_RESULTS, FRAMEWORK_TAG, PROVISION_TEMPLATE_NAME,
};

use crate::credentials::{CertificateInfo, ProvisioningProfileInfo};
use crate::project::{BuildConfiguration, Platform, ProjectSettings};
use crate::upload::StorageReference;

/// Request assembly errors
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("certificate has no common name or friendly name to use as key alias")]
    MissingKeyAlias,

    #[error("failed to encode provisioning identifiers: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Common properties plus the project package.
pub fn assemble_base(
    settings: &ProjectSettings,
    platform: Platform,
    configuration: &BuildConfiguration,
    package: &StorageReference,
    versions: &ResolvedVersions,
) -> BuildRequest {
    let properties = BuildProperties {
        project_configuration: configuration.to_string(),
        build_configuration: configuration.to_string(),
        platform: platform.to_string(),
        app_identifier: settings.project_id.clone(),
        framework_version: versions.framework_version.clone(),
        runtime_version: versions.runtime_version.clone(),
        accept_results: ACCEPT_RESULTS.to_string(),
        session_key: package.upload_session_key.clone(),
        template_app_name: settings.template_app_name(),
        framework: FRAMEWORK_TAG.to_string(),
        ..Default::default()
    };

    BuildRequest {
        properties,
        build_files: vec![BuildFile::new(Disposition::PackageZip, &package.remote_url)],
        targets: Vec::new(),
    }
}

/// Keystore properties and the `CryptoStore` entry; release builds only.
pub fn apply_android_signing(
    mut request: BuildRequest,
    configuration: &BuildConfiguration,
    keystore: &StorageReference,
    certificate: &CertificateInfo,
    password: &str,
) -> Result<BuildRequest, AssembleError> {
    if !configuration.is_release() {
        return Ok(request);
    }

    let alias = certificate.key_alias().ok_or(AssembleError::MissingKeyAlias)?;
    let properties = &mut request.properties;
    properties.key_store_name = Some(keystore.remote_name.clone());
    properties.key_store_alias = Some(alias.to_string());
    properties.key_store_password = Some(password.to_string());
    properties.key_store_alias_password = Some(password.to_string());

    request
        .build_files
        .push(BuildFile::new(Disposition::CryptoStore, &keystore.remote_url));
    Ok(request)
}

/// Uploaded iOS device-signing inputs
#[derive(Debug, Clone, Copy)]
pub struct IosDeviceSigning<'a> {
    pub certificate_ref: &'a StorageReference,
    pub profile_ref: &'a StorageReference,
    pub certificate: &'a CertificateInfo,
    pub profile: &'a ProvisioningProfileInfo,
    pub password: &'a str,
}

/// `Keychain` and `Provision` entries plus signing properties.
pub fn apply_ios_signing(
    mut request: BuildRequest,
    signing: IosDeviceSigning<'_>,
) -> Result<BuildRequest, AssembleError> {
    let profile = signing.profile;
    let descriptor = MobileProvisionIdentifier {
        suffix_id: String::new(),
        template_name: PROVISION_TEMPLATE_NAME.to_string(),
        identifier: profile.uuid.clone(),
        is_default: true,
        file_name: signing.profile_ref.remote_name.clone(),
        app_groups: Vec::new(),
        provision_type: profile.provision_type(),
        name: profile.name.clone(),
    };

    request.build_files.push(BuildFile::new(
        Disposition::Keychain,
        &signing.certificate_ref.remote_url,
    ));
    request.build_files.push(BuildFile::new(
        Disposition::Provision,
        &signing.profile_ref.remote_url,
    ));

    let properties = &mut request.properties;
    properties.certificate_password = Some(signing.password.to_string());
    properties.code_signing_identity = signing.certificate.subject_common_name.clone();
    properties.mobile_provision_identifiers = Some(serde_json::to_string(&[descriptor])?);
    properties.default_mobile_provision_identifier = Some(profile.uuid.clone());
    Ok(request)
}

/// Simulator builds carry no signing inputs, only the flag.
pub fn apply_simulator(mut request: BuildRequest) -> BuildRequest {
    request.properties.simulator = Some(true);
    request
}
