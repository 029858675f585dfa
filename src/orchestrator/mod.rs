//! Build Orchestrator
//!
//! Drives one cloud build from signing validation to the downloaded result:
//!
//! 1. Validate signing inputs (no network before this passes)
//! 2. Package the project into `.cloud/Build.zip`
//! 3. Upload the package, then the signing credentials the build needs
//! 4. Assemble and submit the build request; the call blocks until the
//!    remote build ends
//! 5. Download the primary build item into `.cloud/`
//!
//! Every failure ends the run; nothing already uploaded is cleaned up.

mod stage;

pub use stage::{BuildStage, StageError, StageTracker, StageTransition};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloud_build_protocol::BuildResult;
use serde::Serialize;

use crate::bundle::{package_project, BundleError, DEFAULT_EXCLUDES};
use crate::config::{ConfigError, DEFAULT_REGISTRY_URL};
use crate::credentials::{CredentialError, CredentialInspector};
use crate::host::{ApiError, BuildApi, Transport};
use crate::project::{BuildConfiguration, Platform, ProjectSettings};
use crate::request::{
    apply_android_signing, apply_ios_signing, apply_simulator, assemble_base, resolve_versions,
    AssembleError, IosDeviceSigning, RegistryCatalog, VersionCatalog,
};
use crate::signing::{
    AndroidSigningInput, IosSigningInput, SigningError, SigningValidator, ValidatedSigning,
};
use crate::upload::{StorageReference, UploadError, Uploader};

/// Storage name suffix of the project package
pub const PACKAGE_SUFFIX: &str = ".zip";

/// Storage name suffix of an uploaded provisioning profile
pub const PROVISION_SUFFIX: &str = ".mobileprovision";

/// Errors for a build run
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Every signing-policy violation found, one per line
    #[error("{}", .violations.join("\n"))]
    Validation { violations: Vec<String> },

    #[error("invalid credential {}: {reason}", path.display())]
    CredentialFormat { path: PathBuf, reason: String },

    #[error("path error: {0}")]
    Path(String),

    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("build service error: {0}")]
    Transport(#[from] ApiError),

    #[error("Build failed. Reason is: {error}. Additional information: {output}.")]
    RemoteBuildFailure { error: String, output: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("stage error: {0}")]
    Stage(#[from] StageError),
}

impl BuildError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::Validation { .. } => 10,
            BuildError::CredentialFormat { .. } => 11,
            BuildError::Path(_) => 12,
            BuildError::Upload(_) => 20,
            BuildError::Transport(_) => 21,
            BuildError::RemoteBuildFailure { .. } => 50,
            BuildError::Download(_) => 70,
            BuildError::Config(_) => 1,
            BuildError::Io(_) => 1,
            BuildError::Stage(_) => 40,
        }
    }

    /// Violations, for validation failures
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            BuildError::Validation { violations } => Some(violations),
            _ => None,
        }
    }
}

impl From<CredentialError> for BuildError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Read { path, source } => {
                BuildError::Path(format!("{}: {}", path.display(), source))
            }
            CredentialError::Certificate { path, source } => BuildError::CredentialFormat {
                path,
                reason: source.to_string(),
            },
            CredentialError::Profile { path, source } => BuildError::CredentialFormat {
                path,
                reason: source.to_string(),
            },
        }
    }
}

impl From<SigningError> for BuildError {
    fn from(e: SigningError) -> Self {
        match e {
            SigningError::Violations(violations) => BuildError::Validation { violations },
            SigningError::Credential(e) => e.into(),
        }
    }
}

impl From<BundleError> for BuildError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::Io(e) => BuildError::Io(e),
            e if e.is_path_error() => BuildError::Path(e.to_string()),
            e => BuildError::Io(io::Error::other(e.to_string())),
        }
    }
}

impl From<AssembleError> for BuildError {
    fn from(e: AssembleError) -> Self {
        match e {
            AssembleError::MissingKeyAlias => BuildError::Validation {
                violations: vec![e.to_string()],
            },
            AssembleError::Encode(e) => BuildError::Transport(ApiError::Serialization(e)),
        }
    }
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResultData {
    /// Remote error text
    pub stderr: String,
    /// Remote build output
    pub stdout: String,
    /// Downloaded build result
    pub output_file_path: PathBuf,
}

/// File extension of the downloaded result
pub fn result_extension(platform: Platform, signing: &ValidatedSigning) -> &'static str {
    match (platform, signing) {
        (Platform::Android, _) => "apk",
        (Platform::Ios, ValidatedSigning::IosDevice { .. }) => "ipa",
        (Platform::Ios, _) => "zip",
    }
}

/// Storage name suffix for a credential file: its own extension, if any
fn credential_suffix(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Sequential build pipeline over injected collaborators
pub struct BuildOrchestrator {
    api: Arc<dyn BuildApi>,
    transport: Arc<dyn Transport>,
    inspector: Arc<dyn CredentialInspector>,
    catalog: Arc<dyn VersionCatalog>,
    excludes: Vec<String>,
    now: Option<DateTime<Utc>>,
    tracker: StageTracker,
}

impl BuildOrchestrator {
    pub fn new(
        api: Arc<dyn BuildApi>,
        transport: Arc<dyn Transport>,
        inspector: Arc<dyn CredentialInspector>,
    ) -> Self {
        let catalog = Arc::new(RegistryCatalog::new(transport.clone(), DEFAULT_REGISTRY_URL));
        Self {
            api,
            transport,
            inspector,
            catalog,
            excludes: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            now: None,
            tracker: StageTracker::new(),
        }
    }

    /// Look up framework versions in the registry document at `url`
    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.catalog = Arc::new(RegistryCatalog::new(self.transport.clone(), url));
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn VersionCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Evaluate credential validity at a fixed instant
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Top-level names left out of the project package
    pub fn with_excludes<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.excludes = names.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    /// Stage reached by the last run
    pub fn stage(&self) -> BuildStage {
        self.tracker.current()
    }

    /// Stages visited by the last run
    pub fn history(&self) -> Vec<BuildStage> {
        self.tracker.visited()
    }

    /// Run one build. Fails with the first error encountered; validation
    /// failures carry every violation.
    pub fn build(
        &mut self,
        settings: &ProjectSettings,
        platform: Platform,
        configuration: &BuildConfiguration,
        android: Option<&AndroidSigningInput>,
        ios: Option<&IosSigningInput>,
    ) -> Result<BuildResultData, BuildError> {
        let mut tracker = StageTracker::new();
        tracing::info!(
            app_id = %settings.project_id,
            platform = %platform,
            configuration = %configuration,
            "starting cloud build"
        );

        let result = self.run(&mut tracker, settings, platform, configuration, android, ios);
        match &result {
            Ok(data) => {
                tracing::info!(output = %data.output_file_path.display(), "cloud build finished");
            }
            Err(e) => {
                tracing::warn!(stage = %tracker.current(), error = %e, "cloud build failed");
                tracker.fail();
            }
        }

        self.tracker = tracker;
        result
    }

    fn run(
        &self,
        tracker: &mut StageTracker,
        settings: &ProjectSettings,
        platform: Platform,
        configuration: &BuildConfiguration,
        android: Option<&AndroidSigningInput>,
        ios: Option<&IosSigningInput>,
    ) -> Result<BuildResultData, BuildError> {
        let app_id = settings.project_id.as_str();

        let mut validator = SigningValidator::new(self.inspector.clone());
        if let Some(now) = self.now {
            validator = validator.at(now);
        }
        let signing = validator.validate(platform, configuration, app_id, android, ios)?;

        tracker.advance(BuildStage::Packaging)?;
        let package = package_project(&settings.project_dir, &self.excludes)?;
        tracing::info!(
            files = package.file_count,
            sha256 = %package.sha256,
            "project packaged"
        );

        tracker.advance(BuildStage::Uploading)?;
        let uploader = Uploader::new(self.api.clone(), self.transport.clone());
        let package_ref = uploader.upload(app_id, &package.archive_path, PACKAGE_SUFFIX)?;
        let credential_refs = self.upload_credentials(&uploader, app_id, &signing)?;

        tracker.advance(BuildStage::Submitting)?;
        let versions = resolve_versions(settings, platform, self.catalog.as_ref());
        let request = assemble_base(settings, platform, configuration, &package_ref, &versions);
        let request = match (&signing, credential_refs) {
            (
                ValidatedSigning::AndroidRelease { certificate, .. },
                CredentialRefs::Keystore(keystore_ref),
            ) => apply_android_signing(
                request,
                configuration,
                &keystore_ref,
                certificate,
                android_password(android),
            )?,
            (
                ValidatedSigning::IosDevice {
                    certificate,
                    profile,
                    ..
                },
                CredentialRefs::Ios {
                    certificate_ref,
                    profile_ref,
                },
            ) => apply_ios_signing(
                request,
                IosDeviceSigning {
                    certificate_ref: &certificate_ref,
                    profile_ref: &profile_ref,
                    certificate,
                    profile,
                    password: ios_password(ios),
                },
            )?,
            (ValidatedSigning::IosSimulator, _) => apply_simulator(request),
            _ => request,
        };

        tracker.advance(BuildStage::AwaitingResult)?;
        tracing::info!(build_files = request.build_files.len(), "build submitted, waiting for result");
        let result = self.api.submit_build(app_id, &request)?;
        if result.build_items.is_empty() {
            return Err(remote_failure(result));
        }

        tracker.advance(BuildStage::Downloading)?;
        let destination = settings.scratch_dir().join(format!(
            "{}.{}",
            settings.project_name,
            result_extension(platform, &signing)
        ));
        self.download_result(&result, &destination)?;

        tracker.advance(BuildStage::Done)?;
        Ok(BuildResultData {
            stderr: result.error.unwrap_or_default(),
            stdout: result.output.unwrap_or_default(),
            output_file_path: destination,
        })
    }

    fn upload_credentials(
        &self,
        uploader: &Uploader,
        app_id: &str,
        signing: &ValidatedSigning,
    ) -> Result<CredentialRefs, BuildError> {
        match signing {
            ValidatedSigning::AndroidRelease { keystore_path, .. } => {
                let keystore_ref =
                    uploader.upload(app_id, keystore_path, &credential_suffix(keystore_path))?;
                Ok(CredentialRefs::Keystore(keystore_ref))
            }
            ValidatedSigning::IosDevice {
                certificate_path,
                profile_path,
                ..
            } => {
                let certificate_ref = uploader.upload(
                    app_id,
                    certificate_path,
                    &credential_suffix(certificate_path),
                )?;
                let profile_ref = uploader.upload(app_id, profile_path, PROVISION_SUFFIX)?;
                Ok(CredentialRefs::Ios {
                    certificate_ref,
                    profile_ref,
                })
            }
            ValidatedSigning::Unsigned | ValidatedSigning::IosSimulator => Ok(CredentialRefs::None),
        }
    }

    /// Stream the primary build item to `destination`, removing any partial
    /// file on failure.
    fn download_result(&self, result: &BuildResult, destination: &Path) -> Result<u64, BuildError> {
        let item = result.primary_item().ok_or_else(|| {
            BuildError::Download("build result does not contain a primary build item".to_string())
        })?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BuildError::Download(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let streamed = File::create(destination)
            .map_err(|e| e.to_string())
            .and_then(|file| {
                let mut sink = BufWriter::new(file);
                let bytes = self
                    .transport
                    .download(&item.full_path, &mut sink)
                    .map_err(|e| e.to_string())?;
                sink.flush().map_err(|e| e.to_string())?;
                Ok(bytes)
            });

        match streamed {
            Ok(bytes) => {
                tracing::info!(
                    destination = %destination.display(),
                    bytes,
                    "downloaded build result"
                );
                Ok(bytes)
            }
            Err(reason) => {
                let _ = fs::remove_file(destination);
                Err(BuildError::Download(format!("{}: {}", item.full_path, reason)))
            }
        }
    }
}

/// Storage references of the uploaded signing credentials
enum CredentialRefs {
    None,
    Keystore(StorageReference),
    Ios {
        certificate_ref: StorageReference,
        profile_ref: StorageReference,
    },
}

fn android_password(input: Option<&AndroidSigningInput>) -> &str {
    input
        .and_then(|i| i.certificate_password.as_deref())
        .unwrap_or_default()
}

fn ios_password(input: Option<&IosSigningInput>) -> &str {
    input
        .and_then(|i| i.certificate_password.as_deref())
        .unwrap_or_default()
}

fn remote_failure(result: BuildResult) -> BuildError {
    BuildError::RemoteBuildFailure {
        error: result.failure_reason().to_string(),
        output: result.output.unwrap_or_default(),
    }
}
