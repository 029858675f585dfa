//! Project settings and build target descriptors
//!
//! A build invocation targets one project directory, one platform and one
//! build configuration. Settings are read once from the project's
//! `package.json` and stay read-only for the rest of the run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scratch directory (relative to the project root) holding the package
/// archive and the downloaded build result.
pub const CLOUD_TEMP_DIR_NAME: &str = ".cloud";

/// Configuration name that requires release signing.
pub const RELEASE_CONFIGURATION_NAME: &str = "release";

/// Project manifest read by [`ProjectSettings::load`].
pub const PROJECT_MANIFEST: &str = "package.json";

/// Target platform of a cloud build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Android,
    #[serde(rename = "iOS")]
    Ios,
}

impl Platform {
    /// Name of the runtime package declared for this platform in the
    /// project's runtime metadata.
    pub fn runtime_package_name(&self) -> &'static str {
        match self {
            Platform::Android => "tns-android",
            Platform::Ios => "tns-ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "Android"),
            Platform::Ios => write!(f, "iOS"),
        }
    }
}

impl FromStr for Platform {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            _ => Err(ProjectError::UnknownPlatform(s.to_string())),
        }
    }
}

/// Build configuration name (e.g. `Debug`, `Release`).
///
/// The name is sent to the build service verbatim; only the release check
/// is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfiguration(String);

impl BuildConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn debug() -> Self {
        Self::new("Debug")
    }

    pub fn release() -> Self {
        Self::new("Release")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this configuration requires release signing
    pub fn is_release(&self) -> bool {
        self.0.eq_ignore_ascii_case(RELEASE_CONFIGURATION_NAME)
    }
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self::debug()
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors loading project settings
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project directory not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read project manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse project manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("project manifest has no application identifier (nativescript.id)")]
    MissingAppId,

    #[error("unknown platform '{0}' (expected Android or iOS)")]
    UnknownPlatform(String),
}

/// Immutable input describing the project for one build invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    /// Project root directory
    pub project_dir: PathBuf,
    /// Application identifier (e.g. `org.example.app`)
    pub project_id: String,
    /// Project name, used for the template name and the output file name
    pub project_name: String,
    /// Declared native-runtime versions, keyed by runtime package name
    pub runtime_metadata: Value,
}

impl ProjectSettings {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        runtime_metadata: Value,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            project_id: project_id.into(),
            project_name: project_name.into(),
            runtime_metadata,
        }
    }

    /// Load settings from `<project_dir>/package.json`.
    ///
    /// The app id comes from `nativescript.id`, the runtime metadata is the
    /// whole `nativescript` object and the name is the directory's base name.
    pub fn load(project_dir: &Path) -> Result<Self, ProjectError> {
        if !project_dir.is_dir() {
            return Err(ProjectError::NotFound(project_dir.to_path_buf()));
        }

        let content = std::fs::read(project_dir.join(PROJECT_MANIFEST))?;
        let manifest: Value = serde_json::from_slice(&content)?;

        let runtime_metadata = manifest.get("nativescript").cloned().unwrap_or(Value::Null);
        let project_id = runtime_metadata
            .get("id")
            .and_then(Value::as_str)
            .ok_or(ProjectError::MissingAppId)?
            .to_string();

        let project_name = project_dir
            .canonicalize()
            .unwrap_or_else(|_| project_dir.to_path_buf())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "app".to_string());

        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            project_id,
            project_name,
            runtime_metadata,
        })
    }

    /// Scratch directory for this project
    pub fn scratch_dir(&self) -> PathBuf {
        self.project_dir.join(CLOUD_TEMP_DIR_NAME)
    }

    /// Project name reduced to characters the build templates accept
    /// (ASCII alphanumerics, `-`, `_` and `.`).
    pub fn template_app_name(&self) -> String {
        let sanitized: String = self
            .project_name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        if sanitized.is_empty() {
            "app".to_string()
        } else {
            sanitized
        }
    }

    /// Runtime version explicitly declared for `platform`, if any
    pub fn declared_runtime_version(&self, platform: Platform) -> Option<&str> {
        self.runtime_metadata
            .get(platform.runtime_package_name())
            .and_then(|runtime| runtime.get("version"))
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
    }
}
