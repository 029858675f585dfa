//! Runtime and framework version resolution
//!
//! The runtime version comes from the project (explicit per-platform pin,
//! else derived from the core-modules dependency, else a fixed default).
//! The framework version is the newest catalog release compatible with
//! that runtime.

use std::path::Path;
use std::sync::Arc;

use semver::{Version, VersionReq};
use serde_json::Value;

use crate::host::{HttpRequest, Transport, TransportError};
use crate::project::{Platform, ProjectSettings, PROJECT_MANIFEST};

/// Used when neither the project nor its dependencies name a runtime
pub const DEFAULT_RUNTIME_VERSION: &str = "2.5.0";

/// Dependency whose version stands in for an undeclared runtime
pub const CORE_MODULES_PACKAGE: &str = "tns-core-modules";

/// Versions sent with a build request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersions {
    pub runtime_version: String,
    pub framework_version: String,
}

/// Catalog lookup errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("version catalog request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("version catalog response is malformed: {0}")]
    Malformed(String),
}

/// Source of published framework versions
pub trait VersionCatalog: Send + Sync {
    fn versions(&self) -> Result<Vec<String>, CatalogError>;
}

/// Package-registry document (`{"versions": {"1.0.0": {...}, ...}}`)
pub struct RegistryCatalog {
    transport: Arc<dyn Transport>,
    url: String,
}

impl RegistryCatalog {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }
}

impl VersionCatalog for RegistryCatalog {
    fn versions(&self) -> Result<Vec<String>, CatalogError> {
        let request =
            HttpRequest::get(self.url.as_str()).with_header("Accept", "application/json");
        let response = self.transport.send(&request)?;
        let document: Value = serde_json::from_slice(&response.body)
            .map_err(|e| CatalogError::Malformed(e.to_string()))?;
        let versions = document
            .get("versions")
            .and_then(Value::as_object)
            .ok_or_else(|| CatalogError::Malformed("missing 'versions' object".to_string()))?;
        Ok(versions.keys().cloned().collect())
    }
}

/// Runtime version for `platform`.
///
/// Explicit pin first; else `<major>.<minor>.*` of a valid core-modules
/// version; else [`DEFAULT_RUNTIME_VERSION`].
pub fn resolve_runtime_version(
    platform: Platform,
    runtime_metadata: &Value,
    core_modules_version: Option<&str>,
) -> String {
    let declared = runtime_metadata
        .get(platform.runtime_package_name())
        .and_then(|runtime| runtime.get("version"))
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty());
    if let Some(version) = declared {
        return version.to_string();
    }

    core_modules_version
        .and_then(|v| Version::parse(v.trim().trim_start_matches(['v', '='])).ok())
        .map(|v| format!("{}.{}.*", v.major, v.minor))
        .unwrap_or_else(|| DEFAULT_RUNTIME_VERSION.to_string())
}

/// `dependencies["tns-core-modules"]` from the project manifest
pub fn read_core_modules_version(project_dir: &Path) -> Option<String> {
    let content = std::fs::read(project_dir.join(PROJECT_MANIFEST)).ok()?;
    let manifest: Value = serde_json::from_slice(&content).ok()?;
    manifest
        .get("dependencies")?
        .get(CORE_MODULES_PACKAGE)?
        .as_str()
        .map(str::to_string)
}

/// Leading `major.minor` of a version or version expression
fn major_minor(version: &str) -> Option<(u64, u64)> {
    let trimmed = version.trim().trim_start_matches(['~', '^', '=', 'v']);
    let mut parts = trimmed.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// Newest catalog version compatible (`~`) with `runtime_version`.
///
/// Falls back to `<major>.<minor>.0` of the runtime when the catalog is
/// unavailable or has no match, and to [`DEFAULT_RUNTIME_VERSION`] when the
/// runtime version itself is unreadable.
pub fn resolve_framework_version(runtime_version: &str, available: Option<&[String]>) -> String {
    let base = runtime_version
        .trim()
        .trim_end_matches(".*")
        .trim_end_matches(".x");
    let best = VersionReq::parse(&format!("~{}", base.trim_start_matches(['~', '^'])))
        .ok()
        .and_then(|req| {
            available?
                .iter()
                .filter_map(|v| Version::parse(v).ok())
                .filter(|v| req.matches(v))
                .max()
        });
    if let Some(version) = best {
        return version.to_string();
    }

    match major_minor(runtime_version) {
        Some((major, minor)) => format!("{}.{}.0", major, minor),
        None => DEFAULT_RUNTIME_VERSION.to_string(),
    }
}

/// Resolve both versions for a build of `settings` on `platform`.
pub fn resolve_versions(
    settings: &ProjectSettings,
    platform: Platform,
    catalog: &dyn VersionCatalog,
) -> ResolvedVersions {
    let core_modules = read_core_modules_version(&settings.project_dir);
    let runtime_version =
        resolve_runtime_version(platform, &settings.runtime_metadata, core_modules.as_deref());

    let available = match catalog.versions() {
        Ok(versions) => Some(versions),
        Err(e) => {
            tracing::warn!(error = %e, "framework version catalog unavailable, using fallback");
            None
        }
    };
    let framework_version = resolve_framework_version(&runtime_version, available.as_deref());

    tracing::debug!(
        runtime = %runtime_version,
        framework = %framework_version,
        "resolved versions"
    );

    ResolvedVersions {
        runtime_version,
        framework_version,
    }
}
