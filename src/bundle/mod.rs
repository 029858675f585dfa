//! Artifact Packager
//!
//! Packs a project directory into a single zip archive under the project's
//! scratch directory. Entries are named relative to the project root with
//! `/` separators, written in sorted order with a fixed timestamp, so the
//! archive only changes when the project contents do.

mod exclude;

pub use exclude::{ExcludeError, ExcludeRules, DEFAULT_EXCLUDES};

use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::project::CLOUD_TEMP_DIR_NAME;

/// File name of the project archive inside the scratch directory
pub const PACKAGE_ARCHIVE_NAME: &str = "Build.zip";

/// Errors for packaging operations
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Path escapes project root: {path}")]
    PathEscapesRoot { path: PathBuf },

    #[error("Project directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Exclude rules error: {0}")]
    Exclude(#[from] ExcludeError),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl BundleError {
    /// Whether this is a path containment failure rather than plain I/O
    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            BundleError::PathEscapesRoot { .. } | BundleError::RootNotFound(_)
        )
    }
}

/// Result of packaging a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResult {
    /// Location of the written archive
    pub archive_path: PathBuf,
    /// Number of files stored
    pub file_count: usize,
    /// SHA-256 of the archive bytes
    pub sha256: String,
}

/// Project packager
pub struct Packager {
    root: PathBuf,
    exclude: ExcludeRules,
    archive_name: String,
}

impl Packager {
    /// Packager for `root` with the given exclusions. The scratch directory
    /// is always excluded so an archive never contains its predecessor.
    pub fn new(root: impl Into<PathBuf>, exclude: ExcludeRules) -> Result<Self, BundleError> {
        let exclude = if exclude.names().iter().any(|n| n == CLOUD_TEMP_DIR_NAME) {
            exclude
        } else {
            exclude.with_names(&[CLOUD_TEMP_DIR_NAME])?
        };
        Ok(Self {
            root: root.into(),
            exclude,
            archive_name: PACKAGE_ARCHIVE_NAME.to_string(),
        })
    }

    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }

    /// Where the archive is written
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(CLOUD_TEMP_DIR_NAME).join(&self.archive_name)
    }

    /// Enumerate files to package as (absolute path, archive name) pairs
    pub fn collect_files(&self) -> Result<Vec<(PathBuf, String)>, BundleError> {
        let canonical_root = self
            .root
            .canonicalize()
            .map_err(|_| BundleError::RootNotFound(self.root.clone()))?;

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .map(|rel| rel.as_os_str().is_empty() || !self.exclude.is_excluded(rel))
                    .unwrap_or(false)
            });

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            let rel_path = path
                .strip_prefix(&self.root)
                .map_err(|_| BundleError::PathEscapesRoot {
                    path: path.to_path_buf(),
                })?;
            if rel_path.as_os_str().is_empty() {
                continue;
            }

            let resolved = path.canonicalize()?;
            if !resolved.starts_with(&canonical_root) {
                return Err(BundleError::PathEscapesRoot {
                    path: path.to_path_buf(),
                });
            }

            if entry.file_type().is_file() {
                files.push((path.to_path_buf(), archive_entry_name(rel_path)));
            }
        }

        Ok(files)
    }

    /// Write the archive, replacing any previous one.
    pub fn package(&self) -> Result<PackageResult, BundleError> {
        let files = self.collect_files()?;

        let archive_path = self.archive_path();
        if let Some(parent) = archive_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let mut zip = ZipWriter::new(BufWriter::new(File::create(&archive_path)?));
        for (path, name) in &files {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(fs::metadata(path)?.permissions().mode())
            };

            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(path)?;
            io::copy(&mut source, &mut zip)?;
        }
        zip.finish()?.flush()?;

        let sha256 = {
            let mut hasher = Sha256::new();
            let mut archive = File::open(&archive_path)?;
            io::copy(&mut archive, &mut hasher)?;
            hex::encode(hasher.finalize())
        };

        tracing::debug!(
            files = files.len(),
            sha256 = %sha256,
            "project packaged"
        );

        Ok(PackageResult {
            archive_path,
            file_count: files.len(),
            sha256,
        })
    }
}

/// Archive entry name: relative components joined with `/`
fn archive_entry_name(rel_path: &Path) -> String {
    rel_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Package `project_dir`, excluding the given top-level names.
pub fn package_project<S: AsRef<str>>(
    project_dir: &Path,
    excluded_names: &[S],
) -> Result<PackageResult, BundleError> {
    let rules = ExcludeRules::for_names(excluded_names)?;
    Packager::new(project_dir, rules)?.package()
}
