//! Exclusion rules for project packaging
//!
//! Only top-level names are excluded: a rule for `node_modules` drops
//! `node_modules` itself and everything below it, but keeps
//! `app/node_modules`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Top-level names never packaged: dependency cache, platform build
/// output and the scratch directory.
pub const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "platforms", ".cloud"];

/// Errors for exclusion rules
#[derive(Debug, thiserror::Error)]
pub enum ExcludeError {
    #[error("invalid exclusion name '{name}': {source}")]
    Glob {
        name: String,
        #[source]
        source: globset::Error,
    },
}

/// Exclusion rules for filtering project files
#[derive(Debug, Clone)]
pub struct ExcludeRules {
    names: Vec<String>,
    glob_set: GlobSet,
}

impl ExcludeRules {
    /// Rules for the default top-level names
    pub fn new() -> Result<Self, ExcludeError> {
        Self::for_names(DEFAULT_EXCLUDES)
    }

    /// Rules excluding exactly the given top-level names
    pub fn for_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ExcludeError> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for name in names {
            let name = name.as_ref().trim_matches('/');
            if name.is_empty() {
                continue;
            }
            let escaped = globset::escape(name);
            for pattern in [escaped.clone(), format!("{}/**", escaped)] {
                let glob = Glob::new(&pattern).map_err(|source| ExcludeError::Glob {
                    name: name.to_string(),
                    source,
                })?;
                builder.add(glob);
            }
            kept.push(name.to_string());
        }

        let glob_set = builder.build().map_err(|source| ExcludeError::Glob {
            name: kept.join(","),
            source,
        })?;

        Ok(Self {
            names: kept,
            glob_set,
        })
    }

    /// Add more top-level names to the current set
    pub fn with_names<S: AsRef<str>>(self, extra: &[S]) -> Result<Self, ExcludeError> {
        let mut names = self.names;
        names.extend(extra.iter().map(|n| n.as_ref().to_string()));
        Self::for_names(&names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check if a project-relative path should be excluded
    pub fn is_excluded(&self, rel_path: &Path) -> bool {
        let normalized = rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.glob_set.is_match(normalized.as_str())
    }
}
