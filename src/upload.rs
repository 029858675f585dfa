//! Remote Storage Uploader
//!
//! Each upload asks the build API for a single-use target under a fresh
//! random name, then PUTs the file bytes to the pre-signed URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::host::{ApiError, BuildApi, HttpMethod, HttpRequest, Transport, TransportError};

/// Handle to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReference {
    /// Generated storage name (random, plus suffix)
    pub remote_name: String,
    /// Storage URL, usable as a build-file source
    pub remote_url: String,
    pub upload_session_key: String,
}

/// Upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not obtain an upload target: {0}")]
    Target(#[source] ApiError),

    #[error("transfer to storage failed: {0}")]
    Transfer(#[source] TransportError),
}

/// Uploads local files to remote object storage
pub struct Uploader {
    api: Arc<dyn BuildApi>,
    transport: Arc<dyn Transport>,
}

impl Uploader {
    pub fn new(api: Arc<dyn BuildApi>, transport: Arc<dyn Transport>) -> Self {
        Self { api, transport }
    }

    /// Fresh storage name: a random UUID followed by `suffix`
    pub fn generate_name(suffix: &str) -> String {
        format!("{}{}", Uuid::new_v4(), suffix)
    }

    /// Upload `local_path` on behalf of `owner_id` (the app id).
    pub fn upload(
        &self,
        owner_id: &str,
        local_path: &Path,
        name_suffix: &str,
    ) -> Result<StorageReference, UploadError> {
        let bytes = std::fs::read(local_path).map_err(|source| UploadError::Read {
            path: local_path.to_path_buf(),
            source,
        })?;

        let remote_name = Self::generate_name(name_suffix);
        let target = self
            .api
            .get_upload_target(owner_id, &remote_name)
            .map_err(UploadError::Target)?;

        let size = bytes.len();
        let request = HttpRequest::new(HttpMethod::Put, target.upload_pre_signed_url.as_str())
            .with_body(bytes);
        self.transport
            .send(&request)
            .map_err(UploadError::Transfer)?;

        tracing::info!(remote_name = %remote_name, bytes = size, "uploaded file to storage");

        Ok(StorageReference {
            remote_name,
            remote_url: target.storage_url,
            upload_session_key: target.session_key,
        })
    }
}
