//! Build API response types.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DecodeError;
use crate::request::Disposition;

/// Single-use upload target returned by
/// `GET api/apps/{appId}/build/uploadurl?fileName=...`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UploadTarget {
    /// Pre-signed URL accepting a single PUT of the file bytes.
    pub upload_pre_signed_url: String,
    /// Storage URL used as `sourceUri` in the build request.
    #[serde(rename = "S3Url")]
    pub storage_url: String,
    /// Session key correlating uploads with the build.
    pub session_key: String,
}

impl UploadTarget {
    /// Decode an upload target from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(|e| DecodeError::new("upload target", e))
    }
}

/// Result descriptor returned by the blocking build call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildResult {
    /// Items produced by the build. Empty, null or missing means the build failed.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub build_items: Vec<BuildItem>,
    /// Remote build output.
    #[serde(default)]
    pub output: Option<String>,
    /// Remote error stream.
    #[serde(default)]
    pub error: Option<String>,
    /// Reason reported for a failed build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<BuildItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<BuildItem>>::deserialize(deserializer)?.unwrap_or_default())
}

impl BuildResult {
    /// Decode a build result from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(|e| DecodeError::new("build result", e))
    }

    /// Why the build failed: `Errors` when present, otherwise `Error`.
    pub fn failure_reason(&self) -> &str {
        self.errors
            .as_deref()
            .filter(|reason| !reason.is_empty())
            .or(self.error.as_deref())
            .unwrap_or_default()
    }

    /// The item carrying the primary build output, if any.
    pub fn primary_item(&self) -> Option<&BuildItem> {
        self.build_items
            .iter()
            .find(|item| item.disposition == Disposition::BuildResult)
    }
}

/// A single produced item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildItem {
    pub disposition: Disposition,
    /// Download URL of the item.
    pub full_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}
