//! Error payloads and decode errors for the build API.

use serde::{Deserialize, Serialize};

/// Error body returned by the build service for rejected calls
/// (for example HTTP 402 when the account cannot run cloud builds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "Message")]
    pub message: String,
}

impl ApiErrorBody {
    /// Extract the message from a raw error body, if it is one.
    pub fn parse(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ApiErrorBody>(body)
            .ok()
            .map(|b| b.message)
    }
}

/// A response body did not match the expected descriptor.
#[derive(Debug, thiserror::Error)]
#[error("malformed {what}: {source}")]
pub struct DecodeError {
    what: &'static str,
    #[source]
    source: serde_json::Error,
}

impl DecodeError {
    pub(crate) fn new(what: &'static str, source: serde_json::Error) -> Self {
        Self { what, source }
    }
}
