//! Remote build API client
//!
//! Two operations are consumed from the build service:
//! - `GET  {base}/{prefix}/api/apps/{appId}/build/uploadurl?fileName=...`
//! - `POST {base}/{prefix}/api/apps/{appId}/build` (blocks until the build ends)

use std::sync::Arc;

use cloud_build_protocol::{
    ApiErrorBody, BuildRequest, BuildResult, DecodeError, UploadTarget, SOLUTION_SPACE_HEADER,
};
use reqwest::Url;

use super::transport::{HttpMethod, HttpRequest, Transport, TransportError};
use crate::config::ServerConfig;

/// Build API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// HTTP 402; the service's message is kept verbatim
    #[error("{0}")]
    PaymentRequired(String),

    #[error("Invalid response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid service URL: {0}")]
    Url(String),

    #[error("Failed to serialize build request: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Remote build API
pub trait BuildApi: Send + Sync {
    /// Obtain a single-use upload target for a file named `file_name`
    fn get_upload_target(&self, app_id: &str, file_name: &str)
        -> Result<UploadTarget, ApiError>;

    /// Submit a build and wait for its result descriptor
    fn submit_build(&self, app_id: &str, request: &BuildRequest) -> Result<BuildResult, ApiError>;
}

/// Build API over HTTP
pub struct HttpBuildApi {
    transport: Arc<dyn Transport>,
    config: ServerConfig,
}

impl HttpBuildApi {
    pub fn new(transport: Arc<dyn Transport>, config: ServerConfig) -> Self {
        Self { transport, config }
    }

    /// `{base}/{prefix}/api/apps/{appId}/build[/{extra}]`. Backslashes in the
    /// app id are treated as path separators; every segment is percent-encoded.
    pub fn build_url(&self, app_id: &str, extra: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.config.base_url())
            .map_err(|e| ApiError::Url(format!("{}: {}", self.config.base_url(), e)))?;

        let app_path = app_id.replace('\\', "/");
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(self.config.base_url()))?;
            segments.pop_if_empty();
            segments.extend(self.config.path_prefix.split('/').filter(|s| !s.is_empty()));
            segments.extend(["api", "apps"]);
            segments.extend(app_path.split('/').filter(|s| !s.is_empty()));
            segments.push("build");
            segments.extend(extra);
        }
        Ok(url)
    }

    fn request(&self, method: HttpMethod, url: &Url) -> HttpRequest {
        HttpRequest::new(method, url.as_str())
            .with_header("Accept", "application/json")
            .with_header(SOLUTION_SPACE_HEADER, self.config.solution_space.as_str())
    }

    fn send(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError> {
        match self.transport.send(request) {
            Ok(response) => Ok(response.body),
            Err(TransportError::Status { status: 402, body }) => Err(ApiError::PaymentRequired(
                ApiErrorBody::parse(&body)
                    .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned()),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

impl BuildApi for HttpBuildApi {
    fn get_upload_target(
        &self,
        app_id: &str,
        file_name: &str,
    ) -> Result<UploadTarget, ApiError> {
        let mut url = self.build_url(app_id, &["uploadurl"])?;
        url.query_pairs_mut().append_pair("fileName", file_name);

        let body = self.send(&self.request(HttpMethod::Get, &url))?;
        Ok(UploadTarget::from_json(&body)?)
    }

    fn submit_build(&self, app_id: &str, request: &BuildRequest) -> Result<BuildResult, ApiError> {
        let url = self.build_url(app_id, &[])?;
        let payload = serde_json::to_vec(request)?;

        tracing::debug!(
            url = %url,
            build_files = request.build_files.len(),
            "submitting build request"
        );

        let http = self
            .request(HttpMethod::Post, &url)
            .with_header("Content-Type", "application/json")
            .with_body(payload);
        let body = self.send(&http)?;
        Ok(BuildResult::from_json(&body)?)
    }
}
