//! HTTP transport layer
//!
//! Abstracts HTTP for testability. Provides:
//! - Transport trait: one request in, one response out, or a body streamed to a sink
//! - HttpTransport: blocking reqwest client for production
//! - MockTransport: canned responses with call recording for tests

use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing request descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First header value with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {}", String::from_utf8_lossy(.body))]
    Status { status: u16, body: Vec<u8> },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// HTTP status of a non-success response
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Transport trait for HTTP communication
pub trait Transport: Send + Sync {
    /// Issue a request. Non-2xx responses fail with `TransportError::Status`.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Stream the body of a GET on `url` into `sink`, returning the byte count.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError>;
}

/// Production transport over a blocking reqwest client
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_builder() {
            TransportError::InvalidUrl(url.to_string())
        } else {
            TransportError::Connection(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        tracing::trace!(method = %request.method, url = %request.url, "http request");

        let response = builder
            .send()
            .map_err(|e| Self::map_error(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Connection(e.to_string()))?
            .to_vec();

        if !(200..300).contains(&status) {
            return Err(TransportError::Status { status, body });
        }
        Ok(HttpResponse { status, body })
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        tracing::trace!(url = %url, "http download");

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Self::map_error(url, e))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.bytes().map(|b| b.to_vec()).unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        Ok(io::copy(&mut response, sink)?)
    }
}

/// A request observed by [`MockTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
enum MockReply {
    Response { status: u16, body: Vec<u8> },
    ConnectionFailure(String),
}

#[derive(Debug, Clone)]
struct MockRoute {
    method: HttpMethod,
    url_prefix: String,
    reply: MockReply,
}

/// Mock transport for testing
///
/// Replies are matched by method and URL prefix; when several routes match,
/// the most recently registered one wins. Unmatched requests fail with 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<Vec<MockRoute>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to matching requests with `status` and `body`
    pub fn on(
        &self,
        method: HttpMethod,
        url_prefix: impl Into<String>,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> &Self {
        self.routes.lock().unwrap().push(MockRoute {
            method,
            url_prefix: url_prefix.into(),
            reply: MockReply::Response {
                status,
                body: body.into(),
            },
        });
        self
    }

    /// Fail matching requests with a connection error
    pub fn on_connection_failure(
        &self,
        method: HttpMethod,
        url_prefix: impl Into<String>,
        message: impl Into<String>,
    ) -> &Self {
        self.routes.lock().unwrap().push(MockRoute {
            method,
            url_prefix: url_prefix.into(),
            reply: MockReply::ConnectionFailure(message.into()),
        });
        self
    }

    /// Every request seen so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests with the given method
    pub fn calls_with_method(&self, method: HttpMethod) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    fn respond(&self, method: HttpMethod, url: &str) -> Result<HttpResponse, TransportError> {
        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && url.starts_with(&r.url_prefix))
            .map(|r| r.reply.clone());

        match reply {
            Some(MockReply::Response { status, body }) if (200..300).contains(&status) => {
                Ok(HttpResponse { status, body })
            }
            Some(MockReply::Response { status, body }) => {
                Err(TransportError::Status { status, body })
            }
            Some(MockReply::ConnectionFailure(message)) => Err(TransportError::Connection(message)),
            None => Err(TransportError::Status {
                status: 404,
                body: format!("no mock route for {} {}", method, url).into_bytes(),
            }),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });
        self.respond(request.method, &request.url)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        });
        let response = self.respond(HttpMethod::Get, url)?;
        sink.write_all(&response.body)?;
        Ok(response.body.len() as u64)
    }
}
