//! Remote service clients
//!
//! HTTP transport plus the build API client built on top of it. Object
//! storage uploads and result downloads go through the same transport.

pub mod api;
pub mod transport;

pub use api::{ApiError, BuildApi, HttpBuildApi};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockTransport, RecordedCall, Transport,
    TransportError,
};
