//! Cloud Build Protocol Types
//!
//! Defines the JSON shapes exchanged with the remote build API: the build
//! request, the upload target handed out for object storage, and the build
//! result descriptor. Field names are fixed by the remote service and are
//! case-sensitive.

pub mod error;
pub mod request;
pub mod response;

pub use error::{ApiErrorBody, DecodeError};
pub use request::{
    BuildFile, BuildProperties, BuildRequest, Disposition, MobileProvisionIdentifier,
    ProvisionType,
};
pub use response::{BuildItem, BuildResult, UploadTarget};

/// Result kinds the client is able to consume.
pub const ACCEPT_RESULTS: &str = "Url;LocalPath";

/// Framework tag sent with every build request.
pub const FRAMEWORK_TAG: &str = "tns";

/// Template name used for provisioning-identifier descriptors.
pub const PROVISION_TEMPLATE_NAME: &str = "PROVISION_";

/// Header selecting the solution space on the build service.
pub const SOLUTION_SPACE_HEADER: &str = "X-Icenium-SolutionSpace";
