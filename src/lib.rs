//! Cloud Build - remote build lane for mobile app projects
//!
//! This crate packages a project, validates its code-signing credentials,
//! uploads everything to remote object storage, asks the cloud build
//! service to compile it and downloads the resulting binary.

pub mod bundle;
pub mod config;
pub mod credentials;
pub mod host;
pub mod orchestrator;
pub mod project;
pub mod request;
pub mod signing;
pub mod upload;

pub use config::{ConfigError, ConfigOverrides, ConfigStore, ServerConfig};
pub use credentials::{CredentialInspector, FileInspector};
pub use host::{BuildApi, HttpBuildApi, HttpTransport, MockTransport, Transport};
pub use orchestrator::{BuildError, BuildOrchestrator, BuildResultData, BuildStage};
pub use project::{BuildConfiguration, Platform, ProjectSettings};
pub use signing::{AndroidSigningInput, IosSigningInput, SigningValidator, ValidatedSigning};
