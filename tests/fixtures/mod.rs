//! Shared fixtures for integration tests
//!
//! - Signing credentials under `tests/fixtures/credentials/`: a PKCS#12
//!   container (password [`CERTIFICATE_PASSWORD`]) issued by "Apple Inc.",
//!   a development profile that lists it, and an expired copy of that profile
//! - A throwaway project directory with a `package.json`
//! - Canned build service responses for [`MockTransport`]

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use cloud_build::host::{HttpMethod, MockTransport};
use tempfile::TempDir;

pub const CERTIFICATE_PASSWORD: &str = "secret";
pub const APP_ID: &str = "org.example.app";
pub const PROFILE_UUID: &str = "5D0E8F2A-3C1B-4A7E-9F60-2B8D4C1E7A93";
pub const PROVISIONED_DEVICE: &str = "00008030-001A2B3C4D5E6F70";

/// Build API root for the default server configuration
pub const API_ROOT: &str = "https://platform.telerik.com/appbuilder/api/apps/";
pub const STORAGE_PUT: &str = "https://storage.example/put/";
pub const RESULT_URL: &str = "https://storage.example/results/app";

pub fn credentials_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/credentials")
}

pub fn certificate_path() -> PathBuf {
    credentials_dir().join("dev.p12")
}

pub fn certificate_pem_path() -> PathBuf {
    credentials_dir().join("dev-certificate.pem")
}

pub fn profile_path() -> PathBuf {
    credentials_dir().join("dev.mobileprovision")
}

pub fn expired_profile_path() -> PathBuf {
    credentials_dir().join("expired.mobileprovision")
}

/// Temporary project `<tmp>/HelloWorld` with an app id and a source file
pub struct TestProject {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_manifest(&format!(
            r#"{{"nativescript": {{"id": "{}"}}, "dependencies": {{"tns-core-modules": "6.2.3"}}}}"#,
            APP_ID
        ))
    }

    pub fn with_manifest(manifest: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("HelloWorld");
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        fs::write(root.join("package.json"), manifest).unwrap();
        fs::write(root.join("app/app.js"), "application.run();").unwrap();
        fs::write(root.join("node_modules/left-pad/index.js"), "module.exports = 1;").unwrap();
        Self { dir, root }
    }

    pub fn settings(&self) -> cloud_build::ProjectSettings {
        cloud_build::ProjectSettings::load(&self.root).unwrap()
    }
}

/// Upload target handing out a unique storage URL per requested file name
pub fn upload_target_json(name: &str) -> String {
    format!(
        r#"{{"UploadPreSignedUrl":"{}{}","S3Url":"https://storage.example/{}","SessionKey":"session-1"}}"#,
        STORAGE_PUT, name, name
    )
}

/// Transport answering upload-target, storage PUT and result download calls
pub fn service_transport(build_result: &str) -> MockTransport {
    let transport = MockTransport::new();
    transport.on(
        HttpMethod::Get,
        format!("{}{}/build/uploadurl", API_ROOT, APP_ID),
        200,
        upload_target_json("object"),
    );
    transport.on(HttpMethod::Put, STORAGE_PUT, 200, "");
    transport.on(
        HttpMethod::Post,
        format!("{}{}/build", API_ROOT, APP_ID),
        200,
        build_result.to_string(),
    );
    transport.on(HttpMethod::Get, RESULT_URL, 200, "BINARY-RESULT");
    transport
}

/// Build result with one primary item pointing at [`RESULT_URL`]
pub fn successful_build_result() -> String {
    format!(
        r#"{{"BuildItems":[{{"Disposition":"BuildResult","FullPath":"{}"}}],"Output":"BUILD SUCCESSFUL","Error":""}}"#,
        RESULT_URL
    )
}
