//! End-to-end build runs over the HTTP build API client and a mock transport

mod fixtures;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloud_build::host::{HttpMethod, MockTransport, RecordedCall};
use cloud_build::signing::{AndroidSigningInput, IosSigningInput};
use cloud_build::{
    BuildConfiguration, BuildError, BuildOrchestrator, BuildStage, FileInspector, HttpBuildApi,
    Platform, ServerConfig,
};
use cloud_build_protocol::{BuildRequest, Disposition};

use fixtures::*;

fn now() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z".parse().unwrap()
}

fn orchestrator(transport: &Arc<MockTransport>) -> BuildOrchestrator {
    let api = Arc::new(HttpBuildApi::new(transport.clone(), ServerConfig::default()));
    BuildOrchestrator::new(api, transport.clone(), Arc::new(FileInspector::new())).with_now(now())
}

fn submitted_request(transport: &MockTransport) -> BuildRequest {
    let posts = transport.calls_with_method(HttpMethod::Post);
    assert_eq!(posts.len(), 1, "expected exactly one build submission");
    serde_json::from_slice(posts[0].body.as_deref().unwrap()).unwrap()
}

fn upload_target_requests(calls: &[RecordedCall]) -> Vec<&RecordedCall> {
    calls
        .iter()
        .filter(|c| c.url.contains("/build/uploadurl"))
        .collect()
}

// =============================================================================
// Scenario A: Android debug build without a certificate
// =============================================================================

#[test]
fn test_android_debug_build_downloads_apk() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));
    let mut orchestrator = orchestrator(&transport);

    let data = orchestrator
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap();

    assert!(data.output_file_path.to_string_lossy().ends_with(".apk"));
    assert_eq!(data.output_file_path, project.root.join(".cloud/HelloWorld.apk"));
    assert_eq!(std::fs::read(&data.output_file_path).unwrap(), b"BINARY-RESULT");
    assert_eq!(data.stdout, "BUILD SUCCESSFUL");
    assert_eq!(orchestrator.stage(), BuildStage::Done);

    let request = submitted_request(&transport);
    assert_eq!(request.properties.platform, "Android");
    assert_eq!(request.properties.app_identifier, APP_ID);
    assert_eq!(request.properties.runtime_version, "6.2.*");
    assert_eq!(request.properties.template_app_name, "HelloWorld");
    assert_eq!(request.count_files(Disposition::PackageZip), 1);
    assert_eq!(request.count_files(Disposition::CryptoStore), 0);

    let calls = transport.calls();
    assert_eq!(upload_target_requests(&calls).len(), 1);
}

#[test]
fn test_package_excludes_node_modules() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap();

    let archive = std::fs::File::open(project.root.join(".cloud/Build.zip")).unwrap();
    let archive = zip::ZipArchive::new(archive).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"app/app.js"));
    assert!(names.contains(&"package.json"));
    assert!(names.iter().all(|n| !n.starts_with("node_modules")));
    assert!(names.iter().all(|n| !n.starts_with(".cloud")));

    let puts = transport.calls_with_method(HttpMethod::Put);
    assert_eq!(puts.len(), 1);
    assert_eq!(
        puts[0].body.as_deref().map(|b| b.len()),
        Some(std::fs::metadata(project.root.join(".cloud/Build.zip")).unwrap().len() as usize)
    );
}

// =============================================================================
// Scenario B: Android release with a missing certificate
// =============================================================================

#[test]
fn test_android_release_missing_certificate_fails_before_network() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));
    let mut orchestrator = orchestrator(&transport);

    let input = AndroidSigningInput {
        certificate_path: Some(project.dir.path().join("missing.p12")),
        certificate_password: Some("pw".to_string()),
    };
    let err = orchestrator
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::release(),
            Some(&input),
            None,
        )
        .unwrap_err();

    assert!(matches!(err, BuildError::Validation { .. }));
    assert_eq!(err.exit_code(), 10);
    assert!(err.to_string().contains("missing.p12"));
    assert!(transport.calls().is_empty());
    assert_eq!(orchestrator.stage(), BuildStage::Failed);
    assert!(!project.root.join(".cloud/Build.zip").exists());
}

#[test]
fn test_android_release_without_password_is_credential_format_error() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    let input = AndroidSigningInput {
        certificate_path: Some(certificate_path()),
        certificate_password: None,
    };
    let err = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::release(),
            Some(&input),
            None,
        )
        .unwrap_err();

    match &err {
        BuildError::CredentialFormat { path, .. } => assert_eq!(path, &certificate_path()),
        other => panic!("expected credential format error, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 11);
    assert!(transport.calls().is_empty());
}

#[test]
fn test_android_release_signs_with_keystore() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    let input = AndroidSigningInput {
        certificate_path: Some(certificate_path()),
        certificate_password: Some(CERTIFICATE_PASSWORD.to_string()),
    };
    orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::release(),
            Some(&input),
            None,
        )
        .unwrap();

    let request = submitted_request(&transport);
    assert_eq!(request.count_files(Disposition::CryptoStore), 1);
    assert_eq!(request.count_files(Disposition::Keychain), 0);
    assert_eq!(request.count_files(Disposition::Provision), 0);
    assert_eq!(
        request.properties.key_store_alias.as_deref(),
        Some("iPhone Developer: Test Developer (ABCDE12345)")
    );

    let calls = transport.calls();
    let targets = upload_target_requests(&calls);
    assert_eq!(targets.len(), 2);
    assert!(targets[1].url.contains(".p12"));
}

// =============================================================================
// Scenario C: iOS device build with an expired profile
// =============================================================================

#[test]
fn test_ios_expired_profile_fails_before_upload() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    let input = IosSigningInput {
        certificate_path: Some(certificate_path()),
        certificate_password: Some(CERTIFICATE_PASSWORD.to_string()),
        provisioning_profile_path: Some(expired_profile_path()),
        build_for_device: true,
        target_device_identifier: None,
    };
    let err = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Ios,
            &BuildConfiguration::debug(),
            None,
            Some(&input),
        )
        .unwrap_err();

    let violations = err.violations().expect("validation failure");
    assert!(violations.iter().any(|v| v.contains("expired")));
    assert!(transport.calls_with_method(HttpMethod::Put).is_empty());
    assert!(transport.calls().is_empty());
}

#[test]
fn test_ios_device_build_uploads_certificate_and_profile() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    let input = IosSigningInput {
        certificate_path: Some(certificate_path()),
        certificate_password: Some(CERTIFICATE_PASSWORD.to_string()),
        provisioning_profile_path: Some(profile_path()),
        build_for_device: true,
        target_device_identifier: Some(PROVISIONED_DEVICE.to_string()),
    };
    let data = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Ios,
            &BuildConfiguration::debug(),
            None,
            Some(&input),
        )
        .unwrap();
    assert_eq!(data.output_file_path, project.root.join(".cloud/HelloWorld.ipa"));

    let request = submitted_request(&transport);
    assert_eq!(request.count_files(Disposition::Keychain), 1);
    assert_eq!(request.count_files(Disposition::Provision), 1);
    assert_eq!(request.count_files(Disposition::CryptoStore), 0);
    assert_eq!(
        request.properties.default_mobile_provision_identifier.as_deref(),
        Some(PROFILE_UUID)
    );
    assert_eq!(request.properties.simulator, None);

    let calls = transport.calls();
    let targets = upload_target_requests(&calls);
    assert_eq!(targets.len(), 3);
    assert!(targets[2].url.contains(".mobileprovision"));

    let names: Vec<&str> = targets.iter().map(|c| c.url.as_str()).collect();
    assert_ne!(names[0], names[1]);
    assert_ne!(names[1], names[2]);
}

#[test]
fn test_ios_simulator_build_skips_signing() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));

    let data = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Ios,
            &BuildConfiguration::debug(),
            None,
            Some(&IosSigningInput::default()),
        )
        .unwrap();
    assert_eq!(data.output_file_path, project.root.join(".cloud/HelloWorld.zip"));

    let request = submitted_request(&transport);
    assert_eq!(request.properties.simulator, Some(true));
    assert_eq!(request.count_files(Disposition::Keychain), 0);
    assert_eq!(request.count_files(Disposition::Provision), 0);
    assert_eq!(request.build_files.len(), 1);
}

// =============================================================================
// Scenario D: remote build reports no build items
// =============================================================================

#[test]
fn test_empty_build_items_is_remote_failure() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(
        r#"{"BuildItems":[],"Output":"gradle output","Error":"Keystore was tampered with"}"#,
    ));
    let mut orchestrator = orchestrator(&transport);

    let err = orchestrator
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap_err();

    match &err {
        BuildError::RemoteBuildFailure { error, output } => {
            assert_eq!(error, "Keystore was tampered with");
            assert_eq!(output, "gradle output");
        }
        other => panic!("expected remote build failure, got {:?}", other),
    }
    assert!(err.to_string().contains("Keystore was tampered with"));
    assert_eq!(err.exit_code(), 50);
    assert_eq!(
        orchestrator.history(),
        vec![
            BuildStage::Validating,
            BuildStage::Packaging,
            BuildStage::Uploading,
            BuildStage::Submitting,
            BuildStage::AwaitingResult,
            BuildStage::Failed,
        ]
    );
}

#[test]
fn test_null_build_items_keeps_remote_reason() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(
        r#"{"BuildItems":null,"Errors":"Provisioning failed","Error":"stderr text","Output":"xcodebuild output"}"#,
    ));

    let err = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap_err();

    match &err {
        BuildError::RemoteBuildFailure { error, output } => {
            assert_eq!(error, "Provisioning failed");
            assert_eq!(output, "xcodebuild output");
        }
        other => panic!("expected remote build failure, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 50);
    assert!(transport.calls_with_method(HttpMethod::Get).iter().all(|c| c.url != RESULT_URL));
}

// =============================================================================
// Transport failures
// =============================================================================

#[test]
fn test_payment_required_message_surfaces_verbatim() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));
    transport.on(
        HttpMethod::Post,
        format!("{}{}/build", API_ROOT, APP_ID),
        402,
        r#"{"Message":"Your subscription does not allow cloud builds."}"#,
    );

    let err = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(err, BuildError::Transport(_)));
    assert!(err
        .to_string()
        .contains("Your subscription does not allow cloud builds."));
}

#[test]
fn test_storage_failure_is_upload_error() {
    let project = TestProject::new();
    let transport = Arc::new(service_transport(&successful_build_result()));
    transport.on_connection_failure(HttpMethod::Put, STORAGE_PUT, "connection refused");

    let err = orchestrator(&transport)
        .build(
            &project.settings(),
            Platform::Android,
            &BuildConfiguration::debug(),
            None,
            None,
        )
        .unwrap_err();

    assert!(matches!(err, BuildError::Upload(_)));
    assert_eq!(err.exit_code(), 20);
    assert!(transport.calls_with_method(HttpMethod::Post).is_empty());
}
