//! End-to-end runs against a scripted device farm

mod fixtures;

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};

use fixtures::*;
use serde_json::json;
use tempfile::TempDir;
use vdtest_ios::api::{Method, MockTransport};
use vdtest_ios::export::DOWNLOADED_FILES_DIR_ENV_KEY;
use vdtest_ios::flaky::FLAKY_TEST_CASES_ENV_KEY;
use vdtest_ios::{DimensionKey, MemoryExporter, Pipeline, PipelineConfig};

fn script_start(mock: &MockTransport) {
    mock.push_json(Method::Post, ASSETS_URL, &json!({ "appUrl": UPLOAD_URL }));
    mock.push_response(Method::Put, UPLOAD_URL, 200, "");
    mock.push_response(Method::Post, RUN_URL, 200, "");
}

#[test]
fn test_full_run_with_retried_dimension_and_assets() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);

    mock.push_json(Method::Get, RUN_URL, &steps(vec![]));
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![
            step("S1", "pending", "iphone8", "portrait", None),
            step("S2", "pending", "iphone13pro", "landscape", None),
        ]),
    );
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![
            step("S1", "complete", "iphone8", "portrait", Some("failure")),
            step("S2", "inProgress", "iphone13pro", "landscape", None),
            step("S3", "pending", "iphone8", "portrait", None),
        ]),
    );
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![
            step("S1", "complete", "iphone8", "portrait", Some("failure")),
            step("S2", "complete", "iphone13pro", "landscape", Some("success")),
            step("S3", "complete", "iphone8", "portrait", Some("success")),
        ]),
    );

    let mut assets = BTreeMap::new();
    for name in REPORT_NAMES {
        let url = format!("http://storage.test/assets/{}", name);
        mock.push_response(Method::Get, &url, 200, &fs::read_to_string(report_path(name)).unwrap());
        assets.insert(name.to_string(), url);
    }
    mock.push_json(Method::Get, ASSETS_URL, &json!(assets));

    let mut config = config(write_bundle(dir.path()));
    config.download_test_results = true;
    let exporter = MemoryExporter::new();

    let mut pipeline = Pipeline::new(config, PipelineConfig::default(), &mock, exporter.clone(), Vec::new())
        .with_clock(fixed_clock);
    let report = pipeline.run().unwrap();

    assert!(report.verdict.all_passed);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(mock.call_count(Method::Get, RUN_URL), 4);

    let output = String::from_utf8(pipeline.into_output()).unwrap();
    assert!(output.contains(
        "BullsEye Tests (iphone8 16.6 portrait en)\n\
         - time spent in pending state: ~0s\n\
         - time spent in complete state: ~0s\n"
    ));
    assert!(output.contains("Model         OS version   Orientation   Locale   Outcome\n"));
    assert!(output.contains("iphone8       16.6         portrait      en       failure\n"));
    assert!(output.contains("iphone13pro   16.6         landscape     en       success\n"));

    let assets = report.assets.expect("assets downloaded");
    assert_eq!(assets.files.len(), 3);
    assert_eq!(
        exporter.get(DOWNLOADED_FILES_DIR_ENV_KEY),
        Some(assets.dir.display().to_string())
    );
    assert_eq!(
        exporter.get(FLAKY_TEST_CASES_ENV_KEY).as_deref(),
        Some("- BullsEyeFailingTests.BullsEyeRandomlyFailingTests.testRandomlyFail\n")
    );
    let flaky = assets.flaky_tests.expect("flaky tests exported");
    assert_eq!((flaky.included, flaky.skipped), (1, 0));

    fs::remove_dir_all(&assets.dir).unwrap();
}

#[test]
fn test_dimension_without_success_fails_run() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![
            step("S1", "complete", "iphone8", "portrait", Some("success")),
            step("S2", "complete", "iphone13pro", "landscape", Some("skipped")),
            step("S3", "complete", "iphone13pro", "landscape", Some("inconclusive")),
        ]),
    );

    let report = Pipeline::new(
        config(write_bundle(dir.path())),
        PipelineConfig::default(),
        &mock,
        MemoryExporter::new(),
        Vec::new(),
    )
    .run()
    .unwrap();

    assert!(!report.verdict.all_passed);
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.verdict.failing_dimensions,
        vec![DimensionKey::new("iphone13pro", "16.6", "landscape", "en")]
    );
}

#[test]
fn test_failure_without_failed_cases_counts_as_success() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);

    let mut flaky_only = step("S1", "complete", "iphone8", "portrait", Some("failure"));
    flaky_only["testExecutionStep"] = json!({
        "testSuiteOverviews": [
            {"totalCount": 12, "failureCount": 0, "errorCount": 0, "flakyCount": 1}
        ]
    });
    mock.push_json(Method::Get, RUN_URL, &steps(vec![flaky_only]));

    let mut pipeline = Pipeline::new(
        config(write_bundle(dir.path())),
        PipelineConfig::default(),
        &mock,
        MemoryExporter::new(),
        Vec::new(),
    );
    let report = pipeline.run().unwrap();

    assert!(report.verdict.all_passed);
    let output = String::from_utf8(pipeline.into_output()).unwrap();
    assert!(output.contains("en       success\n"));
}

#[test]
fn test_status_poll_survives_one_failure() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);
    mock.push_response(Method::Get, RUN_URL, 503, "busy");
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![step("S1", "complete", "iphone8", "portrait", Some("success"))]),
    );

    let report = Pipeline::new(
        config(write_bundle(dir.path())),
        PipelineConfig::default(),
        &mock,
        MemoryExporter::new(),
        Vec::new(),
    )
    .run()
    .unwrap();

    assert!(report.verdict.all_passed);
    assert_eq!(mock.call_count(Method::Get, RUN_URL), 2);
}

#[test]
fn test_status_poll_fails_after_two_failures() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);
    mock.push_response(Method::Get, RUN_URL, 503, "busy");

    let err = Pipeline::new(
        config(write_bundle(dir.path())),
        PipelineConfig::default(),
        &mock,
        MemoryExporter::new(),
        Vec::new(),
    )
    .run()
    .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("busy"));
    assert!(!err.to_string().contains("secret-token"));
}

#[test]
fn test_test_matrix_request() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![step("S1", "complete", "iphone8", "portrait", Some("success"))]),
    );

    Pipeline::new(
        config(write_bundle(dir.path())),
        PipelineConfig::default(),
        &mock,
        MemoryExporter::new(),
        Vec::new(),
    )
    .run()
    .unwrap();

    let start = mock
        .requests()
        .into_iter()
        .find(|r| r.method == Method::Post && r.url == RUN_URL)
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&start.body.unwrap()).unwrap();
    assert_eq!(
        body,
        json!({
            "environmentMatrix": {"iosDeviceList": {"iosDevices": [
                {"iosModelId": "iphone8", "iosVersionId": "16.6", "locale": "en", "orientation": "portrait"},
                {"iosModelId": "iphone13pro", "iosVersionId": "16.6", "locale": "en", "orientation": "landscape"}
            ]}},
            "testSpecification": {"testTimeout": "900.000000s", "iosXcTest": {}},
            "flakyTestAttempts": 2
        })
    );
}

#[test]
fn test_quarantined_tests_uploaded_in_rewritten_bundle() {
    let dir = TempDir::new().unwrap();
    let mock = MockTransport::new();
    script_start(&mock);
    mock.push_json(
        Method::Get,
        RUN_URL,
        &steps(vec![step("S1", "complete", "iphone8", "portrait", Some("success"))]),
    );

    let mut config = config(write_bundle(dir.path()));
    config.quarantined_tests = Some(
        json!([{
            "testCaseName": "testGameStyleSwitch()",
            "testSuiteName": ["BullsEyeUITests"],
            "className": "BullsEyeUITests2"
        }])
        .to_string(),
    );
    let original = config.zip_path.clone();

    Pipeline::new(config, PipelineConfig::default(), &mock, MemoryExporter::new(), Vec::new())
        .run()
        .unwrap();

    let upload = mock
        .requests()
        .into_iter()
        .find(|r| r.method == Method::Put)
        .unwrap();
    let uploaded_path = upload.upload_path.unwrap();
    assert_ne!(uploaded_path, original);
    assert_eq!(uploaded_path.file_name().unwrap(), "testbundle.zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(upload.body.unwrap())).unwrap();
    let mut xctestrun = String::new();
    archive
        .by_name("BullsEye_iphoneos17.0-arm64.xctestrun")
        .unwrap()
        .read_to_string(&mut xctestrun)
        .unwrap();
    assert!(xctestrun.contains("<string>BullsEyeUITests2/testGameStyleSwitch</string>"));
    assert!(archive.by_name("Debug-iphoneos/BullsEye.app/BullsEye").is_ok());

    fs::remove_dir_all(uploaded_path.parent().unwrap()).unwrap();
}
