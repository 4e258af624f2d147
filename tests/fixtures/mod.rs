//! Shared fixtures for integration tests
//!
//! - merged JUnit reports as downloaded from the device farm
//! - an `.xctestrun` plist with two test targets
//! - builders for scripted step list responses and test bundles

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use vdtest_ios::config::{parse_device_list, Config, Secret};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const BASE_URL: &str = "http://farm.test";
pub const RUN_URL: &str = "http://farm.test/app-slug/build-slug/secret-token";
pub const ASSETS_URL: &str = "http://farm.test/assets/app-slug/build-slug/secret-token";
pub const UPLOAD_URL: &str = "http://storage.test/upload/testbundle";

/// Names of the merged report fixtures, as the asset map lists them
pub const REPORT_NAMES: [&str; 3] = [
    "iphone8-16.6-en-portrait-test_results_merged.xml",
    "iphone13pro-16.6-en-landscape-test_results_merged.xml",
    "iphone13pro-16.6-en-portrait-test_results_merged.xml",
];

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Path to a merged report fixture
pub fn report_path(name: &str) -> PathBuf {
    fixtures_dir().join("reports").join(name)
}

pub fn report_paths() -> Vec<PathBuf> {
    REPORT_NAMES.iter().map(|name| report_path(name)).collect()
}

/// Path to the `.xctestrun` fixture
pub fn xctestrun_path() -> PathBuf {
    fixtures_dir().join("xctestrun/BullsEye_iphoneos17.0-arm64.xctestrun")
}

/// Fixed wall clock for step state timestamps
pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

/// One step of a step list response
pub fn step(id: &str, state: &str, model: &str, orientation: &str, summary: Option<&str>) -> Value {
    let mut step = json!({
        "stepId": id,
        "name": "BullsEye Tests",
        "state": state,
        "dimensionValue": [
            {"key": "Model", "value": model},
            {"key": "Version", "value": "16.6"},
            {"key": "Orientation", "value": orientation},
            {"key": "Locale", "value": "en"}
        ]
    });
    if let Some(summary) = summary {
        step["outcome"] = json!({ "summary": summary });
    }
    step
}

pub fn steps(steps: Vec<Value>) -> Value {
    json!({ "steps": steps })
}

/// Zip holding a build products folder and the `.xctestrun` fixture
pub fn write_bundle(dir: &Path) -> PathBuf {
    let path = dir.join("testbundle.zip");
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();

    writer.add_directory("Debug-iphoneos/", options).unwrap();
    writer.add_directory("Debug-iphoneos/BullsEye.app/", options).unwrap();
    writer.start_file("Debug-iphoneos/BullsEye.app/BullsEye", options).unwrap();
    writer.write_all(b"\xcf\xfa\xed\xfe").unwrap();
    writer
        .start_file("BullsEye_iphoneos17.0-arm64.xctestrun", options)
        .unwrap();
    writer.write_all(&fs::read(xctestrun_path()).unwrap()).unwrap();
    writer.finish().unwrap();

    path
}

/// Validated configuration pointing at the scripted farm
pub fn config(zip_path: PathBuf) -> Config {
    Config {
        api_base_url: BASE_URL.to_string(),
        api_token: Secret::new("secret-token"),
        build_slug: "build-slug".to_string(),
        app_slug: "app-slug".to_string(),
        zip_path,
        devices: parse_device_list("iphone8,16.6,en,portrait\niphone13pro,16.6,en,landscape").unwrap(),
        test_timeout: 900.0,
        flaky_test_attempts: 2,
        download_test_results: false,
        quarantined_tests: None,
        poll_interval: Duration::ZERO,
    }
}
