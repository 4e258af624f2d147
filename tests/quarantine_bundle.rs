//! Quarantined tests written into `.xctestrun` files

mod fixtures;

use std::fs;

use fixtures::*;
use plist::Value;
use tempfile::TempDir;
use vdtest_ios::quarantine::{
    apply_to_bundle, parse_quarantined_tests, read_xctestrun, rewrite_xctestrun, PlistFormat,
};

fn skip_identifiers(value: &Value, target: &str) -> Option<Vec<String>> {
    let configurations = value
        .as_dictionary()?
        .get("TestConfigurations")?
        .as_array()?;
    for configuration in configurations {
        let targets = configuration.as_dictionary()?.get("TestTargets")?.as_array()?;
        for entry in targets {
            let entry = entry.as_dictionary()?;
            if entry.get("BlueprintName")?.as_string()? != target {
                continue;
            }
            let skips = entry.get("SkipTestIdentifiers")?.as_array()?;
            return Some(
                skips
                    .iter()
                    .filter_map(|v| v.as_string().map(String::from))
                    .collect(),
            );
        }
    }
    None
}

const QUARANTINE_JSON: &str = r#"[
    {"testCaseName": "testGameStyleSwitch()", "testSuiteName": ["BullsEyeUITests"], "className": "BullsEyeUITests2"},
    {"testCaseName": "testRandomlyFail()", "testSuiteName": ["BullsEyeFailingTests"], "className": "BullsEyeRandomlyFailingTests"},
    {"testCaseName": "testUnknownTarget", "testSuiteName": ["NotInBundle"], "className": "Missing"}
]"#;

#[test]
fn test_fixture_has_expected_skips() {
    let (value, format) = read_xctestrun(&xctestrun_path()).unwrap();
    assert_eq!(format, PlistFormat::Xml);
    assert_eq!(skip_identifiers(&value, "BullsEyeUITests"), None);
    assert_eq!(
        skip_identifiers(&value, "BullsEyeFailingTests").unwrap().len(),
        3
    );
}

#[test]
fn test_rewrite_fixture_xctestrun() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("BullsEye.xctestrun");
    fs::copy(xctestrun_path(), &path).unwrap();

    let skipped = parse_quarantined_tests(QUARANTINE_JSON).unwrap();
    rewrite_xctestrun(&path, &skipped).unwrap();

    let (value, format) = read_xctestrun(&path).unwrap();
    assert_eq!(format, PlistFormat::Xml);
    assert_eq!(
        skip_identifiers(&value, "BullsEyeUITests").unwrap(),
        vec!["BullsEyeUITests2/testGameStyleSwitch"]
    );
    assert_eq!(
        skip_identifiers(&value, "BullsEyeFailingTests").unwrap(),
        vec![
            "BullsEyeEventuallyFailingTests",
            "BullsEyeEventuallyFailingTests/testFailIfNoSuccessesRemain",
            "BullsEyeFailingTests/testApiCallCompletes",
            "BullsEyeRandomlyFailingTests/testRandomlyFail",
        ]
    );

    let root = value.as_dictionary().unwrap();
    assert!(root.get("__xctestrun_metadata__").is_some());
    assert!(root.get("TestPlan").is_some());
}

#[test]
fn test_apply_to_fixture_bundle() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(dir.path());
    let skipped = parse_quarantined_tests(QUARANTINE_JSON).unwrap();

    let rewritten = apply_to_bundle(&bundle, &skipped).unwrap();
    assert_ne!(rewritten, bundle);

    let out = TempDir::new().unwrap();
    let mut archive = zip::ZipArchive::new(fs::File::open(&rewritten).unwrap()).unwrap();
    archive.extract(out.path()).unwrap();

    let (value, _) = read_xctestrun(&out.path().join("BullsEye_iphoneos17.0-arm64.xctestrun")).unwrap();
    assert_eq!(
        skip_identifiers(&value, "BullsEyeUITests").unwrap(),
        vec!["BullsEyeUITests2/testGameStyleSwitch"]
    );
    assert_eq!(
        fs::read(out.path().join("Debug-iphoneos/BullsEye.app/BullsEye")).unwrap(),
        b"\xcf\xfa\xed\xfe"
    );

    fs::remove_dir_all(rewritten.parent().unwrap()).unwrap();
}
