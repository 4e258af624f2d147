//! `.xctestrun` plist editing

use std::fs;
use std::io::Cursor;
use std::path::Path;

use plist::{Dictionary, Value};

use super::{QuarantineError, SkippedTestsByTarget};

const BINARY_PLIST_MAGIC: &[u8] = b"bplist";

/// On-disk plist encoding, kept when the file is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    Xml,
    Binary,
}

impl PlistFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(BINARY_PLIST_MAGIC) {
            PlistFormat::Binary
        } else {
            PlistFormat::Xml
        }
    }
}

pub fn read_xctestrun(path: &Path) -> Result<(Value, PlistFormat), QuarantineError> {
    let bytes = fs::read(path).map_err(|e| QuarantineError::io(path, e))?;
    let value = Value::from_reader(Cursor::new(&bytes)).map_err(|source| QuarantineError::Plist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((value, PlistFormat::detect(&bytes)))
}

pub fn write_xctestrun(path: &Path, value: &Value, format: PlistFormat) -> Result<(), QuarantineError> {
    let mut bytes = Vec::new();
    let written = match format {
        PlistFormat::Binary => value.to_writer_binary(&mut bytes),
        PlistFormat::Xml => value.to_writer_xml(&mut bytes),
    };
    written.map_err(|source| QuarantineError::Plist {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, bytes).map_err(|e| QuarantineError::io(path, e))
}

/// Add skip identifiers to one `.xctestrun` file in place
pub fn rewrite_xctestrun(path: &Path, skipped: &SkippedTestsByTarget) -> Result<(), QuarantineError> {
    let (mut value, format) = read_xctestrun(path)?;
    add_skipped_tests(&mut value, skipped)?;
    write_xctestrun(path, &value, format)
}

fn structure(message: &str) -> QuarantineError {
    QuarantineError::Structure(message.to_string())
}

/// Append each target's skip identifiers to `SkipTestIdentifiers` of the
/// matching test targets in every test configuration
pub fn add_skipped_tests(xctestrun: &mut Value, skipped: &SkippedTestsByTarget) -> Result<(), QuarantineError> {
    let root = xctestrun
        .as_dictionary_mut()
        .ok_or_else(|| structure("root is not a dictionary"))?;

    let configurations = root
        .get_mut("TestConfigurations")
        .ok_or_else(|| structure("TestConfigurations not found in xctestrun"))?
        .as_array_mut()
        .ok_or_else(|| structure("invalid TestConfigurations format in xctestrun"))?;

    for configuration in configurations {
        let targets = configuration
            .as_dictionary_mut()
            .ok_or_else(|| structure("invalid test configuration format in xctestrun"))?
            .get_mut("TestTargets")
            .ok_or_else(|| structure("TestTargets not found in test configuration"))?
            .as_array_mut()
            .ok_or_else(|| structure("invalid TestTargets format in test configuration"))?;

        for target in targets {
            let target = target
                .as_dictionary_mut()
                .ok_or_else(|| structure("invalid test target format in test configuration"))?;
            add_to_target(target, skipped)?;
        }
    }

    Ok(())
}

fn add_to_target(target: &mut Dictionary, skipped: &SkippedTestsByTarget) -> Result<(), QuarantineError> {
    let blueprint = target
        .get("BlueprintName")
        .ok_or_else(|| structure("BlueprintName not found in test target"))?
        .as_string()
        .ok_or_else(|| structure("invalid BlueprintName format in test target"))?;

    let Some(to_add) = skipped.get(blueprint) else {
        return Ok(());
    };

    let mut identifiers = match target.get("SkipTestIdentifiers") {
        Some(existing) => existing
            .as_array()
            .cloned()
            .ok_or_else(|| structure("invalid SkipTestIdentifiers format in test target"))?,
        None => Vec::new(),
    };
    identifiers.extend(to_add.iter().cloned().map(Value::String));

    target.insert("SkipTestIdentifiers".to_string(), Value::Array(identifiers));
    Ok(())
}
