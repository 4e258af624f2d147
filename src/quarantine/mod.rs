//! Test quarantine
//!
//! Quarantined tests are added to the `SkipTestIdentifiers` of their test
//! target in every `.xctestrun` of the bundle, so the device farm does not
//! run them.

mod bundle;
mod xctestrun;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use bundle::apply_to_bundle;
pub use xctestrun::{add_skipped_tests, read_xctestrun, rewrite_xctestrun, write_xctestrun, PlistFormat};

/// Skip identifiers (`Class/method`) keyed by test target name
pub type SkippedTestsByTarget = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("failed to parse quarantined tests input: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read plist {path}: {source}")]
    Plist {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("invalid xctestrun: {0}")]
    Structure(String),

    #[error("failed to {action} {path}: {source}")]
    Zip {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QuarantineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuarantineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One entry of the quarantined tests input
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuarantinedTest {
    pub test_case_name: String,
    pub test_suite_name: Vec<String>,
    pub class_name: String,
}

impl QuarantinedTest {
    /// Target and skip identifier, or `None` when a name is missing
    pub fn skip_identifier(&self) -> Option<(&str, String)> {
        let target = self.test_suite_name.first().filter(|t| !t.is_empty())?;
        if self.class_name.is_empty() || self.test_case_name.is_empty() {
            return None;
        }
        let method = self
            .test_case_name
            .strip_suffix("()")
            .unwrap_or(&self.test_case_name);
        Some((target.as_str(), format!("{}/{}", self.class_name, method)))
    }
}

/// Parse the quarantined tests JSON into skip identifiers per target.
/// Blank input means nothing is quarantined.
pub fn parse_quarantined_tests(input: &str) -> Result<SkippedTestsByTarget, QuarantineError> {
    let mut skipped = SkippedTestsByTarget::new();
    if input.trim().is_empty() {
        return Ok(skipped);
    }

    let tests: Vec<QuarantinedTest> = serde_json::from_str(input)?;
    for test in &tests {
        if let Some((target, identifier)) = test.skip_identifier() {
            skipped.entry(target.to_string()).or_default().push(identifier);
        }
    }

    Ok(skipped)
}
