//! Flaky test collection
//!
//! Reads merged JUnit reports, picks the cases marked `flaky="true"` and
//! renders them as a size-capped list for the CI environment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::warn;
use vdtest_junit::{read_report, TestCase, TestReport, TestSuite};

/// Environment key the flaky list is exported under
pub const FLAKY_TEST_CASES_ENV_KEY: &str = "BITRISE_FLAKY_TEST_CASES";

/// Byte limit of the exported flaky list
pub const FLAKY_TEST_CASES_SIZE_LIMIT: usize = 1024;

/// A report that could not be read or parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableReport {
    pub path: PathBuf,
    pub reason: String,
}

/// Flaky case names from a set of reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlakyCollection {
    /// Qualified names in report, suite, case order; may contain duplicates
    pub entries: Vec<String>,
    /// Reports that contributed nothing because they could not be read
    pub unreadable: Vec<UnreadableReport>,
}

/// `<suite>.<class>.<case>`; empty suite or class segments are left out
pub fn qualified_name(suite: &TestSuite, case: &TestCase) -> String {
    let mut name = case.name.clone();
    if !case.class_name.is_empty() {
        name = format!("{}.{}", case.class_name, name);
    }
    if !suite.name.is_empty() {
        name = format!("{}.{}", suite.name, name);
    }
    name
}

/// Flaky case names of one report, in document order
pub fn flaky_entries(report: &TestReport) -> Vec<String> {
    report
        .flaky_cases()
        .map(|(suite, case)| qualified_name(suite, case))
        .collect()
}

/// Collect flaky case names from every report. A report that cannot be read
/// or parsed counts as having no flaky cases.
pub fn collect<P: AsRef<Path>>(paths: &[P]) -> FlakyCollection {
    let mut collection = FlakyCollection::default();

    for path in paths {
        let path = path.as_ref();
        match read_report(path) {
            Ok(report) => collection.entries.extend(flaky_entries(&report)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping unreadable test report");
                collection.unreadable.push(UnreadableReport {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                });
            }
        }
    }

    collection
}

/// Remove repeated names, keeping the first occurrence
pub fn dedupe(entries: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect()
}

/// A rendered list and how many entries did not fit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CappedList {
    pub text: String,
    pub included: usize,
    pub skipped: usize,
}

/// Render `- <name>\n` lines until the next one would exceed `max_bytes`
pub fn render_capped(entries: &[String], max_bytes: usize) -> CappedList {
    let mut text = String::new();

    for (i, entry) in entries.iter().enumerate() {
        let line = format!("- {}\n", entry);
        if text.len() + line.len() > max_bytes {
            let skipped = entries.len() - i;
            warn!(
                "{} env var size limit ({} characters) exceeded. Skipping {} test cases.",
                FLAKY_TEST_CASES_ENV_KEY, max_bytes, skipped
            );
            return CappedList {
                text,
                included: i,
                skipped,
            };
        }
        text.push_str(&line);
    }

    CappedList {
        text,
        included: entries.len(),
        skipped: 0,
    }
}
