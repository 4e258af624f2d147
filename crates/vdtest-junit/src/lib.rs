//! JUnit/XUnit report model for merged device-farm test results.
//!
//! The device farm produces one `test_results_merged.xml` per device
//! dimension. This crate parses those files into a small data model: a
//! report holds suites, a suite holds cases, and a case may be marked flaky
//! or carry failure details.

mod parser;
mod report;

pub use parser::parse_report;
pub use report::{Failure, TestCase, TestReport, TestSuite};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Errors while reading or decoding a report
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed XML: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("unexpected report structure: {0}")]
    Decode(#[from] quick_xml::DeError),

    #[error("report has no root element")]
    MissingRoot,

    #[error("unsupported root element <{0}>")]
    UnsupportedRoot(String),
}

/// Read and parse a report file
pub fn read_report(path: &Path) -> Result<TestReport, ReportError> {
    let xml = fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_report(&xml)
}
