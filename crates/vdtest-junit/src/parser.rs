//! Report parser
//!
//! Accepts either a `<testsuites>` root holding suites or a bare
//! `<testsuite>` root, which some merge tools emit for single-suite runs.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::report::{TestReport, TestSuite};
use crate::ReportError;

/// Parse report XML into a [`TestReport`]
pub fn parse_report(xml: &str) -> Result<TestReport, ReportError> {
    match root_element(xml)?.as_str() {
        "testsuites" => Ok(quick_xml::de::from_str::<TestReport>(xml)?),
        "testsuite" => {
            let suite: TestSuite = quick_xml::de::from_str(xml)?;
            Ok(TestReport {
                test_suites: vec![suite],
            })
        }
        other => Err(ReportError::UnsupportedRoot(other.to_string())),
    }
}

/// Local name of the first element in the document
fn root_element(xml: &str) -> Result<String, ReportError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::Eof => return Err(ReportError::MissingRoot),
            _ => {}
        }
    }
}
