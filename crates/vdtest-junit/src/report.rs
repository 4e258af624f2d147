//! Report data model

use serde::Deserialize;

/// A parsed report: the suites found under the root element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestReport {
    #[serde(rename = "testsuite", default)]
    pub test_suites: Vec<TestSuite>,
}

impl TestReport {
    /// Iterate over every flaky case, paired with its suite, in document order
    pub fn flaky_cases(&self) -> impl Iterator<Item = (&TestSuite, &TestCase)> {
        self.test_suites.iter().flat_map(|suite| {
            suite
                .test_cases
                .iter()
                .filter(|case| case.is_flaky())
                .map(move |case| (suite, case))
        })
    }
}

/// A `<testsuite>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestSuite {
    #[serde(rename = "@name", default)]
    pub name: String,

    #[serde(rename = "testcase", default)]
    pub test_cases: Vec<TestCase>,
}

/// A `<testcase>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TestCase {
    #[serde(rename = "@name", default)]
    pub name: String,

    #[serde(rename = "@classname", default)]
    pub class_name: String,

    #[serde(rename = "@time", default)]
    pub time: Option<String>,

    /// Raw `flaky` attribute; the device farm writes `flaky="true"`
    #[serde(rename = "@flaky", default)]
    pub flaky: Option<String>,

    /// A flaky case carries one failure per failed attempt
    #[serde(rename = "failure", default)]
    pub failures: Vec<Failure>,

    #[serde(rename = "error", default)]
    pub errors: Vec<Failure>,
}

impl TestCase {
    /// Whether the report marks this case as flaky
    pub fn is_flaky(&self) -> bool {
        self.flaky.as_deref() == Some("true")
    }
}

/// A `<failure>` or `<error>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Failure {
    #[serde(rename = "@message", default)]
    pub message: Option<String>,

    #[serde(rename = "@type", default)]
    pub kind: Option<String>,

    #[serde(rename = "$text", default)]
    pub text: String,
}
