//! Request and response bodies of the device-farm intermediary API
//!
//! Field names follow the upstream JSON (camelCase). Every response field is
//! optional upstream, so response types default missing and `null` fields.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::DeviceSpec;

/// Lifecycle state of a step that has finished running
pub const STATE_COMPLETE: &str = "complete";

/// Dimension keys reported on each step
pub const DIMENSION_MODEL: &str = "Model";
pub const DIMENSION_VERSION: &str = "Version";
pub const DIMENSION_ORIENTATION: &str = "Orientation";
pub const DIMENSION_LOCALE: &str = "Locale";

/// Pre-signed upload URLs returned by `POST /assets/...`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrls {
    pub app_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_app_url: Option<String>,
}

/// Test matrix request body for `POST /{app}/{build}/{token}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrix {
    pub environment_matrix: EnvironmentMatrix,
    pub test_specification: TestSpecification,

    #[serde(skip_serializing_if = "is_zero")]
    pub flaky_test_attempts: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl TestMatrix {
    /// Build the matrix for the given devices
    pub fn new(devices: &[DeviceSpec], test_timeout_seconds: f64, flaky_test_attempts: u32) -> Self {
        Self {
            environment_matrix: EnvironmentMatrix {
                ios_device_list: IosDeviceList {
                    ios_devices: devices.iter().map(IosDevice::from).collect(),
                },
            },
            test_specification: TestSpecification {
                test_timeout: format!("{:.6}s", test_timeout_seconds),
                ios_xc_test: IosXcTest {},
            },
            flaky_test_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMatrix {
    pub ios_device_list: IosDeviceList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosDeviceList {
    pub ios_devices: Vec<IosDevice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IosDevice {
    pub ios_model_id: String,
    pub ios_version_id: String,
    pub locale: String,
    pub orientation: String,
}

impl From<&DeviceSpec> for IosDevice {
    fn from(device: &DeviceSpec) -> Self {
        Self {
            ios_model_id: device.model.clone(),
            ios_version_id: device.os_version.clone(),
            locale: device.locale.clone(),
            orientation: device.orientation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpecification {
    /// Duration string, e.g. `"900.000000s"`
    pub test_timeout: String,
    pub ios_xc_test: IosXcTest,
}

/// Marker selecting an XCTest run; carries no fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IosXcTest {}

/// Deserialize `null` as the type's default, like a missing key
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of `GET /{app}/{build}/{token}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListStepsResponse {
    #[serde(deserialize_with = "null_default")]
    pub steps: Vec<Step>,
}

impl ListStepsResponse {
    /// Number of steps not yet in the complete state
    pub fn running_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_complete()).count()
    }
}

/// One executed test run instance against a device dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Step {
    #[serde(deserialize_with = "null_default")]
    pub step_id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub dimension_value: Vec<StepDimensionValue>,
    pub outcome: Option<StepOutcome>,
    pub test_execution_step: Option<TestExecutionStep>,
}

impl Step {
    /// Value of a dimension key, empty when not reported
    pub fn dimension(&self, key: &str) -> &str {
        self.dimension_value
            .iter()
            .find(|d| d.key == key)
            .map(|d| d.value.as_str())
            .unwrap_or("")
    }

    pub fn is_complete(&self) -> bool {
        self.state == STATE_COMPLETE
    }

    /// Suite overviews attached to the step, if any
    pub fn suite_overviews(&self) -> &[TestSuiteOverview] {
        self.test_execution_step
            .as_ref()
            .map(|t| t.test_suite_overviews.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepDimensionValue {
    #[serde(deserialize_with = "null_default")]
    pub key: String,
    #[serde(deserialize_with = "null_default")]
    pub value: String,
}

/// Outcome summary plus the typed detail matching the summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepOutcome {
    /// One of "success", "failure", "inconclusive", "skipped"
    #[serde(deserialize_with = "null_default")]
    pub summary: String,
    pub failure_detail: Option<FailureDetail>,
    pub inconclusive_detail: Option<InconclusiveDetail>,
    pub skipped_detail: Option<SkippedDetail>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FailureDetail {
    #[serde(deserialize_with = "null_default")]
    pub crashed: bool,
    #[serde(deserialize_with = "null_default")]
    pub not_installed: bool,
    #[serde(deserialize_with = "null_default")]
    pub other_native_crash: bool,
    #[serde(deserialize_with = "null_default")]
    pub timed_out: bool,
    #[serde(deserialize_with = "null_default")]
    pub unable_to_crawl: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InconclusiveDetail {
    #[serde(deserialize_with = "null_default")]
    pub aborted_by_user: bool,
    #[serde(deserialize_with = "null_default")]
    pub infrastructure_failure: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkippedDetail {
    #[serde(deserialize_with = "null_default")]
    pub incompatible_app_version: bool,
    #[serde(deserialize_with = "null_default")]
    pub incompatible_architecture: bool,
    #[serde(deserialize_with = "null_default")]
    pub incompatible_device: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestExecutionStep {
    #[serde(deserialize_with = "null_default")]
    pub test_suite_overviews: Vec<TestSuiteOverview>,
}

/// Per-suite case counts reported for a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestSuiteOverview {
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub total_count: i64,
    #[serde(deserialize_with = "null_default")]
    pub failure_count: i64,
    #[serde(deserialize_with = "null_default")]
    pub error_count: i64,
    #[serde(deserialize_with = "null_default")]
    pub skipped_count: i64,
    #[serde(deserialize_with = "null_default")]
    pub flaky_count: i64,
}
