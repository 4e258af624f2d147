//! Step configuration
//!
//! Configuration is merged from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. Optional TOML config file (`--config`)
//! 3. CLI flags and their environment variables
//!
//! The merged result is validated into a [`Config`] before any network call.

mod defaults;
mod devices;
mod merge;

pub use defaults::BuiltinDefaults;
pub use devices::{parse_device_list, DeviceListError, DeviceSpec};
pub use merge::{deep_merge, merge_layers, toml_to_json};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum test timeout accepted by the device farm, in seconds
pub const MAX_TEST_TIMEOUT_SECONDS: f64 = 2700.0;

/// Maximum number of flaky test attempts accepted by the device farm
pub const MAX_FLAKY_TEST_ATTEMPTS: u32 = 10;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required input: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("test bundle not found: {0}")]
    BundleNotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Shape(#[from] serde_json::Error),

    #[error(transparent)]
    Devices(#[from] DeviceListError),
}

/// A secret input value; never printed
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building request URLs
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// One configuration layer. Unset keys are omitted when serialized so they
/// fall through to lower layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<Secret>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_slug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_slug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_devices: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_timeout: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaky_test_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_test_results: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantined_tests: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_seconds: Option<u64>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Value, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let toml_value: toml::Value =
            toml::from_str(&contents).map_err(|source| ConfigError::FileParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(toml_to_json(toml_value))
    }

    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> Result<Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Validated step configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the device-farm intermediary API, without trailing slash
    pub api_base_url: String,
    pub api_token: Secret,
    pub build_slug: String,
    pub app_slug: String,

    /// Zipped test bundle (build products plus .xctestrun)
    pub zip_path: PathBuf,

    pub devices: Vec<DeviceSpec>,

    /// Test timeout in seconds
    pub test_timeout: f64,

    pub flaky_test_attempts: u32,
    pub download_test_results: bool,

    /// Raw quarantined tests JSON, if any
    pub quarantined_tests: Option<String>,

    pub poll_interval: Duration,
}

impl Config {
    /// Merge defaults, an optional config file, and CLI overrides, then validate
    pub fn resolve(cli: &ConfigLayer, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        if let Some(path) = config_file {
            layers.push(ConfigLayer::from_toml_file(path)?);
        }
        layers.push(cli.to_value()?);

        let merged: ConfigLayer = serde_json::from_value(merge_layers(layers))?;
        Self::validate(merged)
    }

    /// Validate a fully merged layer
    pub fn validate(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let api_base_url = required(layer.api_base_url, "api_base_url")?
            .trim_end_matches('/')
            .to_string();
        let api_token = layer
            .api_token
            .filter(|t| !t.expose().is_empty())
            .ok_or(ConfigError::Missing("api_token"))?;
        let build_slug = required(layer.build_slug, "build_slug")?;
        let app_slug = required(layer.app_slug, "app_slug")?;

        let zip_path = layer.zip_path.ok_or(ConfigError::Missing("zip_path"))?;
        if !zip_path.is_file() {
            return Err(ConfigError::BundleNotFound(zip_path));
        }

        let test_devices = required(layer.test_devices, "test_devices")?;
        let devices = parse_device_list(&test_devices)?;

        let test_timeout = layer.test_timeout.ok_or(ConfigError::Missing("test_timeout"))?;
        if !(0.0..=MAX_TEST_TIMEOUT_SECONDS).contains(&test_timeout) {
            return Err(ConfigError::InvalidValue {
                key: "test_timeout",
                reason: format!(
                    "{} is outside the allowed range 0..={}",
                    test_timeout, MAX_TEST_TIMEOUT_SECONDS
                ),
            });
        }

        let flaky_test_attempts = layer.flaky_test_attempts.unwrap_or(0);
        if flaky_test_attempts > MAX_FLAKY_TEST_ATTEMPTS {
            return Err(ConfigError::InvalidValue {
                key: "flaky_test_attempts",
                reason: format!(
                    "{} is outside the allowed range 0..={}",
                    flaky_test_attempts, MAX_FLAKY_TEST_ATTEMPTS
                ),
            });
        }

        let quarantined_tests = layer
            .quarantined_tests
            .filter(|q| !q.trim().is_empty());

        Ok(Self {
            api_base_url,
            api_token,
            build_slug,
            app_slug,
            zip_path,
            devices,
            test_timeout,
            flaky_test_attempts,
            download_test_results: layer.download_test_results.unwrap_or(false),
            quarantined_tests,
            poll_interval: Duration::from_secs(layer.poll_interval_seconds.unwrap_or(10)),
        })
    }

    /// Human-readable summary of the inputs, with the token redacted
    pub fn to_human(&self) -> String {
        let mut lines = vec![
            "Config:".to_string(),
            format!("- ApiBaseURL: {}", self.api_base_url),
            format!("- ApiToken: {}", self.api_token),
            format!("- BuildSlug: {}", self.build_slug),
            format!("- AppSlug: {}", self.app_slug),
            format!("- ZipPath: {}", self.zip_path.display()),
            "- TestDevices:".to_string(),
        ];
        lines.extend(self.devices.iter().map(|d| format!("  - {}", d)));
        lines.push(format!("- TestTimeout: {}", self.test_timeout));
        lines.push(format!("- FlakyTestAttempts: {}", self.flaky_test_attempts));
        lines.push(format!(
            "- DownloadTestResults: {}",
            self.download_test_results
        ));
        lines.push(format!(
            "- QuarantinedTests: {}",
            if self.quarantined_tests.is_some() { "set" } else { "-" }
        ));
        lines.join("\n")
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}
