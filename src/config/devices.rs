//! Test device list parsing
//!
//! One device per line: `model,osVersion,locale,orientation`.
//! Blank lines are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A device the test matrix should run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device model id (e.g. "iphone13pro")
    pub model: String,

    /// OS version id (e.g. "16.6")
    pub os_version: String,

    /// Locale (e.g. "en")
    pub locale: String,

    /// Orientation ("portrait" or "landscape")
    pub orientation: String,
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.model, self.os_version, self.locale, self.orientation
        )
    }
}

/// Device list errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceListError {
    #[error("Invalid test device configuration: {line} (expected model,osVersion,locale,orientation)")]
    InvalidLine { line: String },

    #[error("Empty field in test device configuration: {line}")]
    EmptyField { line: String },

    #[error("No test devices configured")]
    Empty,
}

/// Parse a newline-delimited device list
pub fn parse_device_list(input: &str) -> Result<Vec<DeviceSpec>, DeviceListError> {
    let mut devices = Vec::new();

    for raw in input.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [model, os_version, locale, orientation] = fields.as_slice() else {
            return Err(DeviceListError::InvalidLine {
                line: line.to_string(),
            });
        };

        if fields.iter().any(|f| f.is_empty()) {
            return Err(DeviceListError::EmptyField {
                line: line.to_string(),
            });
        }

        devices.push(DeviceSpec {
            model: model.to_string(),
            os_version: os_version.to_string(),
            locale: locale.to_string(),
            orientation: orientation.to_string(),
        });
    }

    if devices.is_empty() {
        return Err(DeviceListError::Empty);
    }

    Ok(devices)
}
