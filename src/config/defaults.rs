//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Test timeout in seconds (default: 900 = 15 minutes)
    pub test_timeout: f64,

    /// Extra attempts for failing test cases (default: 0)
    pub flaky_test_attempts: u32,

    /// Download result artifacts after the run (default: false)
    pub download_test_results: bool,

    /// Seconds between status polls (default: 10)
    pub poll_interval_seconds: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            test_timeout: 900.0,
            flaky_test_attempts: 0,
            download_test_results: false,
            poll_interval_seconds: 10,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "test_timeout": self.test_timeout,
            "flaky_test_attempts": self.flaky_test_attempts,
            "download_test_results": self.download_test_results,
            "poll_interval_seconds": self.poll_interval_seconds,
        })
    }
}
