//! CI environment exports

use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::info;

use crate::flaky::{self, CappedList, FLAKY_TEST_CASES_ENV_KEY, FLAKY_TEST_CASES_SIZE_LIMIT};

/// Environment key for the downloaded assets directory
pub const DOWNLOADED_FILES_DIR_ENV_KEY: &str = "VDTESTING_DOWNLOADED_FILES_DIR";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to run envman for {key}: {source}")]
    Spawn {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("envman failed to export {key} (exit code {code:?}): {output}")]
    Failed {
        key: String,
        code: Option<i32>,
        output: String,
    },

    #[error("failed to export {key}: {reason}")]
    Rejected { key: String, reason: String },
}

/// Publishes a key/value pair to the CI environment
pub trait OutputExporter {
    fn export_output(&self, key: &str, value: &str) -> Result<(), ExportError>;
}

impl<T: OutputExporter + ?Sized> OutputExporter for &T {
    fn export_output(&self, key: &str, value: &str) -> Result<(), ExportError> {
        (**self).export_output(key, value)
    }
}

/// Exports through `envman add`
#[derive(Debug, Clone)]
pub struct EnvmanExporter {
    program: String,
}

impl Default for EnvmanExporter {
    fn default() -> Self {
        Self {
            program: "envman".to_string(),
        }
    }
}

impl EnvmanExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another executable with the same `add --key --value` interface
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OutputExporter for EnvmanExporter {
    fn export_output(&self, key: &str, value: &str) -> Result<(), ExportError> {
        let output = Command::new(&self.program)
            .args(["add", "--key", key, "--value", value])
            .output()
            .map_err(|source| ExportError::Spawn {
                key: key.to_string(),
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(ExportError::Failed {
                key: key.to_string(),
                code: output.status.code(),
                output: text.trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Keeps exports in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    exports: Arc<Mutex<Vec<(String, String)>>>,
    reject: Arc<Mutex<Option<String>>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later export fail with `reason`
    pub fn reject_with(&self, reason: impl Into<String>) {
        if let Ok(mut reject) = self.reject.lock() {
            *reject = Some(reason.into());
        }
    }

    pub fn exports(&self) -> Vec<(String, String)> {
        self.exports
            .lock()
            .map(|exports| exports.clone())
            .unwrap_or_default()
    }

    /// Last value exported under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.exports()
            .into_iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

impl OutputExporter for MemoryExporter {
    fn export_output(&self, key: &str, value: &str) -> Result<(), ExportError> {
        let rejected = self.reject.lock().ok().and_then(|r| r.clone());
        if let Some(reason) = rejected {
            return Err(ExportError::Rejected {
                key: key.to_string(),
                reason,
            });
        }

        if let Ok(mut exports) = self.exports.lock() {
            exports.push((key.to_string(), value.to_string()));
        }
        Ok(())
    }
}

/// Run-level exports on top of an [`OutputExporter`]
pub struct Exporter<E: OutputExporter> {
    output: E,
}

impl<E: OutputExporter> Exporter<E> {
    pub fn new(output: E) -> Self {
        Self { output }
    }

    /// Export the directory holding downloaded test assets
    pub fn export_results_dir(&self, dir: &Path) -> Result<(), ExportError> {
        let dir = dir.display().to_string();
        self.output.export_output(DOWNLOADED_FILES_DIR_ENV_KEY, &dir)?;
        info!(
            "The downloaded test assets path ({}) is exported to the {} environment variable.",
            dir, DOWNLOADED_FILES_DIR_ENV_KEY
        );
        Ok(())
    }

    /// Collect flaky cases from merged reports and export the capped list.
    /// Returns `None` without exporting when no flaky case was found.
    pub fn export_flaky_tests<P: AsRef<Path>>(
        &self,
        report_paths: &[P],
    ) -> Result<Option<CappedList>, ExportError> {
        let collection = flaky::collect(report_paths);
        let entries = flaky::dedupe(collection.entries);
        if entries.is_empty() {
            return Ok(None);
        }

        info!(
            "{} flaky test case(s) detected, exporting {} env var",
            entries.len(),
            FLAKY_TEST_CASES_ENV_KEY
        );

        let list = flaky::render_capped(&entries, FLAKY_TEST_CASES_SIZE_LIMIT);
        self.output.export_output(FLAKY_TEST_CASES_ENV_KEY, &list.text)?;
        Ok(Some(list))
    }
}
