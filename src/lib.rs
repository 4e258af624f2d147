//! vdtest-ios - iOS virtual device testing CI step
//!
//! Uploads an iOS test bundle to a remote device farm, starts a test run on a
//! matrix of simulated devices, waits for it to finish, and reports the
//! per-device results. Downloaded JUnit reports are scanned for flaky tests,
//! which are exported to the CI environment.

pub mod api;
pub mod config;
pub mod export;
pub mod flaky;
pub mod outcome;
pub mod pipeline;
pub mod poll;
pub mod quarantine;
pub mod state;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, HttpTransport, MockTransport, Transport};
pub use config::{Config, ConfigError, ConfigLayer, Secret};
pub use export::{EnvmanExporter, Exporter, MemoryExporter, OutputExporter};
pub use outcome::{DimensionKey, Outcome, OutcomeAggregator, Verdict};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunReport};
pub use state::StepStateTracker;
