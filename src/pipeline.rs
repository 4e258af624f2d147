//! Test run orchestration
//!
//! One invocation runs these stages in order:
//! - print the resolved configuration
//! - add quarantined tests to the bundle (optional)
//! - upload the bundle and start the test
//! - poll until every step is complete
//! - print step state durations and the results table
//! - download assets and export CI outputs (optional)
//!
//! Failures up to and including the results table are fatal. Download and
//! export failures are logged as warnings and never change the verdict.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, TestMatrix, Transport};
use crate::config::{Config, ConfigError};
use crate::export::{ExportError, Exporter, OutputExporter};
use crate::flaky::CappedList;
use crate::outcome::{DimensionKey, Outcome, OutcomeAggregator, ResultsTable, Verdict};
use crate::poll::RunPoller;
use crate::quarantine::{self, QuarantineError};
use crate::state::StepStateTracker;
use crate::transfer::{self, TransferError};

/// Exit code when at least one dimension failed
pub const EXIT_TESTS_FAILED: i32 = 1;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Transfer(#[from] TransferError),

    #[error("failed to add quarantined tests to the test bundle: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("{0}")]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Api(_) => 3,
            PipelineError::Transfer(_) => 4,
            PipelineError::Quarantine(_) => 5,
            PipelineError::Export(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Output settings
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Color the outcome column of the results table
    pub colored: bool,
}

/// What was downloaded and exported after the run
#[derive(Debug, Clone, Default)]
pub struct AssetSummary {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub flaky_tests: Option<CappedList>,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub verdict: Verdict,
    /// Classified outcome of every final step, in response order
    pub outcomes: Vec<(DimensionKey, Outcome)>,
    /// Set when assets were downloaded
    pub assets: Option<AssetSummary>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.verdict.all_passed {
            0
        } else {
            EXIT_TESTS_FAILED
        }
    }
}

/// Pipeline execution context
pub struct Pipeline<T: Transport, E: OutputExporter, W: Write> {
    config: Config,
    options: PipelineConfig,
    client: ApiClient<T>,
    exporter: Exporter<E>,
    out: W,
    clock: fn() -> DateTime<Utc>,
}

impl<T: Transport, E: OutputExporter, W: Write> Pipeline<T, E, W> {
    /// Create a new pipeline writing its report to `out`
    pub fn new(config: Config, options: PipelineConfig, transport: T, exporter: E, out: W) -> Self {
        let client = ApiClient::from_config(transport, &config);
        Self {
            config,
            options,
            client,
            exporter: Exporter::new(exporter),
            out,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for step state timestamps
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run every stage and return the verdict
    pub fn run(&mut self) -> PipelineResult<RunReport> {
        self.print_config();

        let bundle = self.prepare_bundle()?;
        self.upload(&bundle)?;
        self.start()?;

        info!("Waiting for test results");
        let mut tracker = StepStateTracker::new();
        let response = RunPoller::new(&self.client, self.config.poll_interval)
            .with_clock(self.clock)
            .poll_until_finished(&mut tracker)?;

        self.write_line("");
        if let Err(err) = tracker.render((self.clock)(), &mut self.out) {
            warn!("Failed to print step states: {}", err);
        }
        self.write_line("");

        info!("Test results:");
        let mut aggregator = OutcomeAggregator::new();
        let mut table = ResultsTable::new();
        if self.options.colored {
            table.colorize();
        }
        let mut outcomes = Vec::with_capacity(response.steps.len());
        for step in &response.steps {
            let outcome = aggregator.record_step(step);
            let key = DimensionKey::from_step(step);
            table.push(key.clone(), outcome);
            outcomes.push((key, outcome));
        }
        if let Err(err) = table.write_to(&mut self.out) {
            warn!("Failed to print test results: {}", err);
        }

        let verdict = aggregator.final_verdict();
        for key in &verdict.failing_dimensions {
            warn!(dimension = %key, "No successful test run on device");
        }

        let assets = if self.config.download_test_results {
            match self.download_and_export() {
                Ok(summary) => Some(summary),
                Err(err) => {
                    warn!("Failed to download test assets: {}", err);
                    None
                }
            }
        } else {
            None
        };

        Ok(RunReport {
            verdict,
            outcomes,
            assets,
        })
    }

    fn write_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{}", line) {
            warn!("Failed to write output: {}", err);
        }
    }

    fn print_config(&mut self) {
        let text = self.config.to_human();
        self.write_line(&text);
    }

    /// The bundle to upload, with quarantined tests applied when configured
    fn prepare_bundle(&self) -> PipelineResult<PathBuf> {
        let Some(input) = self.config.quarantined_tests.as_deref() else {
            return Ok(self.config.zip_path.clone());
        };

        let skipped = quarantine::parse_quarantined_tests(input)?;
        if skipped.is_empty() {
            info!("No quarantined tests apply to this bundle");
            return Ok(self.config.zip_path.clone());
        }

        let count: usize = skipped.values().map(Vec::len).sum();
        info!("Adding {} quarantined test(s) to the test bundle", count);
        Ok(quarantine::apply_to_bundle(&self.config.zip_path, &skipped)?)
    }

    fn upload(&self, bundle: &Path) -> PipelineResult<()> {
        info!("Upload test bundle");
        let urls = self.client.request_upload_urls()?;
        transfer::upload_bundle(self.client.transport(), &urls.app_url, bundle)?;
        info!("=> .xctestrun uploaded");
        Ok(())
    }

    fn start(&self) -> PipelineResult<()> {
        info!("Start test");
        let matrix = TestMatrix::new(
            &self.config.devices,
            self.config.test_timeout,
            self.config.flaky_test_attempts,
        );
        self.client.start_test(&matrix)?;
        info!("=> Test started");
        Ok(())
    }

    fn download_and_export(&self) -> PipelineResult<AssetSummary> {
        info!("Downloading test assets");
        let assets = self.client.fetch_asset_urls()?;
        let dir = transfer::create_assets_dir()?;
        let files = transfer::download_assets(self.client.transport(), &assets, &dir)?;
        info!("=> Assets downloaded");

        if let Err(err) = self.exporter.export_results_dir(&dir) {
            warn!(
                "Failed to export environment (VDTESTING_DOWNLOADED_FILES_DIR), error: {}",
                err
            );
        }

        let reports = transfer::merged_reports(&files);
        let flaky_tests = match self.exporter.export_flaky_tests(&reports) {
            Ok(list) => list,
            Err(err) => {
                warn!("Failed to export flaky test cases: {}", err);
                None
            }
        };

        Ok(AssetSummary {
            dir,
            files,
            flaky_tests,
        })
    }
}
