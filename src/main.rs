//! vdtest-ios CLI
//!
//! Entry point for the `vdtest-ios` step. Every input can be given as a flag
//! or through the environment variable the CI step runner sets.

use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vdtest_ios::{
    Config, ConfigLayer, EnvmanExporter, HttpTransport, Pipeline, PipelineConfig, PipelineError,
    Secret,
};

#[derive(Parser)]
#[command(name = "vdtest-ios")]
#[command(about = "Run iOS tests on a remote virtual device farm", version)]
struct Cli {
    /// TOML file with default inputs
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Never color the results table
    #[arg(long)]
    no_color: bool,

    /// Base URL of the device farm API
    #[arg(long, env = "api_base_url")]
    api_base_url: Option<String>,

    /// API access token
    #[arg(long, env = "api_token", hide_env_values = true)]
    api_token: Option<String>,

    /// Build identifier
    #[arg(long, env = "BITRISE_BUILD_SLUG")]
    build_slug: Option<String>,

    /// App identifier
    #[arg(long, env = "BITRISE_APP_SLUG")]
    app_slug: Option<String>,

    /// Test bundle zip (build products and .xctestrun)
    #[arg(long, env = "zip_path")]
    zip_path: Option<PathBuf>,

    /// Newline separated `model,version,locale,orientation` lines
    #[arg(long, env = "test_devices")]
    test_devices: Option<String>,

    /// Test timeout in seconds (max 2700)
    #[arg(long, env = "test_timeout")]
    test_timeout: Option<f64>,

    /// Reruns of failed tests (max 10)
    #[arg(long, env = "flaky_test_attempts")]
    flaky_test_attempts: Option<u32>,

    /// Download test assets after the run
    #[arg(long, env = "download_test_results")]
    download_test_results: Option<bool>,

    /// JSON list of quarantined tests to skip
    #[arg(long, env = "BITRISE_QUARANTINED_TESTS_JSON")]
    quarantined_tests: Option<String>,

    /// Seconds between status polls
    #[arg(long, env = "poll_interval_seconds")]
    poll_interval_seconds: Option<u64>,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            api_base_url: self.api_base_url.clone(),
            api_token: self.api_token.clone().map(Secret::new),
            build_slug: self.build_slug.clone(),
            app_slug: self.app_slug.clone(),
            zip_path: self.zip_path.clone(),
            test_devices: self.test_devices.clone(),
            test_timeout: self.test_timeout,
            flaky_test_attempts: self.flaky_test_attempts,
            download_test_results: self.download_test_results,
            quarantined_tests: self.quarantined_tests.clone(),
            poll_interval_seconds: self.poll_interval_seconds,
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::resolve(&cli.layer(), cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Process config: {}", err);
            process::exit(PipelineError::from(err).exit_code());
        }
    };

    let options = PipelineConfig {
        colored: !cli.no_color && io::stdout().is_terminal(),
    };
    let mut pipeline = Pipeline::new(
        config,
        options,
        HttpTransport::default(),
        EnvmanExporter::new(),
        io::stdout(),
    );

    match pipeline.run() {
        Ok(report) => process::exit(report.exit_code()),
        Err(err) => {
            error!("{}", err);
            process::exit(err.exit_code());
        }
    }
}
