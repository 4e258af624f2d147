//! Status polling
//!
//! Polls the step list until every step is complete. Each response is fed to
//! the [`StepStateTracker`] before the run phase is evaluated.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, ListStepsResponse, Transport};
use crate::state::StepStateTracker;

/// Where the remote run is, derived from one step list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No steps exist yet
    Validating,
    /// At least one step is not complete
    Running { running: usize, total: usize },
    /// Every step is complete
    Finished { total: usize },
}

impl RunPhase {
    pub fn from_response(response: &ListStepsResponse) -> Self {
        let total = response.steps.len();
        if total == 0 {
            return RunPhase::Validating;
        }
        match response.running_count() {
            0 => RunPhase::Finished { total },
            running => RunPhase::Running { running, total },
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunPhase::Finished { .. })
    }

    pub fn progress_message(&self) -> String {
        match self {
            RunPhase::Validating => "- Validating".to_string(),
            RunPhase::Running { running, total } => format!("- ({}/{}) running", running, total),
            RunPhase::Finished { total } => format!("- (0/{}) running", total),
        }
    }
}

/// Suppresses progress messages that were already printed once
#[derive(Debug, Default)]
pub struct ProgressLog {
    printed: HashSet<String>,
    history: Vec<String>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `message` has not been seen before and records it
    pub fn should_print(&mut self, message: &str) -> bool {
        if self.printed.contains(message) {
            return false;
        }
        self.printed.insert(message.to_string());
        self.history.push(message.to_string());
        true
    }

    /// Messages in the order they were first printed
    pub fn history(&self) -> &[String] {
        &self.history
    }
}

/// Polling loop for one test run
pub struct RunPoller<'a, T: Transport> {
    client: &'a ApiClient<T>,
    interval: Duration,
    clock: fn() -> DateTime<Utc>,
    progress: ProgressLog,
}

impl<'a, T: Transport> RunPoller<'a, T> {
    pub fn new(client: &'a ApiClient<T>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            clock: Utc::now,
            progress: ProgressLog::new(),
        }
    }

    /// Replace the wall clock used to timestamp observations
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn progress(&self) -> &ProgressLog {
        &self.progress
    }

    /// Poll until the run is finished and return the final step list.
    /// A status request that fails twice in a row ends polling with an error.
    pub fn poll_until_finished(
        &mut self,
        tracker: &mut StepStateTracker,
    ) -> Result<ListStepsResponse, ApiError> {
        loop {
            let response = self.client.fetch_steps()?;
            tracker.observe_all(&response.steps, (self.clock)());

            let phase = RunPhase::from_response(&response);
            let message = phase.progress_message();
            if self.progress.should_print(&message) {
                info!("{}", message);
            }

            if phase.is_finished() {
                info!("=> Test finished");
                return Ok(response);
            }

            debug!(interval_secs = self.interval.as_secs(), "waiting before next status poll");
            if !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
    }
}
