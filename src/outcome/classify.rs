//! Step outcome classification

use std::fmt;

use crate::api::model::{FailureDetail, InconclusiveDetail, SkippedDetail, Step};

/// Classified result of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureDetail),
    Inconclusive(InconclusiveDetail),
    Skipped(SkippedDetail),
}

impl Outcome {
    /// Classify a step from its reported outcome.
    ///
    /// A "failure" whose suite overviews report no failed and no errored
    /// cases is a success. A missing or unknown summary is inconclusive.
    pub fn classify(step: &Step) -> Self {
        let Some(outcome) = step.outcome.as_ref() else {
            return Outcome::Inconclusive(InconclusiveDetail::default());
        };

        match outcome.summary.as_str() {
            "success" => Outcome::Success,
            "failure" => {
                if has_clean_overviews(step) {
                    Outcome::Success
                } else {
                    Outcome::Failure(outcome.failure_detail.unwrap_or_default())
                }
            }
            "skipped" => Outcome::Skipped(outcome.skipped_detail.unwrap_or_default()),
            _ => Outcome::Inconclusive(outcome.inconclusive_detail.unwrap_or_default()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(_) => "failure",
            Outcome::Inconclusive(_) => "inconclusive",
            Outcome::Skipped(_) => "skipped",
        }
    }

    /// Summary plus one `(Reason)` suffix per set detail flag
    pub fn label(&self) -> String {
        let reasons: Vec<&str> = match self {
            Outcome::Success => Vec::new(),
            Outcome::Failure(d) => flagged(&[
                (d.crashed, "Crashed"),
                (d.not_installed, "NotInstalled"),
                (d.other_native_crash, "OtherNativeCrash"),
                (d.timed_out, "TimedOut"),
                (d.unable_to_crawl, "UnableToCrawl"),
            ]),
            Outcome::Inconclusive(d) => flagged(&[
                (d.aborted_by_user, "AbortedByUser"),
                (d.infrastructure_failure, "InfrastructureFailure"),
            ]),
            Outcome::Skipped(d) => flagged(&[
                (d.incompatible_app_version, "IncompatibleAppVersion"),
                (d.incompatible_architecture, "IncompatibleArchitecture"),
                (d.incompatible_device, "IncompatibleDevice"),
            ]),
        };

        let mut label = self.summary().to_string();
        for reason in reasons {
            label.push('(');
            label.push_str(reason);
            label.push(')');
        }
        label
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

fn flagged<'a>(flags: &[(bool, &'a str)]) -> Vec<&'a str> {
    flags
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| *name)
        .collect()
}

fn has_clean_overviews(step: &Step) -> bool {
    let overviews = step.suite_overviews();
    if overviews.is_empty() {
        return false;
    }
    let failures: i64 = overviews.iter().map(|o| o.failure_count).sum();
    let errors: i64 = overviews.iter().map(|o| o.error_count).sum();
    failures == 0 && errors == 0
}
