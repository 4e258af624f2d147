//! Per-dimension verdicts

use std::collections::BTreeMap;
use std::fmt;

use crate::api::model::{
    Step, DIMENSION_LOCALE, DIMENSION_MODEL, DIMENSION_ORIENTATION, DIMENSION_VERSION,
};

use super::Outcome;

/// Device configuration identity shared by retried steps
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionKey {
    pub model: String,
    pub os_version: String,
    pub orientation: String,
    pub locale: String,
}

impl DimensionKey {
    pub fn new(
        model: impl Into<String>,
        os_version: impl Into<String>,
        orientation: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            os_version: os_version.into(),
            orientation: orientation.into(),
            locale: locale.into(),
        }
    }

    pub fn from_step(step: &Step) -> Self {
        Self::new(
            step.dimension(DIMENSION_MODEL),
            step.dimension(DIMENSION_VERSION),
            step.dimension(DIMENSION_ORIENTATION),
            step.dimension(DIMENSION_LOCALE),
        )
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.model, self.os_version, self.orientation, self.locale
        )
    }
}

/// Final result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub all_passed: bool,
    /// Dimensions where no step succeeded, in key order
    pub failing_dimensions: Vec<DimensionKey>,
}

/// Folds step outcomes into one pass/fail verdict per dimension.
///
/// A dimension passes when at least one of its steps succeeded. Once passing
/// it never goes back to failing.
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    verdicts: BTreeMap<DimensionKey, bool>,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, key: DimensionKey, outcome: &Outcome) {
        let passed = outcome.is_success();
        let verdict = self.verdicts.entry(key).or_insert(passed);
        if passed {
            *verdict = true;
        }
    }

    /// Classify a step and record it under its dimension
    pub fn record_step(&mut self, step: &Step) -> Outcome {
        let outcome = Outcome::classify(step);
        self.record_outcome(DimensionKey::from_step(step), &outcome);
        outcome
    }

    pub fn verdict_for(&self, key: &DimensionKey) -> Option<bool> {
        self.verdicts.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn final_verdict(&self) -> Verdict {
        let failing_dimensions: Vec<DimensionKey> = self
            .verdicts
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(key, _)| key.clone())
            .collect();

        Verdict {
            all_passed: failing_dimensions.is_empty(),
            failing_dimensions,
        }
    }
}
