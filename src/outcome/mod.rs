//! Step outcomes, per-dimension verdicts and the results table

mod aggregate;
mod classify;
mod table;

pub use aggregate::{DimensionKey, OutcomeAggregator, Verdict};
pub use classify::Outcome;
pub use table::{OutcomeStyles, ResultsTable};
