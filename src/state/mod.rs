//! Per-step lifecycle state tracking
//!
//! Reconstructs each step's state timeline (pending → inProgress → complete)
//! from repeated status snapshots.

mod step_states;

pub use step_states::{
    format_seconds, step_display_name, StateDuration, StepStateRecord, StepStateTracker,
};
