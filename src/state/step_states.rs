//! Step state timeline
//!
//! The device farm only reports snapshots ("this step is in state X right
//! now"), so each state's start time is the first poll that saw it. Later
//! sightings of the same state never move that time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::api::model::{
    Step, DIMENSION_LOCALE, DIMENSION_MODEL, DIMENSION_ORIENTATION, DIMENSION_VERSION,
};

/// First-seen times of every lifecycle state observed for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStateRecord {
    display_name: String,
    /// In observation order
    first_seen: Vec<(String, DateTime<Utc>)>,
}

/// Time spent in one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDuration {
    pub state: String,
    /// Whole seconds, rounded to nearest
    pub seconds: i64,
}

impl StepStateRecord {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            first_seen: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Store `at` as the start of `state` unless the state was already seen.
    /// Returns true when the time was stored.
    pub fn record(&mut self, state: &str, at: DateTime<Utc>) -> bool {
        if self.first_seen(state).is_some() {
            return false;
        }
        self.first_seen.push((state.to_string(), at));
        true
    }

    pub fn first_seen(&self, state: &str) -> Option<DateTime<Utc>> {
        self.first_seen
            .iter()
            .find(|(seen, _)| seen == state)
            .map(|(_, at)| *at)
    }

    /// States ordered by first-seen time, ties in observation order
    pub fn timeline(&self) -> Vec<(&str, DateTime<Utc>)> {
        let mut states: Vec<(&str, DateTime<Utc>)> = self
            .first_seen
            .iter()
            .map(|(state, at)| (state.as_str(), *at))
            .collect();
        states.sort_by_key(|(_, at)| *at);
        states
    }

    /// Time spent in each state. A state ends when the next one was first
    /// seen; the last state ends at `as_of`.
    pub fn durations(&self, as_of: DateTime<Utc>) -> Vec<StateDuration> {
        let timeline = self.timeline();
        timeline
            .iter()
            .enumerate()
            .map(|(i, (state, start))| {
                let end = timeline.get(i + 1).map(|(_, next)| *next).unwrap_or(as_of);
                StateDuration {
                    state: state.to_string(),
                    seconds: round_to_seconds(end - *start),
                }
            })
            .collect()
    }
}

/// Human-readable step name including its dimensions
pub fn step_display_name(step: &Step) -> String {
    format!(
        "{} ({} {} {} {})",
        step.name,
        step.dimension(DIMENSION_MODEL),
        step.dimension(DIMENSION_VERSION),
        step.dimension(DIMENSION_ORIENTATION),
        step.dimension(DIMENSION_LOCALE)
    )
}

/// Tracks state timelines for every step of one test run
#[derive(Debug, Clone, Default)]
pub struct StepStateTracker {
    steps: BTreeMap<String, StepStateRecord>,
}

impl StepStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `step_id` was in `state` at `observed_at`.
    /// `display_name` is only used the first time the step is seen.
    pub fn record_observation(
        &mut self,
        step_id: &str,
        display_name: impl FnOnce() -> String,
        state: &str,
        observed_at: DateTime<Utc>,
    ) -> bool {
        self.steps
            .entry(step_id.to_string())
            .or_insert_with(|| StepStateRecord::new(display_name()))
            .record(state, observed_at)
    }

    /// Record a step snapshot from the API
    pub fn observe(&mut self, step: &Step, observed_at: DateTime<Utc>) -> bool {
        self.record_observation(
            &step.step_id,
            || step_display_name(step),
            &step.state,
            observed_at,
        )
    }

    /// Record every step of one poll
    pub fn observe_all(&mut self, steps: &[Step], observed_at: DateTime<Utc>) {
        for step in steps {
            self.observe(step, observed_at);
        }
    }

    pub fn get(&self, step_id: &str) -> Option<&StepStateRecord> {
        self.steps.get(step_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Write each step's state durations, steps ordered by id.
    /// Stops at the first write error.
    pub fn render<W: Write>(&self, as_of: DateTime<Utc>, sink: &mut W) -> io::Result<()> {
        for record in self.steps.values() {
            writeln!(sink, "{}", record.display_name())?;
            for duration in record.durations(as_of) {
                writeln!(
                    sink,
                    "- time spent in {} state: ~{}",
                    duration.state,
                    format_seconds(duration.seconds)
                )?;
            }
        }
        Ok(())
    }
}

fn round_to_seconds(delta: chrono::Duration) -> i64 {
    let millis = delta.num_milliseconds().max(0);
    (millis + 500) / 1000
}

/// Format whole seconds as `1h2m3s`, `1m0s`, `30s`, `0s`
pub fn format_seconds(total: i64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::model::StepDimensionValue;
    use chrono::{Duration, TimeZone};

    fn ref_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 1, 1, 12, 30, 0).unwrap()
    }

    fn step(id: &str, state: &str) -> Step {
        Step {
            step_id: id.to_string(),
            name: "iOS Tests".to_string(),
            state: state.to_string(),
            dimension_value: vec![
                StepDimensionValue {
                    key: "Model".to_string(),
                    value: "iphone8".to_string(),
                },
                StepDimensionValue {
                    key: "Version".to_string(),
                    value: "16.6".to_string(),
                },
                StepDimensionValue {
                    key: "Orientation".to_string(),
                    value: "portrait".to_string(),
                },
                StepDimensionValue {
                    key: "Locale".to_string(),
                    value: "en".to_string(),
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_first_timestamp_wins() {
        let mut tracker = StepStateTracker::new();
        let t0 = ref_time();

        assert!(tracker.observe(&step("S1", "pending"), t0));
        assert!(!tracker.observe(&step("S1", "pending"), t0 + Duration::seconds(5)));

        let record = tracker.get("S1").unwrap();
        assert_eq!(record.first_seen("pending"), Some(t0));
    }

    #[test]
    fn test_display_name_from_first_sighting() {
        let mut tracker = StepStateTracker::new();
        tracker.observe(&step("S1", "pending"), ref_time());

        let mut renamed = step("S1", "inProgress");
        renamed.name = "Renamed".to_string();
        tracker.observe(&renamed, ref_time());

        assert_eq!(
            tracker.get("S1").unwrap().display_name(),
            "iOS Tests (iphone8 16.6 portrait en)"
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_durations() {
        let t0 = ref_time();
        let mut record = StepStateRecord::new("iOS Tests");
        record.record("complete", t0 + Duration::seconds(90));
        record.record("pending", t0);
        record.record("inProgress", t0 + Duration::seconds(60));

        let durations = record.durations(t0 + Duration::seconds(90));
        let got: Vec<(&str, i64)> = durations
            .iter()
            .map(|d| (d.state.as_str(), d.seconds))
            .collect();
        assert_eq!(got, vec![("pending", 60), ("inProgress", 30), ("complete", 0)]);
    }

    #[test]
    fn test_durations_round_to_nearest_second() {
        let t0 = ref_time();
        let mut record = StepStateRecord::new("s");
        record.record("pending", t0);
        record.record("inProgress", t0 + Duration::milliseconds(1499));

        let durations = record.durations(t0 + Duration::milliseconds(3500));
        assert_eq!(durations[0].seconds, 1);
        assert_eq!(durations[1].seconds, 2);
    }

    #[test]
    fn test_last_state_before_as_of_is_zero() {
        let t0 = ref_time();
        let mut record = StepStateRecord::new("s");
        record.record("pending", t0);
        assert_eq!(record.durations(t0 - Duration::seconds(3))[0].seconds, 0);
    }

    #[test]
    fn test_render() {
        let t0 = ref_time();
        let mut tracker = StepStateTracker::new();
        tracker.record_observation("ID_2", || "iOS Unit Tests".to_string(), "pending", t0);
        tracker.record_observation(
            "ID_2",
            || unreachable!(),
            "inProgress",
            t0 + Duration::seconds(40),
        );
        tracker.record_observation("ID_2", || unreachable!(), "complete", t0 + Duration::seconds(90));
        tracker.record_observation("ID_1", || "iOS Tests".to_string(), "pending", t0);
        tracker.record_observation("ID_1", || unreachable!(), "inProgress", t0 + Duration::seconds(60));
        tracker.record_observation("ID_1", || unreachable!(), "complete", t0 + Duration::seconds(90));

        let mut out = Vec::new();
        tracker.render(t0 + Duration::seconds(90), &mut out).unwrap();

        let expected = "\
iOS Tests
- time spent in pending state: ~1m0s
- time spent in inProgress state: ~30s
- time spent in complete state: ~0s
iOS Unit Tests
- time spent in pending state: ~40s
- time spent in inProgress state: ~50s
- time spent in complete state: ~0s
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    struct FailAfter {
        writes_left: usize,
        written: Vec<u8>,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.writes_left == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.writes_left -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_render_stops_on_write_error() {
        let mut tracker = StepStateTracker::new();
        tracker.observe(&step("S1", "pending"), ref_time());
        tracker.observe(&step("S2", "pending"), ref_time());

        let mut sink = FailAfter {
            writes_left: 1,
            written: Vec::new(),
        };
        assert!(tracker.render(ref_time(), &mut sink).is_err());
        assert!(!String::from_utf8_lossy(&sink.written).contains("time spent"));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(59), "59s");
        assert_eq!(format_seconds(60), "1m0s");
        assert_eq!(format_seconds(3723), "1h2m3s");
        assert_eq!(format_seconds(3600), "1h0m0s");
    }
}
