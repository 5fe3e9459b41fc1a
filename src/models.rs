//! Data models for the form audit analyzer.
//!
//! This module contains the core data structures used throughout
//! the application for representing audit events, per-submission
//! aggregates, flags, and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single row of a form audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event type, e.g. `question`, `form start`, `end screen`.
    pub event_type: String,
    /// Identifier of the submission (instance) the event belongs to.
    pub submission_id: String,
    /// Form field (node) name, still carrying its path prefix.
    pub field_name: String,
    /// Interaction start timestamp.
    pub start_time: f64,
    /// Interaction end timestamp.
    pub end_time: f64,
    /// Previous answer, when the log tracks value changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
}

impl EventRecord {
    /// Creates a record without change tracking.
    pub fn new(
        event_type: impl Into<String>,
        submission_id: impl Into<String>,
        field_name: impl Into<String>,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            submission_id: submission_id.into(),
            field_name: field_name.into(),
            start_time,
            end_time,
            old_value: None,
        }
    }

    /// Time spent on the event. Negative when `end < start`.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether the event replaced an earlier answer.
    pub fn changed_answer(&self) -> bool {
        self.old_value.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// Accumulated statistics for one field within one submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStat {
    /// Sum of all question event durations on the field.
    pub total_duration: f64,
    /// Number of question events on the field.
    pub occurrence_count: u32,
    /// Number of events that overwrote a previous answer.
    pub answer_changes: u32,
}

impl FieldStat {
    /// Adds one question event to the statistic.
    pub fn record(&mut self, event: &EventRecord) {
        self.total_duration += event.duration();
        self.occurrence_count += 1;
        if event.changed_answer() {
            self.answer_changes += 1;
        }
    }
}

/// Per-field statistics for a single submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAggregate {
    pub fields: BTreeMap<String, FieldStat>,
}

impl SubmissionAggregate {
    /// Returns the stat for `field_name`, inserting an empty one if absent.
    pub fn field_mut(&mut self, field_name: &str) -> &mut FieldStat {
        self.fields.entry(field_name.to_string()).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldStat)> {
        self.fields.iter()
    }
}

/// Aggregates keyed by submission id.
pub type Submissions = BTreeMap<String, SubmissionAggregate>;

/// Average total duration per field across submissions.
pub type GlobalFieldAverages = BTreeMap<String, f64>;

/// Divisor used when averaging a field's total duration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AverageMode {
    /// Divide by every submission in the log, whether or not it has the field.
    #[default]
    All,
    /// Divide by the submissions that actually contain the field.
    Containing,
}

impl fmt::Display for AverageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageMode::All => write!(f, "all submissions"),
            AverageMode::Containing => write!(f, "submissions containing the field"),
        }
    }
}

/// A submission whose time on a field strays too far from the average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierFlag {
    pub submission_id: String,
    pub field_name: String,
    pub total_duration: f64,
    pub average: f64,
    /// Absolute distance between `total_duration` and `average`.
    pub deviation: f64,
}

/// A field visited repeatedly within one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentChangeFlag {
    pub submission_id: String,
    pub field_name: String,
    pub occurrence_count: u32,
}

/// One line of the averages section, with the display name already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAverage {
    pub field_name: String,
    pub value: f64,
}

/// Metadata about an audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the analyzed file or directory.
    pub input: String,
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Number of distinct submissions.
    pub submissions: usize,
    /// Number of question events aggregated.
    pub question_events: usize,
    /// Question rows dropped for lacking a submission id or field name.
    pub skipped_rows: usize,
    /// Outlier threshold in timestamp units.
    pub outlier_threshold: f64,
    /// Minimum occurrence count for a frequent-change flag.
    pub min_changes: u32,
    /// How field averages were divided.
    pub average_mode: AverageMode,
}

/// The complete audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub metadata: ReportMetadata,
    /// Average input time per field.
    pub averages: Vec<FieldAverage>,
    /// Empty when the input had no submission ids.
    pub outliers: Vec<OutlierFlag>,
    /// Empty when the input had no submission ids.
    pub frequent_changes: Vec<FrequentChangeFlag>,
    /// Present only when the log carried previous answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_changes: Option<Vec<FieldAverage>>,
    /// False for the per-event averages variant.
    pub per_submission: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_duration_allows_negative() {
        let event = EventRecord::new("question", "uuid:1", "/data/age", 500.0, 200.0);
        assert_eq!(event.duration(), -300.0);
    }

    #[test]
    fn test_changed_answer() {
        let mut event = EventRecord::new("question", "uuid:1", "/data/age", 0.0, 1.0);
        assert!(!event.changed_answer());

        event.old_value = Some(String::new());
        assert!(!event.changed_answer());

        event.old_value = Some("42".to_string());
        assert!(event.changed_answer());
    }

    #[test]
    fn test_field_stat_record() {
        let mut stat = FieldStat::default();
        stat.record(&EventRecord::new("question", "a", "/data/x", 100.0, 250.0));
        stat.record(&EventRecord::new("question", "a", "/data/x", 300.0, 400.0));

        assert_eq!(stat.total_duration, 250.0);
        assert_eq!(stat.occurrence_count, 2);
        assert_eq!(stat.answer_changes, 0);
    }

    #[test]
    fn test_field_mut_inserts_default() {
        let mut aggregate = SubmissionAggregate::default();
        assert!(aggregate.fields.get("/data/x").is_none());

        let stat = aggregate.field_mut("/data/x");
        assert_eq!(*stat, FieldStat::default());
        stat.occurrence_count += 1;

        assert_eq!(aggregate.fields["/data/x"].occurrence_count, 1);
    }

    #[test]
    fn test_average_mode_serde() {
        let json = serde_json::to_string(&AverageMode::Containing).unwrap();
        assert_eq!(json, "\"containing\"");
        assert_eq!(AverageMode::default(), AverageMode::All);
    }
}
