//! Per-field response time aggregation.
//!
//! Groups question events by submission and field, then derives the
//! cross-submission averages, outlier flags and frequent-change flags
//! that make up an audit report. The stages form a linear pipeline:
//! [`Aggregator::ingest`] → [`compute_global_averages`] →
//! [`detect_outliers`] → [`detect_frequent_changes`].

use crate::error::{AuditError, Result};
use crate::models::{
    AverageMode, EventRecord, FrequentChangeFlag, GlobalFieldAverages, OutlierFlag,
    SubmissionAggregate, Submissions,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Deviation from the field average, in timestamp units, above which a
/// submission is flagged.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 4000.0;

/// Visits to one field after which a submission is flagged.
pub const DEFAULT_MIN_CHANGES: u32 = 2;

/// Length of the path prefix on logged field names (`/data/`).
pub const DEFAULT_PREFIX_LEN: usize = 6;

/// Event type carrying field timings.
pub const QUESTION_EVENT: &str = "question";

/// Accumulates question events into per-submission field statistics.
///
/// One aggregator serves one run; nothing is shared between runs.
#[derive(Debug, Clone)]
pub struct Aggregator {
    question_event: String,
    submissions: Submissions,
    question_events: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(QUESTION_EVENT)
    }
}

impl Aggregator {
    /// Create an aggregator that keeps events of type `question_event`.
    pub fn new(question_event: impl Into<String>) -> Self {
        Self {
            question_event: question_event.into(),
            submissions: Submissions::new(),
            question_events: 0,
        }
    }

    /// Add every question event in `records` to the running totals.
    ///
    /// Durations are summed as-is, so an event whose end precedes its
    /// start reduces the field total.
    pub fn ingest<'a>(&mut self, records: impl IntoIterator<Item = &'a EventRecord>) {
        for record in records {
            if record.event_type != self.question_event {
                continue;
            }

            self.submission_mut(&record.submission_id)
                .field_mut(&record.field_name)
                .record(record);
            self.question_events += 1;
        }
    }

    /// Returns the aggregate for `submission_id`, inserting an empty one if absent.
    fn submission_mut(&mut self, submission_id: &str) -> &mut SubmissionAggregate {
        self.submissions
            .entry(submission_id.to_string())
            .or_default()
    }

    pub fn submissions(&self) -> &Submissions {
        &self.submissions
    }

    /// Number of question events ingested so far.
    pub fn question_events(&self) -> usize {
        self.question_events
    }

    pub fn into_submissions(self) -> Submissions {
        self.submissions
    }
}

/// Average each field's total duration across submissions.
///
/// With [`AverageMode::All`] the divisor is the number of submissions in
/// the log, including those that never reached the field. With
/// [`AverageMode::Containing`] it is the number of submissions that have
/// the field.
pub fn compute_global_averages(
    submissions: &Submissions,
    mode: AverageMode,
) -> Result<GlobalFieldAverages> {
    if submissions.is_empty() {
        return Err(AuditError::EmptyInput(
            "no question events found".to_string(),
        ));
    }

    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for aggregate in submissions.values() {
        for (field, stat) in aggregate.iter() {
            let entry = totals.entry(field.clone()).or_default();
            entry.0 += stat.total_duration;
            entry.1 += 1;
        }
    }

    let submission_count = submissions.len();
    let averages = totals
        .into_iter()
        .map(|(field, (total, containing))| {
            let divisor = match mode {
                AverageMode::All => submission_count,
                AverageMode::Containing => containing,
            };
            (field, total / divisor as f64)
        })
        .collect();

    debug!(
        "Computed averages over {} submissions ({})",
        submission_count, mode
    );
    Ok(averages)
}

/// Flag every submission whose total on a field differs from the field
/// average by strictly more than `threshold`.
pub fn detect_outliers(
    submissions: &Submissions,
    averages: &GlobalFieldAverages,
    threshold: f64,
) -> Result<Vec<OutlierFlag>> {
    let mut flags = Vec::new();

    for (submission_id, aggregate) in submissions {
        for (field, stat) in aggregate.iter() {
            let average = *averages.get(field).ok_or_else(|| {
                AuditError::EmptyInput(format!("no average computed for field '{}'", field))
            })?;

            let deviation = (stat.total_duration - average).abs();
            if deviation > threshold {
                flags.push(OutlierFlag {
                    submission_id: submission_id.clone(),
                    field_name: field.clone(),
                    total_duration: stat.total_duration,
                    average,
                    deviation,
                });
            }
        }
    }

    Ok(flags)
}

/// Flag every field visited at least `min_changes` times within a submission.
pub fn detect_frequent_changes(
    submissions: &Submissions,
    min_changes: u32,
) -> Vec<FrequentChangeFlag> {
    submissions
        .iter()
        .flat_map(|(submission_id, aggregate)| {
            aggregate
                .iter()
                .filter(move |(_, stat)| stat.occurrence_count >= min_changes)
                .map(move |(field, stat)| FrequentChangeFlag {
                    submission_id: submission_id.clone(),
                    field_name: field.clone(),
                    occurrence_count: stat.occurrence_count,
                })
        })
        .collect()
}

/// Strip the fixed-length path prefix from a logged field name.
///
/// The prefix is counted in characters. A name exactly as long as the
/// prefix becomes empty; names shorter than the prefix carry none and are
/// returned unchanged.
pub fn format_field_name(field_name: &str, prefix_len: usize) -> &str {
    match field_name.char_indices().nth(prefix_len) {
        Some((offset, _)) => &field_name[offset..],
        None if field_name.chars().count() == prefix_len => "",
        None => field_name,
    }
}

/// Mean duration of individual question events per field.
///
/// Used for logs without submission ids, where totals per submission
/// cannot be formed.
pub fn event_averages<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
    question_event: &str,
) -> Result<GlobalFieldAverages> {
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for record in records {
        if record.event_type != question_event {
            continue;
        }
        let entry = totals.entry(record.field_name.clone()).or_default();
        entry.0 += record.duration();
        entry.1 += 1;
    }

    if totals.is_empty() {
        return Err(AuditError::EmptyInput(
            "no question events found".to_string(),
        ));
    }

    Ok(totals
        .into_iter()
        .map(|(field, (total, count))| (field, total / count as f64))
        .collect())
}

/// Mean number of answer changes per field, over submissions that have the field.
pub fn average_answer_changes(submissions: &Submissions) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, (u32, usize)> = BTreeMap::new();

    for aggregate in submissions.values() {
        for (field, stat) in aggregate.iter() {
            let entry = totals.entry(field.clone()).or_default();
            entry.0 += stat.answer_changes;
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(field, (changes, count))| (field, changes as f64 / count as f64))
        .collect()
}
