//! Audit log analysis.
//!
//! [`analyze`] drives the aggregation pipeline over a loaded log and
//! assembles the report sections.

pub mod aggregator;

pub use aggregator::*;

use crate::error::Result;
use crate::input::AuditLog;
use crate::models::{AuditReport, AverageMode, FieldAverage, ReportMetadata};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

/// Tunable parameters of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub question_event: String,
    pub outlier_threshold: f64,
    pub min_changes: u32,
    pub prefix_len: usize,
    pub average_mode: AverageMode,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            question_event: QUESTION_EVENT.to_string(),
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            min_changes: DEFAULT_MIN_CHANGES,
            prefix_len: DEFAULT_PREFIX_LEN,
            average_mode: AverageMode::default(),
        }
    }
}

impl From<&crate::config::Config> for AnalysisSettings {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            question_event: config.input.question_event.clone(),
            outlier_threshold: config.analysis.outlier_threshold,
            min_changes: config.analysis.min_changes,
            prefix_len: config.analysis.prefix_len,
            average_mode: config.analysis.average_mode,
        }
    }
}

/// Run the full pipeline over `log`.
///
/// Logs without submission ids only get the per-event averages section.
pub fn analyze(log: &AuditLog, settings: &AnalysisSettings) -> Result<AuditReport> {
    let display = |field: &str| format_field_name(field, settings.prefix_len).to_string();

    let mut metadata = ReportMetadata {
        input: log.source.clone(),
        analysis_date: Utc::now(),
        submissions: 0,
        question_events: 0,
        skipped_rows: log.skipped_rows,
        outlier_threshold: settings.outlier_threshold,
        min_changes: settings.min_changes,
        average_mode: settings.average_mode,
    };

    if !log.has_submission_ids {
        info!("No submission ids in input; reporting per-event averages only");
        let averages = event_averages(&log.records, &settings.question_event)?;
        metadata.question_events = log.records.len();

        return Ok(AuditReport {
            metadata,
            averages: to_field_averages(averages, display),
            outliers: Vec::new(),
            frequent_changes: Vec::new(),
            answer_changes: None,
            per_submission: false,
        });
    }

    let mut aggregator = Aggregator::new(settings.question_event.clone());
    aggregator.ingest(&log.records);
    metadata.question_events = aggregator.question_events();
    metadata.submissions = aggregator.submissions().len();
    let submissions = aggregator.into_submissions();

    let averages = compute_global_averages(&submissions, settings.average_mode)?;
    let mut outliers = detect_outliers(&submissions, &averages, settings.outlier_threshold)?;
    let mut frequent_changes = detect_frequent_changes(&submissions, settings.min_changes);

    for flag in &mut outliers {
        flag.field_name = display(&flag.field_name);
    }
    for flag in &mut frequent_changes {
        flag.field_name = display(&flag.field_name);
    }

    let answer_changes = log
        .tracks_changes
        .then(|| to_field_averages(average_answer_changes(&submissions), display));

    info!(
        "Analyzed {} submissions: {} outliers, {} frequent changes",
        metadata.submissions,
        outliers.len(),
        frequent_changes.len()
    );

    Ok(AuditReport {
        metadata,
        averages: to_field_averages(averages, display),
        outliers,
        frequent_changes,
        answer_changes,
        per_submission: true,
    })
}

fn to_field_averages(
    values: BTreeMap<String, f64>,
    display: impl Fn(&str) -> String,
) -> Vec<FieldAverage> {
    values
        .into_iter()
        .map(|(field, value)| FieldAverage {
            field_name: display(&field),
            value,
        })
        .collect()
}
