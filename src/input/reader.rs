//! CSV audit log reader.
//!
//! Audit exports are small enough to read whole, so the file is loaded
//! into memory and split into records with a quote-aware scanner.
//! Only question rows are validated: form-level events routinely leave
//! the timestamp columns blank.

use super::AuditLog;
use crate::error::{AuditError, Result};
use crate::models::EventRecord;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Column names and event labels used when reading a log.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    pub event_column: String,
    pub instance_column: String,
    pub node_column: String,
    pub start_column: String,
    pub end_column: String,
    pub old_value_column: String,
    /// Event type whose rows carry field timings.
    pub question_event: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            event_column: "event".to_string(),
            instance_column: "instanceID".to_string(),
            node_column: "node".to_string(),
            start_column: "start".to_string(),
            end_column: "end".to_string(),
            old_value_column: "old-value".to_string(),
            question_event: "question".to_string(),
        }
    }
}

impl From<&crate::config::InputConfig> for ReaderConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            event_column: config.event_column.clone(),
            instance_column: config.instance_column.clone(),
            node_column: config.node_column.clone(),
            start_column: config.start_column.clone(),
            end_column: config.end_column.clone(),
            old_value_column: config.old_value_column.clone(),
            question_event: config.question_event.clone(),
        }
    }
}

/// One CSV record and the physical line it starts on (1-indexed).
#[derive(Debug, Clone, PartialEq)]
struct CsvRow {
    line: usize,
    fields: Vec<String>,
}

/// Header positions resolved once per file.
struct Columns {
    event: usize,
    instance: Option<usize>,
    node: usize,
    start: usize,
    end: usize,
    old_value: Option<usize>,
}

impl Columns {
    fn resolve(header: &[String], config: &ReaderConfig, path: &Path) -> Result<Self> {
        let index: HashMap<&str, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let required = |name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| AuditError::MissingColumn {
                    column: name.to_string(),
                    path: path.to_path_buf(),
                })
        };

        Ok(Self {
            event: required(config.event_column.as_str())?,
            node: required(config.node_column.as_str())?,
            start: required(config.start_column.as_str())?,
            end: required(config.end_column.as_str())?,
            instance: index.get(config.instance_column.as_str()).copied(),
            old_value: index.get(config.old_value_column.as_str()).copied(),
        })
    }
}

/// Load the events of one audit file.
///
/// `fallback_submission` names the submission for files without an
/// instance column (one file per submission). Without it, such files
/// load with empty submission ids and `has_submission_ids == false`.
pub fn load_events(
    path: &Path,
    config: &ReaderConfig,
    fallback_submission: Option<&str>,
) -> Result<AuditLog> {
    let content = std::fs::read_to_string(path)?;
    let mut log = parse_events(&content, config, fallback_submission, path)?;
    log.source = path.display().to_string();

    debug!(
        "Loaded {} question events from {} ({} skipped)",
        log.records.len(),
        path.display(),
        log.skipped_rows
    );

    Ok(log)
}

/// Parse the CSV text of an audit log. `path` is only used in errors.
pub fn parse_events(
    content: &str,
    config: &ReaderConfig,
    fallback_submission: Option<&str>,
    path: &Path,
) -> Result<AuditLog> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut rows = split_records(content).into_iter();

    let header = match rows.next() {
        Some(row) => row.fields,
        None => {
            return Err(AuditError::EmptyInput(format!(
                "{} has no header row",
                path.display()
            )))
        }
    };
    let columns = Columns::resolve(&header, config, path)?;

    let mut log = AuditLog {
        has_submission_ids: columns.instance.is_some() || fallback_submission.is_some(),
        tracks_changes: columns.old_value.is_some(),
        ..AuditLog::default()
    };

    for row in rows {
        let field = |i: usize| row.fields.get(i).map(|s| s.trim()).unwrap_or("");

        // Non-question events are not part of the timing analysis
        if field(columns.event) != config.question_event {
            continue;
        }

        let submission_id = match (columns.instance, fallback_submission) {
            (Some(i), _) => field(i),
            (None, Some(fallback)) => fallback,
            (None, None) => "",
        };
        let node = field(columns.node);

        if node.is_empty() || (log.has_submission_ids && submission_id.is_empty()) {
            warn!(
                "Skipping question row at line {}: missing submission id or field name",
                row.line
            );
            log.skipped_rows += 1;
            continue;
        }

        let start_time = parse_timestamp(field(columns.start), &config.start_column, row.line)?;
        let end_time = parse_timestamp(field(columns.end), &config.end_column, row.line)?;

        let mut record = EventRecord::new(
            config.question_event.as_str(),
            submission_id,
            node,
            start_time,
            end_time,
        );
        record.old_value = columns
            .old_value
            .map(field)
            .filter(|v| !v.is_empty())
            .map(String::from);
        log.records.push(record);
    }

    Ok(log)
}

/// Parse a numeric timestamp cell.
fn parse_timestamp(value: &str, column: &str, line: usize) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AuditError::MalformedRow {
            line,
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// Split CSV text into records.
///
/// Handles quoted fields containing commas, newlines and doubled quotes.
/// Blank lines are dropped.
fn split_records(content: &str) -> Vec<CsvRow> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_start = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            '\n' if in_quotes => {
                line += 1;
                current.push(c);
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut current));
                push_row(&mut rows, row_start, std::mem::take(&mut fields));
                line += 1;
                row_start = line;
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        push_row(&mut rows, row_start, fields);
    }

    rows
}

fn push_row(rows: &mut Vec<CsvRow>, line: usize, fields: Vec<String>) {
    if fields.iter().all(|f| f.trim().is_empty()) {
        return;
    }
    rows.push(CsvRow { line, fields });
}
