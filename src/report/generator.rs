//! Audit report generation.
//!
//! Renders an [`AuditReport`] as plain text (the classic three-section
//! layout), Markdown, or JSON.

use crate::cli::OutputFormat;
use crate::models::{AuditReport, FieldAverage, FrequentChangeFlag, OutlierFlag, ReportMetadata};
use anyhow::Result;

/// Render a report in the requested format.
pub fn render(report: &AuditReport, format: OutputFormat, precision: Option<usize>) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => generate_text_report(report, precision),
        OutputFormat::Markdown => generate_markdown_report(report, precision),
        OutputFormat::Json => generate_json_report(report)?,
    })
}

/// Generate the plain text report.
pub fn generate_text_report(report: &AuditReport, precision: Option<usize>) -> String {
    let mut output = String::new();

    output.push_str("\nAUDIT RESULTS:\n");

    output.push_str("--AVERAGES--\n");
    if report.averages.is_empty() {
        output.push_str("  (none)\n");
    }
    for average in &report.averages {
        output.push_str(&format!(
            "  Form Question Field: {}, Average Input Time: {}\n",
            average.field_name,
            number(average.value, precision)
        ));
    }
    output.push('\n');

    if !report.per_submission {
        return output;
    }

    output.push_str("--OUTLIERS--\n");
    if report.outliers.is_empty() {
        output.push_str("  (none)\n");
    }
    for flag in &report.outliers {
        output.push_str(&format!(
            " Submission {} {} the average on field {}\n",
            flag.submission_id,
            direction(flag),
            flag.field_name
        ));
    }
    output.push('\n');

    output.push_str("--FREQUENT RESPONSE CHANGES--\n");
    if report.frequent_changes.is_empty() {
        output.push_str("  (none)\n");
    }
    for flag in &report.frequent_changes {
        output.push_str(&format!(
            " Submission {} changed their answer {} times on field {}\n",
            flag.submission_id, flag.occurrence_count, flag.field_name
        ));
    }
    output.push('\n');

    if let Some(ref changes) = report.answer_changes {
        output.push_str("--AVERAGE ANSWER CHANGES--\n");
        for average in changes {
            output.push_str(&format!(
                "  Form Question Field: {}, Average Answer Changes: {}\n",
                average.field_name,
                number(average.value, precision)
            ));
        }
        output.push('\n');
    }

    output
}

/// Format a value with a fixed number of decimals, or in full when unset.
///
/// The full form always keeps a fractional part (`200.0`, `3333.3333333333335`).
fn number(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(digits) => format!("{:.*}", digits, value),
        None => format!("{:?}", value),
    }
}

/// Whether the submission was slower or faster than average.
fn direction(flag: &OutlierFlag) -> &'static str {
    if flag.total_duration > flag.average {
        "took longer than"
    } else {
        "was faster than"
    }
}

/// Generate a Markdown report.
pub fn generate_markdown_report(report: &AuditReport, precision: Option<usize>) -> String {
    let mut output = String::new();

    output.push_str("# Form Audit Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata, report.per_submission));
    output.push_str(&generate_averages_section(
        "Average Input Time",
        &report.averages,
        precision,
    ));

    if report.per_submission {
        output.push_str(&generate_outliers_section(&report.outliers, precision));
        output.push_str(&generate_changes_section(&report.frequent_changes));
    }

    if let Some(ref changes) = report.answer_changes {
        output.push_str(&generate_averages_section(
            "Average Answer Changes",
            changes,
            precision,
        ));
    }

    output
}

fn generate_metadata_section(metadata: &ReportMetadata, per_submission: bool) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", metadata.input));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if per_submission {
        section.push_str(&format!("- **Submissions:** {}\n", metadata.submissions));
    }
    section.push_str(&format!(
        "- **Question Events:** {}\n",
        metadata.question_events
    ));
    if metadata.skipped_rows > 0 {
        section.push_str(&format!("- **Skipped Rows:** {}\n", metadata.skipped_rows));
    }
    if per_submission {
        section.push_str(&format!(
            "- **Outlier Threshold:** {}\n",
            metadata.outlier_threshold
        ));
        section.push_str(&format!("- **Min Changes:** {}\n", metadata.min_changes));
        section.push_str(&format!(
            "- **Averaged Over:** {}\n",
            metadata.average_mode
        ));
    }
    section.push('\n');

    section
}

fn generate_averages_section(title: &str, averages: &[FieldAverage], precision: Option<usize>) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    section.push_str("| Field | Average |\n");
    section.push_str("|:---|---:|\n");
    for average in averages {
        section.push_str(&format!(
            "| {} | {} |\n",
            average.field_name,
            number(average.value, precision)
        ));
    }
    section.push('\n');

    section
}

fn generate_outliers_section(outliers: &[OutlierFlag], precision: Option<usize>) -> String {
    let mut section = String::new();

    section.push_str("## Outliers\n\n");
    if outliers.is_empty() {
        section.push_str("No submission deviated from the field averages beyond the threshold.\n\n");
        return section;
    }

    section.push_str("| Submission | Field | Time | Average | Deviation |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");
    for flag in outliers {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            flag.submission_id,
            flag.field_name,
            number(flag.total_duration, precision),
            number(flag.average, precision),
            number(flag.deviation, precision)
        ));
    }
    section.push('\n');

    section
}

fn generate_changes_section(changes: &[FrequentChangeFlag]) -> String {
    let mut section = String::new();

    section.push_str("## Frequent Response Changes\n\n");
    if changes.is_empty() {
        section.push_str("No field was revisited often enough to be flagged.\n\n");
        return section;
    }

    section.push_str("| Submission | Field | Visits |\n");
    section.push_str("|:---|:---|---:|\n");
    for flag in changes {
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            flag.submission_id, flag.field_name, flag.occurrence_count
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AuditReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AverageMode;
    use chrono::Utc;

    fn create_test_report() -> AuditReport {
        AuditReport {
            metadata: ReportMetadata {
                input: "audit.csv".to_string(),
                analysis_date: Utc::now(),
                submissions: 2,
                question_events: 5,
                skipped_rows: 1,
                outlier_threshold: 4000.0,
                min_changes: 2,
                average_mode: AverageMode::All,
            },
            averages: vec![FieldAverage {
                field_name: "name".to_string(),
                value: 5050.0,
            }],
            outliers: vec![
                OutlierFlag {
                    submission_id: "uuid:1".to_string(),
                    field_name: "name".to_string(),
                    total_duration: 10000.0,
                    average: 5050.0,
                    deviation: 4950.0,
                },
                OutlierFlag {
                    submission_id: "uuid:2".to_string(),
                    field_name: "name".to_string(),
                    total_duration: 100.0,
                    average: 5050.0,
                    deviation: 4950.0,
                },
            ],
            frequent_changes: vec![FrequentChangeFlag {
                submission_id: "uuid:2".to_string(),
                field_name: "age".to_string(),
                occurrence_count: 3,
            }],
            answer_changes: None,
            per_submission: true,
        }
    }

    #[test]
    fn test_generate_text_report() {
        let text = generate_text_report(&create_test_report(), Some(1));

        assert!(text.contains("AUDIT RESULTS:"));
        assert!(text.contains("--AVERAGES--"));
        assert!(text.contains("  Form Question Field: name, Average Input Time: 5050.0"));
        assert!(text.contains(" Submission uuid:1 took longer than the average on field name"));
        assert!(text.contains(" Submission uuid:2 was faster than the average on field name"));
        assert!(text.contains(" Submission uuid:2 changed their answer 3 times on field age"));
        assert!(!text.contains("AVERAGE ANSWER CHANGES"));
    }

    #[test]
    fn test_text_report_without_submissions() {
        let mut report = create_test_report();
        report.per_submission = false;

        let text = generate_text_report(&report, Some(2));
        assert!(text.contains("Average Input Time: 5050.00"));
        assert!(!text.contains("--OUTLIERS--"));
        assert!(!text.contains("--FREQUENT RESPONSE CHANGES--"));
    }

    #[test]
    fn test_text_report_empty_sections() {
        let mut report = create_test_report();
        report.outliers.clear();
        report.frequent_changes.clear();

        let text = generate_text_report(&report, Some(1));
        assert!(text.contains("--OUTLIERS--\n  (none)\n"));
        assert!(text.contains("--FREQUENT RESPONSE CHANGES--\n  (none)\n"));
    }

    #[test]
    fn test_full_precision_by_default() {
        let mut report = create_test_report();
        report.averages[0].value = 10000.0 / 3.0;

        let text = generate_text_report(&report, None);
        assert!(text.contains("Average Input Time: 3333.3333333333335"));

        report.averages[0].value = 200.0;
        let text = generate_text_report(&report, None);
        assert!(text.contains("Average Input Time: 200.0\n"));
    }

    #[test]
    fn test_generate_markdown_report() {
        let mut report = create_test_report();
        report.answer_changes = Some(vec![FieldAverage {
            field_name: "age".to_string(),
            value: 0.5,
        }]);

        let markdown = generate_markdown_report(&report, Some(1));

        assert!(markdown.contains("# Form Audit Report"));
        assert!(markdown.contains("- **Skipped Rows:** 1"));
        assert!(markdown.contains("| name | 5050.0 |"));
        assert!(markdown.contains("| `uuid:1` | name | 10000.0 | 5050.0 | 4950.0 |"));
        assert!(markdown.contains("| `uuid:2` | age | 3 |"));
        assert!(markdown.contains("## Average Answer Changes"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = render(&create_test_report(), OutputFormat::Json, None).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["submissions"], 2);
        assert_eq!(value["metadata"]["average_mode"], "all");
        assert_eq!(value["outliers"].as_array().map(|a| a.len()), Some(2));
        assert!(value.get("answer_changes").is_none());
    }
}
