//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Options left unset fall back to the
//! configuration file, then to built-in defaults.

use crate::models::AverageMode;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// FormAudit - response-time analysis for form audit logs
///
/// Reads an audit CSV (or a directory of per-submission audit files),
/// averages the time spent on each form field, and flags submissions
/// that took unusually long or revisited a field repeatedly.
///
/// Examples:
///   formaudit audit.csv
///   formaudit audit.csv --threshold 2500 --min-changes 3
///   formaudit instances/ --format markdown --output report.md
///   formaudit --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Audit CSV file or directory of audit files
    #[arg(value_name = "INPUT", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .formaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (text, markdown, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Deviation from a field's average that marks an outlier
    ///
    /// Same units as the start/end timestamps (milliseconds for ODK). Default: 4000
    #[arg(short, long, value_name = "AMOUNT", env = "FORMAUDIT_THRESHOLD")]
    pub threshold: Option<f64>,

    /// Visits to a single field that count as frequent changes. Default: 2
    #[arg(long, value_name = "COUNT")]
    pub min_changes: Option<u32>,

    /// Characters stripped from field names for display. Default: 6
    #[arg(long, value_name = "CHARS")]
    pub prefix_len: Option<usize>,

    /// Divisor for field averages (all, containing)
    ///
    /// `all` divides by every submission in the log; `containing` only by
    /// submissions that reached the field.
    #[arg(long, value_name = "MODE")]
    pub average_mode: Option<AverageMode>,

    /// Event type that carries field timings. Default: question
    #[arg(long, value_name = "EVENT")]
    pub question_event: Option<String>,

    /// Decimal places for averages. Default: full precision
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .formaudit.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text sections (default)
    #[default]
    Text,
    /// Markdown tables
    Markdown,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input does not exist: {}", input.display()));
            }
            None => return Err("An input file or directory is required".to_string()),
            _ => {}
        }

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err("Threshold must be a non-negative number".to_string());
            }
        }

        if self.min_changes == Some(0) {
            return Err("Min changes must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
