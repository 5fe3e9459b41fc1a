//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.formaudit.toml` files.

use crate::analysis::{
    DEFAULT_MIN_CHANGES, DEFAULT_OUTLIER_THRESHOLD, DEFAULT_PREFIX_LEN, QUESTION_EVENT,
};
use crate::cli::OutputFormat;
use crate::models::AverageMode;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".formaudit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input log layout.
    #[serde(default)]
    pub input: InputConfig,

    /// Aggregation thresholds.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write the report here instead of stdout.
    #[serde(default)]
    pub output: Option<String>,
}

/// Column names and file discovery for audit logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_event_column")]
    pub event_column: String,

    /// Submission id column. Optional in the log itself.
    #[serde(default = "default_instance_column")]
    pub instance_column: String,

    #[serde(default = "default_node_column")]
    pub node_column: String,

    #[serde(default = "default_start_column")]
    pub start_column: String,

    #[serde(default = "default_end_column")]
    pub end_column: String,

    /// Previous-answer column. Optional in the log itself.
    #[serde(default = "default_old_value_column")]
    pub old_value_column: String,

    /// Event type whose rows carry field timings.
    #[serde(default = "default_question_event")]
    pub question_event: String,

    /// Audit file extensions picked up in directory mode.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Names skipped in directory mode.
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            event_column: default_event_column(),
            instance_column: default_instance_column(),
            node_column: default_node_column(),
            start_column: default_start_column(),
            end_column: default_end_column(),
            old_value_column: default_old_value_column(),
            question_event: default_question_event(),
            extensions: default_extensions(),
            excludes: Vec::new(),
        }
    }
}

fn default_event_column() -> String {
    "event".to_string()
}

fn default_instance_column() -> String {
    "instanceID".to_string()
}

fn default_node_column() -> String {
    "node".to_string()
}

fn default_start_column() -> String {
    "start".to_string()
}

fn default_end_column() -> String {
    "end".to_string()
}

fn default_old_value_column() -> String {
    "old-value".to_string()
}

fn default_question_event() -> String {
    QUESTION_EVENT.to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["csv".to_string()]
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Deviation from a field's average (timestamp units) that flags a submission.
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f64,

    /// Visits to one field that flag a submission.
    #[serde(default = "default_min_changes")]
    pub min_changes: u32,

    /// Characters stripped from field names for display.
    #[serde(default = "default_prefix_len")]
    pub prefix_len: usize,

    /// Divisor for field averages.
    #[serde(default)]
    pub average_mode: AverageMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            outlier_threshold: default_outlier_threshold(),
            min_changes: default_min_changes(),
            prefix_len: default_prefix_len(),
            average_mode: AverageMode::default(),
        }
    }
}

fn default_outlier_threshold() -> f64 {
    DEFAULT_OUTLIER_THRESHOLD
}

fn default_min_changes() -> u32 {
    DEFAULT_MIN_CHANGES
}

fn default_prefix_len() -> usize {
    DEFAULT_PREFIX_LEN
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Decimal places for averages in text and markdown output.
    /// Unset prints values in full.
    #[serde(default)]
    pub precision: Option<usize>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            precision: None,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `.formaudit.toml` from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        if let Some(threshold) = args.threshold {
            self.analysis.outlier_threshold = threshold;
        }
        if let Some(min_changes) = args.min_changes {
            self.analysis.min_changes = min_changes;
        }
        if let Some(prefix_len) = args.prefix_len {
            self.analysis.prefix_len = prefix_len;
        }
        if let Some(mode) = args.average_mode {
            self.analysis.average_mode = mode;
        }
        if let Some(ref event) = args.question_event {
            self.input.question_event = event.clone();
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(precision) = args.precision {
            self.report.precision = Some(precision);
        }
    }

    /// Check the merged settings before they reach the analysis.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.analysis.outlier_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            bail!(
                "analysis.outlier_threshold must be a non-negative number, got {}",
                threshold
            );
        }

        if self.analysis.min_changes == 0 {
            bail!("analysis.min_changes must be at least 1");
        }

        if self.input.question_event.trim().is_empty() {
            bail!("input.question_event must not be empty");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.outlier_threshold, 4000.0);
        assert_eq!(config.analysis.min_changes, 2);
        assert_eq!(config.analysis.prefix_len, 6);
        assert_eq!(config.analysis.average_mode, AverageMode::All);
        assert_eq!(config.input.instance_column, "instanceID");
        assert_eq!(config.report.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "audit_report.md"

[input]
node_column = "field"
extensions = ["csv", "tsv"]

[analysis]
outlier_threshold = 2500.5
min_changes = 3
average_mode = "containing"

[report]
format = "markdown"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output.as_deref(), Some("audit_report.md"));
        assert_eq!(config.input.node_column, "field");
        assert_eq!(config.input.event_column, "event");
        assert_eq!(config.input.extensions, vec!["csv", "tsv"]);
        assert_eq!(config.analysis.outlier_threshold, 2500.5);
        assert_eq!(config.analysis.min_changes, 3);
        assert_eq!(config.analysis.prefix_len, 6);
        assert_eq!(config.analysis.average_mode, AverageMode::Containing);
        assert_eq!(config.report.format, OutputFormat::Markdown);
        assert_eq!(config.report.precision, None);
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.analysis.min_changes = 5;

        let args = Args {
            input: Some(PathBuf::from("audit.csv")),
            threshold: Some(1000.0),
            format: Some(OutputFormat::Json),
            ..Args::default()
        };
        config.merge_with_args(&args);

        assert_eq!(config.analysis.outlier_threshold, 1000.0);
        assert_eq!(config.analysis.min_changes, 5);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert!(config.general.output.is_none());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_min_changes() {
        let config: Config = toml::from_str("[analysis]\nmin_changes = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_changes"));
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let config: Config = toml::from_str("[analysis]\noutlier_threshold = -1.0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("outlier_threshold"));

        let mut config = Config::default();
        config.analysis.outlier_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[analysis]\nmin_changes = 4\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.analysis.min_changes, 4);

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[analysis]\noutlier_threshold = \"oops\"\n",
        )
        .unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("outlier_threshold = 4000.0"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.analysis.average_mode, AverageMode::All);
    }
}
