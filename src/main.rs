//! FormAudit - response-time analysis for form audit logs
//!
//! A CLI tool that reads form audit CSV exports, averages the time spent
//! on each field across submissions, and flags outlier submissions and
//! fields that were answered repeatedly.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error (missing or malformed input, config, IO)

mod analysis;
mod cli;
mod config;
mod error;
mod input;
mod models;
mod report;

use analysis::AnalysisSettings;
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use input::{ReaderConfig, ScanConfig};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("FormAudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_audit(&args) {
        error!("Audit failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .formaudit.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize column names, thresholds, and report format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `--verbose` and `--quiet` win over `RUST_LOG`, which in turn wins over
/// the INFO default. Logs go to stderr so the report on stdout stays clean.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(args))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn log_filter(args: &Args) -> EnvFilter {
    let level = args.log_level().to_string().to_lowercase();
    if args.verbose || args.quiet {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Load, analyze, and report on the input audit log.
fn run_audit(args: &Args) -> Result<()> {
    let mut config = load_config(args, Path::new("."))?;
    config.merge_with_args(args);
    config.validate()?;

    let input_path = args.input.as_deref().context("No input path given")?;

    let reader = ReaderConfig::from(&config.input);
    let scan = ScanConfig::from(&config.input);
    let log = input::load_path(input_path, &reader, &scan)
        .with_context(|| format!("Failed to load audit log from {}", input_path.display()))?;

    if log.skipped_rows > 0 {
        warn!(
            "{} question rows lacked a submission id or field name and were skipped",
            log.skipped_rows
        );
    }

    let settings = AnalysisSettings::from(&config);
    let report = analysis::analyze(&log, &settings).context("Analysis failed")?;
    let output = report::render(&report, config.report.format, config.report.precision)?;

    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            info!("Report saved to {}", path);
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Load configuration from `--config`, then `.formaudit.toml` in `dir`,
/// then defaults. A config file that exists but cannot be read is an error.
fn load_config(args: &Args, dir: &Path) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(dir) {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Invalid {}", CONFIG_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_flags() {
        let args = Args {
            quiet: true,
            ..Args::default()
        };
        assert_eq!(log_filter(&args).max_level_hint(), Some(LevelFilter::ERROR));

        let args = Args {
            verbose: true,
            ..Args::default()
        };
        assert_eq!(log_filter(&args).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&Args::default(), dir.path()).unwrap();
        assert_eq!(config.analysis.outlier_threshold, 4000.0);
    }

    #[test]
    fn test_load_config_rejects_broken_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[analysis]\noutlier_threshold = \"oops\"\n",
        )
        .unwrap();

        let err = load_config(&Args::default(), dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_FILE));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[analysis]\nmin_changes = 3\n").unwrap();

        let args = Args {
            config: Some(path),
            ..Args::default()
        };
        let config = load_config(&args, dir.path()).unwrap();
        assert_eq!(config.analysis.min_changes, 3);
    }

    #[test]
    fn test_merged_config_is_validated() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[analysis]\nmin_changes = 0\noutlier_threshold = -1.0\n",
        )
        .unwrap();

        let mut config = load_config(&Args::default(), dir.path()).unwrap();
        config.merge_with_args(&Args::default());
        assert!(config.validate().is_err());

        let args = Args {
            min_changes: Some(2),
            threshold: Some(4000.0),
            ..Args::default()
        };
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }
}
