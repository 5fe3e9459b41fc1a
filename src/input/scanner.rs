//! Audit file discovery for directory inputs.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for audit file discovery.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["csv"])
    pub extensions: Vec<String>,
    /// Directory or file names to skip
    pub excludes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["csv".to_string()],
            excludes: Vec::new(),
        }
    }
}

impl From<&crate::config::InputConfig> for ScanConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
        }
    }
}

/// Recursively find audit files under `root`, sorted by path.
pub fn find_audit_files(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_dir(root, config, &mut files)?;
    files.sort();
    Ok(files)
}

/// Submission id for a per-instance audit file.
///
/// Uses the name of the directory holding the file, or the file stem
/// when the file sits directly in `root`.
pub fn submission_id_for(file: &Path, root: &Path) -> String {
    let parent = file.parent().filter(|p| *p != root);

    parent
        .and_then(|p| p.file_name())
        .or_else(|| file.file_stem())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

/// Check if a file matches scan criteria.
fn matches(path: &Path, config: &ScanConfig) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    config
        .extensions
        .iter()
        .any(|wanted| wanted.eq_ignore_ascii_case(ext))
}

/// Check if a name matches exclusion patterns.
fn is_excluded(name: &str, config: &ScanConfig) -> bool {
    // Hidden files
    if name.starts_with('.') {
        return true;
    }

    config.excludes.iter().any(|pattern| name == pattern)
}

fn walk_dir(dir: &Path, config: &ScanConfig, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if is_excluded(&name, config) {
            debug!("Skipping excluded entry {}", path.display());
            continue;
        }

        if path.is_dir() {
            walk_dir(&path, config, files)?;
        } else if path.is_file() && matches(&path, config) {
            files.push(path);
        }
    }

    Ok(())
}
