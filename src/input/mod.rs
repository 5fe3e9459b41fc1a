//! Audit log input.
//!
//! An input path is either a single audit CSV (usually a server export
//! with an `instanceID` column) or a directory of per-submission audit
//! files laid out as `<instance>/audit.csv`.

pub mod reader;
pub mod scanner;

pub use reader::{load_events, ReaderConfig};
pub use scanner::{find_audit_files, submission_id_for, ScanConfig};

use crate::error::{AuditError, Result};
use crate::models::EventRecord;
use std::path::Path;
use tracing::info;

/// Question events loaded from one or more audit files.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    /// Question events, in file order.
    pub records: Vec<EventRecord>,
    /// Question rows dropped for lacking a submission id or field name.
    pub skipped_rows: usize,
    /// Whether events can be grouped by submission.
    pub has_submission_ids: bool,
    /// Whether the log carried an `old-value` column.
    pub tracks_changes: bool,
    /// File or directory the events came from.
    pub source: String,
}

impl AuditLog {
    /// Append the events of another log.
    pub fn merge(&mut self, other: AuditLog) {
        self.records.extend(other.records);
        self.skipped_rows += other.skipped_rows;
        self.has_submission_ids &= other.has_submission_ids;
        self.tracks_changes |= other.tracks_changes;
    }
}

/// Load every question event reachable from `path`.
pub fn load_path(path: &Path, reader: &ReaderConfig, scan: &ScanConfig) -> Result<AuditLog> {
    if !path.is_dir() {
        return load_events(path, reader, None);
    }

    let files = find_audit_files(path, scan)?;
    if files.is_empty() {
        return Err(AuditError::EmptyInput(format!(
            "no audit files found under {}",
            path.display()
        )));
    }
    info!("Found {} audit files under {}", files.len(), path.display());

    let mut log = AuditLog {
        has_submission_ids: true,
        ..AuditLog::default()
    };
    for file in &files {
        let submission = submission_id_for(file, path);
        log.merge(load_events(file, reader, Some(submission.as_str()))?);
    }
    log.source = path.display().to_string();

    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_directory_of_instances() {
        let dir = TempDir::new().unwrap();
        for (instance, body) in [
            ("uuid-1", "event,node,start,end\nquestion,/data/name,0,100\n"),
            ("uuid-2", "event,node,start,end\nquestion,/data/name,0,300\n"),
        ] {
            let instance_dir = dir.path().join(instance);
            fs::create_dir(&instance_dir).unwrap();
            fs::write(instance_dir.join("audit.csv"), body).unwrap();
        }

        let log = load_path(dir.path(), &ReaderConfig::default(), &ScanConfig::default()).unwrap();

        assert!(log.has_submission_ids);
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[0].submission_id, "uuid-1");
        assert_eq!(log.records[1].submission_id, "uuid-2");
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = load_path(dir.path(), &ReaderConfig::default(), &ScanConfig::default())
            .unwrap_err();
        assert!(matches!(err, AuditError::EmptyInput(_)));
    }

    #[test]
    fn test_merge_keeps_weakest_grouping() {
        let mut log = AuditLog {
            has_submission_ids: true,
            ..AuditLog::default()
        };
        log.merge(AuditLog {
            skipped_rows: 2,
            tracks_changes: true,
            ..AuditLog::default()
        });

        assert!(!log.has_submission_ids);
        assert!(log.tracks_changes);
        assert_eq!(log.skipped_rows, 2);
    }
}
