//! Per-file audit trail.
//!
//! One backtick-separated line per processed file:
//! `time ` LEVEL ` label ` path ` value ` previous ` error`.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::reconcile::FileRecord;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

pub struct AuditLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl AuditLog {
    /// Open the log, truncating it unless `append` is set.
    pub fn create(path: &Path, append: bool) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("failed to open audit log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, record: &FileRecord) -> io::Result<()> {
        let now = chrono::Local::now().format(TIME_FORMAT);
        writeln!(self.writer, "{}", format_line(record, now))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

pub fn format_line(record: &FileRecord, time: impl Display) -> String {
    let level = if record.outcome.is_failure() { "WARNING" } else { "INFO" };
    format!(
        "{} ` {} ` {} ` {} ` {} ` {} ` {}",
        time,
        level,
        record.label(),
        record.path.display(),
        record.value().unwrap_or_default(),
        record.previous().unwrap_or_default(),
        record.error.as_deref().unwrap_or_default(),
    )
}

/// Mirror a record onto the tracing subscriber.
pub fn trace_record(record: &FileRecord) {
    let value = record.value().unwrap_or_default();
    if record.outcome.is_failure() {
        warn!(
            outcome = ?record.outcome,
            path = %record.path.display(),
            value = %value,
            error = record.error.as_deref().unwrap_or_default(),
            "{}",
            record.label()
        );
    } else {
        info!(
            outcome = ?record.outcome,
            path = %record.path.display(),
            value = %value,
            previous = record.previous().unwrap_or_default(),
            "{}",
            record.label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::ExtractedDate;
    use crate::reconcile::Outcome;
    use crate::store::RecordedDate;

    fn record(outcome: Outcome) -> FileRecord {
        FileRecord {
            path: PathBuf::from("photos/2010-05-02 party.jpg"),
            extension: Some("jpg".to_string()),
            existing_date: Some(RecordedDate::new("2001:01:01 00:00:00")),
            extracted_date: ExtractedDate::from_ymd(2010, 5, 2),
            pattern: Some("yyyy-mm-dd"),
            outcome,
            error: None,
            dry_run: false,
        }
    }

    #[test]
    fn test_forced_line_keeps_previous() {
        let line = format_line(&record(Outcome::ForcedOverwrite), "T");
        assert_eq!(
            line,
            "T ` INFO ` Forced Date Set ` photos/2010-05-02 party.jpg ` 2010:05:02 00:00:00 ` 2001:01:01 00:00:00 ` "
        );
    }

    #[test]
    fn test_already_set_line_shows_existing() {
        let line = format_line(&record(Outcome::AlreadySet), "T");
        assert!(line.contains("Set Previously ` photos/2010-05-02 party.jpg ` 2001:01:01 00:00:00 `  ` "));
    }

    #[test]
    fn test_failure_line() {
        let mut r = record(Outcome::WriteError);
        r.error = Some("disk full".to_string());
        let line = format_line(&r, "T");
        assert!(line.starts_with("T ` WARNING ` Error ` "));
        assert!(line.ends_with("` disk full"));
    }

    #[test]
    fn test_dry_run_line() {
        let mut r = record(Outcome::Set);
        r.existing_date = None;
        r.dry_run = true;
        let line = format_line(&r, "T");
        assert!(line.starts_with("T ` INFO ` Would Set Date ` photos/2010-05-02 party.jpg ` 2010:05:02 00:00:00 ` "));
    }

    #[test]
    fn test_truncate_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let mut log = AuditLog::create(&path, false).unwrap();
        log.record(&record(Outcome::Set)).unwrap();
        log.flush().unwrap();
        drop(log);

        let mut log = AuditLog::create(&path, true).unwrap();
        log.record(&record(Outcome::AlreadySet)).unwrap();
        log.flush().unwrap();
        drop(log);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

        let log = AuditLog::create(&path, false).unwrap();
        assert_eq!(log.path(), path.as_path());
        drop(log);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
