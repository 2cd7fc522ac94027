//! Per-file write policy: leave alone, set, overwrite, or report.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date::guess;
use crate::date::ExtractedDate;
use crate::store::{self, MetadataStore, RecordedDate};

/// Terminal state of one file in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    AlreadySet,
    Set,
    ForcedOverwrite,
    ExcludedExtension,
    InvalidFilename,
    InvalidImage,
    ExtractionError,
    WriteError,
}

impl Outcome {
    /// Report order.
    pub const ALL: [Outcome; 8] = [
        Outcome::AlreadySet,
        Outcome::Set,
        Outcome::ForcedOverwrite,
        Outcome::ExcludedExtension,
        Outcome::InvalidFilename,
        Outcome::InvalidImage,
        Outcome::ExtractionError,
        Outcome::WriteError,
    ];

    /// Label used in the audit log.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::AlreadySet => "Set Previously",
            Outcome::Set => "Date Set",
            Outcome::ForcedOverwrite => "Forced Date Set",
            Outcome::ExcludedExtension => "Excluded File",
            Outcome::InvalidFilename => "Error Invalid Filename",
            Outcome::InvalidImage => "Not Image File",
            Outcome::ExtractionError => "Error Extracting EXIF Tag",
            Outcome::WriteError => "Error",
        }
    }

    /// Whether the file was left untouched because something went wrong.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::InvalidFilename | Outcome::InvalidImage | Outcome::ExtractionError | Outcome::WriteError
        )
    }
}

/// Everything learned about one path, kept until its outcome is logged.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Lowercased, without the dot.
    pub extension: Option<String>,
    pub existing_date: Option<RecordedDate>,
    pub extracted_date: Option<ExtractedDate>,
    /// Name of the filename pattern that produced `extracted_date`.
    pub pattern: Option<&'static str>,
    pub outcome: Outcome,
    pub error: Option<String>,
    /// Decided under a dry run; `Set` and `ForcedOverwrite` were not written.
    pub dry_run: bool,
}

impl FileRecord {
    /// Audit label. Dry runs report intent instead of the applied action.
    pub fn label(&self) -> &'static str {
        if !self.dry_run {
            return self.outcome.label();
        }
        match self.outcome {
            Outcome::Set => "Would Set Date",
            Outcome::ForcedOverwrite => "Would Force Date Set",
            Outcome::InvalidFilename if self.existing_date.is_none() => "Not Set",
            outcome => outcome.label(),
        }
    }

    /// The date the log line is about: the one written, or the one found.
    pub fn value(&self) -> Option<String> {
        match self.outcome {
            Outcome::AlreadySet => self.existing_date.as_ref().map(|d| d.raw.clone()),
            _ => self.extracted_date.map(|d| d.to_string()),
        }
    }

    /// The value that a forced write replaced.
    pub fn previous(&self) -> Option<&str> {
        match self.outcome {
            Outcome::ForcedOverwrite => self.existing_date.as_ref().map(|d| d.raw.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    allowed_extensions: BTreeSet<String>,
    pub force_overwrite: bool,
    pub treat_read_error_as_missing: bool,
    /// Read and extract, but never call `write_dates`.
    pub dry_run: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::new(["jpg", "jpeg", "tiff"])
    }
}

impl ReconcileOptions {
    /// Extensions are matched case-insensitively; a leading dot is optional.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            force_overwrite: false,
            treat_read_error_as_missing: true,
            dry_run: false,
        }
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_treat_read_error_as_missing(mut self, treat: bool) -> Self {
        self.treat_read_error_as_missing = treat;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    pub fn is_allowed(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|e| self.allowed_extensions.contains(e))
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Decide and apply the write for one file.
///
/// The outcome depends only on the path, the store's answers and `options`.
pub fn reconcile<S>(path: &Path, store: &S, options: &ReconcileOptions) -> FileRecord
where
    S: MetadataStore + ?Sized,
{
    let extension = path
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()));

    let mut record = FileRecord {
        path: path.to_path_buf(),
        extension,
        existing_date: None,
        extracted_date: None,
        pattern: None,
        outcome: Outcome::ExcludedExtension,
        error: None,
        dry_run: options.dry_run,
    };

    if !options.is_allowed(record.extension.as_deref()) {
        return record;
    }

    match store.read_original_date(path) {
        Ok(existing) => record.existing_date = existing,
        Err(e) if options.treat_read_error_as_missing => {
            debug!(path = %path.display(), error = %e, "unreadable metadata treated as missing");
        }
        Err(e) => {
            record.error = Some(e.to_string());
            record.outcome = Outcome::ExtractionError;
            return record;
        }
    }

    if let Some(existing) = &record.existing_date {
        if existing.parsed().is_none() {
            debug!(path = %path.display(), raw = %existing.raw, "existing DateTimeOriginal does not parse");
        }
        if !options.force_overwrite {
            record.outcome = Outcome::AlreadySet;
            return record;
        }
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(found) = guess::match_filename(&filename) else {
        record.outcome = Outcome::InvalidFilename;
        return record;
    };
    debug!(path = %path.display(), pattern = found.pattern, date = %found.date, "date inferred from filename");
    record.extracted_date = Some(found.date);
    record.pattern = Some(found.pattern);

    if options.dry_run {
        record.outcome = if record.existing_date.is_some() {
            Outcome::ForcedOverwrite
        } else {
            Outcome::Set
        };
        return record;
    }

    record.outcome = match store.write_dates(path, &found.date) {
        Ok(()) if record.existing_date.is_some() => Outcome::ForcedOverwrite,
        Ok(()) => Outcome::Set,
        Err(e) => {
            let outcome = match e {
                store::WriteError::UnsupportedContainer { .. } => Outcome::InvalidImage,
                _ => Outcome::WriteError,
            };
            record.error = Some(e.to_string());
            outcome
        }
    };
    record
}
