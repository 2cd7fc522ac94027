//! Metadata store seam.
//!
//! The reconciler only decides whether and with what value to write; reading
//! and persisting EXIF data happens behind [`MetadataStore`].

pub mod exif_file;
pub mod memory;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::date::{self, ExtractedDate};

pub use exif_file::ExifFileStore;
pub use memory::MemoryStore;

/// The original-capture timestamp as found in the file.
///
/// Presence of the tag is what counts; `raw` may hold a blank placeholder
/// that does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDate {
    pub raw: String,
}

impl RecordedDate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn parsed(&self) -> Option<NaiveDateTime> {
        date::exif::parse_exif_datetime(&self.raw)
    }
}

/// The file's metadata could not be read at all. A file with no metadata
/// block is not an error; stores report that as `Ok(None)`.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable metadata in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("{path} is not an image container that can hold EXIF dates: {reason}")]
    UnsupportedContainer { path: PathBuf, reason: String },

    #[error("failed to write dates to {path}: {reason}")]
    Failed { path: PathBuf, reason: String },

    #[error("failed to write dates to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait MetadataStore {
    /// The DateTimeOriginal value, `None` when the file carries no such tag.
    fn read_original_date(&self, path: &Path) -> Result<Option<RecordedDate>, ReadError>;

    /// Set DateTime, DateTimeOriginal and DateTimeDigitized to `date` in one
    /// operation. On error the file is left as it was.
    fn write_dates(&self, path: &Path, date: &ExtractedDate) -> Result<(), WriteError>;
}
