use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{MetadataStore, ReadError, RecordedDate, WriteError};
use crate::date::ExtractedDate;

#[derive(Debug, Clone)]
enum Entry {
    /// A writable image, with or without a DateTimeOriginal tag.
    Image(Option<RecordedDate>),
    /// Metadata block is corrupt; rewriting it succeeds.
    Unreadable,
    /// Not an image container at all.
    NotAnImage,
    /// Readable, but every write fails.
    ReadOnly(Option<RecordedDate>),
}

/// In-memory [`MetadataStore`], keyed by path. Paths never inserted read as
/// missing files.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<PathBuf, Entry>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&self, path: impl Into<PathBuf>, original: Option<&str>) {
        self.insert(path.into(), Entry::Image(original.map(RecordedDate::new)));
    }

    pub fn insert_unreadable(&self, path: impl Into<PathBuf>) {
        self.insert(path.into(), Entry::Unreadable);
    }

    pub fn insert_not_image(&self, path: impl Into<PathBuf>) {
        self.insert(path.into(), Entry::NotAnImage);
    }

    pub fn insert_read_only(&self, path: impl Into<PathBuf>, original: Option<&str>) {
        self.insert(path.into(), Entry::ReadOnly(original.map(RecordedDate::new)));
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current DateTimeOriginal for `path`, if it is a readable image.
    pub fn original_date(&self, path: &Path) -> Option<RecordedDate> {
        match self.lock().get(path) {
            Some(Entry::Image(date)) | Some(Entry::ReadOnly(date)) => date.clone(),
            _ => None,
        }
    }

    fn insert(&self, path: PathBuf, entry: Entry) {
        self.lock().insert(path, entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataStore for MemoryStore {
    fn read_original_date(&self, path: &Path) -> Result<Option<RecordedDate>, ReadError> {
        match self.lock().get(path) {
            Some(Entry::Image(date)) | Some(Entry::ReadOnly(date)) => Ok(date.clone()),
            Some(Entry::Unreadable) => Err(ReadError::Malformed {
                path: path.to_path_buf(),
                reason: "corrupt Exif block".to_string(),
            }),
            Some(Entry::NotAnImage) => Err(ReadError::Malformed {
                path: path.to_path_buf(),
                reason: "unknown image format".to_string(),
            }),
            None => Err(ReadError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }

    fn write_dates(&self, path: &Path, date: &ExtractedDate) -> Result<(), WriteError> {
        let mut entries = self.lock();
        let current = entries.get(path).cloned();
        match current {
            Some(Entry::Image(_)) | Some(Entry::Unreadable) => {
                entries.insert(
                    path.to_path_buf(),
                    Entry::Image(Some(RecordedDate::new(date.to_exif_string()))),
                );
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Some(Entry::NotAnImage) => Err(WriteError::UnsupportedContainer {
                path: path.to_path_buf(),
                reason: "unknown image format".to_string(),
            }),
            Some(Entry::ReadOnly(_)) => Err(WriteError::Failed {
                path: path.to_path_buf(),
                reason: "store is read-only".to_string(),
            }),
            None => Err(WriteError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}
