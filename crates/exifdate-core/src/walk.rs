use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Lazily yield every regular file under `root`, in file-name order.
///
/// Directories whose path contains any of `ignore_dirs` as a substring are
/// skipped with their whole subtree. Entries that cannot be read are logged
/// and skipped.
pub fn files<'a>(root: &Path, ignore_dirs: &'a [String]) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_ignored_dir(entry, ignore_dirs))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = ?e.path(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
}

fn is_ignored_dir(entry: &DirEntry, ignore_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let path = entry.path().to_string_lossy();
    ignore_dirs
        .iter()
        .any(|pattern| !pattern.is_empty() && path.contains(pattern.as_str()))
}
