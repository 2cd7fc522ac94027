pub mod audit;
pub mod cancel;
pub mod date;
pub mod reconcile;
pub mod run;
pub mod store;
pub mod summary;
pub mod walk;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use cancel::CancellationToken;
pub use date::ExtractedDate;
pub use reconcile::{reconcile, FileRecord, Outcome, ReconcileOptions};
pub use store::{ExifFileStore, MetadataStore};
pub use summary::RunSummary;

fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "tiff".to_string()]
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("set_date_log.txt"))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Root folder to search.
    #[serde(default)]
    pub root: PathBuf,
    /// Only files with these extensions are inspected.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directories whose path contains any of these substrings are skipped.
    #[serde(default)]
    pub ignore_dirs: Vec<String>,
    /// Audit log destination; `None` disables it.
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub append_log: bool,
    /// Overwrite DateTimeOriginal even when it is already set.
    #[serde(default)]
    pub force: bool,
    /// Proceed as if no date were set when the metadata cannot be read.
    #[serde(default = "default_true")]
    pub treat_read_error_as_missing: bool,
    #[serde(default)]
    pub parallel: bool,
    /// Report what would change without writing any file.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extensions: default_extensions(),
            ignore_dirs: Vec::new(),
            log_file: default_log_file(),
            append_log: false,
            force: false,
            treat_read_error_as_missing: true,
            parallel: false,
            dry_run: false,
        }
    }
}

impl RunOptions {
    /// Load options from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open config {}", path.display()))?;
        let options = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(options)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.root.is_dir() {
            bail!("root folder {} is not a directory", self.root.display());
        }
        if self.reconcile_options().allowed_extensions().next().is_none() {
            bail!("no file extensions to process");
        }
        Ok(())
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions::new(&self.extensions)
            .with_force_overwrite(self.force)
            .with_treat_read_error_as_missing(self.treat_read_error_as_missing)
            .with_dry_run(self.dry_run)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub cancel_token: Option<CancellationToken>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub files_found: u64,
    pub summary: RunSummary,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub dry_run: bool,
}

/// Type alias for progress callback
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter, emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current >= total;
        if !is_done {
            let Ok(mut last) = self.last_emit.lock() else {
                return;
            };
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Walk `options.root` and backfill dates in every matching file.
pub fn process(options: &RunOptions, progress_callback: &ProgressCallback<'_>) -> anyhow::Result<RunResult> {
    process_with_control(options, &RunControl::default(), progress_callback)
}

pub fn process_with_control(
    options: &RunOptions,
    control: &RunControl,
    progress_callback: &ProgressCallback<'_>,
) -> anyhow::Result<RunResult> {
    options.validate()?;
    let reconcile_options = options.reconcile_options();
    let store = ExifFileStore::new();
    let tp = ThrottledProgress::new(progress_callback);

    let mut audit = options
        .log_file
        .as_deref()
        .map(|path| audit::AuditLog::create(path, options.append_log))
        .transpose()?;

    // Collected up front so progress has a total.
    tp.report("scan", 0, 1, "Scanning folders");
    let paths: Vec<PathBuf> = walk::files(&options.root, &options.ignore_dirs).collect();
    let total = paths.len() as u64;
    info!(root = %options.root.display(), files = total, "scan complete");

    let mut on_record = |record: &FileRecord| {
        audit::trace_record(record);
        if let Some(log) = audit.as_mut() {
            if let Err(e) = log.record(record) {
                warn!(file = %log.path().display(), error = %e, "failed to append to audit log");
            }
        }
    };

    let cancel = control.cancel_token.as_ref();
    let run = if options.parallel {
        run::reconcile_paths_parallel(
            &paths,
            &store,
            &reconcile_options,
            cancel,
            |done| tp.report("process", done, total, "Processing image files"),
            &mut on_record,
        )
    } else {
        let mut done = 0;
        run::reconcile_paths(paths, &store, &reconcile_options, cancel, |record| {
            on_record(record);
            done += 1;
            tp.report("process", done, total, "Processing image files");
        })
    };

    if let Some(log) = audit.as_mut() {
        log.flush()
            .with_context(|| format!("failed to flush audit log {}", log.path().display()))?;
    }

    if run.cancelled {
        warn!(processed = run.summary.total(), total, "run cancelled");
    }

    Ok(RunResult {
        files_found: total,
        summary: run.summary,
        cancelled: run.cancelled,
        dry_run: options.dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_from_empty_json() {
        let options: RunOptions = serde_json::from_str(r#"{"root": "/photos"}"#).unwrap();
        assert_eq!(options.root, PathBuf::from("/photos"));
        assert_eq!(options.extensions, default_extensions());
        assert!(options.treat_read_error_as_missing);
        assert!(!options.force);
        assert_eq!(options.log_file, default_log_file());
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = RunOptions {
            root: dir.path().to_path_buf(),
            ..RunOptions::default()
        };
        assert!(options.validate().is_ok());

        options.extensions = vec![".".to_string()];
        assert!(options.validate().is_err());

        options.extensions = default_extensions();
        options.root = dir.path().join("missing");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_reconcile_options_follow_flags() {
        let options = RunOptions {
            extensions: vec![".PNG".to_string()],
            force: true,
            treat_read_error_as_missing: false,
            dry_run: true,
            ..RunOptions::default()
        };
        let ro = options.reconcile_options();
        assert!(ro.force_overwrite);
        assert!(ro.dry_run);
        assert!(!ro.treat_read_error_as_missing);
        assert!(ro.is_allowed(Some("png")));
    }

    #[test]
    fn test_throttled_progress_always_reports_completion() {
        let calls = std::sync::Mutex::new(Vec::new());
        let cb = |_: &str, current: u64, _: u64, _: &str| calls.lock().unwrap().push(current);
        let tp = ThrottledProgress::new(&cb);
        tp.report("process", 1, 3, "");
        tp.report("process", 2, 3, "");
        tp.report("process", 3, 3, "");
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }
}
