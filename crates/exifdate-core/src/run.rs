//! Drive the reconciler over a sequence of paths and aggregate outcomes.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::reconcile::{reconcile, FileRecord, ReconcileOptions};
use crate::store::MetadataStore;
use crate::summary::RunSummary;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// The path sequence was abandoned before it ran out.
    pub cancelled: bool,
}

/// Resolve files one at a time, pulling paths lazily. `on_record` sees each
/// record before the next path is taken.
pub fn reconcile_paths<I, S>(
    paths: I,
    store: &S,
    options: &ReconcileOptions,
    cancel: Option<&CancellationToken>,
    mut on_record: impl FnMut(&FileRecord),
) -> RunOutcome
where
    I: IntoIterator<Item = PathBuf>,
    S: MetadataStore + ?Sized,
{
    let mut run = RunOutcome::default();
    for path in paths {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            run.cancelled = true;
            break;
        }
        let record = reconcile(&path, store, options);
        run.summary.record(record.outcome);
        on_record(&record);
    }
    run
}

/// Resolve files on the rayon pool. Records are handed to `on_record` and
/// counted afterwards in a single pass, in the order of `paths`.
/// `on_progress` is called from worker threads with the number of files done.
pub fn reconcile_paths_parallel<S>(
    paths: &[PathBuf],
    store: &S,
    options: &ReconcileOptions,
    cancel: Option<&CancellationToken>,
    on_progress: impl Fn(u64) + Sync,
    mut on_record: impl FnMut(&FileRecord),
) -> RunOutcome
where
    S: MetadataStore + Sync + ?Sized,
{
    let done = std::sync::atomic::AtomicU64::new(0);
    let records: Vec<Option<FileRecord>> = paths
        .par_iter()
        .map(|path| {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return None;
            }
            let record = reconcile(path, store, options);
            let n = done.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
            on_progress(n);
            Some(record)
        })
        .collect();

    let mut run = RunOutcome::default();
    for record in records {
        match record {
            Some(record) => {
                run.summary.record(record.outcome);
                on_record(&record);
            }
            None => run.cancelled = true,
        }
    }
    run
}
