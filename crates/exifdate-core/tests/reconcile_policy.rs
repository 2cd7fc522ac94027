use std::path::Path;

use exifdate_core::run::reconcile_paths;
use exifdate_core::store::{MemoryStore, MetadataStore};
use exifdate_core::{reconcile, ExtractedDate, Outcome, ReconcileOptions};

fn options() -> ReconcileOptions {
    ReconcileOptions::default()
}

#[test]
fn test_set_then_already_set() {
    let store = MemoryStore::new();
    let path = Path::new("album/20050615 beach.jpg");
    store.insert_image(path, None);

    let first = reconcile(path, &store, &options());
    assert_eq!(first.outcome, Outcome::Set);
    assert_eq!(first.extracted_date, ExtractedDate::from_ymd(2005, 6, 15));
    assert_eq!(store.write_count(), 1);

    let second = reconcile(path, &store, &options());
    assert_eq!(second.outcome, Outcome::AlreadySet);
    assert_eq!(second.value().as_deref(), Some("2005:06:15 00:00:00"));
    assert_eq!(store.write_count(), 1);
}

#[test]
fn test_force_overwrites_and_keeps_previous() {
    let store = MemoryStore::new();
    let path = Path::new("2010-05-02 party.jpg");
    store.insert_image(path, Some("2001:01:01 00:00:00"));

    let record = reconcile(path, &store, &options().with_force_overwrite(true));
    assert_eq!(record.outcome, Outcome::ForcedOverwrite);
    assert_eq!(record.value().as_deref(), Some("2010:05:02 00:00:00"));
    assert_eq!(record.previous(), Some("2001:01:01 00:00:00"));
    assert_eq!(
        store.original_date(path).map(|d| d.raw),
        Some("2010:05:02 00:00:00".to_string())
    );
}

#[test]
fn test_force_without_usable_filename() {
    let store = MemoryStore::new();
    let path = Path::new("party.jpg");
    store.insert_image(path, Some("2001:01:01 00:00:00"));

    let record = reconcile(path, &store, &options().with_force_overwrite(true));
    assert_eq!(record.outcome, Outcome::InvalidFilename);
    assert_eq!(store.write_count(), 0);
}

#[test]
fn test_present_date_is_kept_without_force() {
    let store = MemoryStore::new();
    let path = Path::new("2010-05-02 party.jpg");
    // A blank placeholder still counts as set.
    store.insert_image(path, Some("    :  :     :  :  "));

    let record = reconcile(path, &store, &options());
    assert_eq!(record.outcome, Outcome::AlreadySet);
    assert!(record.extracted_date.is_none());
    assert_eq!(store.write_count(), 0);
}

#[test]
fn test_invalid_calendar_date_is_invalid_filename() {
    let store = MemoryStore::new();
    let path = Path::new("2007-13-40 party.jpg");
    store.insert_image(path, None);

    let record = reconcile(path, &store, &options());
    assert_eq!(record.outcome, Outcome::InvalidFilename);
    assert!(record.extracted_date.is_none());
}

#[test]
fn test_excluded_extension_skips_store() {
    // Not inserted: any store access would surface as an error outcome.
    let store = MemoryStore::new();
    let record = reconcile(Path::new("2010-05-02.txt"), &store, &options());
    assert_eq!(record.outcome, Outcome::ExcludedExtension);
}

#[test]
fn test_read_error_policy() {
    let store = MemoryStore::new();
    let path = Path::new("2003-04-05 corrupt.jpg");
    store.insert_unreadable(path);

    let strict = options().with_treat_read_error_as_missing(false);
    let record = reconcile(path, &store, &strict);
    assert_eq!(record.outcome, Outcome::ExtractionError);
    assert!(record.error.as_deref().unwrap().contains("corrupt Exif block"));
    assert_eq!(store.write_count(), 0);

    let record = reconcile(path, &store, &options());
    assert_eq!(record.outcome, Outcome::Set);
    assert!(record.error.is_none());
}

#[test]
fn test_write_failures_are_classified() {
    let store = MemoryStore::new();
    store.insert_not_image("2003-04-05 fake.jpg");
    store.insert_read_only("2003-04-05 locked.jpg", None);

    let record = reconcile(Path::new("2003-04-05 fake.jpg"), &store, &options());
    assert_eq!(record.outcome, Outcome::InvalidImage);
    assert!(record.error.is_some());

    let record = reconcile(Path::new("2003-04-05 locked.jpg"), &store, &options());
    assert_eq!(record.outcome, Outcome::WriteError);
    assert_eq!(record.extracted_date, ExtractedDate::from_ymd(2003, 4, 5));
    assert!(store.read_original_date(Path::new("2003-04-05 locked.jpg")).unwrap().is_none());
}

#[test]
fn test_outcome_is_deterministic() {
    let names = [
        "20050600 trip.jpg",
        "2007 reunion.jpg",
        "2007-03 reunion.jpg",
        "scan.jpg",
        "notes.txt",
    ];

    let outcomes = || {
        let store = MemoryStore::new();
        for name in names {
            store.insert_image(name, None);
        }
        names
            .iter()
            .map(|name| {
                let r = reconcile(Path::new(name), &store, &options());
                (r.outcome, r.extracted_date)
            })
            .collect::<Vec<_>>()
    };

    let first = outcomes();
    assert_eq!(first, outcomes());
    assert_eq!(first[0].1, ExtractedDate::from_ymd(2005, 6, 1));
    assert_eq!(first[1].1, ExtractedDate::from_ymd(2007, 1, 1));
    assert_eq!(first[2].1, ExtractedDate::from_ymd(2007, 3, 1));
    assert_eq!(first[3].0, Outcome::InvalidFilename);
    assert_eq!(first[4].0, Outcome::ExcludedExtension);
}

#[test]
fn test_rerun_is_idempotent() {
    let store = MemoryStore::new();
    let names = ["1999-12-31 party.jpg", "19990704.jpg", "untitled.jpg"];
    for name in names {
        store.insert_image(name, None);
    }
    let paths = || names.iter().map(std::path::PathBuf::from);

    let first = reconcile_paths(paths(), &store, &options(), None, |_| {});
    assert_eq!(first.summary.count(Outcome::Set), 2);
    assert_eq!(first.summary.count(Outcome::InvalidFilename), 1);

    let second = reconcile_paths(paths(), &store, &options(), None, |_| {});
    assert_eq!(second.summary.count(Outcome::AlreadySet), 2);
    assert_eq!(second.summary.count(Outcome::Set), 0);
    assert_eq!(second.summary.total(), 3);
    assert_eq!(store.write_count(), 2);
}
