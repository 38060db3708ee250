//! Date shifting end to end against an on-disk SQLite repository.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};
use datademo_core::db::SqliteStore;
use datademo_core::error::CoreError;
use datademo_core::listeners::{DUBLINCORE_LISTENER, OP_CHAIN_LISTENER};
use datademo_core::model::{Document, FieldPath, SchemaManager, Value};
use datademo_core::random::{RandomInfoOptions, RandomModificationInfo};
use datademo_core::session::{DocumentStore, ListenerRegistry, TransactionManager};
use datademo_core::shift::{DateShifter, ShiftOptions};
use datademo_core::worker::{self, run_foreground};

// The worker's running flag is process-wide.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

fn at(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 3, 1, 9, 30, 0).single().expect("valid base") + Duration::days(day)
}

fn project() -> Document {
    let mut contract = BTreeMap::new();
    contract.insert("owner".to_string(), Value::from("jdoe"));
    contract.insert("signed".to_string(), Value::Date(at(1)));
    let mut milestone = BTreeMap::new();
    milestone.insert("label".to_string(), Value::from("beta"));
    milestone.insert("due".to_string(), Value::Date(at(20)));
    milestone.insert("reminders".to_string(), Value::List(vec![Value::Date(at(18))]));
    let mut window = BTreeMap::new();
    window.insert("start".to_string(), Value::Date(at(7)));
    let mut phase = BTreeMap::new();
    phase.insert("name".to_string(), Value::from("design"));
    phase.insert("window".to_string(), Value::Complex(window));

    Document::new("Project")
        .with_field("dp:kickoff", Value::Date(at(3)))
        .with_field("dp:review_dates", Value::List(vec![Value::Date(at(10))]))
        .with_field("dp:contract", Value::Complex(contract))
        .with_field("dp:milestones", Value::List(vec![Value::Complex(milestone)]))
        .with_field("dp:phases", Value::List(vec![Value::Complex(phase)]))
}

fn read(store: &SqliteStore, id: &str, path: &str) -> Value {
    store
        .get_document(id)
        .expect("get")
        .expect("present")
        .get_path(&FieldPath::parse(path).expect("path"))
        .expect("read path")
}

fn create_repo(path: &Path, projects: usize) -> Vec<String> {
    let store = SqliteStore::open(path).expect("open");
    (0..projects)
        .map(|_| store.create_document(project()).expect("create").id)
        .collect()
}

#[test]
fn shift_moves_every_one_level_date_and_persists() {
    let _serial = serial();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("repo.sqlite3");
    let ids = create_repo(&path, 7);

    let store = SqliteStore::open(&path).expect("open");
    let modified_before = read(&store, &ids[0], "dc:modified");
    let mut shifter = DateShifter::by_days(30).with_options(ShiftOptions {
        docs_per_page: 3,
        docs_per_transaction: 2,
        ..ShiftOptions::default()
    });
    let report = run_foreground(&store, &SchemaManager::builtin(), &mut shifter).expect("shift");
    drop(store);

    assert_eq!(report.documents_updated, 7);
    assert_eq!(report.types_processed(), 1);
    assert!(!worker::is_running());

    let store = SqliteStore::open(&path).expect("reopen");
    for id in &ids {
        assert_eq!(read(&store, id, "dp:kickoff"), Value::Date(at(33)));
        assert_eq!(read(&store, id, "dp:review_dates"), Value::List(vec![Value::Date(at(40))]));
        assert_eq!(read(&store, id, "dp:contract/signed"), Value::Date(at(31)));
        assert_eq!(read(&store, id, "dp:contract/owner"), Value::from("jdoe"));
        assert_eq!(read(&store, id, "dp:milestones/0/due"), Value::Date(at(50)));
        assert_eq!(
            read(&store, id, "dp:milestones/0/reminders"),
            Value::List(vec![Value::Date(at(48))])
        );
        // Two levels deep: left alone.
        assert_eq!(read(&store, id, "dp:phases/0/window/start"), Value::Date(at(7)));
    }

    // The auto-timestamp listener was suspended, so dc:modified moved by
    // exactly the shift instead of being restamped.
    let expected_modified = modified_before
        .as_date()
        .map(|d| Value::Date(d + Duration::days(30)));
    assert_eq!(Some(read(&store, &ids[0], "dc:modified")), expected_modified);
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
}

#[test]
fn listener_flags_return_to_their_snapshot() {
    let _serial = serial();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("repo.sqlite3");
    create_repo(&path, 2);

    let store = SqliteStore::open(&path).expect("open");
    store.set_enabled(OP_CHAIN_LISTENER, false).expect("disable");
    store.recompute_enabled().expect("recompute");

    let mut shifter = DateShifter::by_days(2).with_options(ShiftOptions {
        extra_listeners: vec![OP_CHAIN_LISTENER.to_string(), "no-such-listener".to_string()],
        ..ShiftOptions::default()
    });
    run_foreground(&store, &SchemaManager::builtin(), &mut shifter).expect("shift");
    drop(store);

    let store = SqliteStore::open(&path).expect("reopen");
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
    assert_eq!(store.is_enabled(OP_CHAIN_LISTENER).expect("lookup"), Some(false));
    assert_eq!(store.is_enabled("no-such-listener").expect("lookup"), None);
}

#[test]
fn failed_shift_rolls_back_batch_but_restores_listeners() {
    let _serial = serial();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("repo.sqlite3");
    let ids = create_repo(&path, 1);
    {
        let store = SqliteStore::open(&path).expect("open");
        store
            .create_document(Document::new("Project").with_field("dp:kickoff", "soon"))
            .expect("create bad doc");
    }

    let store = SqliteStore::open(&path).expect("open");
    let mut shifter = DateShifter::by_days(5).with_options(ShiftOptions {
        docs_per_page: 10,
        docs_per_transaction: 10,
        ..ShiftOptions::default()
    });
    let err = run_foreground(&store, &SchemaManager::builtin(), &mut shifter).expect_err("mismatch");
    assert!(matches!(err, CoreError::TypeMismatch { .. }));
    drop(store);

    let store = SqliteStore::open(&path).expect("reopen");
    assert_eq!(read(&store, &ids[0], "dp:kickoff"), Value::Date(at(3)));
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
}

#[test]
fn stale_reference_under_a_day_touches_nothing() {
    let _serial = serial();
    let store = SqliteStore::in_memory().expect("store");
    let id = store.create_document(project()).expect("create").id;

    let now = Utc::now();
    let mut shifter = DateShifter::since(now - Duration::hours(20), now);
    let report = run_foreground(&store, &SchemaManager::builtin(), &mut shifter).expect("run");

    assert!(report.rejected);
    assert_eq!(report.documents_updated, 0);
    assert_eq!(read(&store, &id, "dp:kickoff"), Value::Date(at(3)));
}

#[test]
fn random_info_rewrites_history_without_restamping() {
    let store = SqliteStore::in_memory().expect("store");
    let ids: Vec<String> = (0..5)
        .map(|_| store.create_document(Document::new("Note")).expect("create").id)
        .collect();
    let folder = store.create_document(Document::new("Folder")).expect("create").id;
    let folder_created = read(&store, &folder, "dc:created");

    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).single().expect("now");
    let options = RandomInfoOptions {
        doc_types: vec!["Note".into()],
        users: vec!["alice".into(), "bob".into()],
        created_from_days: 10,
        created_to_days: 60,
        modified_up_to_days: 5,
        docs_per_page: 2,
        docs_per_transaction: 3,
    };
    store.start().expect("start");
    let report = RandomModificationInfo::new(options, Some(11))
        .with_now(now)
        .run(&store)
        .expect("randomize");
    store.commit_or_rollback().expect("commit");

    assert_eq!(report.documents_updated, 5);
    for id in &ids {
        let created = read(&store, id, "dc:created").as_date().expect("created");
        let modified = read(&store, id, "dc:modified").as_date().expect("modified");
        assert!(created <= now - Duration::days(10));
        assert!(created >= now - Duration::days(60));
        assert!(modified >= created && modified <= now);
        let contributor = read(&store, id, "dc:lastContributor");
        assert!(matches!(contributor.as_str(), Some("alice" | "bob")));
    }
    assert_eq!(read(&store, &folder, "dc:created"), folder_created);
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
}

#[test]
fn direct_run_commits_dates_and_restored_listeners() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("repo.sqlite3");
    let ids = create_repo(&path, 3);
    let note = {
        let store = SqliteStore::open(&path).expect("open");
        store.create_document(Document::new("Note")).expect("create").id
    };

    let store = SqliteStore::open(&path).expect("open");
    let note_modified = read(&store, &note, "dc:modified").as_date().expect("modified");
    let report = DateShifter::by_days(3)
        .with_options(ShiftOptions {
            docs_per_page: 2,
            docs_per_transaction: 2,
            ..ShiftOptions::default()
        })
        .run(&store, &SchemaManager::builtin())
        .expect("shift");
    assert_eq!(report.documents_updated, 4);
    drop(store);

    let store = SqliteStore::open(&path).expect("reopen");
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
    for id in &ids {
        assert_eq!(read(&store, id, "dp:kickoff"), Value::Date(at(6)));
    }
    let shifted = note_modified + Duration::days(3);
    assert_eq!(read(&store, &note, "dc:modified"), Value::Date(shifted));

    // The listener fires again on later saves.
    let doc = store.get_document(&note).expect("get").expect("present");
    store.save(doc).expect("save");
    assert_ne!(read(&store, &note, "dc:modified"), Value::Date(shifted));
}

#[test]
fn direct_random_info_run_commits_restored_listeners() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("repo.sqlite3");
    let id = {
        let store = SqliteStore::open(&path).expect("open");
        store.create_document(Document::new("Note")).expect("create").id
    };

    let store = SqliteStore::open(&path).expect("open");
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).single().expect("now");
    let options = RandomInfoOptions {
        created_from_days: 30,
        created_to_days: 40,
        ..RandomInfoOptions::default()
    };
    RandomModificationInfo::new(options, Some(4))
        .with_now(now)
        .run(&store)
        .expect("randomize");
    drop(store);

    let store = SqliteStore::open(&path).expect("reopen");
    assert_eq!(store.is_enabled(DUBLINCORE_LISTENER).expect("lookup"), Some(true));
    let created = read(&store, &id, "dc:created").as_date().expect("created");
    assert!(created <= now - Duration::days(30));
}
