use std::fs;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use taskboard_core::board::Move;
use taskboard_core::datastore::{BOARD_FILE_NAME, BoardStore, JsonFileStore, MemoryStore};
use taskboard_core::local::LocalStore;
use taskboard_core::task::{Task, View};
use taskboard_shared::TaskPatch;
use tempfile::tempdir;

fn task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        title: format!("task {id}"),
        date: "2026-03-01".to_string(),
        time: "08:00 AM".to_string(),
        completed: false,
    }
}

#[test]
fn every_operation_is_written_through() {
    let temp = tempdir().expect("tempdir");
    let persistence = Arc::new(JsonFileStore::open(temp.path()).expect("open store"));
    let now = Utc::now();

    let mut store = LocalStore::open(persistence.clone(), true);
    store.add_local(task("1"), now);
    store.add_local(task("2"), now);
    store.update_local("1", &TaskPatch::completed_only(true));
    store.reorder_local(Move {
        source: View::All,
        source_index: 0,
        destination: View::All,
        destination_index: 1,
    });

    let saved = persistence
        .load()
        .expect("load")
        .expect("board was saved");
    assert_eq!(&saved, store.board());

    let raw = fs::read_to_string(temp.path().join(BOARD_FILE_NAME)).expect("read tasks.json");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    for key in ["all", "active", "completed", "lastSync", "isOnline", "initialized"] {
        assert!(json.get(key).is_some(), "missing {key} in {raw}");
    }
}

#[test]
fn reopening_restores_board_but_takes_current_network_status() {
    let temp = tempdir().expect("tempdir");
    let persistence = Arc::new(JsonFileStore::open(temp.path()).expect("open store"));
    let at = Utc
        .with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .expect("valid time");

    {
        let mut store = LocalStore::open(persistence.clone(), true);
        store.add_local(task("1"), at);
        store.set_last_sync(at);
        store.mark_initialized();
    }

    let reopened = LocalStore::open(persistence, false);
    let board = reopened.board();
    assert_eq!(board.all().len(), 1);
    assert_eq!(board.last_sync(), Some(at));
    assert!(board.is_initialized());
    assert!(!board.is_online());
}

#[test]
fn corrupt_record_falls_back_to_empty_board() {
    let persistence = Arc::new(MemoryStore::with_raw("{ not json"));
    let store = LocalStore::open(persistence, true);
    let board = store.board();
    assert!(board.all().is_empty());
    assert!(!board.is_initialized());
    assert!(board.is_online());
}

#[test]
fn empty_record_counts_as_nothing_saved() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join(BOARD_FILE_NAME), "  \n").expect("write");
    let persistence = JsonFileStore::open(temp.path()).expect("open store");
    assert!(persistence.load().expect("load").is_none());
}

#[test]
fn inconsistent_record_is_repaired_on_next_write() {
    let raw = serde_json::json!({
        "all": [
            { "id": "1", "title": "one", "completed": true },
            { "id": "2", "title": "two", "completed": false }
        ],
        "active": [{ "id": "1", "title": "one", "completed": true }],
        "completed": [],
        "initialized": true
    })
    .to_string();
    let persistence = Arc::new(MemoryStore::with_raw(raw));

    let mut store = LocalStore::open(persistence.clone(), false);
    store.set_network_status(false);

    let board = store.board();
    assert!(board.check_invariants().is_ok());
    assert_eq!(board.active().len(), 1);
    assert_eq!(board.active()[0].id, "2");
    assert_eq!(board.completed()[0].id, "1");
    assert_eq!(persistence.save_count(), 1);
}

#[test]
fn repeated_ids_collapse_to_first_entry() {
    let raw = serde_json::json!({
        "all": [
            { "id": "A", "title": "first", "completed": false },
            { "id": "B", "title": "other", "completed": true },
            { "id": "A", "title": "second", "completed": false }
        ],
        "active": [{ "id": "A", "title": "first", "completed": false }],
        "completed": [{ "id": "B", "title": "other", "completed": true }],
        "initialized": true
    })
    .to_string();
    let persistence = Arc::new(MemoryStore::with_raw(raw));

    let mut store = LocalStore::open(persistence.clone(), true);
    store
        .update_local(
            "A",
            &TaskPatch {
                title: Some("renamed".to_string()),
                ..TaskPatch::default()
            },
        )
        .expect("A exists");

    let board = store.board();
    assert!(board.check_invariants().is_ok());
    let all: Vec<(&str, &str)> = board
        .all()
        .iter()
        .map(|t| (t.id.as_str(), t.title.as_str()))
        .collect();
    assert_eq!(all, vec![("A", "renamed"), ("B", "other")]);
    assert_eq!(board.active().len(), 1);
    assert_eq!(board.active()[0].title, "renamed");

    let saved = persistence.load().expect("load").expect("saved");
    assert_eq!(saved.all().len(), 2);
}

#[test]
fn unknown_update_does_not_write() {
    let persistence = Arc::new(MemoryStore::new());
    let mut store = LocalStore::open(persistence.clone(), true);
    assert!(
        store
            .update_local("ghost", &TaskPatch::completed_only(true))
            .is_none()
    );
    assert_eq!(persistence.save_count(), 0);
    assert!(persistence.raw().is_none());
}

#[test]
fn saved_snapshot_reads_persisted_record() {
    let persistence = Arc::new(MemoryStore::new());
    let mut store = LocalStore::open(persistence, true);
    store.add_local(task("1"), Utc::now());

    let snapshot = store.saved_snapshot();
    assert_eq!(&snapshot, store.board());
}
