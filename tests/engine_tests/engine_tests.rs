//! Tests for Engine
//!
//! These tests verify:
//! - Open/close lifecycle and the NotOpen guard
//! - Add/find/update/delete semantics and their failure modes
//! - Predicate scans over live records
//! - Persistence across reopen
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use flatdb::config::{Config, SyncStrategy};
use flatdb::engine::Engine;
use flatdb::session::Session;
use flatdb::storage::DATA_FILE;
use flatdb::{Employee, FlatDbError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_dir(temp_dir.path().join("db"))
        .sync_strategy(SyncStrategy::EveryWrite) // Sync every write for test reliability
        .build();
    let engine = Engine::open_with(config).unwrap();
    (temp_dir, engine)
}

fn employee(id: i32, name: &str, department: &str, position: &str) -> Employee {
    Employee::new(
        id,
        name,
        department,
        position,
        1000.0,
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
    )
}

fn ids(records: &[Employee]) -> Vec<i32> {
    let mut ids: Vec<i32> = records.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids
}

/// Two departments, two positions
fn populate(engine: &Engine) {
    engine.add(&employee(1, "Ann Smith", "IT", "Dev")).unwrap();
    engine.add(&employee(2, "Bob Stone", "IT", "QA")).unwrap();
    engine.add(&employee(3, "Carl Annson", "HR", "Dev")).unwrap();
    engine.add(&employee(4, "Dana White", "HR", "Lead")).unwrap();
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_open_creates_files() {
    let temp_dir = TempDir::new().unwrap();
    let db_dir = temp_dir.path().join("mydb");

    let engine = Engine::open_path(&db_dir, true).unwrap();

    assert!(engine.is_open());
    assert!(db_dir.join("meta.db").exists());
    assert!(db_dir.join("data.db").exists());
    assert!(db_dir.join("index.db").exists());
    assert_eq!(engine.database_path(), db_dir.as_path());
    assert_eq!(engine.count().unwrap(), 0);
}

#[test]
fn test_engine_open_missing_without_create_fails() {
    let temp_dir = TempDir::new().unwrap();
    let db_dir = temp_dir.path().join("absent");

    let result = Engine::open_path(&db_dir, false);

    assert!(matches!(result, Err(FlatDbError::FileAccess { .. })));
    assert!(!db_dir.exists());
}

#[test]
fn test_engine_rejects_bad_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_dir(temp_dir.path())
        .index_load_factor(1.0)
        .build();

    assert!(matches!(Engine::new(config), Err(FlatDbError::Config(_))));
}

#[test]
fn test_operations_before_open_fail() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().db_dir(temp_dir.path()).build();
    let engine = Engine::new(config).unwrap();

    assert!(!engine.is_open());
    assert!(matches!(engine.count(), Err(FlatDbError::NotOpen)));
    assert!(matches!(engine.find_by_id(1), Err(FlatDbError::NotOpen)));
    assert!(matches!(engine.get_all(), Err(FlatDbError::NotOpen)));
    assert!(matches!(
        engine.add(&employee(1, "Ann", "IT", "Dev")),
        Err(FlatDbError::NotOpen)
    ));
    // NotOpen wins over validation
    assert!(matches!(
        engine.add(&employee(0, "", "", "")),
        Err(FlatDbError::NotOpen)
    ));
}

#[test]
fn test_operations_after_close_fail() {
    let (_temp, engine) = setup_temp_engine();
    engine.add(&employee(1, "Ann", "IT", "Dev")).unwrap();

    engine.close().unwrap();

    assert!(!engine.is_open());
    assert!(matches!(engine.delete_by_id(1), Err(FlatDbError::NotOpen)));
    assert!(matches!(engine.size_in_bytes(), Err(FlatDbError::NotOpen)));
}

#[test]
fn test_close_and_open_are_idempotent() {
    let (_temp, engine) = setup_temp_engine();

    engine.open().unwrap();
    engine.close().unwrap();
    engine.close().unwrap();

    engine.open().unwrap();
    assert!(engine.is_open());
}

// =============================================================================
// Add / Find Tests
// =============================================================================

#[test]
fn test_add_and_find_by_id() {
    let (_temp, engine) = setup_temp_engine();
    let ann = employee(1, "Ann", "IT", "Dev");

    engine.add(&ann).unwrap();

    assert_eq!(engine.find_by_id(1).unwrap(), Some(ann));
    assert_eq!(engine.find_by_id(2).unwrap(), None);
    assert_eq!(engine.count().unwrap(), 1);
    assert_eq!(engine.size_in_bytes().unwrap(), 256);
}

#[test]
fn test_add_duplicate_fails_without_side_effects() {
    let (_temp, engine) = setup_temp_engine();
    engine.add(&employee(1, "Ann", "IT", "Dev")).unwrap();

    let result = engine.add(&employee(1, "Other", "HR", "Lead"));

    assert!(matches!(result, Err(FlatDbError::DuplicateKey { key: 1 })));
    assert_eq!(engine.count().unwrap(), 1);
    assert_eq!(engine.size_in_bytes().unwrap(), 256);
    assert_eq!(engine.find_by_id(1).unwrap().unwrap().name, "Ann");
}

#[test]
fn test_add_invalid_record_changes_nothing() {
    let (_temp, engine) = setup_temp_engine();

    let mut bad = employee(5, "Ann", "IT", "Dev");
    bad.salary = -1.0;
    let result = engine.add(&bad);

    assert!(matches!(
        result,
        Err(FlatDbError::Validation { field: "salary", .. })
    ));
    assert_eq!(engine.count().unwrap(), 0);
    assert_eq!(engine.size_in_bytes().unwrap(), 0);
    assert_eq!(engine.find_by_id(5).unwrap(), None);
}

#[test]
fn test_add_ignores_incoming_deleted_flag() {
    let (_temp, engine) = setup_temp_engine();
    let mut ann = employee(1, "Ann", "IT", "Dev");
    ann.deleted = true;

    engine.add(&ann).unwrap();

    let found = engine.find_by_id(1).unwrap().unwrap();
    assert!(!found.deleted);
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_overwrites_in_place() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);
    let size_before = engine.size_in_bytes().unwrap();

    let mut changed = employee(2, "Bob Stone", "Ops", "Lead");
    changed.salary = 2500.75;
    engine.update(&changed).unwrap();

    assert_eq!(engine.find_by_id(2).unwrap(), Some(changed));
    assert_eq!(engine.size_in_bytes().unwrap(), size_before);
    assert_eq!(engine.count().unwrap(), 4);
    assert_eq!(ids(&engine.find_by_department("IT").unwrap()), vec![1]);
}

#[test]
fn test_update_missing_record_leaves_data_untouched() {
    let (temp, engine) = setup_temp_engine();
    populate(&engine);
    let data_path = temp.path().join("db").join(DATA_FILE);
    let bytes_before = std::fs::read(&data_path).unwrap();

    let result = engine.update(&employee(99, "Nobody", "IT", "Dev"));

    assert!(matches!(result, Err(FlatDbError::RecordNotFound { id: 99 })));
    assert_eq!(std::fs::read(&data_path).unwrap(), bytes_before);
}

#[test]
fn test_update_deleted_record_fails() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);
    engine.delete_by_id(3).unwrap();

    let result = engine.update(&employee(3, "Carl", "HR", "Dev"));

    assert!(matches!(result, Err(FlatDbError::RecordNotFound { id: 3 })));
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_by_id() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);

    assert!(engine.delete_by_id(2).unwrap());

    assert_eq!(engine.find_by_id(2).unwrap(), None);
    assert_eq!(engine.count().unwrap(), 3);
    // Slot stays allocated
    assert_eq!(engine.size_in_bytes().unwrap(), 4 * 256);
    assert!(!engine.delete_by_id(2).unwrap());
    assert!(!engine.delete_by_id(42).unwrap());
}

#[test]
fn test_deleted_id_can_be_added_again() {
    let (_temp, engine) = setup_temp_engine();
    engine.add(&employee(1, "Ann", "IT", "Dev")).unwrap();
    engine.delete_by_id(1).unwrap();

    engine.add(&employee(1, "Ann Again", "IT", "Dev")).unwrap();

    assert_eq!(engine.find_by_id(1).unwrap().unwrap().name, "Ann Again");
    assert_eq!(engine.count().unwrap(), 1);
    assert_eq!(engine.size_in_bytes().unwrap(), 512);
}

#[test]
fn test_delete_by_department() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);

    let deleted = engine.delete_by_department("HR").unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(engine.count().unwrap(), 2);
    assert!(engine.find_by_department("HR").unwrap().is_empty());
    assert_eq!(ids(&engine.get_all().unwrap()), vec![1, 2]);

    assert_eq!(engine.delete_by_department("HR").unwrap(), 0);
    assert_eq!(engine.delete_by_department("Nowhere").unwrap(), 0);
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scans_filter_live_records() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);
    engine.delete_by_id(4).unwrap();

    assert_eq!(ids(&engine.get_all().unwrap()), vec![1, 2, 3]);
    assert_eq!(ids(&engine.find_by_department("IT").unwrap()), vec![1, 2]);
    assert_eq!(ids(&engine.find_by_department("HR").unwrap()), vec![3]);
    assert_eq!(ids(&engine.find_by_position("Dev").unwrap()), vec![1, 3]);
    assert!(engine.find_by_position("Lead").unwrap().is_empty());
    assert!(engine.find_by_department("it").unwrap().is_empty());
}

#[test]
fn test_find_by_name_is_case_insensitive_substring() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);

    assert_eq!(ids(&engine.find_by_name("ann").unwrap()), vec![1, 3]);
    assert_eq!(ids(&engine.find_by_name("STONE").unwrap()), vec![2]);
    assert!(engine.find_by_name("zed").unwrap().is_empty());
}

#[test]
fn test_find_by_name_cyrillic() {
    let (_temp, engine) = setup_temp_engine();
    engine.add(&employee(1, "Анна Петрова", "IT", "Dev")).unwrap();

    assert_eq!(ids(&engine.find_by_name("АННА").unwrap()), vec![1]);
}

#[test]
fn test_get_all_on_empty_database() {
    let (_temp, engine) = setup_temp_engine();
    assert!(engine.get_all().unwrap().is_empty());
}

#[test]
fn test_scan_skips_corrupted_slot() {
    let temp_dir = TempDir::new().unwrap();
    let db_dir = temp_dir.path().join("db");
    {
        let engine = Engine::open_path(&db_dir, true).unwrap();
        populate(&engine);
        engine.close().unwrap();
    }

    // Break the UTF-8 of the second slot's name
    let data_path = db_dir.join(DATA_FILE);
    let mut bytes = std::fs::read(&data_path).unwrap();
    bytes[256 + 4] = 0xFF;
    bytes[256 + 5] = 0xFE;
    std::fs::write(&data_path, &bytes).unwrap();

    let engine = Engine::open_path(&db_dir, false).unwrap();

    assert_eq!(ids(&engine.get_all().unwrap()), vec![1, 3, 4]);
    assert!(matches!(
        engine.find_by_id(2),
        Err(FlatDbError::CorruptRecord {
            offset: Some(256),
            ..
        })
    ));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_dir = temp_dir.path().join("db");

    {
        let engine = Engine::open_path(&db_dir, true).unwrap();
        populate(&engine);
        engine.delete_by_id(2).unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open_path(&db_dir, false).unwrap();
    assert_eq!(engine.count().unwrap(), 3);
    assert_eq!(ids(&engine.get_all().unwrap()), vec![1, 3, 4]);
    assert_eq!(engine.find_by_id(3).unwrap().unwrap().name, "Carl Annson");
    assert_eq!(engine.find_by_id(2).unwrap(), None);
}

#[test]
fn test_drop_closes_engine() {
    let temp_dir = TempDir::new().unwrap();
    let db_dir = temp_dir.path().join("db");

    {
        let engine = Engine::open_path(&db_dir, true).unwrap();
        engine.add(&employee(7, "Gail", "IT", "Dev")).unwrap();
        // No explicit close
    }

    let engine = Engine::open_path(&db_dir, false).unwrap();
    assert_eq!(engine.find_by_id(7).unwrap().unwrap().name, "Gail");
}

#[test]
fn test_many_records_across_index_growth() {
    let (_temp, engine) = setup_temp_engine();

    for id in 1..=100 {
        engine
            .add(&employee(id, "Worker", if id % 2 == 0 { "Even" } else { "Odd" }, "Dev"))
            .unwrap();
    }

    assert_eq!(engine.count().unwrap(), 100);
    for id in 1..=100 {
        assert_eq!(engine.find_by_id(id).unwrap().unwrap().id, id);
    }
    assert_eq!(engine.find_by_department("Even").unwrap().len(), 50);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_reads() {
    let (_temp, engine) = setup_temp_engine();
    populate(&engine);
    let engine = Arc::new(engine);

    let mut handles = vec![];
    for _ in 0..8 {
        let engine_clone = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                assert_eq!(engine_clone.find_by_id(3).unwrap().unwrap().department, "HR");
                assert_eq!(engine_clone.get_all().unwrap().len(), 4);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_engine_concurrent_writes() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let mut handles = vec![];
    for t in 0..4 {
        let engine_clone = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let id = t * 100 + i + 1;
                engine_clone
                    .add(&employee(id, "Writer", &format!("Team{}", t), "Dev"))
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.count().unwrap(), 100);
    assert_eq!(engine.size_in_bytes().unwrap(), 100 * 256);
    for t in 0..4 {
        assert_eq!(engine.find_by_department(&format!("Team{}", t)).unwrap().len(), 25);
    }
}

#[test]
fn test_readers_see_whole_writes() {
    let (_temp, engine) = setup_temp_engine();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            for id in 1..=50 {
                engine.add(&employee(id, "Batch", "IT", "Dev")).unwrap();
            }
        });
        for _ in 0..3 {
            s.spawn(|_| {
                for _ in 0..50 {
                    // Count and scan agree because each add is one write section
                    let all = engine.get_all().unwrap();
                    for record in &all {
                        assert!(engine.find_by_id(record.id).unwrap().is_some());
                    }
                }
            });
        }
    })
    .unwrap();

    assert_eq!(engine.count().unwrap(), 50);
}

#[test]
fn test_lock_timeout() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_dir(temp_dir.path())
        .lock_timeout(Duration::from_millis(50))
        .build();
    let session = Session::new(temp_dir.path(), config);
    session.open(true).unwrap();

    let writer = session.begin_write().unwrap();

    crossbeam::scope(|s| {
        s.spawn(|_| {
            assert!(matches!(
                session.begin_read(),
                Err(FlatDbError::LockTimeout { mode: "read", .. })
            ));
            assert!(matches!(
                session.begin_write(),
                Err(FlatDbError::LockTimeout { mode: "write", .. })
            ));
        });
    })
    .unwrap();

    drop(writer);
    assert!(session.begin_read().is_ok());
}
