//! Integration tests for the persistence layer.
//!
//! These tests exercise PersistenceEngine, ImageReader and service::hydrate
//! against real storage directories created with tempfile.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use guestbook::core::registry::{GuestEntry, Registry, Snapshot};
use guestbook::persist::{
    ImageId, ImageReader, ImageState, PersistError, PersistenceEngine, RecoveryPolicy,
};
use guestbook::service;

// =============================================================================
// Test Helpers
// =============================================================================

fn complete_images(dir: &Path) -> Vec<ImageId> {
    ImageReader::new(dir)
        .images()
        .expect("list images")
        .into_iter()
        .filter(|info| info.state == ImageState::Complete)
        .map(|info| info.id)
        .collect()
}

fn write_image(dir: &Path, seq: u64, state: ImageState, contents: &str) {
    let name = ImageId::new(seq).file_name(state);
    fs::write(dir.join(name), contents).expect("write image");
}

// =============================================================================
// Restart Scenarios
// =============================================================================

#[test]
fn guests_survive_restart() {
    let dir = TempDir::new().unwrap();

    {
        let (engine, registry) = service::hydrate(dir.path(), RecoveryPolicy::Strict).unwrap();
        assert!(registry.is_empty());

        registry.add("alice", true);
        registry.add("bob", false);
        engine.persist(&registry.snapshot()).unwrap();
    }

    let (_engine, registry) = service::hydrate(dir.path(), RecoveryPolicy::Strict).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.is_special("alice"));
    assert!(!registry.is_special("bob"));
    assert_eq!(registry.get("bob"), Some(false));
}

#[test]
fn latest_image_wins_over_older_ones() {
    let dir = TempDir::new().unwrap();
    let engine = PersistenceEngine::open(dir.path()).unwrap();

    let registry = Registry::new();
    registry.add("alice", false);
    let first = engine.persist(&registry.snapshot()).unwrap();

    registry.add("alice", true);
    registry.add("carol", false);
    let second = engine.persist(&registry.snapshot()).unwrap();
    assert!(second > first);

    let loaded = engine.load_latest().unwrap();
    assert_eq!(loaded.get("alice"), Some(true));
    assert_eq!(loaded.get("carol"), Some(false));
}

#[test]
fn names_with_spaces_round_trip() {
    let dir = TempDir::new().unwrap();
    let engine = PersistenceEngine::open(dir.path()).unwrap();

    let snapshot = Snapshot::from_entries([
        GuestEntry::new("Ada Lovelace", true),
        GuestEntry::new("  padded  ", false),
    ]);
    engine.persist(&snapshot).unwrap();

    assert_eq!(engine.load_latest().unwrap(), snapshot);
}

#[test]
fn name_with_line_break_is_rejected_without_writing() {
    let dir = TempDir::new().unwrap();
    let engine = PersistenceEngine::open(dir.path()).unwrap();

    let snapshot = Snapshot::from_entries([GuestEntry::new("eve\ntrue", false)]);
    let err = engine.persist(&snapshot).unwrap_err();

    assert!(matches!(err, PersistError::Unencodable { .. }));
    assert!(engine.images().unwrap().is_empty());
}

// =============================================================================
// Crash Recovery
// =============================================================================

#[test]
fn leftover_partial_image_is_ignored() {
    let dir = TempDir::new().unwrap();

    {
        let engine = PersistenceEngine::open(dir.path()).unwrap();
        engine
            .persist(&Snapshot::from_entries([GuestEntry::new("alice", true)]))
            .unwrap();
    }
    // A writer that died between writing and renaming.
    write_image(
        dir.path(),
        u64::MAX - 1,
        ImageState::Partial,
        "alice false\nmallory true\n",
    );

    let (_engine, registry) = service::hydrate(dir.path(), RecoveryPolicy::Strict).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.is_special("alice"));
    assert_eq!(registry.get("mallory"), None);
}

#[test]
fn truncated_partial_alone_loads_empty() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), 7, ImageState::Partial, "alice tr");

    let snapshot = ImageReader::new(dir.path()).load_latest().unwrap();
    assert!(snapshot.is_empty());
}

#[test]
fn corrupt_newest_image_is_fatal_by_default() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), 1, ImageState::Complete, "alice true\n");
    write_image(dir.path(), 2, ImageState::Complete, "bob maybe\n");

    let err = service::hydrate(dir.path(), RecoveryPolicy::Strict).unwrap_err();
    match err {
        PersistError::CorruptImage { line, .. } => assert_eq!(line, 1),
        other => panic!("expected CorruptImage, got {other:?}"),
    }
}

#[test]
fn fallback_uses_previous_complete_image() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), 1, ImageState::Complete, "alice true\n");
    write_image(dir.path(), 2, ImageState::Complete, "no-separator\n");

    let (_engine, registry) = service::hydrate(dir.path(), RecoveryPolicy::Fallback).unwrap();
    assert!(registry.is_special("alice"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn non_utf8_newest_image_is_fatal_by_default() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), 1, ImageState::Complete, "alice true\n");
    let name = ImageId::new(2).file_name(ImageState::Complete);
    fs::write(dir.path().join(name), b"bob \xff\xfe\n").unwrap();

    let err = service::hydrate(dir.path(), RecoveryPolicy::Strict).unwrap_err();
    assert!(matches!(err, PersistError::CorruptImage { line: 1, .. }));
}

#[test]
fn non_utf8_newest_image_falls_back_to_previous() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), 1, ImageState::Complete, "alice true\n");
    let name = ImageId::new(2).file_name(ImageState::Complete);
    fs::write(dir.path().join(name), b"bob \xff\xfe\n").unwrap();

    let (_engine, registry) = service::hydrate(dir.path(), RecoveryPolicy::Fallback).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.is_special("alice"));
}

#[test]
fn image_at_max_sequence_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    write_image(dir.path(), u64::MAX, ImageState::Complete, "alice true\n");

    let engine = PersistenceEngine::open(dir.path()).unwrap();
    let err = engine
        .persist(&Snapshot::from_entries([GuestEntry::new("bob", false)]))
        .unwrap_err();
    assert!(matches!(err, PersistError::SequenceExhausted));

    let loaded = engine.load_latest().unwrap();
    assert_eq!(loaded.get("alice"), Some(true));
    assert_eq!(loaded.get("bob"), None);
}

#[test]
fn persist_after_restart_uses_higher_sequence() {
    let dir = TempDir::new().unwrap();
    let far_future = u64::MAX / 2;
    write_image(dir.path(), far_future, ImageState::Complete, "alice true\n");

    let engine = PersistenceEngine::open(dir.path()).unwrap();
    let id = engine.persist(&engine.load_latest().unwrap()).unwrap();

    assert_eq!(id.seq(), far_future + 1);
    assert_eq!(complete_images(dir.path())[0], id);
}

// =============================================================================
// Directory Ownership
// =============================================================================

#[test]
fn second_engine_on_same_directory_is_refused() {
    let dir = TempDir::new().unwrap();
    let _owner = PersistenceEngine::open(dir.path()).unwrap();

    let err = PersistenceEngine::open(dir.path()).unwrap_err();
    assert!(matches!(err, PersistError::Locked { .. }));
}

#[test]
fn directory_is_released_when_engine_drops() {
    let dir = TempDir::new().unwrap();
    drop(PersistenceEngine::open(dir.path()).unwrap());

    assert!(PersistenceEngine::open(dir.path()).is_ok());
}

#[test]
fn reader_works_while_engine_holds_lock() {
    let dir = TempDir::new().unwrap();
    let engine = PersistenceEngine::open(dir.path()).unwrap();
    engine
        .persist(&Snapshot::from_entries([GuestEntry::new("alice", true)]))
        .unwrap();

    let snapshot = ImageReader::new(dir.path()).load_latest().unwrap();
    assert_eq!(snapshot.get("alice"), Some(true));
}

#[test]
fn storage_path_that_is_a_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    fs::write(&file, "").unwrap();

    let err = PersistenceEngine::open(&file).unwrap_err();
    assert!(matches!(err, PersistError::Configuration(_)));
}

#[test]
fn every_persist_keeps_earlier_images() {
    let dir = TempDir::new().unwrap();
    let engine = PersistenceEngine::open(dir.path()).unwrap();
    let registry = Registry::new();

    for name in ["a", "b", "c"] {
        registry.add(name, false);
        engine.persist(&registry.snapshot()).unwrap();
    }

    let images = complete_images(dir.path());
    assert_eq!(images.len(), 3);
    assert!(images.windows(2).all(|w| w[0] > w[1]), "newest first");
}
