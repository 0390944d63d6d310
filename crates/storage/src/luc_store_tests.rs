// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;
use tempfile::TempDir;

fn context(groups: &[(LucType, &[&str])]) -> LastUserContext {
    groups
        .iter()
        .map(|(ty, names)| (*ty, names.iter().map(UnitName::new).collect::<Vec<_>>()))
        .collect()
}

fn store_in(dir: &TempDir) -> LucStore {
    LucStore::new(dir.path().join("luc"))
}

#[test]
#[serial]
fn write_then_read_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let ctx = context(&[
        (1, &["a.service"]),
        (3, &["b.service", "c.service"]),
        (4, &["d.service"]),
    ]);

    store.write(&ctx).unwrap();
    assert_eq!(store.read().unwrap(), ctx);
}

#[test]
#[serial]
fn missing_file_is_a_not_found_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let err = store.read().expect_err("should fail");
    assert!(matches!(err, LucStoreError::NotFound(_)), "unexpected error: {err}");
}

#[test]
#[serial]
fn malformed_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), b"\x00\x00\x00\x05garbage").unwrap();

    let err = store.read().expect_err("should fail");
    assert!(matches!(err, LucStoreError::Malformed { .. }), "unexpected error: {err}");
}

#[test]
#[serial]
fn trailing_bytes_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.write(&context(&[(1, &["a.service"])])).unwrap();

    let mut bytes = std::fs::read(store.path()).unwrap();
    bytes.push(0);
    std::fs::write(store.path(), &bytes).unwrap();

    let err = store.read().expect_err("should fail");
    assert!(matches!(err, LucStoreError::Malformed { .. }));
}

#[test]
#[serial]
fn write_creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let store = LucStore::new(dir.path().join("nested/state/luc"));

    store.write(&context(&[(1, &["a.service"])])).unwrap();
    assert!(store.path().is_file());
}

#[test]
#[serial]
fn write_replaces_the_previous_file_and_leaves_no_temporary() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.write(&context(&[(1, &["old.service"])])).unwrap();
    store.write(&context(&[(1, &["new.service"])])).unwrap();

    assert_eq!(store.read().unwrap(), context(&[(1, &["new.service"])]));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temporary file left behind");
}

#[test]
#[serial]
fn identical_contexts_serialize_to_identical_bytes() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let ctx = context(&[(2, &["b.service"]), (1, &["a.service"])]);

    store.write(&ctx).unwrap();
    let first = std::fs::read(store.path()).unwrap();
    store.write(&ctx).unwrap();
    let second = std::fs::read(store.path()).unwrap();

    assert_eq!(first, second);
}

#[test]
#[serial]
fn empty_context_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.write(&LastUserContext::new()).unwrap();
    assert!(store.read().unwrap().is_empty());
}

#[test]
#[serial]
fn environment_override_wins_over_the_configured_path() {
    let dir = TempDir::new().unwrap();
    let override_path = dir.path().join("override-luc");
    let store = LucStore::new(dir.path().join("default-luc"));

    std::env::set_var(LUC_PATH_ENV, &override_path);
    let result = store.write(&context(&[(5, &["e.service"])]));
    let resolved = store.path();
    std::env::remove_var(LUC_PATH_ENV);

    result.unwrap();
    assert_eq!(resolved, override_path);
    assert!(override_path.is_file());
    assert!(!dir.path().join("default-luc").exists());
}
