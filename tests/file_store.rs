#![cfg(feature = "file-store")]

use std::path::PathBuf;

use formulary::config::SaveQueueConfig;
use formulary::persist::{FileStore, FormulaStore, FrameError, PersistenceError, SaveQueue};
use formulary::{FormulaId, parse};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("formulary_test_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[test]
fn save_and_load() {
    let dir = scratch_dir("save_and_load");
    let mut store = FileStore::open(&dir).unwrap();
    let id = FormulaId::from("f_total");
    let seq = parse("[{area} > 100 ? {roof}.extra : 0]!ignore + @{f_base}").unwrap();

    store.save(&id, &seq).unwrap();
    assert!(store.path_for(&id).exists());
    assert_eq!(store.load(&id).unwrap(), Some(seq));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_formula_loads_as_none() {
    let dir = scratch_dir("missing");
    let store = FileStore::open(&dir).unwrap();
    assert_eq!(store.load(&"nope".into()).unwrap(), None);
    assert!(!store.remove(&"nope".into()).unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn overwrite_keeps_latest() {
    let dir = scratch_dir("overwrite");
    let mut store = FileStore::open(&dir).unwrap();
    let id = FormulaId::from("f1");
    store.save(&id, &parse("1 + 1").unwrap()).unwrap();
    let latest = parse("2 * {qty}").unwrap();
    store.save(&id, &latest).unwrap();
    assert_eq!(store.load(&id).unwrap(), Some(latest));
    assert!(store.remove(&id).unwrap());
    assert_eq!(store.load(&id).unwrap(), None);

    let _ = std::fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// Corruption
// ---------------------------------------------------------------------------

#[test]
fn corrupted_file_is_rejected() {
    let dir = scratch_dir("corrupted");
    let mut store = FileStore::open(&dir).unwrap();
    let id = FormulaId::from("f1");
    store.save(&id, &parse("{a} + 1").unwrap()).unwrap();

    let path = store.path_for(&id);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        store.load(&id),
        Err(PersistenceError::Frame(FrameError::ChecksumMismatch))
    ));

    std::fs::write(&path, b"not a formula file at all, just some text").unwrap();
    assert!(matches!(
        store.load(&id),
        Err(PersistenceError::Frame(FrameError::BadMagic))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// Behind the queue
// ---------------------------------------------------------------------------

#[test]
fn queue_writes_files() {
    let dir = scratch_dir("queue");
    let store = FileStore::open(&dir).unwrap();
    let reader = store.clone();
    let id = FormulaId::from("f1");
    let seq = parse("{a} * 3").unwrap();
    {
        let queue = SaveQueue::new(store, &SaveQueueConfig::default()).unwrap();
        queue.submit(id.clone(), seq.clone()).unwrap();
    }
    assert_eq!(reader.load(&id).unwrap(), Some(seq));

    let _ = std::fs::remove_dir_all(&dir);
}
