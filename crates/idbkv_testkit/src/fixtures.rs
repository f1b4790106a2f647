//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up backing stores
//! and common test scenarios.

use idbkv_codec::KeyPath;
use idbkv_core::{BackingStore, Config};
use std::path::PathBuf;
use tempfile::TempDir;

/// Origin used by every fixture store.
pub const TEST_ORIGIN: &str = "https://test.example";

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: BackingStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: BackingStore::open_in_memory(TEST_ORIGIN)
                .expect("Failed to open in-memory store"),
            _temp_dir: None,
        }
    }

    /// Creates a new file-based test store in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackingStore::open(&temp_dir.path().join("store"), TEST_ORIGIN, &Config::default())
            .expect("Failed to open file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the engine directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }

    /// Closes the store and opens the same directory again.
    ///
    /// Panics for in-memory stores.
    pub fn reopen(self) -> Self {
        let temp_dir = self._temp_dir.expect("Only file stores can be reopened");
        drop(self.store);
        let store = BackingStore::open(&temp_dir.path().join("store"), TEST_ORIGIN, &Config::default())
            .expect("Failed to reopen file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = BackingStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A database and one object store inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreScope {
    /// Database id.
    pub database_id: i64,
    /// Object store id.
    pub object_store_id: i64,
}

impl StoreScope {
    /// Creates database `database` holding an object store `object_store`
    /// without a key path, and commits.
    pub fn create(store: &BackingStore, database: &str, object_store: &str) -> Self {
        let database_id = store
            .create_database(database, "1", None)
            .expect("Failed to create database");
        let txn = store.begin();
        let object_store_id = store
            .create_object_store(&txn, database_id, object_store, &KeyPath::Null, false)
            .expect("Failed to create object store");
        txn.commit().expect("Failed to commit object store");
        Self {
            database_id,
            object_store_id,
        }
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&BackingStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-based store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&BackingStore, &std::path::Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use idbkv_codec::Key;

    /// Creates a store with `record_count` records keyed 1, 2, 3, ...
    pub fn populated_store(record_count: usize) -> (TestStore, StoreScope) {
        let test_store = TestStore::memory();
        let scope = StoreScope::create(&test_store, "db", "records");

        let txn = test_store.begin();
        for i in 1..=record_count {
            let data = format!(r#"{{"index":{i}}}"#).into_bytes();
            test_store
                .put_record(
                    &txn,
                    scope.database_id,
                    scope.object_store_id,
                    &Key::number(i as f64),
                    &data,
                )
                .expect("Failed to put record");
        }
        txn.commit().expect("Failed to commit records");

        (test_store, scope)
    }
}
