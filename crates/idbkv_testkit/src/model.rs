//! Model-checked harness for record and cursor behavior.
//!
//! Applies the same operations to a backing store and to an in-memory
//! model, then checks that point reads and cursor walks agree with the
//! model.

use crate::fixtures::{StoreScope, TestStore};
use crate::generators::{key_strategy, record_value_strategy};
use idbkv_codec::Key;
use idbkv_core::{CursorDirection, Transaction};
use proptest::prelude::*;
use std::cmp::Ordering;

/// One operation against an object store.
#[derive(Debug, Clone)]
pub enum RecordOp {
    /// Write a record.
    Put(Key, Vec<u8>),
    /// Delete a record if present.
    Delete(Key),
    /// Remove every record.
    Clear,
    /// Commit and start a new transaction.
    Commit,
}

/// Strategy for operation sequences.
pub fn record_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<RecordOp>> {
    let op = prop_oneof![
        6 => (key_strategy(), record_value_strategy()).prop_map(|(k, v)| RecordOp::Put(k, v)),
        2 => key_strategy().prop_map(RecordOp::Delete),
        1 => Just(RecordOp::Clear),
        2 => Just(RecordOp::Commit),
    ];
    prop::collection::vec(op, 0..max_len)
}

/// A store and the model it is checked against.
pub struct ModelHarness {
    store: TestStore,
    scope: StoreScope,
    txn: Transaction,
    /// Records sorted by key.
    model: Vec<(Key, Vec<u8>)>,
}

impl ModelHarness {
    /// Creates a harness over a fresh in-memory store.
    pub fn new() -> Self {
        let store = TestStore::memory();
        let scope = StoreScope::create(&store, "model", "records");
        let txn = store.begin();
        Self {
            store,
            scope,
            txn,
            model: Vec::new(),
        }
    }

    /// Applies one operation to both sides.
    pub fn apply(&mut self, op: &RecordOp) {
        let StoreScope {
            database_id,
            object_store_id,
        } = self.scope;
        match op {
            RecordOp::Put(key, value) => {
                self.store
                    .put_record(&self.txn, database_id, object_store_id, key, value)
                    .expect("Failed to put record");
                match self.position(key) {
                    Ok(i) => self.model[i].1 = value.clone(),
                    Err(i) => self.model.insert(i, (key.clone(), value.clone())),
                }
            }
            RecordOp::Delete(key) => {
                let found = self
                    .store
                    .key_exists_in_object_store(&self.txn, database_id, object_store_id, key)
                    .expect("Failed to probe record");
                if let Some(record) = found {
                    self.store
                        .delete_object_store_record(&self.txn, database_id, object_store_id, &record)
                        .expect("Failed to delete record");
                }
                if let Ok(i) = self.position(key) {
                    self.model.remove(i);
                }
            }
            RecordOp::Clear => {
                self.store
                    .clear_object_store(&self.txn, database_id, object_store_id)
                    .expect("Failed to clear store");
                self.model.clear();
            }
            RecordOp::Commit => {
                self.txn.commit().expect("Failed to commit");
                self.txn = self.store.begin();
            }
        }
    }

    /// Checks point reads and both cursor directions against the model.
    pub fn verify(&self) {
        let StoreScope {
            database_id,
            object_store_id,
        } = self.scope;
        for (key, value) in &self.model {
            let stored = self
                .store
                .get_record(&self.txn, database_id, object_store_id, key)
                .expect("Failed to get record");
            assert_eq!(stored.as_ref(), Some(value), "record mismatch for {key:?}");
        }

        let forward = self.walk(CursorDirection::Next);
        let expected: Vec<_> = self.model.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(forward, expected, "forward cursor disagrees with model");

        let mut reverse = self.walk(CursorDirection::Prev);
        reverse.reverse();
        assert_eq!(reverse, expected, "reverse cursor disagrees with model");
    }

    /// Number of records the model holds.
    pub fn len(&self) -> usize {
        self.model.len()
    }

    /// Returns true if the model holds no records.
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    fn position(&self, key: &Key) -> Result<usize, usize> {
        self.model.binary_search_by(|(k, _)| k.compare(key))
    }

    fn walk(&self, direction: CursorDirection) -> Vec<(Key, Vec<u8>)> {
        let mut rows = Vec::new();
        let mut cursor = self
            .store
            .open_object_store_cursor(
                &self.txn,
                self.scope.database_id,
                self.scope.object_store_id,
                None,
                direction,
            )
            .expect("Failed to open cursor");
        while let Some(c) = cursor.as_mut() {
            let key = c.key().cloned().expect("Cursor row without key");
            rows.push((key, c.value().to_vec()));
            if !c.continue_to(None).expect("Failed to continue cursor") {
                break;
            }
        }
        debug_assert!(rows
            .windows(2)
            .all(|w| w[0].0.compare(&w[1].0) != Ordering::Equal));
        rows
    }
}

impl Default for ModelHarness {
    fn default() -> Self {
        Self::new()
    }
}
