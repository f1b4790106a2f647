//! In-memory engine for testing and ephemeral stores.

use crate::batch::WriteBatch;
use crate::comparator::KeyComparator;
use crate::engine::KvEngine;
use crate::error::StorageResult;
use crate::table::{Snapshot, SortedTable};
use parking_lot::RwLock;
use std::sync::Arc;

/// An ephemeral engine holding everything in memory.
///
/// # Thread Safety
///
/// The engine is thread-safe and can be shared across threads. Snapshots
/// share the table copy-on-write, so taking one is O(1).
///
/// # Example
///
/// ```rust
/// use idbkv_storage::{BytewiseComparator, KvEngine, MemoryEngine};
/// use std::sync::Arc;
///
/// let engine = MemoryEngine::new(Arc::new(BytewiseComparator));
/// engine.put(b"key", b"value").unwrap();
/// assert_eq!(engine.get(b"key").unwrap(), Some(b"value".to_vec()));
/// ```
#[derive(Debug)]
pub struct MemoryEngine {
    table: RwLock<Arc<SortedTable>>,
}

impl MemoryEngine {
    /// Creates an empty engine ordered by `comparator`.
    #[must_use]
    pub fn new(comparator: Arc<dyn KeyComparator>) -> Self {
        Self {
            table: RwLock::new(Arc::new(SortedTable::new(comparator))),
        }
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if the engine holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

impl KvEngine for MemoryEngine {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.table.read().get(key).map(<[u8]>::to_vec))
    }

    fn write(&self, batch: &WriteBatch) -> StorageResult<()> {
        let mut table = self.table.write();
        Arc::make_mut(&mut table).apply(batch);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(Arc::clone(&self.table.read()))
    }

    fn comparator(&self) -> Arc<dyn KeyComparator> {
        Arc::clone(self.table.read().comparator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use crate::iterator::KvIterator;

    fn engine() -> MemoryEngine {
        MemoryEngine::new(Arc::new(BytewiseComparator))
    }

    #[test]
    fn memory_new_is_empty() {
        let engine = engine();
        assert!(engine.is_empty());
        assert_eq!(engine.get(b"missing").unwrap(), None);
    }

    #[test]
    fn memory_put_get_delete() {
        let engine = engine();
        engine.put(b"k", b"v").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));

        engine.delete(b"k").unwrap();
        assert_eq!(engine.get(b"k").unwrap(), None);
        // Deleting an absent key is fine.
        engine.delete(b"k").unwrap();
    }

    #[test]
    fn memory_batch_applies_in_order() {
        let engine = engine();
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.put(b"b", b"2");
        batch.delete(b"a");
        batch.put(b"b", b"3");
        engine.write(&batch).unwrap();

        assert_eq!(engine.get(b"a").unwrap(), None);
        assert_eq!(engine.get(b"b").unwrap(), Some(b"3".to_vec()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn memory_snapshot_ignores_later_writes() {
        let engine = engine();
        engine.put(b"a", b"old").unwrap();
        let snapshot = engine.snapshot();

        engine.put(b"a", b"new").unwrap();
        engine.put(b"b", b"added").unwrap();

        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"old".to_vec()));
        assert_eq!(snapshot.get(b"b").unwrap(), None);
        assert_eq!(engine.get(b"a").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn memory_iter_walks_in_order() {
        let engine = engine();
        for key in [b"c", b"a", b"b"] {
            engine.put(key, key).unwrap();
        }

        let mut iter = engine.iter();
        iter.seek_to_first();
        let mut keys = Vec::new();
        while iter.is_valid() {
            keys.push(iter.key().to_vec());
            iter.next();
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}
