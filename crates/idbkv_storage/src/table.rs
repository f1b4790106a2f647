//! Comparator-ordered in-memory table shared by both engines.

use crate::batch::{BatchOp, WriteBatch};
use crate::comparator::KeyComparator;
use crate::error::StorageResult;
use crate::iterator::KvIterator;
use std::fmt;
use std::sync::Arc;

/// Sorted key-value entries, ordered by the table's comparator.
///
/// Engines keep the live table behind an `Arc`. Snapshots clone the `Arc`,
/// and writers go through `Arc::make_mut`, so a pinned snapshot never
/// observes later writes.
#[derive(Clone)]
pub struct SortedTable {
    comparator: Arc<dyn KeyComparator>,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SortedTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(comparator: Arc<dyn KeyComparator>) -> Self {
        Self {
            comparator,
            entries: Vec::new(),
        }
    }

    /// Returns the table's comparator.
    #[must_use]
    pub fn comparator(&self) -> &Arc<dyn KeyComparator> {
        &self.comparator
    }

    fn search(&self, key: &[u8]) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(probe, _)| self.comparator.compare(probe, key))
    }

    /// Looks up a key.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.search(key)
            .ok()
            .map(|index| self.entries[index].1.as_slice())
    }

    /// Inserts or overwrites a key.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        match self.search(key) {
            Ok(index) => self.entries[index].1 = value.to_vec(),
            Err(index) => self.entries.insert(index, (key.to_vec(), value.to_vec())),
        }
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        match self.search(key) {
            Ok(index) => {
                self.entries.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    /// Applies every operation of a batch in order.
    pub fn apply(&mut self, batch: &WriteBatch) {
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => self.insert(key, value),
                BatchOp::Delete { key } => {
                    self.remove(key);
                }
            }
        }
    }

    /// Index of the first entry whose key is at or after `key`.
    #[must_use]
    pub fn lower_bound(&self, key: &[u8]) -> usize {
        match self.search(key) {
            Ok(index) | Err(index) => index,
        }
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<(&[u8], &[u8])> {
        self.entries
            .get(index)
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SortedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedTable")
            .field("comparator", &self.comparator.name())
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Iterator over a pinned [`SortedTable`].
#[derive(Debug, Clone)]
pub struct TableIterator {
    table: Arc<SortedTable>,
    position: Option<usize>,
}

impl TableIterator {
    /// Creates an unpositioned iterator over `table`.
    #[must_use]
    pub fn new(table: Arc<SortedTable>) -> Self {
        Self {
            table,
            position: None,
        }
    }

    fn current(&self) -> Option<(&[u8], &[u8])> {
        self.position.and_then(|index| self.table.entry(index))
    }
}

impl KvIterator for TableIterator {
    fn seek_to_first(&mut self) {
        self.position = (!self.table.is_empty()).then_some(0);
    }

    fn seek_to_last(&mut self) {
        self.position = self.table.len().checked_sub(1);
    }

    fn seek(&mut self, target: &[u8]) {
        let index = self.table.lower_bound(target);
        self.position = (index < self.table.len()).then_some(index);
    }

    fn next(&mut self) {
        let len = self.table.len();
        self.position = self
            .position
            .and_then(|index| (index + 1 < len).then_some(index + 1));
    }

    fn prev(&mut self) {
        self.position = self.position.and_then(|index| index.checked_sub(1));
    }

    fn is_valid(&self) -> bool {
        self.current().is_some()
    }

    fn key(&self) -> &[u8] {
        self.current().map(|(key, _)| key).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current().map(|(_, value)| value).unwrap_or_default()
    }
}

/// A point-in-time, read-only view of an engine.
#[derive(Debug, Clone)]
pub struct Snapshot {
    table: Arc<SortedTable>,
}

impl Snapshot {
    /// Pins `table` as a snapshot.
    #[must_use]
    pub fn new(table: Arc<SortedTable>) -> Self {
        Self { table }
    }

    /// Reads a key as of the snapshot.
    ///
    /// # Errors
    ///
    /// Table-backed snapshots never fail; the `Result` mirrors
    /// [`crate::KvEngine::get`].
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.table.get(key).map(<[u8]>::to_vec))
    }

    /// Creates an iterator over the snapshot.
    #[must_use]
    pub fn iter(&self) -> Box<dyn KvIterator> {
        Box::new(TableIterator::new(Arc::clone(&self.table)))
    }

    /// Returns the number of keys visible in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if the snapshot holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;
    use std::cmp::Ordering;

    struct ReverseComparator;

    impl KeyComparator for ReverseComparator {
        fn name(&self) -> &str {
            "test.Reverse"
        }

        fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }
    }

    fn table_of(keys: &[&[u8]]) -> SortedTable {
        let mut table = SortedTable::new(Arc::new(BytewiseComparator));
        for key in keys {
            table.insert(key, key);
        }
        table
    }

    #[test]
    fn insert_keeps_comparator_order() {
        let mut table = SortedTable::new(Arc::new(ReverseComparator));
        table.insert(b"a", b"1");
        table.insert(b"c", b"3");
        table.insert(b"b", b"2");

        let mut iter = TableIterator::new(Arc::new(table));
        iter.seek_to_first();
        let mut seen = Vec::new();
        while iter.is_valid() {
            seen.push(iter.key().to_vec());
            iter.next();
        }
        assert_eq!(seen, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn insert_overwrites_existing_key() {
        let mut table = table_of(&[b"k"]);
        table.insert(b"k", b"new");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(b"k"), Some(&b"new"[..]));
    }

    #[test]
    fn seek_lands_on_first_key_at_or_after_target() {
        let table = Arc::new(table_of(&[b"b", b"d", b"f"]));
        let mut iter = TableIterator::new(table);

        iter.seek(b"c");
        assert_eq!(iter.key(), b"d");
        iter.seek(b"d");
        assert_eq!(iter.key(), b"d");
        iter.seek(b"g");
        assert!(!iter.is_valid());
        assert!(iter.key().is_empty());
    }

    #[test]
    fn prev_from_first_invalidates() {
        let table = Arc::new(table_of(&[b"a", b"b"]));
        let mut iter = TableIterator::new(table);
        iter.seek_to_last();
        assert_eq!(iter.key(), b"b");
        iter.prev();
        assert_eq!(iter.key(), b"a");
        iter.prev();
        assert!(!iter.is_valid());
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut live = Arc::new(table_of(&[b"a"]));
        let snapshot = Snapshot::new(Arc::clone(&live));

        Arc::make_mut(&mut live).insert(b"b", b"b");
        Arc::make_mut(&mut live).remove(b"a");

        assert_eq!(snapshot.get(b"a").unwrap(), Some(b"a".to_vec()));
        assert_eq!(snapshot.get(b"b").unwrap(), None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(live.len(), 1);
    }
}
