//! Comparator-ordered pending writes.

use idbkv_storage::{KeyComparator, WriteBatch};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// A pending write in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or update a key.
    Put {
        /// New value.
        value: Vec<u8>,
    },
    /// Delete a key. Hides the committed value until commit.
    Delete,
}

impl PendingWrite {
    /// Returns true for a tombstone.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// A key ordered by the engine comparator instead of by bytes.
#[derive(Clone)]
struct OrderedKey {
    bytes: Vec<u8>,
    comparator: Arc<dyn KeyComparator>,
}

impl PartialEq for OrderedKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedKey {}

impl PartialOrd for OrderedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator.compare(&self.bytes, &other.bytes)
    }
}

/// One entry as seen by an iterator.
pub(crate) type OverlayEntry = (Vec<u8>, PendingWrite);

/// The uncommitted writes of one transaction.
///
/// `generation` changes on every mutation so iterators can tell that their
/// cached overlay position may be stale.
pub(crate) struct Overlay {
    comparator: Arc<dyn KeyComparator>,
    entries: BTreeMap<OrderedKey, PendingWrite>,
    generation: u64,
}

impl Overlay {
    pub(crate) fn new(comparator: Arc<dyn KeyComparator>) -> Self {
        Self {
            comparator,
            entries: BTreeMap::new(),
            generation: 0,
        }
    }

    fn probe(&self, key: &[u8]) -> OrderedKey {
        OrderedKey {
            bytes: key.to_vec(),
            comparator: Arc::clone(&self.comparator),
        }
    }

    pub(crate) fn put(&mut self, key: &[u8], value: &[u8]) {
        self.entries.insert(
            self.probe(key),
            PendingWrite::Put {
                value: value.to_vec(),
            },
        );
        self.generation += 1;
    }

    pub(crate) fn remove(&mut self, key: &[u8]) {
        self.entries.insert(self.probe(key), PendingWrite::Delete);
        self.generation += 1;
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&PendingWrite> {
        self.entries.get(&self.probe(key))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.generation += 1;
    }

    /// Builds the batch that applies every pending write, in key order.
    pub(crate) fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::with_capacity(self.entries.len());
        for (key, write) in &self.entries {
            match write {
                PendingWrite::Put { value } => batch.put(&key.bytes, value),
                PendingWrite::Delete => batch.delete(&key.bytes),
            }
        }
        batch
    }

    pub(crate) fn first(&self) -> Option<OverlayEntry> {
        self.entries.iter().next().map(to_entry)
    }

    pub(crate) fn last(&self) -> Option<OverlayEntry> {
        self.entries.iter().next_back().map(to_entry)
    }

    /// First entry at or after `key`.
    pub(crate) fn ceiling(&self, key: &[u8]) -> Option<OverlayEntry> {
        self.entries
            .range((Bound::Included(self.probe(key)), Bound::Unbounded))
            .next()
            .map(to_entry)
    }

    /// First entry strictly after `key`.
    pub(crate) fn successor(&self, key: &[u8]) -> Option<OverlayEntry> {
        self.entries
            .range((Bound::Excluded(self.probe(key)), Bound::Unbounded))
            .next()
            .map(to_entry)
    }

    /// Last entry strictly before `key`.
    pub(crate) fn predecessor(&self, key: &[u8]) -> Option<OverlayEntry> {
        self.entries
            .range((Bound::Unbounded, Bound::Excluded(self.probe(key))))
            .next_back()
            .map(to_entry)
    }
}

fn to_entry((key, write): (&OrderedKey, &PendingWrite)) -> OverlayEntry {
    (key.bytes.clone(), write.clone())
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("comparator", &self.comparator.name())
            .field("entries", &self.entries.len())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idbkv_storage::{BatchOp, BytewiseComparator};

    struct ReverseComparator;

    impl KeyComparator for ReverseComparator {
        fn name(&self) -> &str {
            "reverse"
        }

        fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }
    }

    #[test]
    fn later_write_replaces_earlier() {
        let mut overlay = Overlay::new(Arc::new(BytewiseComparator));
        overlay.put(b"k", b"1");
        overlay.remove(b"k");
        assert_eq!(overlay.get(b"k"), Some(&PendingWrite::Delete));
        overlay.put(b"k", b"2");
        assert_eq!(
            overlay.get(b"k"),
            Some(&PendingWrite::Put { value: b"2".to_vec() })
        );
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.generation(), 3);
    }

    #[test]
    fn navigation_follows_comparator() {
        let mut overlay = Overlay::new(Arc::new(ReverseComparator));
        for key in [b"a", b"b", b"c"] {
            overlay.put(key, b"");
        }
        assert_eq!(overlay.first().unwrap().0, b"c");
        assert_eq!(overlay.last().unwrap().0, b"a");
        assert_eq!(overlay.successor(b"c").unwrap().0, b"b");
        assert_eq!(overlay.predecessor(b"b").unwrap().0, b"c");
        assert_eq!(overlay.ceiling(b"bb").unwrap().0, b"b");
        assert!(overlay.successor(b"a").is_none());
    }

    #[test]
    fn batch_is_in_key_order() {
        let mut overlay = Overlay::new(Arc::new(BytewiseComparator));
        overlay.put(b"b", b"2");
        overlay.remove(b"a");
        let batch = overlay.to_batch();
        assert_eq!(
            batch.ops(),
            &[
                BatchOp::Delete { key: b"a".to_vec() },
                BatchOp::Put {
                    key: b"b".to_vec(),
                    value: b"2".to_vec()
                },
            ]
        );
    }
}
