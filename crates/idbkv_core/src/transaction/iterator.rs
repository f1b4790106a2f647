//! Iteration over a snapshot merged with pending writes.

use super::overlay::{OverlayEntry, PendingWrite};
use super::state::TransactionState;
use idbkv_storage::{KeyComparator, KvIterator};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Which child the merged iterator is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Overlay,
    Base,
}

/// Position within the overlay, cached so key and value can be borrowed.
#[derive(Debug, Default)]
struct OverlayCursor {
    entry: Option<OverlayEntry>,
}

impl OverlayCursor {
    fn is_valid(&self) -> bool {
        self.entry.is_some()
    }

    fn key(&self) -> &[u8] {
        self.entry.as_ref().map(|(key, _)| key.as_slice()).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        match &self.entry {
            Some((_, PendingWrite::Put { value })) => value.as_slice(),
            _ => &[],
        }
    }

    fn is_deleted(&self) -> bool {
        matches!(&self.entry, Some((_, write)) if write.is_delete())
    }

    fn step(&mut self, state: &TransactionState, direction: Direction) {
        let Some((key, _)) = &self.entry else {
            return;
        };
        self.entry = match direction {
            Direction::Forward => state.overlay.successor(key),
            Direction::Reverse => state.overlay.predecessor(key),
        };
    }
}

/// An iterator over a transaction's view: its snapshot with its own writes
/// applied.
///
/// Overlay entries win over snapshot entries with the same key, and
/// tombstones hide them. Writes made through the transaction after the
/// iterator was positioned are picked up on the next move; until then
/// `key` and `value` report the row as it was when the iterator last moved.
pub struct TransactionIterator {
    shared: Arc<Mutex<TransactionState>>,
    comparator: Arc<dyn KeyComparator>,
    overlay: OverlayCursor,
    base: Box<dyn KvIterator>,
    current: Option<Child>,
    direction: Direction,
    generation: u64,
}

impl TransactionIterator {
    pub(crate) fn new(
        shared: Arc<Mutex<TransactionState>>,
        base: Box<dyn KvIterator>,
        comparator: Arc<dyn KeyComparator>,
    ) -> Self {
        let generation = shared.lock().overlay.generation();
        Self {
            shared,
            comparator,
            overlay: OverlayCursor::default(),
            base,
            current: None,
            direction: Direction::Forward,
            generation,
        }
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.comparator.compare(a, b)
    }

    fn step_base(&mut self, direction: Direction) {
        match direction {
            Direction::Forward => self.base.next(),
            Direction::Reverse => self.base.prev(),
        }
    }

    /// Skips the base past keys the overlay shadows and the overlay past
    /// tombstones that no longer hide anything ahead of the base.
    fn handle_conflicts_and_deletes(&mut self, state: &TransactionState) {
        loop {
            if self.overlay.is_valid()
                && self.base.is_valid()
                && self.compare(self.overlay.key(), self.base.key()) == Ordering::Equal
            {
                self.step_base(self.direction);
            }

            if !self.overlay.is_deleted() {
                return;
            }
            let overlay_is_ahead = !self.base.is_valid() || {
                let ord = self.compare(self.overlay.key(), self.base.key());
                match self.direction {
                    Direction::Forward => ord == Ordering::Less,
                    Direction::Reverse => ord == Ordering::Greater,
                }
            };
            if !overlay_is_ahead {
                return;
            }
            self.overlay.step(state, self.direction);
        }
    }

    fn select(&mut self, wanted: Ordering) {
        self.current = match (self.overlay.is_valid(), self.base.is_valid()) {
            (false, false) => None,
            (true, false) => Some(Child::Overlay),
            (false, true) => Some(Child::Base),
            (true, true) => {
                if self.compare(self.base.key(), self.overlay.key()) == wanted {
                    Some(Child::Base)
                } else {
                    Some(Child::Overlay)
                }
            }
        };
    }

    /// Re-reads the overlay position if the transaction wrote since the
    /// iterator last moved.
    fn refresh(&mut self, state: &TransactionState) {
        let generation = state.overlay.generation();
        if generation == self.generation {
            return;
        }
        self.generation = generation;

        let Some(current) = self.current else {
            return;
        };
        let key = self.key().to_vec();
        self.overlay.entry = match (current, self.direction) {
            (Child::Overlay, _) => state.overlay.ceiling(&key),
            (Child::Base, Direction::Forward) => state.overlay.successor(&key),
            (Child::Base, Direction::Reverse) => state.overlay.predecessor(&key),
        };
    }

    fn position(&mut self, state: &TransactionState, direction: Direction) {
        self.generation = state.overlay.generation();
        self.direction = direction;
        self.handle_conflicts_and_deletes(state);
        match direction {
            Direction::Forward => self.select(Ordering::Less),
            Direction::Reverse => self.select(Ordering::Greater),
        }
    }
}

impl KvIterator for TransactionIterator {
    fn seek_to_first(&mut self) {
        let shared = Arc::clone(&self.shared);
        let state = shared.lock();
        self.overlay.entry = state.overlay.first();
        self.base.seek_to_first();
        self.position(&state, Direction::Forward);
    }

    fn seek_to_last(&mut self) {
        let shared = Arc::clone(&self.shared);
        let state = shared.lock();
        self.overlay.entry = state.overlay.last();
        self.base.seek_to_last();
        self.position(&state, Direction::Reverse);
    }

    fn seek(&mut self, target: &[u8]) {
        let shared = Arc::clone(&self.shared);
        let state = shared.lock();
        self.overlay.entry = state.overlay.ceiling(target);
        self.base.seek(target);
        self.position(&state, Direction::Forward);
    }

    fn next(&mut self) {
        let shared = Arc::clone(&self.shared);
        let state = shared.lock();
        self.refresh(&state);
        let Some(current) = self.current else {
            return;
        };

        if self.direction != Direction::Forward {
            // Move the other child strictly past the current key.
            let key = self.key().to_vec();
            match current {
                Child::Overlay => {
                    self.base.seek(&key);
                    if self.base.is_valid() && self.compare(self.base.key(), &key) == Ordering::Equal {
                        self.base.next();
                    }
                }
                Child::Base => self.overlay.entry = state.overlay.successor(&key),
            }
            self.direction = Direction::Forward;
        }

        match current {
            Child::Overlay => self.overlay.step(&state, Direction::Forward),
            Child::Base => self.base.next(),
        }
        self.handle_conflicts_and_deletes(&state);
        self.select(Ordering::Less);
    }

    fn prev(&mut self) {
        let shared = Arc::clone(&self.shared);
        let state = shared.lock();
        self.refresh(&state);
        let Some(current) = self.current else {
            return;
        };

        if self.direction != Direction::Reverse {
            // Move the other child strictly before the current key.
            let key = self.key().to_vec();
            match current {
                Child::Overlay => {
                    self.base.seek(&key);
                    if self.base.is_valid() {
                        self.base.prev();
                    } else {
                        self.base.seek_to_last();
                    }
                }
                Child::Base => self.overlay.entry = state.overlay.predecessor(&key),
            }
            self.direction = Direction::Reverse;
        }

        match current {
            Child::Overlay => self.overlay.step(&state, Direction::Reverse),
            Child::Base => self.base.prev(),
        }
        self.handle_conflicts_and_deletes(&state);
        self.select(Ordering::Greater);
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        match self.current {
            Some(Child::Overlay) => self.overlay.key(),
            Some(Child::Base) => self.base.key(),
            None => &[],
        }
    }

    fn value(&self) -> &[u8] {
        match self.current {
            Some(Child::Overlay) => self.overlay.value(),
            Some(Child::Base) => self.base.value(),
            None => &[],
        }
    }
}

impl fmt::Debug for TransactionIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionIterator")
            .field("current", &self.current)
            .field("direction", &self.direction)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::transaction::Transaction;
    use idbkv_storage::{BytewiseComparator, KvEngine, KvIterator, MemoryEngine};
    use std::sync::Arc;

    fn engine_with(keys: &[u8]) -> Arc<dyn KvEngine> {
        let engine = MemoryEngine::new(Arc::new(BytewiseComparator));
        for key in keys {
            engine.put(&[*key], b"base").unwrap();
        }
        Arc::new(engine)
    }

    fn forward_keys(iter: &mut impl KvIterator) -> Vec<u8> {
        let mut keys = Vec::new();
        while iter.is_valid() {
            keys.push(iter.key()[0]);
            iter.next();
        }
        keys
    }

    fn scenario() -> Transaction {
        let txn = Transaction::begin(engine_with(&[1, 3, 5, 7]));
        txn.put(&[4], b"overlay").unwrap();
        txn.remove(&[5]).unwrap();
        txn.put(&[9], b"overlay").unwrap();
        txn
    }

    #[test]
    fn writes_show_up_after_the_next_move() {
        let txn = scenario();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek(&[3]);
        assert_eq!(iter.value(), b"base");

        txn.put(&[3], b"rewritten").unwrap();
        assert_eq!(iter.key(), &[3_u8]);
        assert_eq!(iter.value(), b"base");

        iter.next();
        assert_eq!(iter.key(), &[4_u8]);
        iter.prev();
        assert_eq!(iter.key(), &[3_u8]);
        assert_eq!(iter.value(), b"rewritten");
    }

    #[test]
    fn forward_scan_merges_overlay() {
        let txn = scenario();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        assert_eq!(forward_keys(&mut iter), vec![1, 3, 4, 7, 9]);
    }

    #[test]
    fn reversing_at_base_key() {
        let txn = scenario();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        while iter.key() != [7] {
            iter.next();
        }

        let mut keys = Vec::new();
        iter.prev();
        while iter.is_valid() {
            keys.push(iter.key()[0]);
            iter.prev();
        }
        assert_eq!(keys, vec![4, 3, 1]);
    }

    #[test]
    fn reversing_at_overlay_key() {
        let txn = scenario();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek(&[4]);
        assert_eq!(iter.value(), b"overlay");
        iter.prev();
        assert_eq!(iter.key(), [3]);
        iter.next();
        assert_eq!(iter.key(), [4]);
        iter.next();
        assert_eq!(iter.key(), [7]);
    }

    #[test]
    fn reverse_scan_from_last() {
        let txn = scenario();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_last();
        let mut keys = Vec::new();
        while iter.is_valid() {
            keys.push(iter.key()[0]);
            iter.prev();
        }
        assert_eq!(keys, vec![9, 7, 4, 3, 1]);
    }

    #[test]
    fn overlay_wins_on_equal_keys() {
        let txn = Transaction::begin(engine_with(&[1, 2]));
        txn.put(&[2], b"mine").unwrap();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek(&[2]);
        assert_eq!(iter.value(), b"mine");
        iter.next();
        assert!(!iter.is_valid());
    }

    #[test]
    fn writes_after_positioning_are_seen() {
        let txn = Transaction::begin(engine_with(&[1, 5]));
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        assert_eq!(iter.key(), [1]);

        txn.put(&[3], b"late").unwrap();
        txn.remove(&[5]).unwrap();
        iter.next();
        assert_eq!(iter.key(), [3]);
        iter.next();
        assert!(!iter.is_valid());
    }

    #[test]
    fn removing_current_key_during_scan() {
        let txn = Transaction::begin(engine_with(&[1, 2, 3]));
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        let mut seen = Vec::new();
        while iter.is_valid() {
            let key = iter.key().to_vec();
            seen.push(key[0]);
            txn.remove(&key).unwrap();
            iter.next();
        }
        assert_eq!(seen, vec![1, 2, 3]);

        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        assert!(!iter.is_valid());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::{BTreeMap, BTreeSet};
        use std::ops::Bound;

        #[derive(Debug, Clone)]
        enum Write {
            Put(u8, u8),
            Remove(u8),
        }

        fn write() -> impl Strategy<Value = Write> {
            prop_oneof![
                (any::<u8>(), any::<u8>()).prop_map(|(k, v)| Write::Put(k, v)),
                any::<u8>().prop_map(Write::Remove),
            ]
        }

        /// Applies `write` to the transaction and to the model.
        fn apply(txn: &Transaction, model: &mut BTreeMap<u8, Vec<u8>>, write: &Write) {
            match *write {
                Write::Put(k, v) => {
                    txn.put(&[k], &[v]).unwrap();
                    model.insert(k, vec![v]);
                }
                Write::Remove(k) => {
                    txn.remove(&[k]).unwrap();
                    model.remove(&k);
                }
            }
        }

        fn setup(base: &BTreeSet<u8>, writes: &[Write]) -> (Transaction, BTreeMap<u8, Vec<u8>>) {
            let keys: Vec<u8> = base.iter().copied().collect();
            let txn = Transaction::begin(engine_with(&keys));
            let mut model: BTreeMap<u8, Vec<u8>> =
                keys.iter().map(|k| (*k, b"base".to_vec())).collect();
            for w in writes {
                apply(&txn, &mut model, w);
            }
            (txn, model)
        }

        proptest! {
            #[test]
            fn full_scans_match_model(
                base in prop::collection::btree_set(any::<u8>(), 0..32),
                writes in prop::collection::vec(write(), 0..48),
            ) {
                let (txn, model) = setup(&base, &writes);
                let expected: Vec<(u8, Vec<u8>)> =
                    model.iter().map(|(k, v)| (*k, v.clone())).collect();

                let mut iter = txn.create_iterator().unwrap();
                iter.seek_to_first();
                let mut forward = Vec::new();
                while iter.is_valid() {
                    forward.push((iter.key()[0], iter.value().to_vec()));
                    iter.next();
                }
                prop_assert_eq!(&forward, &expected);

                iter.seek_to_last();
                let mut reverse = Vec::new();
                while iter.is_valid() {
                    reverse.push((iter.key()[0], iter.value().to_vec()));
                    iter.prev();
                }
                reverse.reverse();
                prop_assert_eq!(&reverse, &expected);
            }

            #[test]
            fn direction_switch_matches_model(
                base in prop::collection::btree_set(any::<u8>(), 0..32),
                writes in prop::collection::vec(write(), 0..48),
                target in any::<u8>(),
            ) {
                let (txn, model) = setup(&base, &writes);
                let mut iter = txn.create_iterator().unwrap();
                iter.seek(&[target]);

                let at = model.range(target..).next().map(|(k, _)| *k);
                prop_assert_eq!(iter.is_valid().then(|| iter.key()[0]), at);
                let Some(at) = at else {
                    return Ok(());
                };

                iter.prev();
                let before = model.range(..at).next_back().map(|(k, _)| *k);
                prop_assert_eq!(iter.is_valid().then(|| iter.key()[0]), before);
                if before.is_some() {
                    iter.next();
                    prop_assert_eq!(iter.key(), &[at][..]);
                }
            }

            #[test]
            fn forward_scan_sees_writes_made_while_walking(
                base in prop::collection::btree_set(any::<u8>(), 0..32),
                walk_writes in prop::collection::vec(write(), 0..64),
            ) {
                let (txn, mut model) = setup(&base, &[]);
                let mut iter = txn.create_iterator().unwrap();
                iter.seek_to_first();
                prop_assert_eq!(
                    iter.is_valid().then(|| iter.key()[0]),
                    model.keys().next().copied()
                );

                let mut walk_writes = walk_writes.iter();
                while iter.is_valid() {
                    let current = iter.key()[0];
                    if let Some(w) = walk_writes.next() {
                        apply(&txn, &mut model, w);
                    }
                    let expected = model
                        .range((Bound::Excluded(current), Bound::Unbounded))
                        .next()
                        .map(|(k, v)| (*k, v.clone()));
                    iter.next();
                    let actual = iter.is_valid().then(|| (iter.key()[0], iter.value().to_vec()));
                    prop_assert_eq!(actual, expected);
                }
            }
        }
    }

    #[test]
    fn tombstones_only() {
        let txn = Transaction::begin(engine_with(&[1]));
        txn.remove(&[1]).unwrap();
        txn.remove(&[2]).unwrap();
        let mut iter = txn.create_iterator().unwrap();
        iter.seek_to_first();
        assert!(!iter.is_valid());
        iter.seek_to_last();
        assert!(!iter.is_valid());
    }
}
