//! Cursors over record rows and index entries.

use super::index::{split_index_value, version_exists};
use super::records::{read_record, split_record};
use super::{check_ids, check_index_ids, BackingStore};
use crate::error::CoreResult;
use crate::transaction::{Transaction, TransactionIterator};
use crate::types::RecordIdentifier;
use bytes::Bytes;
use idbkv_codec::{compare_index_keys, IndexDataKey, Key, ObjectStoreDataKey};
use idbkv_storage::KvIterator;
use std::cmp::Ordering;
use std::fmt;

/// Order in which a cursor visits rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorDirection {
    /// Ascending, every row.
    #[default]
    Next,
    /// Ascending, first row of each key.
    NextNoDuplicate,
    /// Descending, every row.
    Prev,
    /// Descending, one row per key. The row yielded for a key is its first
    /// duplicate in ascending order.
    PrevNoDuplicate,
}

impl CursorDirection {
    fn is_forward(self) -> bool {
        matches!(self, Self::Next | Self::NextNoDuplicate)
    }

    fn is_unique(self) -> bool {
        matches!(self, Self::NextNoDuplicate | Self::PrevNoDuplicate)
    }
}

/// An interval of keys. A missing bound is unbounded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRange {
    /// Lower bound.
    pub lower: Option<Key>,
    /// Upper bound.
    pub upper: Option<Key>,
    /// Whether `lower` itself is excluded.
    pub lower_open: bool,
    /// Whether `upper` itself is excluded.
    pub upper_open: bool,
}

impl KeyRange {
    /// The range holding exactly `key`.
    #[must_use]
    pub fn only(key: Key) -> Self {
        Self::bound(key.clone(), key, false, false)
    }

    /// Keys above `lower`.
    #[must_use]
    pub fn lower_bound(lower: Key, open: bool) -> Self {
        Self {
            lower: Some(lower),
            lower_open: open,
            ..Self::default()
        }
    }

    /// Keys below `upper`.
    #[must_use]
    pub fn upper_bound(upper: Key, open: bool) -> Self {
        Self {
            upper: Some(upper),
            upper_open: open,
            ..Self::default()
        }
    }

    /// Keys between `lower` and `upper`.
    #[must_use]
    pub fn bound(lower: Key, upper: Key, lower_open: bool, upper_open: bool) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
            lower_open,
            upper_open,
        }
    }
}

/// What a cursor walks and what it yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// Record rows; yields key and value.
    ObjectStore,
    /// Index entries; yields index key and primary key.
    IndexKey,
    /// Index entries; yields index key, primary key and record value.
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IteratorState {
    Ready,
    Seek,
}

/// Engine-key bounds and direction, fixed when the cursor opens.
#[derive(Debug, Clone)]
struct CursorOptions {
    database_id: i64,
    object_store_id: i64,
    index_id: i64,
    low_key: Vec<u8>,
    low_open: bool,
    high_key: Vec<u8>,
    high_open: bool,
    forward: bool,
    unique: bool,
}

/// A position within an ordered range of rows, read through a
/// transaction.
///
/// Index cursors skip entries whose record has moved on to a newer version
/// and remove them from the transaction.
pub struct Cursor {
    txn: Transaction,
    iterator: TransactionIterator,
    kind: CursorKind,
    options: CursorOptions,
    current_key: Option<Key>,
    primary_key: Option<Key>,
    value: Bytes,
    record_identifier: RecordIdentifier,
}

impl Cursor {
    fn open(txn: &Transaction, kind: CursorKind, options: CursorOptions) -> CoreResult<Option<Self>> {
        let mut cursor = Self {
            txn: txn.clone(),
            iterator: txn.create_iterator()?,
            kind,
            options,
            current_key: None,
            primary_key: None,
            value: Bytes::new(),
            record_identifier: RecordIdentifier::default(),
        };
        Ok(cursor.first_seek()?.then_some(cursor))
    }

    /// Returns what this cursor walks.
    #[must_use]
    pub fn kind(&self) -> CursorKind {
        self.kind
    }

    /// Current key: the record key, or the index key for index cursors.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.current_key.as_ref()
    }

    /// Primary key of the current record.
    #[must_use]
    pub fn primary_key(&self) -> Option<&Key> {
        self.primary_key.as_ref()
    }

    /// Value of the current record. Empty for [`CursorKind::IndexKey`].
    #[must_use]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Identifies the current record version.
    #[must_use]
    pub fn record_identifier(&self) -> &RecordIdentifier {
        &self.record_identifier
    }

    /// Moves to the next row, or to the first row at or beyond `key` in
    /// the cursor's direction. Returns false once the range is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored key does not decode or the transaction
    /// has ended.
    pub fn continue_to(&mut self, key: Option<&Key>) -> CoreResult<bool> {
        self.continue_from(key, IteratorState::Seek)
    }

    /// Moves `count` rows on. Returns false if the range ran out first.
    ///
    /// # Errors
    ///
    /// See [`Cursor::continue_to`].
    pub fn advance(&mut self, count: u32) -> CoreResult<bool> {
        for _ in 0..count {
            if !self.continue_to(None)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn first_seek(&mut self) -> CoreResult<bool> {
        if self.options.forward {
            self.iterator.seek(&self.options.low_key);
        } else {
            self.iterator.seek(&self.options.high_key);
        }
        self.continue_from(None, IteratorState::Ready)
    }

    fn continue_from(&mut self, target: Option<&Key>, state: IteratorState) -> CoreResult<bool> {
        let previous_key = self.current_key.clone();
        let mut last_duplicate_key: Option<Key> = None;
        let mut forward = self.options.forward;
        let mut pending_seek = target.filter(|_| forward);
        let mut step = state == IteratorState::Seek;

        loop {
            if step {
                if let Some(target) = pending_seek.take() {
                    let encoded = self.encode_key(target)?;
                    self.iterator.seek(&encoded);
                } else if forward {
                    self.iterator.next();
                } else {
                    self.iterator.prev();
                }
            }
            step = true;

            if !self.iterator.is_valid() {
                if !forward && last_duplicate_key.is_some() {
                    // Ran off the front; walk back up to the first duplicate.
                    forward = true;
                    self.iterator.seek(&self.options.low_key);
                    step = false;
                    continue;
                }
                return self.exhausted();
            }

            if self.is_past_bounds()? {
                if forward != self.options.forward {
                    continue;
                }
                if !forward && last_duplicate_key.is_some() {
                    forward = true;
                    continue;
                }
                return self.exhausted();
            }

            if !self.have_entered_range()? {
                continue;
            }

            // Stale index entries do not load.
            if !self.load_current_row()? {
                continue;
            }
            let Some(current) = self.current_key.as_ref() else {
                continue;
            };

            if let Some(target) = target {
                let ord = current.compare(target);
                let short_of_target = if self.options.forward {
                    ord == Ordering::Less
                } else {
                    ord == Ordering::Greater
                };
                if short_of_target {
                    continue;
                }
            }

            if self.options.unique {
                if previous_key
                    .as_ref()
                    .is_some_and(|previous| previous.compare(current) == Ordering::Equal)
                {
                    continue;
                }
                if !forward {
                    match &last_duplicate_key {
                        None => last_duplicate_key = Some(current.clone()),
                        Some(last) if last.compare(current) != Ordering::Equal => forward = true,
                        Some(_) => {}
                    }
                    continue;
                }
            }

            return Ok(true);
        }
    }

    fn exhausted(&mut self) -> CoreResult<bool> {
        self.current_key = None;
        self.primary_key = None;
        self.value = Bytes::new();
        Ok(false)
    }

    fn encode_key(&self, key: &Key) -> CoreResult<Vec<u8>> {
        let CursorOptions {
            database_id,
            object_store_id,
            index_id,
            ..
        } = self.options;
        Ok(match self.kind {
            CursorKind::ObjectStore => ObjectStoreDataKey::encode(database_id, object_store_id, key)?,
            CursorKind::IndexKey | CursorKind::Index => {
                IndexDataKey::encode_for_user_key(database_id, object_store_id, index_id, key)?
            }
        })
    }

    fn have_entered_range(&self) -> CoreResult<bool> {
        let key = self.iterator.key();
        Ok(if self.options.forward {
            let ord = compare_index_keys(key, &self.options.low_key)?;
            ord == Ordering::Greater || (!self.options.low_open && ord == Ordering::Equal)
        } else {
            let ord = compare_index_keys(key, &self.options.high_key)?;
            ord == Ordering::Less || (!self.options.high_open && ord == Ordering::Equal)
        })
    }

    fn is_past_bounds(&self) -> CoreResult<bool> {
        let key = self.iterator.key();
        Ok(if self.options.forward {
            let ord = compare_index_keys(key, &self.options.high_key)?;
            ord == Ordering::Greater || (self.options.high_open && ord == Ordering::Equal)
        } else {
            let ord = compare_index_keys(key, &self.options.low_key)?;
            ord == Ordering::Less || (self.options.low_open && ord == Ordering::Equal)
        })
    }

    fn load_current_row(&mut self) -> CoreResult<bool> {
        match self.kind {
            CursorKind::ObjectStore => self.load_record_row(),
            CursorKind::IndexKey => self.load_index_row(false),
            CursorKind::Index => self.load_index_row(true),
        }
    }

    fn load_record_row(&mut self) -> CoreResult<bool> {
        let data_key = ObjectStoreDataKey::decode(self.iterator.key())?;
        let Some((version, value)) = split_record(self.iterator.value()) else {
            return Ok(false);
        };
        let value = Bytes::copy_from_slice(value);
        let key = data_key.user_key()?;

        self.record_identifier = RecordIdentifier::new(data_key.encoded_user_key().to_vec(), version);
        self.value = value;
        self.primary_key = Some(key.clone());
        self.current_key = Some(key);
        Ok(true)
    }

    fn load_index_row(&mut self, with_value: bool) -> CoreResult<bool> {
        let entry_key = IndexDataKey::decode(self.iterator.key())?;
        let Some((version, encoded_primary_key)) = split_index_value(self.iterator.value()) else {
            return Ok(false);
        };
        let encoded_primary_key = encoded_primary_key.to_vec();
        let primary_key = match Key::decode(&encoded_primary_key) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(error = %err, "index entry holds a malformed primary key");
                return Ok(false);
            }
        };

        let CursorOptions {
            database_id,
            object_store_id,
            ..
        } = self.options;
        let value = if with_value {
            let data_key =
                ObjectStoreDataKey::encode_encoded(database_id, object_store_id, &encoded_primary_key)?;
            match read_record(&self.txn, &data_key)? {
                Some((current, value)) if current == version => Bytes::from(value),
                _ => return self.remove_stale_entry(version),
            }
        } else {
            if !version_exists(&self.txn, database_id, object_store_id, version, &encoded_primary_key)? {
                return self.remove_stale_entry(version);
            }
            Bytes::new()
        };

        self.current_key = Some(entry_key.user_key()?);
        self.primary_key = Some(primary_key);
        self.record_identifier = RecordIdentifier::new(encoded_primary_key, version);
        self.value = value;
        Ok(true)
    }

    fn remove_stale_entry(&self, version: i64) -> CoreResult<bool> {
        tracing::debug!(index_id = self.options.index_id, version, "removing stale index entry");
        self.txn.remove(self.iterator.key())?;
        Ok(false)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("kind", &self.kind)
            .field("key", &self.current_key)
            .field("primary_key", &self.primary_key)
            .finish_non_exhaustive()
    }
}

impl BackingStore {
    /// Opens a cursor over the records of an object store. Returns `None`
    /// if the range holds no record.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids, an ended transaction or a stored
    /// key that does not decode.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn open_object_store_cursor(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> CoreResult<Option<Cursor>> {
        check_ids(database_id, object_store_id)?;
        let range = range.cloned().unwrap_or_default();
        let data_key = |key: &Key| ObjectStoreDataKey::encode(database_id, object_store_id, key);
        let forward = direction.is_forward();

        let (low_key, low_open) = match &range.lower {
            Some(lower) => (data_key(lower)?, range.lower_open),
            None => (data_key(&Key::Min)?, true),
        };
        let (high_key, high_open) = match &range.upper {
            None if forward => (data_key(&Key::Null)?, true),
            None => {
                let Some(found) = find_greatest_key_less_than_or_equal(txn, &data_key(&Key::Null)?)?
                else {
                    return Ok(None);
                };
                (found, false)
            }
            Some(upper) if forward => (data_key(upper)?, range.upper_open),
            Some(upper) => {
                let high_key = data_key(upper)?;
                let Some(found) = find_greatest_key_less_than_or_equal(txn, &high_key)? else {
                    return Ok(None);
                };
                let open = range.upper_open
                    && compare_index_keys(&found, &high_key)? != Ordering::Less;
                (found, open)
            }
        };

        let options = CursorOptions {
            database_id,
            object_store_id,
            index_id: 0,
            low_key,
            low_open,
            high_key,
            high_open,
            forward,
            unique: direction.is_unique(),
        };
        Cursor::open(txn, CursorKind::ObjectStore, options)
    }

    /// Opens a cursor yielding index keys and primary keys.
    ///
    /// # Errors
    ///
    /// See [`BackingStore::open_object_store_cursor`].
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn open_index_key_cursor(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> CoreResult<Option<Cursor>> {
        let Some(options) =
            index_cursor_options(txn, database_id, object_store_id, index_id, range, direction)?
        else {
            return Ok(None);
        };
        Cursor::open(txn, CursorKind::IndexKey, options)
    }

    /// Opens a cursor yielding index keys, primary keys and record values.
    ///
    /// # Errors
    ///
    /// See [`BackingStore::open_object_store_cursor`].
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn open_index_cursor(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> CoreResult<Option<Cursor>> {
        let Some(options) =
            index_cursor_options(txn, database_id, object_store_id, index_id, range, direction)?
        else {
            return Ok(None);
        };
        Cursor::open(txn, CursorKind::Index, options)
    }
}

fn index_cursor_options(
    txn: &Transaction,
    database_id: i64,
    object_store_id: i64,
    index_id: i64,
    range: Option<&KeyRange>,
    direction: CursorDirection,
) -> CoreResult<Option<CursorOptions>> {
    check_index_ids(database_id, object_store_id, index_id)?;
    let range = range.cloned().unwrap_or_default();
    let entry_key =
        |key: &Key| IndexDataKey::encode_for_user_key(database_id, object_store_id, index_id, key);
    let forward = direction.is_forward();

    let (low_key, low_open) = match &range.lower {
        Some(lower) => (entry_key(lower)?, range.lower_open),
        None => (IndexDataKey::encode_min_key(database_id, object_store_id, index_id)?, false),
    };
    let (high_key, high_open) = match &range.upper {
        None => {
            let max = IndexDataKey::encode_max_key(database_id, object_store_id, index_id)?;
            if forward {
                (max, false)
            } else {
                let Some(found) = find_greatest_key_less_than_or_equal(txn, &max)? else {
                    return Ok(None);
                };
                (found, false)
            }
        }
        Some(upper) => {
            // Bound at the last duplicate of the upper key.
            let high_key = entry_key(upper)?;
            let Some(found) = find_greatest_key_less_than_or_equal(txn, &high_key)? else {
                return Ok(None);
            };
            let open =
                range.upper_open && compare_index_keys(&found, &high_key)? != Ordering::Less;
            (found, open)
        }
    };

    Ok(Some(CursorOptions {
        database_id,
        object_store_id,
        index_id,
        low_key,
        low_open,
        high_key,
        high_open,
        forward,
        unique: direction.is_unique(),
    }))
}

/// Finds the last key comparing at or below `target` on index keys. Among
/// several keys equal to `target`, the last one wins.
fn find_greatest_key_less_than_or_equal(
    txn: &Transaction,
    target: &[u8],
) -> CoreResult<Option<Vec<u8>>> {
    let mut it = txn.create_iterator()?;
    it.seek(target);
    if !it.is_valid() {
        it.seek_to_last();
        if !it.is_valid() {
            return Ok(None);
        }
    }

    while compare_index_keys(it.key(), target)? == Ordering::Greater {
        it.prev();
        if !it.is_valid() {
            return Ok(None);
        }
    }

    let mut found = it.key().to_vec();
    it.next();
    while it.is_valid() && compare_index_keys(it.key(), target)? == Ordering::Equal {
        found = it.key().to_vec();
        it.next();
    }
    Ok(Some(found))
}
