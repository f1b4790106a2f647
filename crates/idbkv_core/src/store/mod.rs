//! The backing store: databases, object stores, indexes, records and
//! cursors mapped onto an ordered key-value engine.
//!
//! Every row lives under a key built by `idbkv_codec`. Schema-changing and
//! record operations take a [`Transaction`]; registry and metadata loads
//! read committed state straight from the engine.

mod cursor;
mod database;
mod index;
mod object_store;
mod records;

pub use cursor::{Cursor, CursorDirection, CursorKind, KeyRange};

use crate::comparator::IdbComparator;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use crate::types::SCHEMA_VERSION;
use idbkv_codec::{
    compare_keys, decode_bool, decode_int, decode_string, decode_var_int, encode_bool,
    encode_int, encode_string, encode_var_int, CodecResult, Key, KeyPath, KeyPrefix,
    SchemaVersionKey,
};
use idbkv_storage::{FileEngine, KvEngine, KvIterator, MemoryEngine};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Schema-aware access to one origin's databases.
///
/// # Example
///
/// ```rust
/// use idbkv_codec::{Key, KeyPath};
/// use idbkv_core::BackingStore;
///
/// let store = BackingStore::open_in_memory("https://example.com").unwrap();
/// let db = store.create_database("notes", "1", None).unwrap();
///
/// let txn = store.begin();
/// let os = store.create_object_store(&txn, db, "notes", &KeyPath::Null, false).unwrap();
/// store.put_record(&txn, db, os, &Key::string("a"), b"hello").unwrap();
/// txn.commit().unwrap();
///
/// let txn = store.begin();
/// let value = store.get_record(&txn, db, os, &Key::string("a")).unwrap();
/// assert_eq!(value.as_deref(), Some(&b"hello"[..]));
/// ```
pub struct BackingStore {
    origin: String,
    engine: Arc<dyn KvEngine>,
}

impl BackingStore {
    /// Opens a store in the engine directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be opened, or
    /// `SchemaVersionMismatch` if it was written by another schema.
    pub fn open(path: &Path, origin: &str, config: &Config) -> CoreResult<Self> {
        let engine = FileEngine::open(path, Arc::new(IdbComparator), config.engine_options())?;
        Self::with_engine(origin, Arc::new(engine))
    }

    /// Opens an empty store that lives in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema version row cannot be written.
    pub fn open_in_memory(origin: &str) -> CoreResult<Self> {
        Self::with_engine(origin, Arc::new(MemoryEngine::new(Arc::new(IdbComparator))))
    }

    /// Opens a store over an existing engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the engine is not ordered by
    /// [`IdbComparator`], `SchemaVersionMismatch` if its schema version is
    /// not [`SCHEMA_VERSION`], or any engine error.
    pub fn with_engine(origin: &str, engine: Arc<dyn KvEngine>) -> CoreResult<Self> {
        let comparator = engine.comparator();
        if comparator.name() != IdbComparator::NAME {
            return Err(CoreError::invalid_argument(format!(
                "engine is ordered by {}, expected {}",
                comparator.name(),
                IdbComparator::NAME
            )));
        }

        let key = SchemaVersionKey::encode();
        match get_int(engine.as_ref(), &key)? {
            None => engine.put(&key, &encode_int(SCHEMA_VERSION)?)?,
            Some(SCHEMA_VERSION) => {}
            Some(found) => {
                tracing::error!(found, expected = SCHEMA_VERSION, "schema version mismatch");
                return Err(CoreError::SchemaVersionMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
        }

        tracing::debug!(origin, "backing store opened");
        Ok(Self {
            origin: origin.to_owned(),
            engine,
        })
    }

    /// Returns the origin whose databases this store holds.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn KvEngine> {
        &self.engine
    }

    /// Begins a transaction on the engine.
    #[must_use]
    pub fn begin(&self) -> Transaction {
        Transaction::begin(Arc::clone(&self.engine))
    }
}

impl fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingStore")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Point reads and scans, from a transaction or straight from the engine.
pub(crate) trait ReadView {
    fn read(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>>;

    fn scan(&self) -> CoreResult<Box<dyn KvIterator>>;
}

impl ReadView for Transaction {
    fn read(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.get(key)
    }

    fn scan(&self) -> CoreResult<Box<dyn KvIterator>> {
        Ok(Box::new(self.create_iterator()?))
    }
}

impl ReadView for dyn KvEngine {
    fn read(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(self.get(key)?)
    }

    fn scan(&self) -> CoreResult<Box<dyn KvIterator>> {
        Ok(self.iter())
    }
}

/// Decodes a metadata value. Metadata that fails to decode means the store
/// is inconsistent.
pub(crate) fn decode_meta<T>(
    key: &[u8],
    bytes: &[u8],
    decode: impl FnOnce(&[u8]) -> CodecResult<T>,
) -> CoreResult<T> {
    decode(bytes).map_err(|err| {
        tracing::error!(key = ?key, error = %err, "corrupt metadata value");
        CoreError::consistency(format!("corrupt metadata value: {err}"))
    })
}

fn get_meta<V, T>(
    view: &V,
    key: &[u8],
    decode: impl FnOnce(&[u8]) -> CodecResult<T>,
) -> CoreResult<Option<T>>
where
    V: ReadView + ?Sized,
{
    match view.read(key)? {
        Some(bytes) => decode_meta(key, &bytes, decode).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn get_int<V: ReadView + ?Sized>(view: &V, key: &[u8]) -> CoreResult<Option<i64>> {
    get_meta(view, key, decode_int)
}

pub(crate) fn get_var_int<V: ReadView + ?Sized>(view: &V, key: &[u8]) -> CoreResult<Option<i64>> {
    get_meta(view, key, |bytes| {
        let (value, len) = decode_var_int(bytes)?;
        if len == bytes.len() {
            Ok(value)
        } else {
            Err(idbkv_codec::CodecError::invalid_key("trailing bytes after varint"))
        }
    })
}

pub(crate) fn get_string<V: ReadView + ?Sized>(
    view: &V,
    key: &[u8],
) -> CoreResult<Option<String>> {
    get_meta(view, key, decode_string)
}

pub(crate) fn get_bool<V: ReadView + ?Sized>(view: &V, key: &[u8]) -> CoreResult<Option<bool>> {
    get_meta(view, key, decode_bool)
}

pub(crate) fn get_key_path<V: ReadView + ?Sized>(
    view: &V,
    key: &[u8],
) -> CoreResult<Option<KeyPath>> {
    get_meta(view, key, KeyPath::decode)
}

pub(crate) fn put_int(txn: &Transaction, key: &[u8], value: i64) -> CoreResult<()> {
    txn.put(key, &encode_int(value)?)
}

pub(crate) fn put_var_int(txn: &Transaction, key: &[u8], value: i64) -> CoreResult<()> {
    txn.put(key, &encode_var_int(value)?)
}

pub(crate) fn put_string(txn: &Transaction, key: &[u8], value: &str) -> CoreResult<()> {
    txn.put(key, &encode_string(value))
}

pub(crate) fn put_bool(txn: &Transaction, key: &[u8], value: bool) -> CoreResult<()> {
    txn.put(key, &encode_bool(value))
}

/// Error for a metadata row that must exist but does not.
pub(crate) fn missing_row(what: &str) -> CoreError {
    tracing::error!(row = what, "required metadata row is missing");
    CoreError::consistency(format!("missing {what} row"))
}

/// Returns true while `key` sorts before `stop`.
pub(crate) fn before(key: &[u8], stop: &[u8]) -> CoreResult<bool> {
    Ok(compare_keys(key, stop)? == Ordering::Less)
}

/// Collects every key in `[start, stop)`.
pub(crate) fn keys_in_range<V: ReadView + ?Sized>(
    view: &V,
    start: &[u8],
    stop: &[u8],
) -> CoreResult<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    let mut it = view.scan()?;
    it.seek(start);
    while it.is_valid() && before(it.key(), stop)? {
        keys.push(it.key().to_vec());
        it.next();
    }
    Ok(keys)
}

/// Removes every key in `[start, stop)` as seen by `txn`.
pub(crate) fn delete_range(txn: &Transaction, start: &[u8], stop: &[u8]) -> CoreResult<()> {
    for key in keys_in_range(txn, start, stop)? {
        txn.remove(&key)?;
    }
    Ok(())
}

/// Takes the lowest id parked on a free list spanning `[start, stop)`.
pub(crate) fn pop_free_id(
    txn: &Transaction,
    start: &[u8],
    stop: &[u8],
    decode: impl FnOnce(&[u8]) -> CodecResult<i64>,
) -> CoreResult<Option<i64>> {
    let mut it = txn.scan()?;
    it.seek(start);
    if !it.is_valid() || !before(it.key(), stop)? {
        return Ok(None);
    }
    let key = it.key().to_vec();
    let id = decode(&key)?;
    txn.remove(&key)?;
    Ok(Some(id))
}

pub(crate) fn check_database_id(database_id: i64) -> CoreResult<()> {
    if KeyPrefix::is_valid_database_id(database_id) {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!(
            "invalid database id {database_id}"
        )))
    }
}

pub(crate) fn check_ids(database_id: i64, object_store_id: i64) -> CoreResult<()> {
    check_database_id(database_id)?;
    if KeyPrefix::is_valid_object_store_id(object_store_id) {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!(
            "invalid object store id {object_store_id}"
        )))
    }
}

pub(crate) fn check_index_ids(database_id: i64, object_store_id: i64, index_id: i64) -> CoreResult<()> {
    check_ids(database_id, object_store_id)?;
    if KeyPrefix::is_valid_index_id(index_id) {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!("invalid index id {index_id}")))
    }
}

/// Rejects the two probe keys, which never key a stored row.
pub(crate) fn check_user_key(key: &Key) -> CoreResult<()> {
    if key.is_valid() && !matches!(key, Key::Null) {
        Ok(())
    } else {
        Err(CoreError::invalid_argument(format!("{key:?} cannot key a record")))
    }
}
