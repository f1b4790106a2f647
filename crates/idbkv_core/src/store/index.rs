//! Index metadata and index entries.
//!
//! An index entry is live only while the record it points at still carries
//! the version stamped into the entry. Entries that fail that check are
//! removed when a lookup or cursor meets them.

use super::records::{new_version_number, read_record};
use super::{
    before, check_ids, check_index_ids, check_user_key, decode_meta, delete_range, get_bool,
    get_int, get_key_path, get_string, missing_row, pop_free_id, put_bool, put_int, put_string,
    BackingStore,
};
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use crate::types::{IndexMetadata, RecordIdentifier};
use idbkv_codec::{
    compare_index_keys, decode_int, decode_string, decode_var_int, encode_int, encode_var_int,
    ExistsEntryKey, IndexDataKey, IndexFreeListKey, IndexMetaDataKey, IndexMetaDataType,
    IndexNamesKey, Key, KeyPath, KeyPrefix, ObjectStoreDataKey, ObjectStoreMetaDataKey,
    ObjectStoreMetaDataType, MIN_INDEX_ID,
};
use idbkv_storage::{KvEngine, KvIterator};
use std::cmp::Ordering;
use std::collections::BTreeMap;

impl BackingStore {
    /// Loads every index of an object store. Reads committed state only.
    ///
    /// # Errors
    ///
    /// Returns `Consistency` if an index's required rows are missing or
    /// corrupt.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn get_indexes(
        &self,
        database_id: i64,
        object_store_id: i64,
    ) -> CoreResult<BTreeMap<i64, IndexMetadata>> {
        check_ids(database_id, object_store_id)?;
        let view: &dyn KvEngine = self.engine.as_ref();
        let start =
            IndexMetaDataKey::encode(database_id, object_store_id, 0, IndexMetaDataType::Name)?;
        let stop = IndexMetaDataKey::encode_max_key(database_id, object_store_id)?;

        let mut indexes = BTreeMap::new();
        let mut it = view.iter();
        it.seek(&start);
        while it.is_valid() && before(it.key(), &stop)? {
            let meta_key = IndexMetaDataKey::decode(it.key())?;
            if meta_key.meta_data_type() != IndexMetaDataType::Name.as_byte() {
                it.next();
                continue;
            }

            let id = meta_key.index_id();
            let name = decode_meta(it.key(), it.value(), decode_string)?;
            let row = |meta_data_type| {
                IndexMetaDataKey::encode(database_id, object_store_id, id, meta_data_type)
            };
            let unique = get_bool(view, &row(IndexMetaDataType::Unique)?)?
                .ok_or_else(|| missing_row("index unique flag"))?;
            let key_path = get_key_path(view, &row(IndexMetaDataType::KeyPath)?)?
                .ok_or_else(|| missing_row("index key path"))?;
            let multi_entry =
                get_bool(view, &row(IndexMetaDataType::MultiEntry)?)?.unwrap_or(false);

            indexes.insert(
                id,
                IndexMetadata {
                    id,
                    name,
                    key_path,
                    unique,
                    multi_entry,
                },
            );
            it.next();
        }
        Ok(indexes)
    }

    /// Creates an index on an object store and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the store does not exist, or
    /// `InvalidOperation` if the name is taken or ids are exhausted.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, name = %name))]
    #[allow(clippy::too_many_arguments)]
    pub fn create_index(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        name: &str,
        key_path: &KeyPath,
        unique: bool,
        multi_entry: bool,
    ) -> CoreResult<i64> {
        check_ids(database_id, object_store_id)?;
        let store_name = ObjectStoreMetaDataKey::encode(
            database_id,
            object_store_id,
            ObjectStoreMetaDataType::Name,
        )?;
        if txn.get(&store_name)?.is_none() {
            return Err(CoreError::invalid_argument(format!(
                "no object store with id {object_store_id}"
            )));
        }
        let names_key = IndexNamesKey::encode(database_id, object_store_id, name)?;
        if txn.get(&names_key)?.is_some() {
            return Err(CoreError::invalid_operation(format!(
                "index {name:?} already exists"
            )));
        }

        let id = allocate_index_id(txn, database_id, object_store_id)?;
        let row =
            |meta_data_type| IndexMetaDataKey::encode(database_id, object_store_id, id, meta_data_type);

        put_string(txn, &row(IndexMetaDataType::Name)?, name)?;
        put_bool(txn, &row(IndexMetaDataType::Unique)?, unique)?;
        txn.put(&row(IndexMetaDataType::KeyPath)?, &key_path.encode())?;
        put_bool(txn, &row(IndexMetaDataType::MultiEntry)?, multi_entry)?;
        txn.put(&names_key, &encode_int(id)?)?;

        tracing::debug!(index_id = id, "index created");
        Ok(id)
    }

    /// Deletes an index with all its entries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the index does not exist.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn delete_index(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
    ) -> CoreResult<()> {
        check_index_ids(database_id, object_store_id, index_id)?;
        let name = get_string(
            txn,
            &IndexMetaDataKey::encode(database_id, object_store_id, index_id, IndexMetaDataType::Name)?,
        )?
        .ok_or_else(|| CoreError::invalid_argument(format!("no index with id {index_id}")))?;

        delete_range(
            txn,
            &IndexMetaDataKey::encode(database_id, object_store_id, index_id, IndexMetaDataType::Name)?,
            &IndexMetaDataKey::encode_max_key_for_index(database_id, object_store_id, index_id)?,
        )?;
        delete_range(
            txn,
            &IndexDataKey::encode_min_key(database_id, object_store_id, index_id)?,
            &IndexDataKey::encode_max_key(database_id, object_store_id, index_id)?,
        )?;
        txn.remove(&IndexNamesKey::encode(database_id, object_store_id, &name)?)?;
        txn.put(&IndexFreeListKey::encode(database_id, object_store_id, index_id)?, &[])?;

        tracing::debug!(index_id, "index deleted");
        Ok(())
    }

    /// Adds an entry mapping index key `key` to `record`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a probe key or a reserved index id.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn put_index_data_for_record(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        key: &Key,
        record: &RecordIdentifier,
    ) -> CoreResult<()> {
        check_index_ids(database_id, object_store_id, index_id)?;
        check_user_key(key)?;

        let sequence = new_version_number(txn, database_id, object_store_id)?;
        let entry_key = IndexDataKey::encode(
            database_id,
            object_store_id,
            index_id,
            &key.encode(),
            &record.encoded_primary_key,
            sequence,
        )?;
        let mut entry = encode_var_int(record.version)?;
        entry.extend_from_slice(&record.encoded_primary_key);
        txn.put(&entry_key, &entry)
    }

    /// Returns the primary key of the first live entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored key does not decode.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn get_primary_key_via_index(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        key: &Key,
    ) -> CoreResult<Option<Key>> {
        find_key_in_index(txn, database_id, object_store_id, index_id, key)?
            .map(|primary_key| Key::decode(&primary_key).map_err(CoreError::from))
            .transpose()
    }

    /// Returns the record value behind the first live entry for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored key does not decode.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, index_id = index_id))]
    pub fn get_object_via_index(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        key: &Key,
    ) -> CoreResult<Option<Vec<u8>>> {
        let Some(primary_key) = find_key_in_index(txn, database_id, object_store_id, index_id, key)?
        else {
            return Ok(None);
        };
        let data_key = ObjectStoreDataKey::encode_encoded(database_id, object_store_id, &primary_key)?;
        Ok(read_record(txn, &data_key)?.map(|(_, value)| value))
    }

    /// Checks whether `key` has a live entry, returning the primary key it
    /// maps to.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored key does not decode.
    pub fn key_exists_in_index(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        key: &Key,
    ) -> CoreResult<Option<Key>> {
        self.get_primary_key_via_index(txn, database_id, object_store_id, index_id, key)
    }
}

fn allocate_index_id(txn: &Transaction, database_id: i64, object_store_id: i64) -> CoreResult<i64> {
    let max_key = ObjectStoreMetaDataKey::encode(
        database_id,
        object_store_id,
        ObjectStoreMetaDataType::MaxIndexId,
    )?;
    let max = get_int(txn, &max_key)?.unwrap_or(MIN_INDEX_ID - 1);

    let recycled = pop_free_id(
        txn,
        &IndexFreeListKey::encode(database_id, object_store_id, 0)?,
        &IndexFreeListKey::encode_max_key(database_id, object_store_id)?,
        |key| IndexFreeListKey::decode(key).map(|key| key.index_id()),
    )?;
    let id = recycled.unwrap_or(max + 1);
    if !KeyPrefix::is_valid_index_id(id) {
        return Err(CoreError::invalid_operation("index ids exhausted"));
    }
    if id > max {
        put_int(txn, &max_key, id)?;
    }
    Ok(id)
}

/// Returns true if the record's exists entry still carries `version`.
pub(crate) fn version_exists(
    txn: &Transaction,
    database_id: i64,
    object_store_id: i64,
    version: i64,
    encoded_primary_key: &[u8],
) -> CoreResult<bool> {
    let exists_key = ExistsEntryKey::encode_encoded(database_id, object_store_id, encoded_primary_key)?;
    let Some(bytes) = txn.get(&exists_key)? else {
        return Ok(false);
    };
    match decode_int(&bytes) {
        Ok(current) => Ok(current == version),
        Err(err) => {
            tracing::warn!(error = %err, "exists entry does not decode");
            Ok(false)
        }
    }
}

/// Splits an index entry value into the record version and encoded
/// primary key.
pub(crate) fn split_index_value(value: &[u8]) -> Option<(i64, &[u8])> {
    match decode_var_int(value) {
        Ok((version, len)) => Some((version, &value[len..])),
        Err(err) => {
            tracing::warn!(error = %err, "index entry value does not decode");
            None
        }
    }
}

/// Finds the first live entry for `key` and returns its encoded primary
/// key, removing stale entries met on the way.
fn find_key_in_index(
    txn: &Transaction,
    database_id: i64,
    object_store_id: i64,
    index_id: i64,
    key: &Key,
) -> CoreResult<Option<Vec<u8>>> {
    check_index_ids(database_id, object_store_id, index_id)?;
    let probe = IndexDataKey::encode_for_user_key(database_id, object_store_id, index_id, key)?;

    let mut it = txn.create_iterator()?;
    it.seek(&probe);
    while it.is_valid() && compare_index_keys(it.key(), &probe)? != Ordering::Greater {
        let Some((version, primary_key)) = split_index_value(it.value()) else {
            it.next();
            continue;
        };
        if version_exists(txn, database_id, object_store_id, version, primary_key)? {
            return Ok(Some(primary_key.to_vec()));
        }

        tracing::debug!(index_id, version, "removing stale index entry");
        txn.remove(it.key())?;
        it.next();
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (BackingStore, i64, i64) {
        let store = BackingStore::open_in_memory("origin").unwrap();
        let db = store.create_database("db", "", None).unwrap();
        let txn = store.begin();
        let os = store.create_object_store(&txn, db, "os", &KeyPath::Null, false).unwrap();
        txn.commit().unwrap();
        (store, db, os)
    }

    #[test]
    fn create_load_and_delete() {
        let (store, db, os) = setup();
        let txn = store.begin();
        let by_name = store
            .create_index(&txn, db, os, "by_name", &KeyPath::string("name"), true, false)
            .unwrap();
        let by_tag = store
            .create_index(&txn, db, os, "by_tag", &KeyPath::string("tags"), false, true)
            .unwrap();
        assert_eq!((by_name, by_tag), (MIN_INDEX_ID, MIN_INDEX_ID + 1));
        assert!(matches!(
            store.create_index(&txn, db, os, "by_name", &KeyPath::Null, false, false),
            Err(CoreError::InvalidOperation { .. })
        ));
        txn.commit().unwrap();

        let indexes = store.get_indexes(db, os).unwrap();
        assert_eq!(indexes.len(), 2);
        assert!(indexes[&by_name].unique);
        assert!(indexes[&by_tag].multi_entry);
        assert_eq!(indexes[&by_tag].key_path, KeyPath::string("tags"));

        let txn = store.begin();
        store.delete_index(&txn, db, os, by_name).unwrap();
        assert_eq!(
            store
                .create_index(&txn, db, os, "again", &KeyPath::Null, false, false)
                .unwrap(),
            by_name
        );
        txn.commit().unwrap();
        let indexes = store.get_indexes(db, os).unwrap();
        assert_eq!(indexes[&by_name].name, "again");
    }

    #[test]
    fn index_on_missing_store_rejected() {
        let (store, db, _) = setup();
        let txn = store.begin();
        assert!(matches!(
            store.create_index(&txn, db, 42, "idx", &KeyPath::Null, false, false),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn lookup_through_index() {
        let (store, db, os) = setup();
        let txn = store.begin();
        let idx = store
            .create_index(&txn, db, os, "idx", &KeyPath::string("k"), false, false)
            .unwrap();
        let record = store.put_record(&txn, db, os, &Key::number(1.0), b"one").unwrap();
        store
            .put_index_data_for_record(&txn, db, os, idx, &Key::string("x"), &record)
            .unwrap();

        assert_eq!(
            store.get_primary_key_via_index(&txn, db, os, idx, &Key::string("x")).unwrap(),
            Some(Key::number(1.0))
        );
        assert_eq!(
            store.get_object_via_index(&txn, db, os, idx, &Key::string("x")).unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(
            store.key_exists_in_index(&txn, db, os, idx, &Key::string("y")).unwrap(),
            None
        );
    }

    #[test]
    fn stale_entry_is_removed_on_lookup() {
        let (store, db, os) = setup();
        let txn = store.begin();
        let idx = store
            .create_index(&txn, db, os, "idx", &KeyPath::string("k"), false, false)
            .unwrap();
        let first = store.put_record(&txn, db, os, &Key::number(1.0), b"old").unwrap();
        store
            .put_index_data_for_record(&txn, db, os, idx, &Key::string("x"), &first)
            .unwrap();
        store.put_record(&txn, db, os, &Key::number(1.0), b"new").unwrap();

        assert_eq!(
            store.get_object_via_index(&txn, db, os, idx, &Key::string("x")).unwrap(),
            None
        );
        txn.commit().unwrap();

        let start = IndexDataKey::encode_min_key(db, os, idx).unwrap();
        let mut it = store.engine().iter();
        it.seek(&start);
        assert!(!it.is_valid() || !before(it.key(), &IndexDataKey::encode_max_key(db, os, idx).unwrap()).unwrap());
    }

    #[test]
    fn reserved_index_ids_rejected() {
        let (store, db, os) = setup();
        let txn = store.begin();
        let record = store.put_record(&txn, db, os, &Key::number(1.0), b"").unwrap();
        assert!(matches!(
            store.put_index_data_for_record(&txn, db, os, 1, &Key::number(1.0), &record),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
