//! Object store metadata.

use super::{
    before, check_database_id, check_ids, decode_meta, delete_range, get_bool, get_int,
    get_key_path, get_string, missing_row, pop_free_id, put_bool, put_int, put_string,
    BackingStore,
};
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use crate::types::{ObjectStoreMetadata, KEY_GENERATOR_INITIAL_NUMBER};
use idbkv_codec::{
    decode_string, encode_int, DatabaseMetaDataKey, DatabaseMetaDataType, IndexFreeListKey,
    IndexMetaDataKey, IndexMetaDataType, IndexNamesKey, KeyPath, KeyPrefix,
    ObjectStoreFreeListKey, ObjectStoreMetaDataKey, ObjectStoreMetaDataType, ObjectStoreNamesKey,
    MIN_INDEX_ID,
};
use idbkv_storage::KvEngine;
use std::collections::BTreeMap;

impl BackingStore {
    /// Loads every object store of a database, with its indexes.
    ///
    /// Reads committed state only.
    ///
    /// # Errors
    ///
    /// Returns `Consistency` if a store's required rows are missing or
    /// corrupt.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id))]
    pub fn get_object_stores(
        &self,
        database_id: i64,
    ) -> CoreResult<BTreeMap<i64, ObjectStoreMetadata>> {
        check_database_id(database_id)?;
        let view: &dyn KvEngine = self.engine.as_ref();
        let start = ObjectStoreMetaDataKey::encode(database_id, 1, ObjectStoreMetaDataType::Name)?;
        let stop = ObjectStoreMetaDataKey::encode_max_key(database_id)?;

        let mut stores = BTreeMap::new();
        let mut it = view.iter();
        it.seek(&start);
        while it.is_valid() && before(it.key(), &stop)? {
            let meta_key = ObjectStoreMetaDataKey::decode(it.key())?;
            if meta_key.meta_data_type() != ObjectStoreMetaDataType::Name.as_byte() {
                it.next();
                continue;
            }

            let id = meta_key.object_store_id();
            let name = decode_meta(it.key(), it.value(), decode_string)?;
            let row = |meta_data_type| ObjectStoreMetaDataKey::encode(database_id, id, meta_data_type);

            let mut key_path = get_key_path(view, &row(ObjectStoreMetaDataType::KeyPath)?)?
                .ok_or_else(|| missing_row("object store key path"))?;
            let auto_increment = get_bool(view, &row(ObjectStoreMetaDataType::AutoIncrement)?)?
                .ok_or_else(|| missing_row("object store auto increment"))?;
            let max_index_id = get_int(view, &row(ObjectStoreMetaDataType::MaxIndexId)?)?
                .ok_or_else(|| missing_row("object store max index id"))?;

            // Stores written before key paths carried their own null marker.
            if get_bool(view, &row(ObjectStoreMetaDataType::HasKeyPath)?)? == Some(false) {
                if matches!(&key_path, KeyPath::String(path) if !path.is_empty()) {
                    tracing::error!(object_store_id = id, "key path present but flagged absent");
                    return Err(CoreError::consistency(format!(
                        "object store {id} has a key path but is flagged as having none"
                    )));
                }
                key_path = KeyPath::Null;
            }

            let generator_row = row(ObjectStoreMetaDataType::KeyGeneratorCurrentNumber)?;
            if let Some(current) = get_int(view, &generator_row)? {
                if current < KEY_GENERATOR_INITIAL_NUMBER {
                    tracing::error!(object_store_id = id, current, "key generator below its initial number");
                    return Err(CoreError::consistency(format!(
                        "object store {id} has key generator number {current}"
                    )));
                }
            }

            let indexes = self.get_indexes(database_id, id)?;
            stores.insert(
                id,
                ObjectStoreMetadata {
                    id,
                    name,
                    key_path,
                    auto_increment,
                    max_index_id,
                    indexes,
                },
            );
            it.next();
        }
        Ok(stores)
    }

    /// Resolves an object store name to its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction has ended or the row is corrupt.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, name = %name))]
    pub fn get_object_store_id(
        &self,
        txn: &Transaction,
        database_id: i64,
        name: &str,
    ) -> CoreResult<Option<i64>> {
        check_database_id(database_id)?;
        get_int(txn, &ObjectStoreNamesKey::encode(database_id, name)?)
    }

    /// Creates an object store and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the name is taken or ids are
    /// exhausted.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, name = %name))]
    pub fn create_object_store(
        &self,
        txn: &Transaction,
        database_id: i64,
        name: &str,
        key_path: &KeyPath,
        auto_increment: bool,
    ) -> CoreResult<i64> {
        check_database_id(database_id)?;
        let names_key = ObjectStoreNamesKey::encode(database_id, name)?;
        if txn.get(&names_key)?.is_some() {
            return Err(CoreError::invalid_operation(format!(
                "object store {name:?} already exists"
            )));
        }

        let id = allocate_object_store_id(txn, database_id)?;
        let row = |meta_data_type| ObjectStoreMetaDataKey::encode(database_id, id, meta_data_type);

        put_string(txn, &row(ObjectStoreMetaDataType::Name)?, name)?;
        txn.put(&row(ObjectStoreMetaDataType::KeyPath)?, &key_path.encode())?;
        put_bool(txn, &row(ObjectStoreMetaDataType::AutoIncrement)?, auto_increment)?;
        put_bool(txn, &row(ObjectStoreMetaDataType::Evictable)?, false)?;
        put_int(txn, &row(ObjectStoreMetaDataType::LastVersion)?, 0)?;
        put_int(txn, &row(ObjectStoreMetaDataType::MaxIndexId)?, MIN_INDEX_ID - 1)?;
        put_bool(txn, &row(ObjectStoreMetaDataType::HasKeyPath)?, !key_path.is_null())?;
        put_int(
            txn,
            &row(ObjectStoreMetaDataType::KeyGeneratorCurrentNumber)?,
            KEY_GENERATOR_INITIAL_NUMBER,
        )?;
        txn.put(&names_key, &encode_int(id)?)?;

        tracing::debug!(object_store_id = id, "object store created");
        Ok(id)
    }

    /// Deletes an object store with its indexes and records.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the store does not exist.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn delete_object_store(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
    ) -> CoreResult<()> {
        check_ids(database_id, object_store_id)?;
        let name = get_string(
            txn,
            &ObjectStoreMetaDataKey::encode(
                database_id,
                object_store_id,
                ObjectStoreMetaDataType::Name,
            )?,
        )?
        .ok_or_else(|| {
            CoreError::invalid_argument(format!("no object store with id {object_store_id}"))
        })?;

        delete_range(
            txn,
            &ObjectStoreMetaDataKey::encode(
                database_id,
                object_store_id,
                ObjectStoreMetaDataType::Name,
            )?,
            &ObjectStoreMetaDataKey::encode_max_key_for_store(database_id, object_store_id)?,
        )?;
        txn.put(&ObjectStoreFreeListKey::encode(database_id, object_store_id)?, &[])?;
        txn.remove(&ObjectStoreNamesKey::encode(database_id, &name)?)?;

        delete_range(
            txn,
            &IndexFreeListKey::encode(database_id, object_store_id, 0)?,
            &IndexFreeListKey::encode_max_key(database_id, object_store_id)?,
        )?;
        delete_range(
            txn,
            &IndexMetaDataKey::encode(database_id, object_store_id, 0, IndexMetaDataType::Name)?,
            &IndexMetaDataKey::encode_max_key(database_id, object_store_id)?,
        )?;
        delete_range(
            txn,
            &IndexNamesKey::encode_min_key(database_id, object_store_id)?,
            &IndexNamesKey::encode_stop_key(database_id, object_store_id)?,
        )?;

        self.clear_object_store(txn, database_id, object_store_id)?;
        tracing::debug!(object_store_id, "object store deleted");
        Ok(())
    }
}

fn allocate_object_store_id(txn: &Transaction, database_id: i64) -> CoreResult<i64> {
    let max_key = DatabaseMetaDataKey::encode(database_id, DatabaseMetaDataType::MaxObjectStoreId)?;
    let max = get_int(txn, &max_key)?.unwrap_or(0);

    let recycled = pop_free_id(
        txn,
        &ObjectStoreFreeListKey::encode(database_id, 0)?,
        &ObjectStoreFreeListKey::encode_max_key(database_id)?,
        |key| ObjectStoreFreeListKey::decode(key).map(|key| key.object_store_id()),
    )?;
    let id = match recycled {
        Some(id) => id,
        None => max + 1,
    };
    if !KeyPrefix::is_valid_object_store_id(id) {
        return Err(CoreError::invalid_operation("object store ids exhausted"));
    }
    if id > max {
        put_int(txn, &max_key, id)?;
    }
    Ok(id)
}
