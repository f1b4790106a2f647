//! Record rows and their exists entries.

use super::{before, check_ids, check_user_key, get_int, put_int, BackingStore};
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use crate::types::RecordIdentifier;
use idbkv_codec::{
    decode_var_int, encode_int, encode_var_int, ExistsEntryKey, Key, KeyPrefix,
    ObjectStoreDataKey, ObjectStoreMetaDataKey, ObjectStoreMetaDataType,
};
use idbkv_storage::KvIterator;

impl BackingStore {
    /// Reads the value stored under `key`.
    ///
    /// A value whose version header does not decode is logged and reported
    /// as missing.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids, an ended transaction or an engine
    /// failure.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn get_record(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        key: &Key,
    ) -> CoreResult<Option<Vec<u8>>> {
        check_ids(database_id, object_store_id)?;
        let data_key = ObjectStoreDataKey::encode(database_id, object_store_id, key)?;
        Ok(read_record(txn, &data_key)?.map(|(_, value)| value))
    }

    /// Writes `value` under `key`, stamping it with a fresh version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `key` is a probe key.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn put_record(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        key: &Key,
        value: &[u8],
    ) -> CoreResult<RecordIdentifier> {
        check_ids(database_id, object_store_id)?;
        check_user_key(key)?;

        let version = new_version_number(txn, database_id, object_store_id)?;
        let encoded_key = key.encode();

        let mut row = encode_var_int(version)?;
        row.extend_from_slice(value);
        txn.put(
            &ObjectStoreDataKey::encode_encoded(database_id, object_store_id, &encoded_key)?,
            &row,
        )?;
        txn.put(
            &ExistsEntryKey::encode_encoded(database_id, object_store_id, &encoded_key)?,
            &encode_int(version)?,
        )?;

        Ok(RecordIdentifier::new(encoded_key, version))
    }

    /// Removes every row of an object store: records, exists entries and
    /// index entries.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids or an ended transaction.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn clear_object_store(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
    ) -> CoreResult<()> {
        check_ids(database_id, object_store_id)?;
        let start = KeyPrefix::object_store(database_id, object_store_id).encode()?;
        let stop = KeyPrefix::object_store(database_id, object_store_id.saturating_add(1)).encode()?;
        super::delete_range(txn, &start, &stop)
    }

    /// Removes a record and its exists entry. Index entries pointing at it
    /// go stale and are reaped when next read.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids or an ended transaction.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn delete_object_store_record(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        record: &RecordIdentifier,
    ) -> CoreResult<()> {
        check_ids(database_id, object_store_id)?;
        let primary_key = &record.encoded_primary_key;
        txn.remove(&ObjectStoreDataKey::encode_encoded(
            database_id,
            object_store_id,
            primary_key,
        )?)?;
        txn.remove(&ExistsEntryKey::encode_encoded(
            database_id,
            object_store_id,
            primary_key,
        )?)
    }

    /// Returns one more than the largest integer part of any number key in
    /// the store, or 1 for a store without number keys.
    ///
    /// Scans every record. Stores created without a key generator row
    /// derive their generator state this way.
    ///
    /// # Errors
    ///
    /// Returns an error if a record key does not decode.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn next_auto_increment_number(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
    ) -> CoreResult<i64> {
        check_ids(database_id, object_store_id)?;
        let start = ObjectStoreDataKey::encode(database_id, object_store_id, &Key::Min)?;
        let stop = ObjectStoreDataKey::encode(database_id, object_store_id, &Key::Null)?;

        let mut max = 0_i64;
        let mut it = txn.create_iterator()?;
        it.seek(&start);
        while it.is_valid() && before(it.key(), &stop)? {
            if let Key::Number(n) = ObjectStoreDataKey::decode(it.key())?.user_key()? {
                max = max.max(n as i64);
            }
            it.next();
        }
        Ok(max.saturating_add(1))
    }

    /// Returns the number the store's key generator hands out next.
    ///
    /// Falls back to [`BackingStore::next_auto_increment_number`] for stores
    /// that have no key generator row.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids, an ended transaction or a corrupt
    /// generator row.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn get_key_generator_current_number(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
    ) -> CoreResult<i64> {
        check_ids(database_id, object_store_id)?;
        let key = key_generator_key(database_id, object_store_id)?;
        match get_int(txn, &key)? {
            Some(current) => Ok(current),
            None => self.next_auto_increment_number(txn, database_id, object_store_id),
        }
    }

    /// Stores `new_number` as the key generator state.
    ///
    /// With `check_current`, a number at or below the current one is
    /// ignored so the generator never moves backwards.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids, an ended transaction or a negative
    /// number.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id, new_number = new_number))]
    pub fn maybe_update_key_generator_current_number(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        new_number: i64,
        check_current: bool,
    ) -> CoreResult<()> {
        check_ids(database_id, object_store_id)?;
        if check_current
            && new_number <= self.get_key_generator_current_number(txn, database_id, object_store_id)?
        {
            return Ok(());
        }
        put_int(txn, &key_generator_key(database_id, object_store_id)?, new_number)
    }

    /// Looks up the current version of the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid ids or an ended transaction.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id, object_store_id = object_store_id))]
    pub fn key_exists_in_object_store(
        &self,
        txn: &Transaction,
        database_id: i64,
        object_store_id: i64,
        key: &Key,
    ) -> CoreResult<Option<RecordIdentifier>> {
        check_ids(database_id, object_store_id)?;
        let encoded_key = key.encode();
        let data_key = ObjectStoreDataKey::encode_encoded(database_id, object_store_id, &encoded_key)?;
        Ok(read_record(txn, &data_key)?
            .map(|(version, _)| RecordIdentifier::new(encoded_key, version)))
    }
}

/// Reads a record row as (version, value).
pub(crate) fn read_record(
    txn: &Transaction,
    data_key: &[u8],
) -> CoreResult<Option<(i64, Vec<u8>)>> {
    let Some(row) = txn.get(data_key)? else {
        return Ok(None);
    };
    Ok(split_record(&row).map(|(version, value)| (version, value.to_vec())))
}

/// Splits a record row into its version and value.
pub(crate) fn split_record(row: &[u8]) -> Option<(i64, &[u8])> {
    match decode_var_int(row) {
        Ok((version, len)) => Some((version, &row[len..])),
        Err(err) => {
            tracing::warn!(error = %err, "record value has no readable version");
            None
        }
    }
}

fn key_generator_key(database_id: i64, object_store_id: i64) -> CoreResult<Vec<u8>> {
    Ok(ObjectStoreMetaDataKey::encode(
        database_id,
        object_store_id,
        ObjectStoreMetaDataType::KeyGeneratorCurrentNumber,
    )?)
}

/// Takes the next version from the store's counter.
pub(crate) fn new_version_number(
    txn: &Transaction,
    database_id: i64,
    object_store_id: i64,
) -> CoreResult<i64> {
    let key = ObjectStoreMetaDataKey::encode(
        database_id,
        object_store_id,
        ObjectStoreMetaDataType::LastVersion,
    )?;
    let last = get_int(txn, &key)?.unwrap_or(0);
    let version = last
        .checked_add(1)
        .ok_or_else(|| CoreError::invalid_operation("version counter exhausted"))?;
    put_int(txn, &key, version)?;
    Ok(version)
}
