//! Database registry: name lookup, id allocation and version rows.

use super::{
    before, check_database_id, delete_range, get_int, get_string, get_var_int, missing_row,
    pop_free_id, put_int, put_string, put_var_int, BackingStore,
};
use crate::error::{CoreError, CoreResult};
use crate::transaction::Transaction;
use crate::types::DatabaseMetadata;
use idbkv_codec::{
    DatabaseFreeListKey, DatabaseMetaDataKey, DatabaseMetaDataType, DatabaseNameKey,
    MaxDatabaseIdKey,
};
use idbkv_storage::KvEngine;

/// Stored integer version meaning "no integer version set".
const DEFAULT_INT_VERSION: i64 = 0;

impl BackingStore {
    /// Lists the names of every database in this store's origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine read fails or a name row is malformed.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn get_database_names(&self) -> CoreResult<Vec<String>> {
        let start = DatabaseNameKey::encode_min_key_for_origin(&self.origin);
        let stop = DatabaseNameKey::encode_stop_key_for_origin(&self.origin);

        let mut names = Vec::new();
        let mut it = self.engine.iter();
        it.seek(&start);
        while it.is_valid() && before(it.key(), &stop)? {
            let key = DatabaseNameKey::decode(it.key())?;
            names.push(key.database_name().to_owned());
            it.next();
        }
        Ok(names)
    }

    /// Loads a database's metadata, or `None` if no database has `name`.
    ///
    /// # Errors
    ///
    /// Returns `Consistency` if a required row is missing or corrupt.
    #[tracing::instrument(level = "trace", skip_all, fields(name = %name))]
    pub fn get_database_metadata(&self, name: &str) -> CoreResult<Option<DatabaseMetadata>> {
        let view: &dyn KvEngine = self.engine.as_ref();
        let Some(id) = get_int(view, &DatabaseNameKey::encode(&self.origin, name))? else {
            return Ok(None);
        };

        let version = get_string(
            view,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::UserVersion)?,
        )?
        .ok_or_else(|| missing_row("database version"))?;
        let int_version = get_var_int(
            view,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::UserIntVersion)?,
        )?
        .ok_or_else(|| missing_row("database integer version"))?;
        let max_object_store_id = get_int(
            view,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::MaxObjectStoreId)?,
        )?
        .unwrap_or(0);

        Ok(Some(DatabaseMetadata {
            id,
            name: name.to_owned(),
            version,
            int_version: (int_version != DEFAULT_INT_VERSION).then_some(int_version),
            max_object_store_id,
        }))
    }

    /// Creates a database and returns its id.
    ///
    /// Runs in its own transaction. Ids freed by [`Self::delete_database`]
    /// are reused first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the name is taken, `InvalidArgument`
    /// for a negative integer version, or any engine error.
    #[tracing::instrument(level = "trace", skip_all, fields(name = %name))]
    pub fn create_database(
        &self,
        name: &str,
        version: &str,
        int_version: Option<i64>,
    ) -> CoreResult<i64> {
        let name_key = DatabaseNameKey::encode(&self.origin, name);
        let txn = self.begin();
        if txn.get(&name_key)?.is_some() {
            return Err(CoreError::invalid_operation(format!(
                "database {name:?} already exists"
            )));
        }

        let id = allocate_database_id(&txn)?;
        put_int(&txn, &name_key, id)?;
        put_string(
            &txn,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::OriginName)?,
            &self.origin,
        )?;
        put_string(
            &txn,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::DatabaseName)?,
            name,
        )?;
        put_string(
            &txn,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::UserVersion)?,
            version,
        )?;
        put_var_int(
            &txn,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::UserIntVersion)?,
            stored_int_version(int_version)?,
        )?;
        txn.commit()?;

        tracing::debug!(database_id = id, "database created");
        Ok(id)
    }

    /// Rewrites the version string of a database.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid id, or an error if the
    /// transaction has ended.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id))]
    pub fn update_database_version(
        &self,
        txn: &Transaction,
        database_id: i64,
        version: &str,
    ) -> CoreResult<()> {
        check_database_id(database_id)?;
        put_string(
            txn,
            &DatabaseMetaDataKey::encode(database_id, DatabaseMetaDataType::UserVersion)?,
            version,
        )
    }

    /// Rewrites the integer version of a database. `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an invalid id or a negative version.
    #[tracing::instrument(level = "trace", skip_all, fields(database_id = database_id))]
    pub fn update_database_int_version(
        &self,
        txn: &Transaction,
        database_id: i64,
        int_version: Option<i64>,
    ) -> CoreResult<()> {
        check_database_id(database_id)?;
        put_var_int(
            txn,
            &DatabaseMetaDataKey::encode(database_id, DatabaseMetaDataType::UserIntVersion)?,
            stored_int_version(int_version)?,
        )
    }

    /// Deletes a database with everything in it. Returns false if no
    /// database has `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata is inconsistent or the commit fails.
    #[tracing::instrument(level = "trace", skip_all, fields(name = %name))]
    pub fn delete_database(&self, name: &str) -> CoreResult<bool> {
        let Some(metadata) = self.get_database_metadata(name)? else {
            return Ok(false);
        };
        let id = metadata.id;
        let next = id
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_argument(format!("invalid database id {id}")))?;

        let txn = self.begin();
        delete_range(
            &txn,
            &DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::OriginName)?,
            &DatabaseMetaDataKey::encode(next, DatabaseMetaDataType::OriginName)?,
        )?;
        txn.remove(&DatabaseNameKey::encode(&self.origin, name))?;
        txn.put(&DatabaseFreeListKey::encode(id)?, &[])?;
        txn.commit()?;

        tracing::debug!(database_id = id, "database deleted");
        Ok(true)
    }
}

fn stored_int_version(int_version: Option<i64>) -> CoreResult<i64> {
    match int_version {
        None => Ok(DEFAULT_INT_VERSION),
        Some(version) if version > DEFAULT_INT_VERSION => Ok(version),
        Some(version) => Err(CoreError::invalid_argument(format!(
            "integer version must be positive, got {version}"
        ))),
    }
}

fn allocate_database_id(txn: &Transaction) -> CoreResult<i64> {
    let recycled = pop_free_id(
        txn,
        &DatabaseFreeListKey::encode(0)?,
        &DatabaseFreeListKey::encode_max_key(),
        |key| DatabaseFreeListKey::decode(key).map(|key| key.database_id()),
    )?;
    if let Some(id) = recycled {
        return Ok(id);
    }

    let max_key = MaxDatabaseIdKey::encode();
    let max = get_int(txn, &max_key)?.unwrap_or(0);
    let id = max + 1;
    check_database_id(id)?;
    put_int(txn, &max_key, id)?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_list() {
        let store = BackingStore::open_in_memory("origin").unwrap();
        assert!(store.get_database_names().unwrap().is_empty());

        let a = store.create_database("a", "1.0", None).unwrap();
        let b = store.create_database("b", "", Some(3)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get_database_names().unwrap(), vec!["a", "b"]);

        let meta = store.get_database_metadata("b").unwrap().unwrap();
        assert_eq!(meta.id, 2);
        assert_eq!(meta.version, "");
        assert_eq!(meta.int_version, Some(3));
        assert_eq!(meta.max_object_store_id, 0);

        let meta = store.get_database_metadata("a").unwrap().unwrap();
        assert_eq!(meta.int_version, None);
        assert!(store.get_database_metadata("c").unwrap().is_none());
    }

    #[test]
    fn names_are_scoped_to_origin() {
        let store = BackingStore::open_in_memory("one").unwrap();
        store.create_database("db", "", None).unwrap();

        let other = BackingStore::with_engine("two", store.engine().clone()).unwrap();
        assert!(other.get_database_names().unwrap().is_empty());
        assert_eq!(other.create_database("db", "", None).unwrap(), 2);
    }

    #[test]
    fn duplicate_name_rejected() {
        let store = BackingStore::open_in_memory("origin").unwrap();
        store.create_database("db", "", None).unwrap();
        assert!(matches!(
            store.create_database("db", "", None),
            Err(CoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn version_updates() {
        let store = BackingStore::open_in_memory("origin").unwrap();
        let id = store.create_database("db", "1", None).unwrap();

        let txn = store.begin();
        store.update_database_version(&txn, id, "2").unwrap();
        store.update_database_int_version(&txn, id, Some(7)).unwrap();
        assert!(store.update_database_int_version(&txn, id, Some(-1)).is_err());
        txn.commit().unwrap();

        let meta = store.get_database_metadata("db").unwrap().unwrap();
        assert_eq!(meta.version, "2");
        assert_eq!(meta.int_version, Some(7));
    }

    #[test]
    fn deleted_ids_are_reused() {
        let store = BackingStore::open_in_memory("origin").unwrap();
        let first = store.create_database("a", "", None).unwrap();
        store.create_database("b", "", None).unwrap();

        assert!(store.delete_database("a").unwrap());
        assert!(!store.delete_database("a").unwrap());
        assert_eq!(store.get_database_names().unwrap(), vec!["b"]);

        assert_eq!(store.create_database("c", "", None).unwrap(), first);
        assert_eq!(store.create_database("d", "", None).unwrap(), 3);
    }

    #[test]
    fn missing_version_row_is_inconsistent() {
        let store = BackingStore::open_in_memory("origin").unwrap();
        let id = store.create_database("db", "", None).unwrap();
        store
            .engine()
            .delete(&DatabaseMetaDataKey::encode(id, DatabaseMetaDataType::UserVersion).unwrap())
            .unwrap();

        assert!(matches!(
            store.get_database_metadata("db"),
            Err(CoreError::Consistency { .. })
        ));
    }
}
