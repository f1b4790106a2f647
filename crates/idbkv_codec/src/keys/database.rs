use super::{finish, open_key, MAX_META_DATA_TYPE};
use crate::coding::{put_string_with_length, put_var_int};
use crate::error::CodecResult;
use crate::prefix::{KeyCategory, KeyPrefix};

/// Types below this are single rows with nothing after the type byte.
pub const MAX_SIMPLE_DATABASE_META_DATA_TYPE: u8 = 32;
/// Type byte of object store metadata rows.
pub const OBJECT_STORE_META_DATA_TYPE_BYTE: u8 = 50;
/// Type byte of index metadata rows.
pub const INDEX_META_DATA_TYPE_BYTE: u8 = 100;
/// Type byte of object store free-list rows.
pub const OBJECT_STORE_FREE_LIST_TYPE_BYTE: u8 = 150;
/// Type byte of index free-list rows.
pub const INDEX_FREE_LIST_TYPE_BYTE: u8 = 151;
/// Type byte of `name -> object store id` rows.
pub const OBJECT_STORE_NAMES_TYPE_BYTE: u8 = 200;
/// Type byte of `(object store, name) -> index id` rows.
pub const INDEX_NAMES_TYPE_BYTE: u8 = 201;

/// Single-row database attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseMetaDataType {
    /// Origin the database belongs to (string).
    OriginName = 0,
    /// Database name (string).
    DatabaseName = 1,
    /// Version string.
    UserVersion = 2,
    /// Largest object store id handed out (fixed int).
    MaxObjectStoreId = 3,
    /// Integer version (varint).
    UserIntVersion = 4,
}

fn database_key(database_id: i64, type_byte: u8) -> CodecResult<Vec<u8>> {
    let mut buf = KeyPrefix::database(database_id).encode()?;
    buf.push(type_byte);
    Ok(buf)
}

/// A single-row database attribute.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseMetaDataKey;

impl DatabaseMetaDataKey {
    /// Encodes the row holding `meta_data_type` for `database_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative database id.
    pub fn encode(database_id: i64, meta_data_type: DatabaseMetaDataType) -> CodecResult<Vec<u8>> {
        database_key(database_id, meta_data_type as u8)
    }
}

/// Per-object-store attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectStoreMetaDataType {
    /// Store name (string). Every store has this row.
    Name = 0,
    /// Encoded key path.
    KeyPath = 1,
    /// Auto-increment flag (bool).
    AutoIncrement = 2,
    /// Reserved; always false.
    Evictable = 3,
    /// Last version handed out (fixed int).
    LastVersion = 4,
    /// Largest index id handed out (fixed int).
    MaxIndexId = 5,
    /// Whether the key path is set (bool).
    HasKeyPath = 6,
    /// Next number the key generator hands out (fixed int).
    KeyGeneratorCurrentNumber = 7,
}

impl ObjectStoreMetaDataType {
    /// Converts the type to its byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An object store attribute row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreMetaDataKey {
    object_store_id: i64,
    meta_data_type: u8,
}

impl ObjectStoreMetaDataKey {
    fn encode_raw(database_id: i64, object_store_id: i64, meta_data_type: u8) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, OBJECT_STORE_META_DATA_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id)?;
        buf.push(meta_data_type);
        Ok(buf)
    }

    /// Encodes one attribute row.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(
        database_id: i64,
        object_store_id: i64,
        meta_data_type: ObjectStoreMetaDataType,
    ) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, object_store_id, meta_data_type.as_byte())
    }

    /// A key after every object store attribute row of the database.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative database id.
    pub fn encode_max_key(database_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, i64::MAX, MAX_META_DATA_TYPE)
    }

    /// A key after every attribute row of one store.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_max_key_for_store(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, object_store_id, MAX_META_DATA_TYPE)
    }

    /// Decodes an attribute row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an object store metadata key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(OBJECT_STORE_META_DATA_TYPE_BYTE),
        )?;
        let object_store_id = reader.read_var_int()?;
        let meta_data_type = reader.read_byte()?;
        finish(&reader)?;
        Ok(Self {
            object_store_id,
            meta_data_type,
        })
    }

    /// The object store id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }

    /// The raw attribute type byte.
    #[must_use]
    pub fn meta_data_type(&self) -> u8 {
        self.meta_data_type
    }
}

/// Per-index attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexMetaDataType {
    /// Index name (string). Every index has this row.
    Name = 0,
    /// Unique flag (bool).
    Unique = 1,
    /// Encoded key path.
    KeyPath = 2,
    /// Multi-entry flag (bool).
    MultiEntry = 3,
}

impl IndexMetaDataType {
    /// Converts the type to its byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An index attribute row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetaDataKey {
    object_store_id: i64,
    index_id: i64,
    meta_data_type: u8,
}

impl IndexMetaDataKey {
    fn encode_raw(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        meta_data_type: u8,
    ) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, INDEX_META_DATA_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id)?;
        put_var_int(&mut buf, index_id)?;
        buf.push(meta_data_type);
        Ok(buf)
    }

    /// Encodes one attribute row.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        meta_data_type: IndexMetaDataType,
    ) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, object_store_id, index_id, meta_data_type.as_byte())
    }

    /// A key after every index attribute row of one store.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_max_key(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, object_store_id, i64::MAX, MAX_META_DATA_TYPE)
    }

    /// A key after every attribute row of one index.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_max_key_for_index(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
    ) -> CodecResult<Vec<u8>> {
        Self::encode_raw(database_id, object_store_id, index_id, MAX_META_DATA_TYPE)
    }

    /// Decodes an attribute row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an index metadata key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(INDEX_META_DATA_TYPE_BYTE),
        )?;
        let object_store_id = reader.read_var_int()?;
        let index_id = reader.read_var_int()?;
        let meta_data_type = reader.read_byte()?;
        finish(&reader)?;
        Ok(Self {
            object_store_id,
            index_id,
            meta_data_type,
        })
    }

    /// The owning object store id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }

    /// The index id.
    #[must_use]
    pub fn index_id(&self) -> i64 {
        self.index_id
    }

    /// The raw attribute type byte.
    #[must_use]
    pub fn meta_data_type(&self) -> u8 {
        self.meta_data_type
    }
}

/// A recycled object store id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreFreeListKey {
    object_store_id: i64,
}

impl ObjectStoreFreeListKey {
    /// Encodes the free-list row for `object_store_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, OBJECT_STORE_FREE_LIST_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id)?;
        Ok(buf)
    }

    /// A key after every object store free-list row of the database.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative database id.
    pub fn encode_max_key(database_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode(database_id, i64::MAX)
    }

    /// Decodes a free-list row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an object store free-list key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(OBJECT_STORE_FREE_LIST_TYPE_BYTE),
        )?;
        let object_store_id = reader.read_var_int()?;
        finish(&reader)?;
        Ok(Self { object_store_id })
    }

    /// The recycled id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }
}

/// A recycled index id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFreeListKey {
    object_store_id: i64,
    index_id: i64,
}

impl IndexFreeListKey {
    /// Encodes the free-list row for `index_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(database_id: i64, object_store_id: i64, index_id: i64) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, INDEX_FREE_LIST_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id)?;
        put_var_int(&mut buf, index_id)?;
        Ok(buf)
    }

    /// A key after every index free-list row of one store.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_max_key(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode(database_id, object_store_id, i64::MAX)
    }

    /// Decodes a free-list row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an index free-list key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(INDEX_FREE_LIST_TYPE_BYTE),
        )?;
        let object_store_id = reader.read_var_int()?;
        let index_id = reader.read_var_int()?;
        finish(&reader)?;
        Ok(Self {
            object_store_id,
            index_id,
        })
    }

    /// The owning object store id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }

    /// The recycled id.
    #[must_use]
    pub fn index_id(&self) -> i64 {
        self.index_id
    }
}

/// Maps an object store name to its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreNamesKey {
    object_store_name: String,
}

impl ObjectStoreNamesKey {
    /// Encodes the lookup row for `object_store_name`.
    ///
    /// # Errors
    ///
    /// Returns an error for a negative database id.
    pub fn encode(database_id: i64, object_store_name: &str) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, OBJECT_STORE_NAMES_TYPE_BYTE)?;
        put_string_with_length(&mut buf, object_store_name);
        Ok(buf)
    }

    /// Decodes a name lookup key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an object store names key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(OBJECT_STORE_NAMES_TYPE_BYTE),
        )?;
        let object_store_name = reader.read_string_with_length()?;
        finish(&reader)?;
        Ok(Self { object_store_name })
    }

    /// The object store name.
    #[must_use]
    pub fn object_store_name(&self) -> &str {
        &self.object_store_name
    }
}

/// Maps an index name within one store to its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNamesKey {
    object_store_id: i64,
    index_name: String,
}

impl IndexNamesKey {
    /// Encodes the lookup row for `index_name` in `object_store_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(database_id: i64, object_store_id: i64, index_name: &str) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, INDEX_NAMES_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id)?;
        put_string_with_length(&mut buf, index_name);
        Ok(buf)
    }

    /// A key before every index name row of `object_store_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_min_key(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        Self::encode(database_id, object_store_id, "")
    }

    /// A key after every index name row of `object_store_id`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_stop_key(database_id: i64, object_store_id: i64) -> CodecResult<Vec<u8>> {
        let mut buf = database_key(database_id, INDEX_NAMES_TYPE_BYTE)?;
        put_var_int(&mut buf, object_store_id.saturating_add(1))?;
        put_string_with_length(&mut buf, "");
        Ok(buf)
    }

    /// Decodes a name lookup key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an index names key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::DatabaseMetaData,
            Some(INDEX_NAMES_TYPE_BYTE),
        )?;
        let object_store_id = reader.read_var_int()?;
        let index_name = reader.read_string_with_length()?;
        finish(&reader)?;
        Ok(Self {
            object_store_id,
            index_name,
        })
    }

    /// The owning object store id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }

    /// The index name.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_keys_decode() {
        let key = ObjectStoreMetaDataKey::decode(
            &ObjectStoreMetaDataKey::encode(4, 9, ObjectStoreMetaDataType::MaxIndexId).unwrap(),
        )
        .unwrap();
        assert_eq!(key.object_store_id(), 9);
        assert_eq!(key.meta_data_type(), ObjectStoreMetaDataType::MaxIndexId.as_byte());

        let key = IndexMetaDataKey::decode(
            &IndexMetaDataKey::encode(4, 9, 31, IndexMetaDataType::Unique).unwrap(),
        )
        .unwrap();
        assert_eq!((key.object_store_id(), key.index_id()), (9, 31));
        assert_eq!(key.meta_data_type(), 1);
    }

    #[test]
    fn free_list_and_name_keys_decode() {
        let key = ObjectStoreFreeListKey::decode(&ObjectStoreFreeListKey::encode(2, 7).unwrap()).unwrap();
        assert_eq!(key.object_store_id(), 7);

        let key = IndexFreeListKey::decode(&IndexFreeListKey::encode(2, 7, 30).unwrap()).unwrap();
        assert_eq!((key.object_store_id(), key.index_id()), (7, 30));

        let key = ObjectStoreNamesKey::decode(&ObjectStoreNamesKey::encode(2, "books").unwrap()).unwrap();
        assert_eq!(key.object_store_name(), "books");

        let key = IndexNamesKey::decode(&IndexNamesKey::encode(2, 7, "by_title").unwrap()).unwrap();
        assert_eq!((key.object_store_id(), key.index_name()), (7, "by_title"));
    }

    #[test]
    fn simple_metadata_key_layout() {
        let encoded = DatabaseMetaDataKey::encode(1, DatabaseMetaDataType::MaxObjectStoreId).unwrap();
        assert_eq!(encoded, vec![0, 1, 0, 0, 3]);
    }

    #[test]
    fn decode_checks_type_byte() {
        let encoded = ObjectStoreFreeListKey::encode(2, 7).unwrap();
        assert!(IndexFreeListKey::decode(&encoded).is_err());
        assert!(ObjectStoreMetaDataKey::decode(&encoded).is_err());
    }
}
