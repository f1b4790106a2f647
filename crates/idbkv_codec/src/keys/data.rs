use super::open_key;
use crate::coding::put_var_int;
use crate::error::{CodecError, CodecResult};
use crate::key::Key;
use crate::prefix::{KeyCategory, KeyPrefix, EXISTS_ENTRY_INDEX_ID, OBJECT_STORE_DATA_INDEX_ID};

fn record_key(prefix: KeyPrefix, encoded_user_key: &[u8]) -> CodecResult<Vec<u8>> {
    let mut buf = prefix.encode()?;
    buf.extend_from_slice(encoded_user_key);
    Ok(buf)
}

fn decode_record_key(bytes: &[u8], category: KeyCategory) -> CodecResult<Vec<u8>> {
    let (_, mut reader) = open_key(bytes, category, None)?;
    let user_key = reader.extract_key()?;
    if !reader.is_empty() {
        return Err(CodecError::invalid_key("trailing bytes after record key"));
    }
    Ok(user_key.to_vec())
}

/// Key of a record row: `(db, os, 1)` followed by the tagged user key.
///
/// The value is `varint(version)` followed by the record bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreDataKey {
    encoded_user_key: Vec<u8>,
}

impl ObjectStoreDataKey {
    /// Encodes the row key for `user_key`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(database_id: i64, object_store_id: i64, user_key: &Key) -> CodecResult<Vec<u8>> {
        Self::encode_encoded(database_id, object_store_id, &user_key.encode())
    }

    /// Encodes the row key for an already encoded user key.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_encoded(
        database_id: i64,
        object_store_id: i64,
        encoded_user_key: &[u8],
    ) -> CodecResult<Vec<u8>> {
        record_key(
            KeyPrefix::new(database_id, object_store_id, OBJECT_STORE_DATA_INDEX_ID),
            encoded_user_key,
        )
    }

    /// Decodes a row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an object-store data key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_record_key(bytes, KeyCategory::ObjectStoreData)
            .map(|encoded_user_key| Self { encoded_user_key })
    }

    /// The tagged user key bytes.
    #[must_use]
    pub fn encoded_user_key(&self) -> &[u8] {
        &self.encoded_user_key
    }

    /// Decodes the user key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored key is malformed.
    pub fn user_key(&self) -> CodecResult<Key> {
        Key::decode(&self.encoded_user_key)
    }
}

/// Key of an exists row: `(db, os, 2)` followed by the tagged user key.
///
/// The value is the record version as a fixed int.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsEntryKey {
    encoded_user_key: Vec<u8>,
}

impl ExistsEntryKey {
    /// Encodes the exists key for `user_key`.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode(database_id: i64, object_store_id: i64, user_key: &Key) -> CodecResult<Vec<u8>> {
        Self::encode_encoded(database_id, object_store_id, &user_key.encode())
    }

    /// Encodes the exists key for an already encoded user key.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids.
    pub fn encode_encoded(
        database_id: i64,
        object_store_id: i64,
        encoded_user_key: &[u8],
    ) -> CodecResult<Vec<u8>> {
        record_key(
            KeyPrefix::new(database_id, object_store_id, EXISTS_ENTRY_INDEX_ID),
            encoded_user_key,
        )
    }

    /// Decodes an exists key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an exists-entry key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_record_key(bytes, KeyCategory::ExistsEntry)
            .map(|encoded_user_key| Self { encoded_user_key })
    }

    /// The tagged user key bytes.
    #[must_use]
    pub fn encoded_user_key(&self) -> &[u8] {
        &self.encoded_user_key
    }
}

/// Key of an index entry:
/// `(db, os, idx)`, tagged index key, varint sequence number, tagged
/// primary key.
///
/// The value is `varint(record version)` followed by the tagged primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDataKey {
    database_id: i64,
    object_store_id: i64,
    index_id: i64,
    encoded_user_key: Vec<u8>,
    sequence_number: i64,
    encoded_primary_key: Vec<u8>,
}

impl IndexDataKey {
    /// Encodes a full index entry key.
    ///
    /// # Errors
    ///
    /// Returns an error for negative ids, a negative sequence number or an
    /// index id outside the user range.
    pub fn encode(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        encoded_user_key: &[u8],
        encoded_primary_key: &[u8],
        sequence_number: i64,
    ) -> CodecResult<Vec<u8>> {
        if !KeyPrefix::is_valid_index_id(index_id) {
            return Err(CodecError::invalid_prefix(format!(
                "{index_id} is not a user index id"
            )));
        }
        let mut buf = KeyPrefix::new(database_id, object_store_id, index_id).encode()?;
        buf.extend_from_slice(encoded_user_key);
        put_var_int(&mut buf, sequence_number)?;
        buf.extend_from_slice(encoded_primary_key);
        Ok(buf)
    }

    /// The first possible entry for `user_key`.
    ///
    /// # Errors
    ///
    /// See [`IndexDataKey::encode`].
    pub fn encode_for_user_key(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        user_key: &Key,
    ) -> CodecResult<Vec<u8>> {
        Self::encode(
            database_id,
            object_store_id,
            index_id,
            &user_key.encode(),
            &Key::Min.encode(),
            0,
        )
    }

    /// An entry after every duplicate of an encoded user key.
    ///
    /// # Errors
    ///
    /// See [`IndexDataKey::encode`].
    pub fn encode_max_key_for_user_key(
        database_id: i64,
        object_store_id: i64,
        index_id: i64,
        encoded_user_key: &[u8],
    ) -> CodecResult<Vec<u8>> {
        Self::encode(
            database_id,
            object_store_id,
            index_id,
            encoded_user_key,
            &Key::Null.encode(),
            i64::MAX,
        )
    }

    /// An entry before every entry of the index.
    ///
    /// # Errors
    ///
    /// See [`IndexDataKey::encode`].
    pub fn encode_min_key(database_id: i64, object_store_id: i64, index_id: i64) -> CodecResult<Vec<u8>> {
        let min = Key::Min.encode();
        Self::encode(database_id, object_store_id, index_id, &min, &min, 0)
    }

    /// An entry after every entry of the index.
    ///
    /// # Errors
    ///
    /// See [`IndexDataKey::encode`].
    pub fn encode_max_key(database_id: i64, object_store_id: i64, index_id: i64) -> CodecResult<Vec<u8>> {
        let max = Key::Null.encode();
        Self::encode(database_id, object_store_id, index_id, &max, &max, i64::MAX)
    }

    /// Decodes an index entry key.
    ///
    /// A key that ends after the index key decodes with sequence number 0
    /// and a `Min` primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not an index data key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (prefix, mut reader) = open_key(bytes, KeyCategory::IndexData, None)?;
        let encoded_user_key = reader.extract_key()?.to_vec();
        let sequence_number = if reader.is_empty() {
            0
        } else {
            reader.read_var_int()?
        };
        let encoded_primary_key = if reader.is_empty() {
            Key::Min.encode()
        } else {
            reader.extract_key()?.to_vec()
        };
        if !reader.is_empty() {
            return Err(CodecError::invalid_key("trailing bytes after index key"));
        }
        Ok(Self {
            database_id: prefix.database_id,
            object_store_id: prefix.object_store_id,
            index_id: prefix.index_id,
            encoded_user_key,
            sequence_number,
            encoded_primary_key,
        })
    }

    /// The database id.
    #[must_use]
    pub fn database_id(&self) -> i64 {
        self.database_id
    }

    /// The object store id.
    #[must_use]
    pub fn object_store_id(&self) -> i64 {
        self.object_store_id
    }

    /// The index id.
    #[must_use]
    pub fn index_id(&self) -> i64 {
        self.index_id
    }

    /// The tagged index key bytes.
    #[must_use]
    pub fn encoded_user_key(&self) -> &[u8] {
        &self.encoded_user_key
    }

    /// The tagged primary key bytes.
    #[must_use]
    pub fn encoded_primary_key(&self) -> &[u8] {
        &self.encoded_primary_key
    }

    /// The sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    /// Decodes the index key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored key is malformed.
    pub fn user_key(&self) -> CodecResult<Key> {
        Key::decode(&self.encoded_user_key)
    }

    /// Decodes the primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored key is malformed.
    pub fn primary_key(&self) -> CodecResult<Key> {
        Key::decode(&self.encoded_primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_decode() {
        let key = Key::array(vec![Key::string("a"), Key::number(2.0)]);
        let data = ObjectStoreDataKey::encode(1, 2, &key).unwrap();
        assert_eq!(ObjectStoreDataKey::decode(&data).unwrap().user_key().unwrap(), key);

        let exists = ExistsEntryKey::encode(1, 2, &key).unwrap();
        assert_eq!(
            ExistsEntryKey::decode(&exists).unwrap().encoded_user_key(),
            key.encode().as_slice()
        );
        assert!(ExistsEntryKey::decode(&data).is_err());
        assert!(ObjectStoreDataKey::decode(&exists).is_err());
    }

    #[test]
    fn record_key_rejects_trailing_bytes() {
        let mut data = ObjectStoreDataKey::encode(1, 2, &Key::number(1.0)).unwrap();
        data.push(0);
        assert!(ObjectStoreDataKey::decode(&data).is_err());
    }

    #[test]
    fn index_key_decodes_all_parts() {
        let encoded = IndexDataKey::encode(
            3,
            4,
            31,
            &Key::string("title").encode(),
            &Key::number(9.0).encode(),
            17,
        )
        .unwrap();
        let key = IndexDataKey::decode(&encoded).unwrap();
        assert_eq!((key.database_id(), key.object_store_id(), key.index_id()), (3, 4, 31));
        assert_eq!(key.user_key().unwrap(), Key::string("title"));
        assert_eq!(key.primary_key().unwrap(), Key::number(9.0));
        assert_eq!(key.sequence_number(), 17);
    }

    #[test]
    fn short_index_key_defaults_trailing_parts() {
        let mut encoded = KeyPrefix::new(3, 4, 31).encode().unwrap();
        encoded.extend_from_slice(&Key::string("t").encode());
        let key = IndexDataKey::decode(&encoded).unwrap();
        assert_eq!(key.sequence_number(), 0);
        assert_eq!(key.primary_key().unwrap(), Key::Min);
    }

    #[test]
    fn reserved_index_ids_are_rejected() {
        assert!(IndexDataKey::encode_min_key(1, 1, OBJECT_STORE_DATA_INDEX_ID).is_err());
        assert!(IndexDataKey::encode_min_key(1, 1, 29).is_err());
        assert!(IndexDataKey::encode_min_key(1, 1, 30).is_ok());
    }
}
