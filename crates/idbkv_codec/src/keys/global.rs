use super::{finish, open_key};
use crate::coding::{put_string_with_length, put_var_int, put_var_u64};
use crate::error::CodecResult;
use crate::prefix::{KeyCategory, KeyPrefix};

/// Type byte of the schema version row.
pub const SCHEMA_VERSION_TYPE_BYTE: u8 = 0;
/// Type byte of the max-database-id counter row.
pub const MAX_DATABASE_ID_TYPE_BYTE: u8 = 1;
/// Types below this are single rows with nothing after the type byte.
pub const MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE: u8 = 32;
/// Type byte of database free-list rows.
pub const DATABASE_FREE_LIST_TYPE_BYTE: u8 = 100;
/// Type byte of `(origin, name) -> database id` rows.
pub const DATABASE_NAME_TYPE_BYTE: u8 = 201;

fn global_key(type_byte: u8) -> Vec<u8> {
    let mut buf = KeyPrefix::GLOBAL_ENCODED.to_vec();
    buf.push(type_byte);
    buf
}

/// Row holding the schema version as a fixed int.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersionKey;

impl SchemaVersionKey {
    /// Encodes the key.
    #[must_use]
    pub fn encode() -> Vec<u8> {
        global_key(SCHEMA_VERSION_TYPE_BYTE)
    }
}

/// Row holding the largest database id handed out so far.
#[derive(Debug, Clone, Copy)]
pub struct MaxDatabaseIdKey;

impl MaxDatabaseIdKey {
    /// Encodes the key.
    #[must_use]
    pub fn encode() -> Vec<u8> {
        global_key(MAX_DATABASE_ID_TYPE_BYTE)
    }
}

/// A recycled database id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseFreeListKey {
    database_id: i64,
}

impl DatabaseFreeListKey {
    /// Encodes the free-list row for `database_id`.
    ///
    /// # Errors
    ///
    /// Returns `NegativeValue` for a negative id.
    pub fn encode(database_id: i64) -> CodecResult<Vec<u8>> {
        let mut buf = global_key(DATABASE_FREE_LIST_TYPE_BYTE);
        put_var_int(&mut buf, database_id)?;
        Ok(buf)
    }

    /// Encodes a key after every database free-list row.
    #[must_use]
    pub fn encode_max_key() -> Vec<u8> {
        let mut buf = global_key(DATABASE_FREE_LIST_TYPE_BYTE);
        put_var_u64(&mut buf, i64::MAX as u64);
        buf
    }

    /// Decodes a free-list row key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a database free-list key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::GlobalMetaData,
            Some(DATABASE_FREE_LIST_TYPE_BYTE),
        )?;
        let database_id = reader.read_var_int()?;
        finish(&reader)?;
        Ok(Self { database_id })
    }

    /// The recycled id.
    #[must_use]
    pub fn database_id(&self) -> i64 {
        self.database_id
    }
}

/// Maps an origin and database name to a database id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseNameKey {
    origin: String,
    database_name: String,
}

impl DatabaseNameKey {
    /// Encodes the lookup row for `database_name` within `origin`.
    #[must_use]
    pub fn encode(origin: &str, database_name: &str) -> Vec<u8> {
        let mut buf = global_key(DATABASE_NAME_TYPE_BYTE);
        put_string_with_length(&mut buf, origin);
        put_string_with_length(&mut buf, database_name);
        buf
    }

    /// The smallest name key of `origin`.
    #[must_use]
    pub fn encode_min_key_for_origin(origin: &str) -> Vec<u8> {
        Self::encode(origin, "")
    }

    /// A key just past every name key of `origin`.
    #[must_use]
    pub fn encode_stop_key_for_origin(origin: &str) -> Vec<u8> {
        Self::encode_min_key_for_origin(&format!("{origin}\u{1}"))
    }

    /// Decodes a name key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a database name key.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (_, mut reader) = open_key(
            bytes,
            KeyCategory::GlobalMetaData,
            Some(DATABASE_NAME_TYPE_BYTE),
        )?;
        let origin = reader.read_string_with_length()?;
        let database_name = reader.read_string_with_length()?;
        finish(&reader)?;
        Ok(Self {
            origin,
            database_name,
        })
    }

    /// The origin the database belongs to.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The database name.
    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.database_name
    }
}
