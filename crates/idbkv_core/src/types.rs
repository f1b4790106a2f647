//! Core type definitions.

use idbkv_codec::KeyPath;
use std::collections::BTreeMap;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 1;

/// First number a fresh key generator hands out.
pub const KEY_GENERATOR_INITIAL_NUMBER: i64 = 1;

/// Identifies one stored version of a record.
///
/// Index entries carry the version they were written for; an entry is live
/// only while the record's exists row still holds that version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RecordIdentifier {
    /// Tagged encoding of the primary key.
    pub encoded_primary_key: Vec<u8>,
    /// Version stamped on the record write.
    pub version: i64,
}

impl RecordIdentifier {
    /// Creates a record identifier.
    #[must_use]
    pub fn new(encoded_primary_key: Vec<u8>, version: i64) -> Self {
        Self {
            encoded_primary_key,
            version,
        }
    }
}

/// Metadata of one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseMetadata {
    /// Numeric id, unique within the backing store.
    pub id: i64,
    /// Database name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Integer version; `None` until one has been set.
    pub int_version: Option<i64>,
    /// Largest object store id handed out so far.
    pub max_object_store_id: i64,
}

/// Metadata of one object store, including its indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreMetadata {
    /// Numeric id, unique within the database.
    pub id: i64,
    /// Store name.
    pub name: String,
    /// Key path records are keyed by.
    pub key_path: KeyPath,
    /// Whether keys are generated.
    pub auto_increment: bool,
    /// Largest index id handed out so far.
    pub max_index_id: i64,
    /// Indexes by id.
    pub indexes: BTreeMap<i64, IndexMetadata>,
}

/// Metadata of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Numeric id, unique within the object store.
    pub id: i64,
    /// Index name.
    pub name: String,
    /// Key path index keys are read from.
    pub key_path: KeyPath,
    /// Whether index keys must be unique.
    pub unique: bool,
    /// Whether array keys produce one entry per element.
    pub multi_entry: bool,
}
