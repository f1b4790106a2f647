//! Composite key formats for every stored row.
//!
//! All keys share the [`KeyPrefix`] header. What follows depends on the
//! prefix category:
//!
//! | category          | rest of key                                              |
//! |-------------------|----------------------------------------------------------|
//! | global metadata   | type byte, then type-specific fields                     |
//! | database metadata | type byte, then type-specific fields                     |
//! | object-store data | tagged user key                                          |
//! | exists entry      | tagged user key                                          |
//! | index data        | tagged user key, varint sequence, tagged primary key     |

mod data;
mod database;
mod global;

pub use data::{ExistsEntryKey, IndexDataKey, ObjectStoreDataKey};
pub use database::{
    DatabaseMetaDataKey, DatabaseMetaDataType, IndexFreeListKey, IndexMetaDataKey,
    IndexMetaDataType, IndexNamesKey, ObjectStoreFreeListKey, ObjectStoreMetaDataKey,
    ObjectStoreMetaDataType, ObjectStoreNamesKey, INDEX_FREE_LIST_TYPE_BYTE,
    INDEX_META_DATA_TYPE_BYTE, INDEX_NAMES_TYPE_BYTE, MAX_SIMPLE_DATABASE_META_DATA_TYPE,
    OBJECT_STORE_FREE_LIST_TYPE_BYTE, OBJECT_STORE_META_DATA_TYPE_BYTE,
    OBJECT_STORE_NAMES_TYPE_BYTE,
};
pub use global::{
    DatabaseFreeListKey, DatabaseNameKey, MaxDatabaseIdKey, SchemaVersionKey,
    DATABASE_FREE_LIST_TYPE_BYTE, DATABASE_NAME_TYPE_BYTE, MAX_DATABASE_ID_TYPE_BYTE,
    MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE, SCHEMA_VERSION_TYPE_BYTE,
};

use crate::error::{CodecError, CodecResult};
use crate::prefix::{KeyCategory, KeyPrefix};
use crate::reader::KeyReader;

/// Metadata type byte marking the upper bound of a metadata range.
pub const MAX_META_DATA_TYPE: u8 = 255;

/// Decodes the prefix and checks its category, plus the metadata type
/// byte when one is given.
fn open_key(
    bytes: &[u8],
    category: KeyCategory,
    type_byte: Option<u8>,
) -> CodecResult<(KeyPrefix, KeyReader<'_>)> {
    let mut reader = KeyReader::new(bytes);
    let prefix = KeyPrefix::decode(&mut reader)?;
    if prefix.category() != category {
        return Err(CodecError::invalid_key(format!(
            "expected {category:?} key, found prefix {prefix}"
        )));
    }
    if let Some(expected) = type_byte {
        let found = reader.read_byte()?;
        if found != expected {
            return Err(CodecError::invalid_key(format!(
                "expected type byte {expected}, found {found}"
            )));
        }
    }
    Ok((prefix, reader))
}

fn finish(reader: &KeyReader<'_>) -> CodecResult<()> {
    if reader.is_empty() {
        Ok(())
    } else {
        Err(CodecError::invalid_key("trailing bytes after key"))
    }
}
