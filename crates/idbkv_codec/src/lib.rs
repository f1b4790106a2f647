//! # idbkv Codec
//!
//! Binary key and value encodings for idbkv, plus the total order the
//! storage engine sorts by.
//!
//! Every stored key starts with a [`KeyPrefix`] naming a database, object
//! store and index. The remainder is interpreted per prefix category; see
//! the [`keys`] module for the layouts and [`compare`] for the order.
//!
//! ## Example
//!
//! ```rust
//! use idbkv_codec::{compare_keys, Key, ObjectStoreDataKey};
//! use std::cmp::Ordering;
//!
//! let one = ObjectStoreDataKey::encode(1, 1, &Key::number(1.0)).unwrap();
//! let two = ObjectStoreDataKey::encode(1, 1, &Key::number(2.0)).unwrap();
//! assert_eq!(compare_keys(&one, &two).unwrap(), Ordering::Less);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coding;
mod compare;
mod error;
mod key;
mod key_path;
pub mod keys;
mod prefix;
mod reader;

pub use coding::{
    compare_utf16, decode_bool, decode_int, decode_string, decode_var_int, encode_bool,
    encode_double, encode_int, encode_string, encode_string_with_length, encode_var_int,
    fixed_int_len, put_double, put_int, put_string, put_string_with_length, put_var_int,
    MAX_FIXED_INT_BYTES,
};
pub use compare::{compare, compare_index_keys, compare_keys};
pub use error::{CodecError, CodecResult};
pub use key::{compare_encoded, compare_encoded_keys, Key, KeyType, MAX_KEY_DEPTH};
pub use key_path::KeyPath;
pub use keys::{
    DatabaseFreeListKey, DatabaseMetaDataKey, DatabaseMetaDataType, DatabaseNameKey,
    ExistsEntryKey, IndexDataKey, IndexFreeListKey, IndexMetaDataKey, IndexMetaDataType,
    IndexNamesKey, MaxDatabaseIdKey, ObjectStoreDataKey, ObjectStoreFreeListKey,
    ObjectStoreMetaDataKey, ObjectStoreMetaDataType, ObjectStoreNamesKey, SchemaVersionKey,
    MAX_META_DATA_TYPE,
};
pub use prefix::{
    KeyCategory, KeyPrefix, EXISTS_ENTRY_INDEX_ID, MAX_DATABASE_ID_BYTES, MAX_INDEX_ID,
    MAX_INDEX_ID_BYTES, MAX_OBJECT_STORE_ID_BYTES, MIN_INDEX_ID, OBJECT_STORE_DATA_INDEX_ID,
};
pub use reader::KeyReader;
