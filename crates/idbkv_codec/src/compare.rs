//! Total order over encoded keys.
//!
//! Keys order by prefix first. Within a prefix the rest of the key is
//! compared field by field according to the prefix category, so
//! `(db 1, os 2)` metadata never interleaves with `(db 1, os 10)` even
//! though the byte encodings would.

use crate::coding::compare_utf16;
use crate::error::{CodecError, CodecResult};
use crate::key::compare_encoded_keys;
use crate::keys::{
    DATABASE_FREE_LIST_TYPE_BYTE, DATABASE_NAME_TYPE_BYTE, INDEX_FREE_LIST_TYPE_BYTE,
    INDEX_META_DATA_TYPE_BYTE, INDEX_NAMES_TYPE_BYTE, MAX_SIMPLE_DATABASE_META_DATA_TYPE,
    MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE, OBJECT_STORE_FREE_LIST_TYPE_BYTE,
    OBJECT_STORE_META_DATA_TYPE_BYTE, OBJECT_STORE_NAMES_TYPE_BYTE,
};
use crate::prefix::{KeyCategory, KeyPrefix};
use crate::reader::KeyReader;
use std::cmp::Ordering;

/// Compares two stored keys.
///
/// With `only_index_keys` set, index entries compare equal when their
/// index keys are equal, ignoring primary key and sequence number.
///
/// # Errors
///
/// Returns an error if either key is malformed, uses an unknown metadata
/// type, or has an invalid prefix with a non-empty remainder.
pub fn compare(a: &[u8], b: &[u8], only_index_keys: bool) -> CodecResult<Ordering> {
    let mut reader_a = KeyReader::new(a);
    let mut reader_b = KeyReader::new(b);
    let prefix_a = KeyPrefix::decode(&mut reader_a)?;
    let prefix_b = KeyPrefix::decode(&mut reader_b)?;

    let by_prefix = prefix_a.compare(&prefix_b);
    if by_prefix != Ordering::Equal {
        return Ok(by_prefix);
    }
    match (reader_a.is_empty(), reader_b.is_empty()) {
        (true, true) => return Ok(Ordering::Equal),
        (true, false) => return Ok(Ordering::Less),
        (false, true) => return Ok(Ordering::Greater),
        (false, false) => {}
    }

    match prefix_a.category() {
        KeyCategory::GlobalMetaData => compare_global(&mut reader_a, &mut reader_b),
        KeyCategory::DatabaseMetaData => compare_database(&mut reader_a, &mut reader_b),
        KeyCategory::ObjectStoreData | KeyCategory::ExistsEntry => {
            compare_encoded_keys(&mut reader_a, &mut reader_b)
        }
        KeyCategory::IndexData => compare_index(&mut reader_a, &mut reader_b, only_index_keys),
        KeyCategory::Invalid => Err(CodecError::invalid_prefix(format!(
            "cannot order keys under prefix {prefix_a}"
        ))),
    }
}

/// Compares two stored keys in full.
///
/// # Errors
///
/// See [`compare`].
pub fn compare_keys(a: &[u8], b: &[u8]) -> CodecResult<Ordering> {
    compare(a, b, false)
}

/// Compares two stored keys, treating index entries as equal when their
/// index keys match.
///
/// # Errors
///
/// See [`compare`].
pub fn compare_index_keys(a: &[u8], b: &[u8]) -> CodecResult<Ordering> {
    compare(a, b, true)
}

fn compare_global(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    let type_a = a.read_byte()?;
    let type_b = b.read_byte()?;
    if type_a != type_b {
        return Ok(type_a.cmp(&type_b));
    }
    if type_a < MAX_SIMPLE_GLOBAL_META_DATA_TYPE_BYTE {
        return Ok(Ordering::Equal);
    }
    match type_a {
        DATABASE_FREE_LIST_TYPE_BYTE => compare_var_ints(a, b),
        DATABASE_NAME_TYPE_BYTE => {
            let ord = compare_strings(a, b)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
            compare_strings(a, b)
        }
        other => Err(CodecError::invalid_key(format!(
            "unknown global metadata type {other}"
        ))),
    }
}

fn compare_database(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    let type_a = a.read_byte()?;
    let type_b = b.read_byte()?;
    if type_a != type_b {
        return Ok(type_a.cmp(&type_b));
    }
    if type_a < MAX_SIMPLE_DATABASE_META_DATA_TYPE {
        return Ok(Ordering::Equal);
    }
    match type_a {
        OBJECT_STORE_META_DATA_TYPE_BYTE => {
            then(compare_var_ints(a, b)?, || compare_bytes(a, b))
        }
        INDEX_META_DATA_TYPE_BYTE => then(compare_var_ints(a, b)?, || {
            then(compare_var_ints(a, b)?, || compare_bytes(a, b))
        }),
        OBJECT_STORE_FREE_LIST_TYPE_BYTE => compare_var_ints(a, b),
        INDEX_FREE_LIST_TYPE_BYTE => {
            then(compare_var_ints(a, b)?, || compare_var_ints(a, b))
        }
        OBJECT_STORE_NAMES_TYPE_BYTE => compare_strings(a, b),
        INDEX_NAMES_TYPE_BYTE => then(compare_var_ints(a, b)?, || compare_strings(a, b)),
        other => Err(CodecError::invalid_key(format!(
            "unknown database metadata type {other}"
        ))),
    }
}

fn compare_index(
    a: &mut KeyReader<'_>,
    b: &mut KeyReader<'_>,
    only_index_keys: bool,
) -> CodecResult<Ordering> {
    let by_user_key = compare_encoded_keys(a, b)?;
    if by_user_key != Ordering::Equal || only_index_keys {
        return Ok(by_user_key);
    }

    // A key that stops after the index key sorts before its entries.
    let seq_a = if a.is_empty() { 0 } else { a.read_var_int()? };
    let seq_b = if b.is_empty() { 0 } else { b.read_var_int()? };

    let by_primary_key = match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_encoded_keys(a, b)?,
    };
    if by_primary_key != Ordering::Equal {
        return Ok(by_primary_key);
    }
    Ok(seq_a.cmp(&seq_b))
}

fn then(
    first: Ordering,
    rest: impl FnOnce() -> CodecResult<Ordering>,
) -> CodecResult<Ordering> {
    if first == Ordering::Equal {
        rest()
    } else {
        Ok(first)
    }
}

fn compare_var_ints(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    Ok(a.read_var_int()?.cmp(&b.read_var_int()?))
}

fn compare_bytes(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    Ok(a.read_byte()?.cmp(&b.read_byte()?))
}

fn compare_strings(a: &mut KeyReader<'_>, b: &mut KeyReader<'_>) -> CodecResult<Ordering> {
    Ok(compare_utf16(
        a.read_utf16_with_length()?,
        b.read_utf16_with_length()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::keys::{
        DatabaseFreeListKey, DatabaseMetaDataKey, DatabaseMetaDataType, DatabaseNameKey,
        ExistsEntryKey, IndexDataKey, IndexMetaDataKey, IndexMetaDataType, IndexNamesKey,
        MaxDatabaseIdKey, ObjectStoreDataKey, ObjectStoreMetaDataKey, ObjectStoreMetaDataType,
        ObjectStoreNamesKey, SchemaVersionKey,
    };
    use proptest::prelude::*;

    fn assert_ascending(keys: &[Vec<u8>]) {
        for (i, pair) in keys.windows(2).enumerate() {
            assert_eq!(compare_keys(&pair[0], &pair[1]).unwrap(), Ordering::Less, "pair {i}");
            assert_eq!(compare_keys(&pair[1], &pair[0]).unwrap(), Ordering::Greater, "pair {i}");
        }
    }

    fn index_key(user: &Key, primary: &Key, seq: i64) -> Vec<u8> {
        IndexDataKey::encode(1, 1, 30, &user.encode(), &primary.encode(), seq).unwrap()
    }

    #[test]
    fn keyspace_layout_orders_by_prefix_then_category_fields() {
        assert_ascending(&[
            KeyPrefix::global().encode().unwrap(),
            SchemaVersionKey::encode(),
            MaxDatabaseIdKey::encode(),
            DatabaseFreeListKey::encode(1).unwrap(),
            DatabaseFreeListKey::encode(300).unwrap(),
            DatabaseFreeListKey::encode_max_key(),
            DatabaseNameKey::encode("a", "z"),
            DatabaseNameKey::encode("b", ""),
            DatabaseNameKey::encode("b", "db"),
            DatabaseNameKey::encode_stop_key_for_origin("b"),
            DatabaseMetaDataKey::encode(1, DatabaseMetaDataType::OriginName).unwrap(),
            DatabaseMetaDataKey::encode(1, DatabaseMetaDataType::UserIntVersion).unwrap(),
            ObjectStoreMetaDataKey::encode(1, 2, ObjectStoreMetaDataType::Name).unwrap(),
            ObjectStoreMetaDataKey::encode(1, 2, ObjectStoreMetaDataType::HasKeyPath).unwrap(),
            ObjectStoreMetaDataKey::encode_max_key_for_store(1, 2).unwrap(),
            ObjectStoreMetaDataKey::encode(1, 10, ObjectStoreMetaDataType::Name).unwrap(),
            ObjectStoreMetaDataKey::encode_max_key(1).unwrap(),
            IndexMetaDataKey::encode(1, 2, 30, IndexMetaDataType::Name).unwrap(),
            IndexMetaDataKey::encode(1, 2, 31, IndexMetaDataType::Name).unwrap(),
            IndexMetaDataKey::encode_max_key(1, 2).unwrap(),
            ObjectStoreNamesKey::encode(1, "a").unwrap(),
            ObjectStoreNamesKey::encode(1, "b").unwrap(),
            IndexNamesKey::encode_min_key(1, 2).unwrap(),
            IndexNamesKey::encode(1, 2, "x").unwrap(),
            IndexNamesKey::encode_stop_key(1, 2).unwrap(),
            KeyPrefix::object_store(1, 2).encode().unwrap(),
            ObjectStoreDataKey::encode(1, 2, &Key::string("a")).unwrap(),
            ObjectStoreDataKey::encode(1, 2, &Key::number(1.0)).unwrap(),
            ExistsEntryKey::encode(1, 2, &Key::number(1.0)).unwrap(),
            IndexDataKey::encode_min_key(1, 2, 30).unwrap(),
            IndexDataKey::encode_max_key(1, 2, 30).unwrap(),
            KeyPrefix::object_store(1, 3).encode().unwrap(),
            DatabaseMetaDataKey::encode(2, DatabaseMetaDataType::OriginName).unwrap(),
        ]);
    }

    #[test]
    fn object_store_data_uses_key_order_not_byte_order() {
        // Byte order would put 256.0 before 1.0 on little-endian hosts.
        let small = ObjectStoreDataKey::encode(1, 1, &Key::number(1.0)).unwrap();
        let large = ObjectStoreDataKey::encode(1, 1, &Key::number(256.0)).unwrap();
        assert_eq!(compare_keys(&small, &large).unwrap(), Ordering::Less);
    }

    #[test]
    fn index_entries_order_by_user_key_primary_key_then_sequence() {
        assert_ascending(&[
            IndexDataKey::encode_for_user_key(1, 1, 30, &Key::string("a")).unwrap(),
            index_key(&Key::string("a"), &Key::number(1.0), 9),
            index_key(&Key::string("a"), &Key::number(2.0), 1),
            index_key(&Key::string("a"), &Key::number(2.0), 5),
            index_key(&Key::string("b"), &Key::number(0.0), 0),
        ]);
    }

    #[test]
    fn only_index_keys_ignores_primary_key_and_sequence() {
        let a = index_key(&Key::string("a"), &Key::number(1.0), 9);
        let b = index_key(&Key::string("a"), &Key::number(2.0), 1);
        assert_eq!(compare_index_keys(&a, &b).unwrap(), Ordering::Equal);
        assert_eq!(compare_keys(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn bare_prefix_sorts_before_its_keys() {
        let bare = KeyPrefix::new(1, 1, 30).encode().unwrap();
        let entry = index_key(&Key::Min, &Key::Min, 0);
        assert_eq!(compare_keys(&bare, &entry).unwrap(), Ordering::Less);
        assert_eq!(compare_keys(&bare, &bare).unwrap(), Ordering::Equal);
    }

    #[test]
    fn invalid_prefix_with_payload_is_an_error() {
        let mut a = KeyPrefix::new(1, 1, 3).encode().unwrap();
        a.push(1);
        assert!(compare_keys(&a, &a).is_err());

        let bare = KeyPrefix::new(1, 1, 3).encode().unwrap();
        assert_eq!(compare_keys(&bare, &bare).unwrap(), Ordering::Equal);
    }

    #[test]
    fn unknown_metadata_type_is_an_error() {
        let mut a = KeyPrefix::database(1).encode().unwrap();
        a.push(77);
        assert!(compare_keys(&a, &a).is_err());

        let mut g = KeyPrefix::global().encode().unwrap();
        g.push(150);
        assert!(compare_keys(&g, &g).is_err());
    }

    #[test]
    fn simple_metadata_rows_ignore_trailing_bytes() {
        let a = SchemaVersionKey::encode();
        let mut b = SchemaVersionKey::encode();
        b.push(9);
        assert_eq!(compare_keys(&a, &b).unwrap(), Ordering::Equal);
    }

    fn arb_key() -> impl Strategy<Value = Key> {
        prop_oneof![
            "[a-d]{0,3}".prop_map(Key::String),
            (-3i32..3).prop_map(|n| Key::Number(f64::from(n))),
            (-3i32..3).prop_map(|n| Key::Date(f64::from(n))),
        ]
    }

    proptest! {
        #[test]
        fn index_key_order_is_lexicographic_over_parts(
            a in (arb_key(), arb_key(), 0i64..4),
            b in (arb_key(), arb_key(), 0i64..4),
        ) {
            let expected = a.0.compare(&b.0)
                .then_with(|| a.1.compare(&b.1))
                .then_with(|| a.2.cmp(&b.2));
            let encoded_a = index_key(&a.0, &a.1, a.2);
            let encoded_b = index_key(&b.0, &b.1, b.2);
            prop_assert_eq!(compare_keys(&encoded_a, &encoded_b).unwrap(), expected);
            prop_assert_eq!(
                compare_index_keys(&encoded_a, &encoded_b).unwrap(),
                a.0.compare(&b.0)
            );
        }
    }
}
