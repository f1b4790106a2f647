//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use idbkv_codec::{Key, KeyPath, KeyPrefix, MAX_INDEX_ID};
use proptest::prelude::*;

/// Strategy for finite doubles, including both zeros and extremes.
pub fn finite_f64_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO,
        Just(f64::MAX),
        Just(f64::MIN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

/// Strategy for strings mixing ASCII, BMP and astral code points.
pub fn key_string_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]{0,8}").expect("Invalid regex"),
        any::<String>().prop_map(|s| s.chars().take(12).collect()),
    ]
}

/// Strategy for non-array keys a record can be stored under.
pub fn scalar_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        key_string_strategy().prop_map(Key::String),
        finite_f64_strategy().prop_map(Key::Date),
        finite_f64_strategy().prop_map(Key::Number),
    ]
}

/// Strategy for valid record keys, arrays nested up to three levels.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    scalar_key_strategy().prop_recursive(3, 24, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Key::Array)
    })
}

/// Strategy for any key, including the `Min` and `Null` probe keys.
pub fn probe_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        8 => key_strategy(),
        1 => Just(Key::Min),
        1 => Just(Key::Null),
    ]
}

/// Strategy for key paths.
pub fn key_path_strategy() -> impl Strategy<Value = KeyPath> {
    let segment = || prop::string::string_regex("[a-z][a-z0-9_.]{0,15}").expect("Invalid regex");
    prop_oneof![
        Just(KeyPath::Null),
        segment().prop_map(KeyPath::String),
        prop::collection::vec(segment(), 0..4).prop_map(KeyPath::Array),
    ]
}

/// Strategy for ids spread over every encoded width.
pub fn id_strategy(max: i64) -> impl Strategy<Value = i64> {
    prop_oneof![
        0..=255_i64,
        0..=max,
        Just(max),
    ]
}

/// Strategy for encodable key prefixes.
pub fn key_prefix_strategy() -> impl Strategy<Value = KeyPrefix> {
    (id_strategy(i64::MAX), id_strategy(i64::MAX), id_strategy(MAX_INDEX_ID))
        .prop_map(|(database_id, object_store_id, index_id)| {
            KeyPrefix::new(database_id, object_store_id, index_id)
        })
}

/// Strategy for database and object store names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_ ]{0,31}").expect("Invalid regex")
}

/// Strategy for record values (arbitrary bytes).
pub fn record_value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use idbkv_codec::{compare_keys, ObjectStoreDataKey};
    use std::cmp::Ordering;

    proptest! {
        #[test]
        fn generated_keys_are_valid(key in key_strategy()) {
            prop_assert!(key.is_valid());
            prop_assert_eq!(Key::decode(&key.encode()).unwrap(), key);
        }

        #[test]
        fn data_key_order_matches_key_order(a in probe_key_strategy(), b in probe_key_strategy()) {
            let encoded_a = ObjectStoreDataKey::encode(1, 1, &a).unwrap();
            let encoded_b = ObjectStoreDataKey::encode(1, 1, &b).unwrap();
            prop_assert_eq!(compare_keys(&encoded_a, &encoded_b).unwrap(), a.compare(&b));
        }

        #[test]
        fn prefixes_round_trip(prefix in key_prefix_strategy()) {
            let encoded = prefix.encode().unwrap();
            let decoded = KeyPrefix::decode(&mut idbkv_codec::KeyReader::new(&encoded)).unwrap();
            prop_assert_eq!(decoded, prefix);
        }

        #[test]
        fn key_paths_round_trip(path in key_path_strategy()) {
            prop_assert_eq!(KeyPath::decode(&path.encode()).unwrap(), path);
        }
    }

    #[test]
    fn probe_keys_bracket_generated_keys() {
        let mut runner = proptest::test_runner::TestRunner::default();
        runner
            .run(&key_strategy(), |key| {
                prop_assert_eq!(Key::Min.compare(&key), Ordering::Less);
                prop_assert_eq!(key.compare(&Key::Null), Ordering::Less);
                Ok(())
            })
            .unwrap();
    }
}
